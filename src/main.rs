mod app;
mod apply;
mod capture;
mod cli;
mod config;
mod error;
mod identity;
mod matching;
mod monitor;
mod platform;
mod profile;
mod service;
#[cfg(test)]
mod sim;
mod source_ids;
mod store;
mod topology;
mod ui;
mod undo;

use std::fs::OpenOptions;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

use crate::cli::{Cli, Command};
use crate::config::Settings;
use crate::service::ProfileService;
use crate::store::ProfileStore;

const LOG_FILE_NAME: &str = "displayset.log";

fn parse_level(name: &str) -> Level {
    match name.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Log to stderr, or to `log_file` while the TUI owns the terminal.
fn init_logging(settings: &Settings, log_file: Option<&Path>) -> Result<()> {
    let level = parse_level(&std::env::var("LOG_LEVEL").unwrap_or_else(|_| settings.log_level.clone()));
    let builder = FmtSubscriber::builder().with_max_level(level);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            let subscriber = builder.with_ansi(false).with_writer(Mutex::new(file)).finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        None => {
            let subscriber = builder.with_writer(std::io::stderr).finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}

fn run(cli: Cli) -> Result<u8> {
    let settings = Settings::load();
    let profile_dir = cli.profile_dir.unwrap_or_else(|| settings.profile_dir());
    let command = cli.command.unwrap_or(Command::Tui);

    let store = ProfileStore::open(&profile_dir)
        .with_context(|| format!("failed to open profile directory {}", profile_dir.display()))?;

    let log_file = command.is_tui().then(|| profile_dir.join(LOG_FILE_NAME));
    init_logging(&settings, log_file.as_deref())?;
    debug!(profile_dir = %store.base_dir().display(), ?command, "starting");

    let service = ProfileService::new(platform::native(), store);
    cli::run(&service, &settings, command)
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}
