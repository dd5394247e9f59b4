use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use crossterm::style::Stylize;

use crate::apply::ApplyResult;
use crate::config::Settings;
use crate::service::ProfileService;
use crate::topology::DisplayApi;

#[derive(Debug, Parser)]
#[command(name = "displayset", version, about = "Save and restore multi-monitor display layouts")]
pub struct Cli {
    /// Directory holding saved profiles and the undo state
    #[arg(long, global = true, value_name = "DIR")]
    pub profile_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List all saved profiles
    List,
    /// Save the current display configuration
    Save {
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
        /// Overwrite an existing profile
        #[arg(short, long)]
        force: bool,
    },
    /// Apply a saved profile
    Load { name: String },
    /// Show the current display configuration
    Current,
    /// Delete a saved profile
    Delete {
        name: String,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Revert to the configuration in place before the last apply
    Undo,
    /// Interactive profile manager (default)
    Tui,
}

impl Command {
    pub fn is_tui(&self) -> bool {
        matches!(self, Command::Tui)
    }
}

/// Run one command and return the process exit code.
pub fn run<A: DisplayApi>(service: &ProfileService<A>, settings: &Settings, command: Command) -> Result<u8> {
    match command {
        Command::List => list_profiles(service),
        Command::Save { name, description, force } => save_profile(service, &name, &description, force),
        Command::Load { name } => load_profile(service, &name),
        Command::Current => show_current(service),
        Command::Delete { name, yes } => delete_profile(service, &name, yes),
        Command::Undo => undo(service),
        Command::Tui => {
            crate::app::run(service, settings)?;
            Ok(0)
        }
    }
}

fn list_profiles<A: DisplayApi>(service: &ProfileService<A>) -> Result<u8> {
    let profiles = service.list().context("failed to read saved profiles")?;

    if profiles.is_empty() {
        println!("No saved profiles.");
        println!("Use 'displayset save \"Name\"' to save the current display configuration.");
        return Ok(0);
    }

    println!("{:<30} {:<15} {:<20} Description", "Name", "Monitors", "Created");
    println!("{}", "-".repeat(90));

    for profile in &profiles {
        let created = profile.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string();
        println!(
            "{:<30} {:<15} {:<20} {}",
            truncate(&profile.name, 28),
            profile.summary(),
            created,
            truncate(&profile.description, 30)
        );
    }

    println!();
    println!("{} profile(s) found.", profiles.len());
    Ok(0)
}

fn save_profile<A: DisplayApi>(service: &ProfileService<A>, name: &str, description: &str, force: bool) -> Result<u8> {
    if service.exists(name) && !force {
        print_error(&format!("Profile '{}' already exists. Use --force to overwrite.", name));
        return Ok(1);
    }

    let profile = service
        .save_current(name, description)
        .with_context(|| format!("failed to save profile '{}'", name))?;

    println!("{}", format!("✓ Profile '{}' saved successfully.", name).green());
    println!("  Monitors: {}", profile.summary());
    for m in &profile.monitors {
        println!(
            "    {}: {} @ {} ({})",
            m.display_name(),
            m.resolution_string(),
            m.refresh_rate,
            m.status_string()
        );
    }
    Ok(0)
}

fn load_profile<A: DisplayApi>(service: &ProfileService<A>, name: &str) -> Result<u8> {
    println!("Applying profile '{}'...", name);
    let result = ApplyResult::from(&service.apply_by_name(name));
    Ok(report_apply(&result))
}

fn undo<A: DisplayApi>(service: &ProfileService<A>) -> Result<u8> {
    println!("Reverting to previous display configuration...");
    let result = ApplyResult::from(&service.revert());
    Ok(report_apply(&result))
}

/// Print an apply outcome. Exit code 2 means the OS rejected something.
fn report_apply(result: &ApplyResult) -> u8 {
    if result.success {
        println!("{}", format!("✓ {}", result.message).green());
        if !result.missing.is_empty() {
            println!("{}", "Missing monitors (not currently connected):".yellow());
            for name in &result.missing {
                println!("    - {}", name);
            }
        }
        return 0;
    }

    print_error(&result.message);
    if !result.missing.is_empty() {
        eprintln!("  Not connected: {}", result.missing.join(", "));
    }
    if result.error_code != 0 {
        eprintln!("  Win32 error code: {}", result.error_code);
        2
    } else {
        1
    }
}

fn show_current<A: DisplayApi>(service: &ProfileService<A>) -> Result<u8> {
    let profile = service.current().context("failed to read the current display configuration")?;

    println!("Current Display Configuration:");
    println!("{}", "-".repeat(70));

    for m in &profile.monitors {
        let primary = if m.primary { " [Primary]" } else { "" };
        let rotation = match m.rotation.label() {
            "" => String::new(),
            label => format!(" ({})", label),
        };
        println!("  {}{}", m.display_name(), primary);
        println!("    Status:     {}", if m.active { "Active" } else { "Disabled" });
        println!("    Resolution: {}{}", m.resolution_string(), rotation);
        println!("    Refresh:    {}", m.refresh_rate);
        println!("    Position:   ({}, {})", m.x, m.y);
        println!("    Connector:  {}", m.identity.connector.label());
        println!("    EDID:       {} / {}", m.identity.manufacturer, m.identity.product_code);
        println!("    Device:     {}", m.identity.device_path);
        println!();
    }

    println!("Total: {} monitor(s), {} active", profile.monitors.len(), profile.active_count());
    Ok(0)
}

fn delete_profile<A: DisplayApi>(service: &ProfileService<A>, name: &str, yes: bool) -> Result<u8> {
    if !service.exists(name) {
        print_error(&format!("Profile '{}' not found.", name));
        return Ok(2);
    }

    if !yes && !confirm(&format!("Delete profile '{}'? [y/N] ", name))? {
        println!("Cancelled.");
        return Ok(0);
    }

    if service.delete(name).with_context(|| format!("failed to delete profile '{}'", name))? {
        println!("{}", format!("✓ Profile '{}' deleted.", name).green());
        Ok(0)
    } else {
        print_error(&format!("Failed to delete profile '{}'.", name));
        Ok(1)
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn print_error(message: &str) {
    eprintln!("{}", format!("Error: {}", message).red());
}

fn truncate(value: &str, max_len: usize) -> String {
    if value.chars().count() <= max_len {
        return value.to_string();
    }
    let mut short: String = value.chars().take(max_len.saturating_sub(2)).collect();
    short.push_str("..");
    short
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_save_with_flags() {
        let cli = Cli::parse_from(["displayset", "save", "Office", "-d", "All four", "-f"]);
        match cli.command {
            Some(Command::Save { name, description, force }) => {
                assert_eq!(name, "Office");
                assert_eq!(description, "All four");
                assert!(force);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_no_command_means_tui() {
        let cli = Cli::parse_from(["displayset", "--profile-dir", "/tmp/p"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.profile_dir, Some(PathBuf::from("/tmp/p")));
    }

    #[test]
    fn test_exit_codes() {
        let ok = ApplyResult {
            success: true,
            ..Default::default()
        };
        assert_eq!(report_apply(&ok), 0);

        let rejected = ApplyResult {
            message: "SetDisplayConfig apply failed".to_string(),
            error_code: 87,
            ..Default::default()
        };
        assert_eq!(report_apply(&rejected), 2);

        let missing = ApplyResult {
            message: "profile 'x' not found".to_string(),
            ..Default::default()
        };
        assert_eq!(report_apply(&missing), 1);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Office", 28), "Office");
        assert_eq!(truncate("abcdefghij", 6), "abcd..");
    }
}
