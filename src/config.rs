use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::store::ProfileStore;

/// Application settings, read from `<config_dir>/displayset/config.json`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Where profiles and the undo slot live. Defaults to the platform data directory.
    #[serde(default)]
    pub profile_dir: Option<PathBuf>,

    /// Seconds the TUI waits for the user to keep an applied profile before reverting.
    #[serde(default = "default_confirm_timeout_secs")]
    pub confirm_timeout_secs: u64,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_confirm_timeout_secs() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            profile_dir: None,
            confirm_timeout_secs: default_confirm_timeout_secs(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("displayset").join("config.json"))
    }

    pub fn load() -> Self {
        Self::path().map(|path| Self::load_from(&path)).unwrap_or_default()
    }

    /// Missing file means defaults. A malformed one also means defaults, with a warning.
    pub fn load_from(path: &Path) -> Self {
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read settings, using defaults");
                return Self::default();
            }
        };

        serde_json::from_str(&json).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "malformed settings, using defaults");
            Self::default()
        })
    }

    pub fn profile_dir(&self) -> PathBuf {
        self.profile_dir.clone().unwrap_or_else(ProfileStore::default_base_dir)
    }
}
