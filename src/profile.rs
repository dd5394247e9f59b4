use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DisplayError, Result};
use crate::monitor::MonitorConfig;

pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// A named arrangement of monitors. Monitor order is capture order and carries no meaning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DisplayProfile {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub monitors: Vec<MonitorConfig>,
}

impl DisplayProfile {
    pub fn new(name: &str, monitors: Vec<MonitorConfig>) -> Self {
        let now = Utc::now();
        DisplayProfile {
            schema_version: SCHEMA_VERSION,
            name: name.to_string(),
            description: String::new(),
            created_at: now,
            modified_at: now,
            monitors,
        }
    }

    pub fn active_monitors(&self) -> impl Iterator<Item = &MonitorConfig> {
        self.monitors.iter().filter(|m| m.active)
    }

    pub fn active_count(&self) -> usize {
        self.active_monitors().count()
    }

    pub fn summary(&self) -> String {
        format!("{}/{} monitors active", self.active_count(), self.monitors.len())
    }

    /// Reject profiles that would switch every display off.
    pub fn ensure_appliable(&self) -> Result<()> {
        if self.monitors.is_empty() {
            return Err(DisplayError::NoMonitorsInProfile);
        }
        if self.active_count() == 0 {
            return Err(DisplayError::EmptyActiveSet);
        }
        Ok(())
    }
}
