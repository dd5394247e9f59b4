use thiserror::Error;

use crate::topology::{AdapterId, OsStatus};

/// Which half of the apply protocol an OS failure came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyStage {
    Precise,
    TopologyOnly,
}

impl std::fmt::Display for ApplyStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplyStage::Precise => write!(f, "apply"),
            ApplyStage::TopologyOnly => write!(f, "topology apply"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("failed to query current display config: Win32 error {status}")]
    TopologyQueryFailed { status: OsStatus },

    #[error("profile contains no monitors")]
    NoMonitorsInProfile,

    #[error("safety check failed: profile has no active displays")]
    EmptyActiveSet,

    #[error("no monitors from the profile could be matched to currently connected displays")]
    NoMonitorsMatched { missing: Vec<String> },

    #[error("topology validation failed with Win32 error {status}")]
    ValidationFailed { status: OsStatus },

    #[error("SetDisplayConfig {stage} failed with Win32 error {status}")]
    ApplyFailed { status: OsStatus, stage: ApplyStage },

    #[error("no free source id left on adapter {adapter}")]
    SourceAllocationExhausted { adapter: AdapterId },

    #[error("profile '{0}' not found")]
    ProfileNotFound(String),

    #[error("no previous display configuration to revert to")]
    NoUndoState,

    #[error("invalid profile name: {0}")]
    InvalidProfileName(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl DisplayError {
    /// Raw OS status attached to this failure, or 0 when the failure never reached the OS.
    pub fn status_code(&self) -> i32 {
        match self {
            DisplayError::TopologyQueryFailed { status }
            | DisplayError::ValidationFailed { status }
            | DisplayError::ApplyFailed { status, .. } => status.code(),
            _ => 0,
        }
    }
}

pub type Result<T> = std::result::Result<T, DisplayError>;
