//! The OS backend behind `DisplayApi`.

use crate::topology::{AdapterId, CurrentPath, DisplayApi, ModeRecord, OsStatus, SetFlags, TargetDeviceName};

#[cfg(windows)]
mod win32;

#[cfg(windows)]
pub use win32::Win32Display as NativeDisplay;

#[cfg(not(windows))]
pub type NativeDisplay = Unsupported;

#[cfg(windows)]
pub fn native() -> NativeDisplay {
    win32::Win32Display
}

#[cfg(not(windows))]
pub fn native() -> NativeDisplay {
    Unsupported
}

/// Backend for systems without a display-configuration API. Every call fails with
/// `OsStatus::NOT_SUPPORTED`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unsupported;

impl DisplayApi for Unsupported {
    fn buffer_sizes(&self) -> Result<(usize, usize), OsStatus> {
        Err(OsStatus::NOT_SUPPORTED)
    }

    fn query_config(&self, _paths: &mut [CurrentPath], _modes: &mut [ModeRecord]) -> Result<(usize, usize), OsStatus> {
        Err(OsStatus::NOT_SUPPORTED)
    }

    fn target_device_name(&self, _adapter_id: AdapterId, _target_id: u32) -> Result<TargetDeviceName, OsStatus> {
        Err(OsStatus::NOT_SUPPORTED)
    }

    fn set_config(&self, _paths: &[CurrentPath], _modes: &[ModeRecord], _flags: SetFlags) -> OsStatus {
        OsStatus::NOT_SUPPORTED
    }
}
