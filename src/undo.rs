use std::cell::RefCell;

use tracing::info;

use crate::apply::{apply_profile, ApplyReport};
use crate::capture::capture_current_config;
use crate::error::{DisplayError, Result};
use crate::profile::DisplayProfile;
use crate::topology::DisplayApi;

pub const UNDO_PROFILE_NAME: &str = "_previous";

/// Storage for the single "previous configuration" slot. Last write wins.
pub trait UndoSlot {
    fn store_previous(&self, profile: &DisplayProfile) -> Result<()>;
    fn load_previous(&self) -> Result<Option<DisplayProfile>>;
}

/// Undo slot that lives only as long as the value does.
#[derive(Debug, Default)]
pub struct MemoryUndoSlot {
    slot: RefCell<Option<DisplayProfile>>,
}

impl UndoSlot for MemoryUndoSlot {
    fn store_previous(&self, profile: &DisplayProfile) -> Result<()> {
        *self.slot.borrow_mut() = Some(profile.clone());
        Ok(())
    }

    fn load_previous(&self) -> Result<Option<DisplayProfile>> {
        Ok(self.slot.borrow().clone())
    }
}

/// Capture what is on screen now and overwrite the undo slot with it.
pub fn capture_undo_state<A, U>(api: &A, slot: &U) -> Result<()>
where
    A: DisplayApi + ?Sized,
    U: UndoSlot + ?Sized,
{
    let mut previous = capture_current_config(api)?;
    previous.name = UNDO_PROFILE_NAME.to_string();
    slot.store_previous(&previous)?;
    info!(active = previous.active_count(), "stored previous configuration for undo");
    Ok(())
}

/// Apply `profile`, remembering the current configuration first.
pub fn apply_with_undo<A, U>(api: &A, slot: &U, profile: &DisplayProfile) -> Result<ApplyReport>
where
    A: DisplayApi + ?Sized,
    U: UndoSlot + ?Sized,
{
    // an unappliable profile must not cost an OS call or the stored undo state
    profile.ensure_appliable()?;
    capture_undo_state(api, slot)?;
    apply_profile(api, profile)
}

/// Re-apply the stored previous configuration. The slot is left as it is.
pub fn revert<A, U>(api: &A, slot: &U) -> Result<ApplyReport>
where
    A: DisplayApi + ?Sized,
    U: UndoSlot + ?Sized,
{
    let previous = slot.load_previous()?.ok_or(DisplayError::NoUndoState)?;
    info!("reverting to previous display configuration");
    apply_profile(api, &previous)
}
