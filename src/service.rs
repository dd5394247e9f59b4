use chrono::Utc;
use tracing::info;

use crate::apply::ApplyReport;
use crate::capture::capture_current_config;
use crate::error::{DisplayError, Result};
use crate::profile::DisplayProfile;
use crate::store::{sanitize_name, ProfileStore};
use crate::topology::DisplayApi;
use crate::undo;

pub const CURRENT_PROFILE_NAME: &str = "(current)";

/// Saved-profile operations against one display backend and one store.
pub struct ProfileService<A> {
    api: A,
    store: ProfileStore,
}

impl<A: DisplayApi> ProfileService<A> {
    pub fn new(api: A, store: ProfileStore) -> Self {
        ProfileService { api, store }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn store(&self) -> &ProfileStore {
        &self.store
    }

    /// Capture the live configuration and store it under `name`.
    /// Overwriting keeps the original creation time.
    pub fn save_current(&self, name: &str, description: &str) -> Result<DisplayProfile> {
        sanitize_name(name)?;
        let mut profile = capture_current_config(&self.api)?;
        profile.name = name.to_string();
        profile.description = description.to_string();

        let now = Utc::now();
        profile.modified_at = now;
        profile.created_at = match self.store.load(name) {
            Ok(Some(existing)) => existing.created_at,
            _ => now,
        };

        self.store.save(&profile)?;
        info!(name, monitors = profile.monitors.len(), "saved current configuration");
        Ok(profile)
    }

    pub fn apply_by_name(&self, name: &str) -> Result<ApplyReport> {
        let profile = self
            .store
            .load(name)?
            .ok_or_else(|| DisplayError::ProfileNotFound(name.to_string()))?;
        undo::apply_with_undo(&self.api, &self.store, &profile)
    }

    pub fn revert(&self) -> Result<ApplyReport> {
        undo::revert(&self.api, &self.store)
    }

    pub fn current(&self) -> Result<DisplayProfile> {
        let mut profile = capture_current_config(&self.api)?;
        profile.name = CURRENT_PROFILE_NAME.to_string();
        Ok(profile)
    }

    pub fn list(&self) -> Result<Vec<DisplayProfile>> {
        self.store.list()
    }

    pub fn delete(&self, name: &str) -> Result<bool> {
        let deleted = self.store.delete(name)?;
        if deleted {
            info!(name, "deleted profile");
        }
        Ok(deleted)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.store.exists(name)
    }
}
