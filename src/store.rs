use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{DisplayError, Result};
use crate::profile::DisplayProfile;
use crate::undo::{UndoSlot, UNDO_PROFILE_NAME};

const MAX_NAME_LEN: usize = 100;

/// Profiles saved as one JSON file each under `<base>/profiles`.
#[derive(Clone, Debug)]
pub struct ProfileStore {
    base: PathBuf,
}

impl ProfileStore {
    pub fn open(base: impl Into<PathBuf>) -> Result<Self> {
        let store = ProfileStore { base: base.into() };
        fs::create_dir_all(store.profiles_dir())?;
        debug!(base = %store.base.display(), "opened profile store");
        Ok(store)
    }

    pub fn default_base_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("displayset")
    }

    pub fn base_dir(&self) -> &Path {
        &self.base
    }

    fn profiles_dir(&self) -> PathBuf {
        self.base.join("profiles")
    }

    fn profile_path(&self, name: &str) -> Result<PathBuf> {
        Ok(self.profiles_dir().join(format!("{}.json", sanitize_name(name)?)))
    }

    fn undo_path(&self) -> PathBuf {
        self.base.join(format!("{}.json", UNDO_PROFILE_NAME))
    }

    pub fn save(&self, profile: &DisplayProfile) -> Result<PathBuf> {
        let path = self.profile_path(&profile.name)?;
        write_atomic(&path, profile)?;
        debug!(name = %profile.name, path = %path.display(), "saved profile");
        Ok(path)
    }

    pub fn load(&self, name: &str) -> Result<Option<DisplayProfile>> {
        read_profile(&self.profile_path(name)?)
    }

    /// Every readable profile, ordered by file name.
    pub fn list(&self) -> Result<Vec<DisplayProfile>> {
        let mut paths: Vec<PathBuf> = fs::read_dir(self.profiles_dir())?
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut profiles = Vec::with_capacity(paths.len());
        for path in paths {
            match read_profile(&path) {
                Ok(Some(profile)) => profiles.push(profile),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable profile"),
            }
        }
        Ok(profiles)
    }

    pub fn delete(&self, name: &str) -> Result<bool> {
        match fs::remove_file(self.profile_path(name)?) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub fn exists(&self, name: &str) -> bool {
        self.profile_path(name).is_ok_and(|path| path.is_file())
    }
}

impl UndoSlot for ProfileStore {
    fn store_previous(&self, profile: &DisplayProfile) -> Result<()> {
        write_atomic(&self.undo_path(), profile)
    }

    fn load_previous(&self) -> Result<Option<DisplayProfile>> {
        read_profile(&self.undo_path())
    }
}

fn read_profile(path: &Path) -> Result<Option<DisplayProfile>> {
    let json = match fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_str(&json)?))
}

/// Write next to the destination and rename over it, so readers never see half a file.
fn write_atomic(path: &Path, profile: &DisplayProfile) -> Result<()> {
    let json = serde_json::to_string_pretty(profile)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    if let Err(e) = fs::rename(&tmp, path) {
        fs::remove_file(&tmp).ok();
        return Err(e.into());
    }
    Ok(())
}

/// Turn a profile name into a file stem that is valid on every platform.
pub fn sanitize_name(name: &str) -> Result<String> {
    let mut out = String::with_capacity(name.len());
    for c in name.trim().chars() {
        let invalid = matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') || c.is_control();
        let c = if invalid || c.is_whitespace() { '_' } else { c };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }

    let trimmed: String = out.trim_matches('_').chars().take(MAX_NAME_LEN).collect();
    if trimmed.is_empty() {
        return Err(DisplayError::InvalidProfileName(name.to_string()));
    }
    Ok(trimmed)
}
