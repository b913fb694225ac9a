//! Named lookup profiles kept in `<config dir>/dynform/cli-config.json`.
//!
//! A profile supplies what `dynform resolve` cannot infer from a descriptor
//! file: where options come from, the step and component names sent with each
//! lookup, and the credentials file. Relative credential paths are read
//! against the directory holding the profile file, so a profile keeps working
//! from any working directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use dynform_core::util::normalize_text_option;
use serde::{Deserialize, Serialize};

use crate::error::CliError;

const PROFILE_ENV: &str = "DYNFORM_PROFILE";
const DEFAULT_PROFILE: &str = "default";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_path: Option<PathBuf>,
}

impl Profile {
    pub fn lookup_base_url(&self) -> Option<String> {
        normalize_text_option(self.lookup_base_url.clone())
    }

    pub fn step_name(&self) -> Option<String> {
        normalize_text_option(self.step_name.clone())
    }

    pub fn component_name(&self) -> Option<String> {
        normalize_text_option(self.component_name.clone())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct ProfileFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    active_profile: Option<String>,
    #[serde(default)]
    profiles: BTreeMap<String, Profile>,
}

/// Profile file bound to its location on disk.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
    file: ProfileFile,
}

pub fn default_profiles_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("dynform")
        .join("cli-config.json")
}

/// Pick a profile name: explicit flag, then environment, then the active
/// profile, then `default`. Blank names are skipped.
pub fn select_profile_name(
    explicit: Option<&str>,
    from_env: Option<String>,
    active: Option<&str>,
) -> String {
    [
        explicit.map(str::to_string),
        from_env,
        active.map(str::to_string),
    ]
    .into_iter()
    .find_map(normalize_text_option)
    .unwrap_or_else(|| DEFAULT_PROFILE.to_string())
}

impl ProfileStore {
    pub fn open_default() -> Result<Self, CliError> {
        Self::open(default_profiles_path())
    }

    /// A missing file is an empty store.
    pub fn open(path: PathBuf) -> Result<Self, CliError> {
        let file = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|error| profiles_error(&path, &error.to_string()))?,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => ProfileFile::default(),
            Err(error) => return Err(profiles_error(&path, &error.to_string())),
        };
        Ok(Self { path, file })
    }

    pub fn save(&self) -> Result<(), CliError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|error| profiles_error(&self.path, &error.to_string()))?;
        }
        let serialized = serde_json::to_string_pretty(&self.file)?;
        std::fs::write(&self.path, serialized)
            .map_err(|error| profiles_error(&self.path, &error.to_string()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn selected_name(&self, explicit: Option<&str>) -> String {
        select_profile_name(
            explicit,
            std::env::var(PROFILE_ENV).ok(),
            self.file.active_profile.as_deref(),
        )
    }

    pub fn get(&self, name: &str) -> Option<&Profile> {
        self.file.profiles.get(name)
    }

    pub fn entry(&mut self, name: &str) -> &mut Profile {
        self.file.profiles.entry(name.to_string()).or_default()
    }

    pub fn activate(&mut self, name: &str) {
        self.file.active_profile = Some(name.to_string());
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.file.active_profile.as_deref() == Some(name)
    }

    /// Credentials file of a profile, anchored at the profile file's directory
    /// when stored as a relative path.
    pub fn credentials_path(&self, profile: &Profile) -> Option<PathBuf> {
        let path = profile
            .credentials_path
            .as_ref()
            .filter(|path| !path.as_os_str().is_empty())?;
        if path.is_absolute() {
            return Some(path.clone());
        }
        let base = self.path.parent().unwrap_or_else(|| Path::new("."));
        Some(base.join(path))
    }
}

fn profiles_error(path: &Path, message: &str) -> CliError {
    CliError::Profiles {
        path: path.display().to_string(),
        message: message.to_string(),
    }
}
