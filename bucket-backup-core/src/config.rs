//! Backup profiles: the typed, validated form of the YAML configuration.
//!
//! The document maps profile names to a list of path pairs:
//!
//! ```yaml
//! media:
//!   paths:
//!     - remote: s3://bucket/logs/
//!       local: /backup/logs
//!       delete: true
//!       include-only:
//!         today: "%Y-%m-%d"
//! ```
//!
//! Profiles and paths keep their declaration order, which is the order they
//! are synced in. Unknown keys are ignored so newer configs still load.

use chrono::format::{Item, StrftimeItems};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config YAML: {0}")]
    Parse(String),

    #[error("No profiles found in the config file")]
    Empty,

    #[error("Invalid profile '{profile}': {reason}")]
    InvalidProfile { profile: String, reason: String },
}

/// All profiles declared in the config, in declaration order. Never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileSet {
    profiles: Vec<Profile>,
}

/// A named credential context and the paths synced under it.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub name: String,
    pub paths: Vec<PathSpec>,
}

/// One remote -> local pairing and its options.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PathSpec {
    pub remote: String,
    pub local: String,
    /// Remove local files that no longer exist remotely.
    #[serde(default, alias = "delete-extraneous")]
    pub delete: bool,
    #[serde(default, rename = "include-only")]
    pub include_only: Option<DateFilter>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DateFilter {
    #[serde(default)]
    pub today: Option<DatePattern>,
    #[serde(default)]
    pub yesterday: Option<DatePattern>,
}

impl DateFilter {
    pub fn is_empty(&self) -> bool {
        self.today.is_none() && self.yesterday.is_none()
    }
}

/// A strftime pattern, e.g. `%Y-%m-%d`. Checked when the config is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct DatePattern(String);

impl TryFrom<String> for DatePattern {
    type Error = String;

    fn try_from(pattern: String) -> Result<Self, Self::Error> {
        Self::new(pattern)
    }
}

impl DatePattern {
    pub fn new(pattern: impl Into<String>) -> Result<Self, String> {
        let pattern = pattern.into();
        if StrftimeItems::new(&pattern).any(|item| matches!(item, Item::Error)) {
            return Err(format!("invalid date pattern {pattern:?}"));
        }
        Ok(Self(pattern))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Deserialize)]
struct ProfileYaml {
    paths: Option<Vec<PathSpec>>,
}

impl ProfileSet {
    /// Builds a set from already-typed profiles.
    pub fn new(profiles: Vec<Profile>) -> Result<Self, ConfigError> {
        if profiles.is_empty() {
            return Err(ConfigError::Empty);
        }
        for profile in &profiles {
            profile.validate()?;
        }
        Ok(Self { profiles })
    }

    /// Parses and validates a YAML document.
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Err(ConfigError::Empty);
        }
        let document: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let mapping = match document {
            serde_yaml::Value::Null => return Err(ConfigError::Empty),
            serde_yaml::Value::Mapping(mapping) => mapping,
            other => {
                return Err(ConfigError::Parse(format!(
                    "expected a mapping of profile names, found {}",
                    value_kind(&other)
                )))
            }
        };

        let mut profiles = Vec::with_capacity(mapping.len());
        for (key, value) in mapping {
            let name = match key {
                serde_yaml::Value::String(name) => name,
                other => {
                    return Err(ConfigError::InvalidProfile {
                        profile: format!("{other:?}"),
                        reason: "profile names must be strings".into(),
                    })
                }
            };

            let raw: ProfileYaml =
                serde_yaml::from_value(value).map_err(|e| ConfigError::InvalidProfile {
                    profile: name.clone(),
                    reason: e.to_string(),
                })?;
            let paths = raw.paths.ok_or_else(|| ConfigError::InvalidProfile {
                profile: name.clone(),
                reason: "missing `paths`".into(),
            })?;

            debug!(profile = %name, paths = paths.len(), "Parsed profile");
            profiles.push(Profile { name, paths });
        }

        Self::new(profiles)
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// Total number of path entries, i.e. the number of syncs a run performs.
    pub fn path_count(&self) -> usize {
        self.profiles.iter().map(|p| p.paths.len()).sum()
    }

    pub fn trace_loaded(&self) {
        info!(
            profiles = self.profiles.len(),
            paths = self.path_count(),
            "Loaded backup profiles"
        );
        for profile in &self.profiles {
            if profile.paths.is_empty() {
                warn!(profile = %profile.name, "Profile declares no paths; nothing to sync");
            }
        }
        debug!(?self, "Profiles loaded (full debug)");
    }
}

impl Profile {
    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidProfile {
            profile: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("profile name cannot be empty".into()));
        }
        for (index, path) in self.paths.iter().enumerate() {
            if path.remote.trim().is_empty() {
                return Err(invalid(format!("paths[{index}]: `remote` cannot be empty")));
            }
            if path.local.trim().is_empty() {
                return Err(invalid(format!("paths[{index}]: `local` cannot be empty")));
            }
        }
        Ok(())
    }
}

fn value_kind(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "a boolean",
        serde_yaml::Value::Number(_) => "a number",
        serde_yaml::Value::String(_) => "a string",
        serde_yaml::Value::Sequence(_) => "a list",
        serde_yaml::Value::Mapping(_) => "a mapping",
        serde_yaml::Value::Tagged(_) => "a tagged value",
    }
}
