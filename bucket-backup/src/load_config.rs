/// `load_config` module: finds and reads the backup profile file.
///
/// This is the only place the CLI touches the filesystem for configuration.
/// Parsing and validation live in [`bucket_backup_core::config`]; this module
/// adds the file lookup rules and the logging around them.
///
/// # Location
/// 1. `BUCKET_BACKUP_CONFIG`, when set, names the file.
/// 2. Otherwise `config.yaml` next to the running executable.
///
/// # Errors
/// Every failure is a [`ConfigError`]. Callers treat it as fatal: nothing
/// is synced when the profiles cannot be loaded.
use bucket_backup_core::config::{ConfigError, ProfileSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const CONFIG_ENV_VAR: &str = "BUCKET_BACKUP_CONFIG";
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Resolves the config file path from the environment or the executable's directory.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(CONFIG_FILE_NAME)))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

/// Reads and validates the profiles at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ProfileSet, ConfigError> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let content = fs::read_to_string(path_ref).map_err(|e| {
        debug!(error = ?e, config_path = ?path_ref, "Failed to read config file");
        ConfigError::Read {
            path: path_ref.display().to_string(),
            source: e,
        }
    })?;

    match ProfileSet::from_yaml_str(&content) {
        Ok(profiles) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            profiles.trace_loaded();
            Ok(profiles)
        }
        Err(e) => {
            debug!(error = %e, config_path = ?path_ref, "Failed to load config YAML");
            Err(e)
        }
    }
}
