use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

use super::AppConfig;

const APP_NAME: &str = "fsmatch";
const CONFIG_FILE: &str = "config.json";

/// Returns the platform-specific configuration directory for the application.
pub fn get_config_directory() -> Option<PathBuf> {
    ProjectDirs::from("com", "fsmatch", APP_NAME).map(|proj_dirs| proj_dirs.config_dir().to_path_buf())
}

/// Returns the full path to the configuration file.
pub fn get_config_file_path() -> Option<PathBuf> {
    get_config_directory().map(|dir| dir.join(CONFIG_FILE))
}

/// Loads the configuration from `path`, or from the platform location.
///
/// A missing file yields the defaults. A file that cannot be parsed is
/// logged and replaced by the defaults as well; fields absent from the file
/// take their default values.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let config_path = match path {
        Some(path) => path.to_path_buf(),
        None => get_config_file_path().ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?,
    };

    if !config_path.exists() {
        tracing::debug!("No config file at {:?}, using defaults", config_path);
        return Ok(AppConfig::default());
    }

    let config_content = fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config file {}", config_path.display()))?;

    match serde_json::from_str::<AppConfig>(&config_content) {
        Ok(config) => {
            tracing::debug!("Loaded config from {:?}", config_path);
            Ok(config)
        }
        Err(e) => {
            tracing::warn!(
                "Failed to parse config file at {:?}: {}. Falling back to default config.",
                config_path,
                e
            );
            Ok(AppConfig::default())
        }
    }
}

/// Saves the provided configuration to the platform config file.
pub fn save_config(config: &AppConfig) -> Result<PathBuf> {
    let config_dir = get_config_directory().ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed to create {}", config_dir.display()))?;
        tracing::info!("Created config directory: {:?}", config_dir);
    }

    let config_path = config_dir.join(CONFIG_FILE);
    export_config(config, &config_path)?;
    Ok(config_path)
}

/// Writes the configuration to a user-specified JSON file.
pub fn export_config(config: &AppConfig, export_path: &Path) -> Result<()> {
    let config_json = serde_json::to_string_pretty(config)?;
    fs::write(export_path, config_json)
        .with_context(|| format!("Failed to write config to {}", export_path.display()))?;
    tracing::info!("Exported config to {:?}", export_path);
    Ok(())
}

/// Reads a configuration from a user-specified JSON file. Unlike
/// [`load_config`] a malformed file is an error.
pub fn import_config(import_path: &Path) -> Result<AppConfig> {
    let config_content = fs::read_to_string(import_path)
        .with_context(|| format!("Failed to read {}", import_path.display()))?;
    let config = serde_json::from_str::<AppConfig>(&config_content)
        .with_context(|| format!("Invalid config file {}", import_path.display()))?;
    tracing::info!("Imported config from {:?}", import_path);
    Ok(config)
}

// Platform-specific configuration paths for reference:
// macOS:   ~/Library/Application Support/com.fsmatch.fsmatch/
// Linux:   ~/.config/fsmatch/
// Windows: %APPDATA%/fsmatch/fsmatch/config/

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::commands::ConflictResolution;
    use tempfile::tempdir;

    #[test]
    fn test_export_then_import() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = AppConfig {
            conflict_resolution: ConflictResolution::Suffix,
            max_matching_files: Some(10),
            ..Default::default()
        };
        export_config(&config, &path).unwrap();
        assert_eq!(import_config(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "recurse": false, "conflict_resolution": "overwrite" }"#).unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert!(!config.recurse);
        assert_eq!(config.conflict_resolution, ConflictResolution::Overwrite);
        assert_eq!(config.excluded_directories, AppConfig::default().excluded_directories);
    }

    #[test]
    fn test_malformed_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_config(Some(&path)).unwrap(), AppConfig::default());
        assert!(import_config(&path).is_err());
        assert_eq!(load_config(Some(&dir.path().join("missing.json"))).unwrap(), AppConfig::default());
    }
}
