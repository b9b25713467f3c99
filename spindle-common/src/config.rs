//! Configuration file discovery and root folder resolution

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "SPINDLE_CONFIG";

/// Environment variable naming the music root folder
pub const ROOT_FOLDER_ENV_VAR: &str = "SPINDLE_ROOT_FOLDER";

/// Root folder resolution, in priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. `root_folder` value from the TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(
    cli_arg: Option<&str>,
    env_var_name: &str,
    config_value: Option<&str>,
) -> PathBuf {
    if let Some(path) = cli_arg.filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = config_value.filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }

    default_root_folder()
}

/// Locate the configuration file
///
/// An explicit path (CLI or `SPINDLE_CONFIG`) is returned as-is even if it
/// does not exist, so the caller can warn about it. Otherwise the per-user
/// config directory is checked, then `/etc/spindle` on Linux.
pub fn find_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    if let Some(path) = default_config_path() {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/spindle/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Per-user configuration file path (`<config_dir>/spindle/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("spindle").join("config.toml"))
}

/// OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "windows") {
        // %USERPROFILE%\Music
        dirs::audio_dir()
            .or_else(|| dirs::home_dir().map(|d| d.join("Music")))
            .unwrap_or_else(|| PathBuf::from("C:\\Music"))
    } else {
        // ~/Music on Linux and macOS
        dirs::audio_dir()
            .or_else(|| dirs::home_dir().map(|d| d.join("Music")))
            .unwrap_or_else(|| PathBuf::from("./music"))
    }
}

/// Default folder for prepared (materialized) audio files
pub fn default_temp_folder() -> PathBuf {
    std::env::temp_dir().join("spindle")
}

/// Create a directory (and parents) if it does not exist yet
pub fn ensure_directory_exists(path: &Path) -> Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    if path.exists() {
        return Err(Error::Config(format!(
            "Path exists but is not a directory: {}",
            path.display()
        )));
    }
    std::fs::create_dir_all(path)?;
    Ok(())
}
