//! Platform-specific configuration paths.
//!
//! - **User config**: `~/.config/fxrig/` (Linux), `~/Library/Application Support/fxrig/` (macOS), `%APPDATA%\fxrig\` (Windows)
//! - **Default file**: `fxrig.toml` inside the user config directory

use std::path::{Path, PathBuf};

/// Application name used for directory paths.
const APP_NAME: &str = "fxrig";

/// File name of the default configuration.
pub const CONFIG_FILE_NAME: &str = "fxrig.toml";

/// Returns the user-specific configuration directory.
///
/// # Platform Paths
///
/// - Linux: `~/.config/fxrig/`
/// - macOS: `~/Library/Application Support/fxrig/`
/// - Windows: `%APPDATA%\fxrig\`
///
/// Returns a fallback path if the config directory cannot be determined.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Path of the configuration loaded when none is given.
pub fn default_config_path() -> PathBuf {
    user_config_dir().join(CONFIG_FILE_NAME)
}

/// Ensure the user config directory exists.
///
/// Creates the directory and any parent directories if they don't exist.
pub fn ensure_user_config_dir() -> Result<PathBuf, crate::ConfigError> {
    let dir = user_config_dir();

    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| crate::ConfigError::create_dir(&dir, e))?;
    }

    Ok(dir)
}

/// Resolves a configuration name to an existing file.
///
/// `name` may be a path, or a file name looked up in the user config
/// directory (with or without the `.toml` extension).
pub fn find_config(name: &str) -> Option<PathBuf> {
    find_config_in(name, &user_config_dir())
}

fn find_config_in(name: &str, dir: &Path) -> Option<PathBuf> {
    let path = PathBuf::from(name);
    if path.is_file() {
        return Some(path);
    }

    let filename = if name.ends_with(".toml") {
        name.to_string()
    } else {
        format!("{}.toml", name)
    };
    let candidate = dir.join(filename);
    candidate.is_file().then_some(candidate)
}
