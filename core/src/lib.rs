use std::{path::PathBuf, time::Duration};

use directories::ProjectDirs;

use crate::errors::DirectoryError;

pub mod config;
pub mod errors;
pub mod logger;

/// Format a duration as `seconds.micros`, e.g. `1.000250`.
#[must_use]
pub fn format_duration(duration: &Duration) -> String {
    format!("{}.{:06}", duration.as_secs(), duration.subsec_micros())
}

/// Get the directory the config file lives in.
///
/// On linux this is `$XDG_CONFIG_HOME/playlake` (usually `~/.config/playlake`),
/// on macos `~/Library/Application Support/playlake`, and on windows
/// `%APPDATA%\playlake\config`.
///
/// # Errors
///
/// Fails if the user's home directory can't be determined.
pub fn get_config_dir() -> Result<PathBuf, DirectoryError> {
    ProjectDirs::from("", "", "playlake")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or(DirectoryError::Config)
}
