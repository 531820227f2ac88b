use std::path::PathBuf;

use playlake_storage::schemas::TableName;
use thiserror::Error;

/// Errors that can occur with finding the config directory.
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Unable to find the config directory for playlake.")]
    Config,
}

/// Errors that can occur while loading or validating the settings.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Tables {first} and {second} would both be written to {}", .destination.display())]
    DestinationCollision {
        first: TableName,
        second: TableName,
        destination: PathBuf,
    },
    #[error("Invalid partitioning for the {table} table: {source}")]
    Partitioning {
        table: TableName,
        #[source]
        source: playlake_storage::errors::Error,
    },
    #[error("Invalid value for `{key}`: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}
