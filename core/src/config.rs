//! Handles the configuration of the pipeline.
//!
//! this module is responsible for parsing the Playlake.toml file, applying environment
//! overrides, and checking that the result describes a lake that can actually be written.

use config::{Config, Environment, File};
use serde::Deserialize;
use strum::IntoEnumIterator;

use std::{
    num::NonZeroUsize,
    path::{Component, Path, PathBuf},
    str::FromStr,
};

use playlake_storage::{
    schemas::TableName,
    writer::{Codec, TableTarget, WriterOptions},
};

use crate::errors::SettingsError;

pub static DEFAULT_CONFIG: &str = include_str!("../../Playlake.toml");

#[derive(Clone, Debug, Deserialize, Default, PartialEq)]
pub struct Settings {
    /// Where the data comes from and goes to, and how it gets processed.
    #[serde(default)]
    pub pipeline: PipelineSettings,
    /// Layout of the raw sources below `pipeline.input_root`.
    #[serde(default)]
    pub sources: SourcesSettings,
    /// How the parquet files get written.
    #[serde(default)]
    pub output: OutputSettings,
    /// Destination and partitioning of each table.
    #[serde(default)]
    pub tables: TablesSettings,
    #[serde(default)]
    pub log: LogSettings,
}

impl Settings {
    /// Load settings from the config file and environment variables.
    ///
    /// The environment variables are prefixed with `PLAYLAKE_`, and use `__` to separate
    /// the section from the key, e.g. `PLAYLAKE_PIPELINE__WORKERS=4`.
    ///
    /// # Arguments
    ///
    /// * `config` - Path to the config file.
    /// * `log_level` - Overrides the log level from the config file, if set.
    ///
    /// # Errors
    ///
    /// This function will return an error if the config file is not found, if the config file is
    /// invalid, or if the settings fail [`Settings::validate`].
    #[inline]
    pub fn init(
        config: PathBuf,
        log_level: Option<log::LevelFilter>,
    ) -> Result<Self, SettingsError> {
        let s = Config::builder()
            .add_source(File::from(config))
            .add_source(
                Environment::with_prefix("PLAYLAKE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut settings: Self = s.try_deserialize()?;

        settings.pipeline.input_root = expand(&settings.pipeline.input_root);
        settings.pipeline.output_root = expand(&settings.pipeline.output_root);

        if let Some(log_level) = log_level {
            settings.log.level = log_level;
        }

        settings.validate()?;

        Ok(settings)
    }

    /// Get the (default) path to the config file.
    /// If the config file does not exist at this path, it will be created with the default config.
    ///
    /// See [`crate::get_config_dir`] for more information about where this default path is located.
    ///
    /// # Errors
    ///
    /// This function will return an error if the system config directory (e.g., `~/.config` on linux) could not be found, or if the config file was missing and could not be created.
    #[inline]
    pub fn get_config_path() -> Result<PathBuf, std::io::Error> {
        match crate::get_config_dir() {
            Ok(config_dir) => {
                // if the config directory does not exist, create it
                if !config_dir.exists() {
                    std::fs::create_dir_all(&config_dir)?;
                }
                let config_file = config_dir.join("Playlake.toml");

                if !config_file.exists() {
                    std::fs::write(&config_file, DEFAULT_CONFIG)?;
                }

                Ok(config_file)
            }
            Err(e) => {
                eprintln!("Error: {e}");
                Err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "Unable to find the config directory for playlake.",
                ))
            }
        }
    }

    /// Check the settings for values that would only fail (or do damage) halfway through a run.
    ///
    /// # Errors
    ///
    /// - the duration tolerance is negative or not a number
    /// - a source has a depth of 0
    /// - a table is partitioned by columns it doesn't have
    /// - a table has an empty destination, or one that isn't below the output root
    /// - two tables would be written to the same destination, or one inside the other
    pub fn validate(&self) -> Result<(), SettingsError> {
        let tolerance = self.pipeline.duration_tolerance;
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(SettingsError::InvalidValue {
                key: "pipeline.duration_tolerance",
                reason: format!("must be a non-negative number of seconds, got {tolerance}"),
            });
        }

        for (key, source) in [
            ("sources.songs.depth", &self.sources.songs),
            ("sources.logs.depth", &self.sources.logs),
        ] {
            if source.depth == 0 {
                return Err(SettingsError::InvalidValue {
                    key,
                    reason: "must be at least 1".into(),
                });
            }
        }

        let targets = TableName::iter()
            .map(|table| self.tables.target(table))
            .collect::<Vec<_>>();

        for target in &targets {
            target
                .table
                .validate_partition_columns(&target.partition_by)
                .map_err(|source| SettingsError::Partitioning {
                    table: target.table,
                    source,
                })?;
            if normalize(&target.destination).as_os_str().is_empty() {
                return Err(SettingsError::InvalidValue {
                    key: "tables.destination",
                    reason: format!("the {} table has an empty destination", target.table),
                });
            }
            if target.destination.has_root()
                || target
                    .destination
                    .components()
                    .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
            {
                return Err(SettingsError::InvalidValue {
                    key: "tables.destination",
                    reason: format!(
                        "the destination of the {} table must stay below the output root, got {}",
                        target.table,
                        target.destination.display()
                    ),
                });
            }
        }

        for (i, first) in targets.iter().enumerate() {
            for second in &targets[i + 1..] {
                let (a, b) = (normalize(&first.destination), normalize(&second.destination));
                // overwriting an outer destination would wipe the inner one
                if a.starts_with(&b) || b.starts_with(&a) {
                    return Err(SettingsError::DestinationCollision {
                        first: first.table,
                        second: second.table,
                        destination: if a.starts_with(&b) { b } else { a },
                    });
                }
            }
        }

        Ok(())
    }
}

fn expand(path: &Path) -> PathBuf {
    shellexpand::tilde(&path.to_string_lossy())
        .into_owned()
        .into()
}

fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// How plays from the activity log are matched to songs in the catalog.
#[derive(Clone, Copy, Debug, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JoinStrategy {
    /// The play's artist name equals the catalog's artist name.
    #[default]
    ArtistName,
    /// Artist name and song title are equal, and the durations are within
    /// [`PipelineSettings::duration_tolerance`] of each other.
    ArtistTitleDuration,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct PipelineSettings {
    /// The directory holding the raw sources.
    #[serde(default = "default_input_root")]
    pub input_root: PathBuf,
    /// The directory the tables are written to.
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,
    /// Size of the worker pool, 0 uses one thread per core.
    #[serde(default)]
    pub workers: usize,
    /// Join plays against the song catalog extracted earlier in the run instead of reading
    /// the song source again.
    #[serde(default)]
    pub reuse_song_catalog: bool,
    #[serde(default)]
    pub join_strategy: JoinStrategy,
    /// Seconds two durations may differ by and still match,
    /// only used by [`JoinStrategy::ArtistTitleDuration`].
    #[serde(default = "default_duration_tolerance")]
    pub duration_tolerance: f64,
}

fn default_input_root() -> PathBuf {
    shellexpand::tilde("~/playlake/input").into_owned().into()
}

fn default_output_root() -> PathBuf {
    shellexpand::tilde("~/playlake/lake").into_owned().into()
}

const fn default_duration_tolerance() -> f64 {
    1.0
}

impl Default for PipelineSettings {
    #[inline]
    fn default() -> Self {
        Self {
            input_root: default_input_root(),
            output_root: default_output_root(),
            workers: 0,
            reuse_song_catalog: false,
            join_strategy: JoinStrategy::default(),
            duration_tolerance: default_duration_tolerance(),
        }
    }
}

/// Where the files of a raw source are: `<input_root>/<dir>/`, exactly `depth` levels down,
/// ending in `.<extension>`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct SourceSettings {
    pub dir: String,
    pub depth: usize,
    #[serde(default = "default_extension")]
    pub extension: String,
}

fn default_extension() -> String {
    "json".into()
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct SourcesSettings {
    #[serde(default = "default_song_source")]
    pub songs: SourceSettings,
    #[serde(default = "default_log_source")]
    pub logs: SourceSettings,
}

fn default_song_source() -> SourceSettings {
    SourceSettings {
        dir: "song_data".into(),
        depth: 4,
        extension: default_extension(),
    }
}

fn default_log_source() -> SourceSettings {
    SourceSettings {
        dir: "log_data".into(),
        depth: 3,
        extension: default_extension(),
    }
}

impl Default for SourcesSettings {
    #[inline]
    fn default() -> Self {
        Self {
            songs: default_song_source(),
            logs: default_log_source(),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub struct OutputSettings {
    /// Upper bound on the number of rows in a single file.
    #[serde(default = "default_rows_per_file")]
    pub rows_per_file: NonZeroUsize,
    #[serde(default)]
    pub compression: Codec,
}

fn default_rows_per_file() -> NonZeroUsize {
    WriterOptions::default().rows_per_file
}

impl Default for OutputSettings {
    #[inline]
    fn default() -> Self {
        Self {
            rows_per_file: default_rows_per_file(),
            compression: Codec::default(),
        }
    }
}

impl From<OutputSettings> for WriterOptions {
    #[inline]
    fn from(output: OutputSettings) -> Self {
        Self {
            rows_per_file: output.rows_per_file,
            codec: output.compression,
        }
    }
}

/// Overrides for a single table, anything unset falls back to the table's default.
#[derive(Clone, Debug, Deserialize, Default, PartialEq, Eq)]
pub struct TableSettings {
    /// Relative to `pipeline.output_root`.
    #[serde(default)]
    pub destination: Option<PathBuf>,
    #[serde(default)]
    pub partition_by: Option<Vec<String>>,
}

#[derive(Clone, Debug, Deserialize, Default, PartialEq, Eq)]
pub struct TablesSettings {
    #[serde(default)]
    pub songs: TableSettings,
    #[serde(default)]
    pub artists: TableSettings,
    #[serde(default)]
    pub users: TableSettings,
    #[serde(default)]
    pub time: TableSettings,
    #[serde(default)]
    pub songplays: TableSettings,
}

impl TablesSettings {
    #[must_use]
    pub const fn get(&self, table: TableName) -> &TableSettings {
        match table {
            TableName::Songs => &self.songs,
            TableName::Artists => &self.artists,
            TableName::Users => &self.users,
            TableName::Time => &self.time,
            TableName::Songplays => &self.songplays,
        }
    }

    /// Resolve where, and how, `table` gets written.
    #[must_use]
    pub fn target(&self, table: TableName) -> TableTarget {
        let settings = self.get(table);
        let destination = settings
            .destination
            .clone()
            .unwrap_or_else(|| PathBuf::from(table.to_string()));
        let partition_by = settings.partition_by.clone().unwrap_or_else(|| {
            default_partition_by(table)
                .iter()
                .map(ToString::to_string)
                .collect()
        });
        TableTarget {
            table,
            destination,
            partition_by,
        }
    }
}

/// The partition columns used when a table's `partition_by` isn't set.
#[must_use]
pub const fn default_partition_by(table: TableName) -> &'static [&'static str] {
    match table {
        TableName::Songs | TableName::Artists | TableName::Users => &[],
        TableName::Time => &["year", "month"],
        TableName::Songplays => &["song_id", "artist_id"],
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub struct LogSettings {
    /// What level of logging to use.
    /// Default is "info".
    #[serde(default = "default_log_level")]
    #[serde(deserialize_with = "de_log_level")]
    pub level: log::LevelFilter,
    /// Report the time spent in each stage of the pipeline.
    #[serde(default)]
    pub trace_spans: bool,
}

fn de_log_level<'de, D>(deserializer: D) -> Result<log::LevelFilter, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(log::LevelFilter::from_str(&s).unwrap_or_else(|_| default_log_level()))
}

const fn default_log_level() -> log::LevelFilter {
    log::LevelFilter::Info
}

impl Default for LogSettings {
    #[inline]
    fn default() -> Self {
        Self {
            level: default_log_level(),
            trace_spans: false,
        }
    }
}
