use std::{fmt, path::PathBuf};

use playlake_storage::schemas::TableName;
use thiserror::Error;

use crate::report::RunReport;

/// Errors that make a raw source unusable.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Source directory {} does not exist.", .path.display())]
    Missing { path: PathBuf },
    #[error("Failed to walk {}: {source}", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The step of a run that was in progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    Setup,
    ReadSongs,
    ReadLogs,
    /// Reading the song source again, for the songplays join.
    ReadCatalog,
    Write(TableName),
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Setup => write!(f, "setting up"),
            Self::ReadSongs => write!(f, "reading the song source"),
            Self::ReadLogs => write!(f, "reading the log source"),
            Self::ReadCatalog => write!(f, "reading the song catalog"),
            Self::Write(table) => write!(f, "writing the {table} table"),
        }
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to build the worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("{source}")]
    Source {
        stage: Stage,
        #[source]
        source: SourceError,
    },
    #[error("Failed to write the {table} table: {source}")]
    Write {
        table: TableName,
        #[source]
        source: playlake_storage::errors::Error,
    },
}

impl PipelineError {
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match self {
            Self::Pool(_) => Stage::Setup,
            Self::Source { stage, .. } => *stage,
            Self::Write { table, .. } => Stage::Write(*table),
        }
    }
}

/// A run that didn't write every table.
///
/// Tables written before the failure stay written, see [`RunError::report`] for which.
#[derive(Error, Debug)]
#[error("Run {} failed while {stage}: {source}", .report.run_id)]
pub struct RunError {
    pub stage: Stage,
    pub report: Box<RunReport>,
    #[source]
    pub source: PipelineError,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_str_eq;
    use rstest::rstest;

    #[rstest]
    #[case(Stage::Setup, "setting up")]
    #[case(Stage::ReadLogs, "reading the log source")]
    #[case(Stage::Write(TableName::Songplays), "writing the songplays table")]
    fn test_stage_display(#[case] stage: Stage, #[case] expected: &str) {
        assert_str_eq!(stage.to_string(), expected);
    }

    #[test]
    fn test_pipeline_error_stage() {
        let error = PipelineError::Source {
            stage: Stage::ReadCatalog,
            source: SourceError::Missing {
                path: "/input/song_data".into(),
            },
        };
        assert_eq!(error.stage(), Stage::ReadCatalog);
        assert_str_eq!(
            error.to_string(),
            "Source directory /input/song_data does not exist."
        );

        let error = PipelineError::Write {
            table: TableName::Time,
            source: playlake_storage::errors::Error::Rejected {
                table: TableName::Time,
                reason: "disk full".into(),
            },
        };
        assert_eq!(error.stage(), Stage::Write(TableName::Time));
    }

    #[test]
    fn test_run_error_display() {
        let report = RunReport::new(ulid::Ulid::nil());
        let error = RunError {
            stage: Stage::ReadSongs,
            report: Box::new(report),
            source: PipelineError::Source {
                stage: Stage::ReadSongs,
                source: SourceError::Missing {
                    path: "/input/song_data".into(),
                },
            },
        };
        assert_str_eq!(
            error.to_string(),
            "Run 00000000000000000000000000 failed while reading the song source: Source directory /input/song_data does not exist."
        );
    }
}
