use std::path::PathBuf;

use thiserror::Error;

use crate::schemas::TableName;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[cfg(feature = "parquet")]
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error("Table {table} has no column named `{column}` to partition by.")]
    UnknownPartitionColumn { table: TableName, column: String },
    #[error("Column `{column}` is missing or has the wrong type in the {table} batch.")]
    ColumnMismatch { table: TableName, column: String },
    #[error("Write to {table} was rejected: {reason}")]
    Rejected { table: TableName, reason: String },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type StorageResult<T> = Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_str_eq;
    use rstest::rstest;

    #[rstest]
    #[case(
        Error::UnknownPartitionColumn { table: TableName::Time, column: "decade".into() },
        "Table time has no column named `decade` to partition by."
    )]
    #[case(
        Error::ColumnMismatch { table: TableName::Songs, column: "year".into() },
        "Column `year` is missing or has the wrong type in the songs batch."
    )]
    #[case(
        Error::io("/lake/songs", std::io::Error::other("disk full")),
        "IO error at /lake/songs: disk full"
    )]
    fn test_error_display(#[case] error: Error, #[case] expected: &str) {
        assert_str_eq!(error.to_string(), expected);
    }
}
