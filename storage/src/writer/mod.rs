//! Persisting tables.
//!
//! A [`DatasetWriter`] takes a whole table as a single [`RecordBatch`] and replaces
//! whatever was at the table's destination with it. Writers must make that replacement
//! look atomic to the caller: either the new table is fully in place, or the previous
//! contents are untouched.

pub mod partition;

#[cfg(any(test, feature = "test_utils"))]
pub mod memory;
#[cfg(feature = "parquet")]
pub mod parquet;

use std::{num::NonZeroUsize, path::PathBuf};

use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{
    errors::{Error, StorageResult},
    schemas::{TableName, TableRow},
};

/// Where, and how, a table gets written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableTarget {
    pub table: TableName,
    /// Destination of the table, relative to the writer's root.
    pub destination: PathBuf,
    /// Columns whose values become `column=value` directories, outermost first.
    pub partition_by: Vec<String>,
}

impl TableTarget {
    #[must_use]
    pub fn new(table: TableName, destination: impl Into<PathBuf>, partition_by: &[&str]) -> Self {
        Self {
            table,
            destination: destination.into(),
            partition_by: partition_by.iter().map(ToString::to_string).collect(),
        }
    }
}

/// What a successful write produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriteSummary {
    pub rows: usize,
    /// Number of distinct partition directories (`1` for an unpartitioned table).
    pub partitions: usize,
    pub files: usize,
}

/// The compression codec used for columnar files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    #[default]
    Snappy,
    Zstd,
    Uncompressed,
}

/// Knobs shared by the file-backed writers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriterOptions {
    /// Upper bound on the number of rows in a single file.
    pub rows_per_file: NonZeroUsize,
    pub codec: Codec,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            rows_per_file: NonZeroUsize::new(1_000_000).unwrap_or(NonZeroUsize::MIN),
            codec: Codec::default(),
        }
    }
}

/// Persists whole tables, overwriting any previous contents.
pub trait DatasetWriter: Send + Sync {
    /// Replace the table at `target.destination` with `batch`.
    ///
    /// # Errors
    ///
    /// Fails if the partition columns are invalid for the table or if the underlying
    /// storage fails. On failure, the previous contents of the destination are left as they were.
    fn write(&self, target: &TableTarget, batch: &RecordBatch) -> StorageResult<WriteSummary>;
}

/// Convert `rows` to a batch and hand it to `writer`.
///
/// # Errors
///
/// Fails if `target` is for a different table than `T`, or if the write fails.
#[instrument(skip(writer, rows), fields(table = %target.table, rows = rows.len()))]
pub fn write_rows<T: TableRow, W: DatasetWriter + ?Sized>(
    writer: &W,
    target: &TableTarget,
    rows: &[T],
) -> StorageResult<WriteSummary> {
    if target.table != T::TABLE {
        return Err(Error::Rejected {
            table: target.table,
            reason: format!("expected {} rows, got {} rows", target.table, T::TABLE),
        });
    }
    let batch = T::to_record_batch(rows)?;
    writer.write(target, &batch)
}
