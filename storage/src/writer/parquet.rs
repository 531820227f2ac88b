//! A [`DatasetWriter`] that writes hive-partitioned parquet datasets to a local (or mounted)
//! filesystem.
//!
//! Layout of a written table:
//!
//! ```text
//! <root>/<destination>/
//!     year=2018/month=11/part-00000.parquet
//!     year=2018/month=12/part-00000.parquet
//!     _SUCCESS
//! ```
//!
//! Everything is first written to a hidden staging directory next to the destination,
//! which is then swapped into place with renames. A failed write removes the staging
//! directory and leaves the old table where it was.

use std::{
    fs::{self, File},
    path::{Path, PathBuf},
};

use arrow::{datatypes::SchemaRef, record_batch::RecordBatch};
use log::{debug, warn};
use parquet::{
    arrow::ArrowWriter,
    basic::{Compression, ZstdLevel},
    file::properties::WriterProperties,
};
use tracing::instrument;
use ulid::Ulid;

use super::{
    Codec, DatasetWriter, TableTarget, WriteSummary, WriterOptions,
    partition::{PartitionSlice, split_by_partition},
};
use crate::errors::{Error, StorageResult};

/// Name of the marker file written once a table is complete.
pub const SUCCESS_MARKER: &str = "_SUCCESS";

impl From<Codec> for Compression {
    fn from(codec: Codec) -> Self {
        match codec {
            Codec::Snappy => Self::SNAPPY,
            Codec::Zstd => Self::ZSTD(ZstdLevel::default()),
            Codec::Uncompressed => Self::UNCOMPRESSED,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ParquetDatasetWriter {
    root: PathBuf,
    options: WriterOptions,
}

impl ParquetDatasetWriter {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, options: WriterOptions) -> Self {
        Self {
            root: root.into(),
            options,
        }
    }

    fn properties(&self) -> WriterProperties {
        WriterProperties::builder()
            .set_compression(self.options.codec.into())
            .set_created_by(format!(
                "playlake-storage version {}",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
    }

    /// Write a single parquet file holding `batch`.
    fn write_file(&self, path: &Path, schema: SchemaRef, batch: &RecordBatch) -> StorageResult<()> {
        let file = File::create(path).map_err(|e| Error::io(path, e))?;
        let mut writer = ArrowWriter::try_new(file, schema, Some(self.properties()))?;
        writer.write(batch)?;
        writer.close()?;
        Ok(())
    }

    /// Write the files of one partition below `dir`, returns the number of files written.
    fn write_partition(&self, dir: &Path, slice: &PartitionSlice) -> StorageResult<usize> {
        let dir = dir.join(&slice.path);
        fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;

        let rows = slice.batch.num_rows();
        let per_file = self.options.rows_per_file.get();
        let chunks = if rows == 0 {
            vec![slice.batch.clone()]
        } else {
            (0..rows)
                .step_by(per_file)
                .map(|offset| slice.batch.slice(offset, per_file.min(rows - offset)))
                .collect()
        };

        for (i, chunk) in chunks.iter().enumerate() {
            let path = dir.join(format!("part-{i:05}.parquet"));
            self.write_file(&path, chunk.schema(), chunk)?;
            debug!("wrote {} rows to {}", chunk.num_rows(), path.display());
        }

        Ok(chunks.len())
    }

    fn write_staged(
        &self,
        staging: &Path,
        target: &TableTarget,
        batch: &RecordBatch,
    ) -> StorageResult<WriteSummary> {
        let split = split_by_partition(target.table, batch, &target.partition_by)?;
        fs::create_dir_all(staging).map_err(|e| Error::io(staging, e))?;

        let mut files = 0;
        if split.partitions.is_empty() {
            // a partitioned table with no rows still gets a file, so readers can find the schema
            let empty = RecordBatch::new_empty(split.data_schema.clone());
            self.write_file(
                &staging.join("part-00000.parquet"),
                split.data_schema.clone(),
                &empty,
            )?;
            files += 1;
        }
        for slice in &split.partitions {
            files += self.write_partition(staging, slice)?;
        }

        let marker = staging.join(SUCCESS_MARKER);
        File::create(&marker).map_err(|e| Error::io(&marker, e))?;

        Ok(WriteSummary {
            rows: batch.num_rows(),
            partitions: split.partitions.len(),
            files,
        })
    }
}

/// A hidden sibling of `destination`, unique to this call.
fn sibling(destination: &Path, purpose: &str) -> Option<PathBuf> {
    let name = destination.file_name()?.to_string_lossy();
    Some(destination.with_file_name(format!(".{name}.{purpose}-{}", Ulid::new())))
}

fn remove_any(path: &Path) -> std::io::Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Move `staging` to `destination`, replacing whatever was there.
fn swap_into_place(staging: &Path, destination: &Path) -> StorageResult<()> {
    let replaced = if destination.exists() {
        let replaced = sibling(destination, "replaced").unwrap_or_else(|| staging.with_extension("replaced"));
        fs::rename(destination, &replaced).map_err(|e| Error::io(destination, e))?;
        Some(replaced)
    } else {
        None
    };

    if let Err(e) = fs::rename(staging, destination) {
        if let Some(replaced) = &replaced {
            if let Err(restore) = fs::rename(replaced, destination) {
                warn!(
                    "could not restore {} from {}: {restore}",
                    destination.display(),
                    replaced.display()
                );
            }
        }
        return Err(Error::io(destination, e));
    }

    if let Some(replaced) = replaced {
        if let Err(e) = remove_any(&replaced) {
            warn!("could not clean up {}: {e}", replaced.display());
        }
    }

    Ok(())
}

impl DatasetWriter for ParquetDatasetWriter {
    #[instrument(skip(self, batch), fields(table = %target.table, destination = %target.destination.display()))]
    fn write(&self, target: &TableTarget, batch: &RecordBatch) -> StorageResult<WriteSummary> {
        let destination = self.root.join(&target.destination);
        let Some(staging) = sibling(&destination, "staging") else {
            return Err(Error::Rejected {
                table: target.table,
                reason: format!("{} is not a usable destination", destination.display()),
            });
        };
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let summary = match self.write_staged(&staging, target, batch) {
            Ok(summary) => summary,
            Err(e) => {
                if staging.exists() {
                    if let Err(cleanup) = fs::remove_dir_all(&staging) {
                        warn!("could not clean up {}: {cleanup}", staging.display());
                    }
                }
                return Err(e);
            }
        };

        if let Err(e) = swap_into_place(&staging, &destination) {
            if let Err(cleanup) = remove_any(&staging) {
                warn!("could not clean up {}: {cleanup}", staging.display());
            }
            return Err(e);
        }

        debug!(
            "{} now holds {} rows in {} files",
            destination.display(),
            summary.rows,
            summary.files
        );
        Ok(summary)
    }
}
