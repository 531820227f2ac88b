//! An in-memory [`DatasetWriter`], for tests.

use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
    sync::Mutex,
};

use arrow::record_batch::RecordBatch;

use super::{DatasetWriter, TableTarget, WriteSummary, partition::split_by_partition};
use crate::{
    errors::{Error, StorageResult},
    schemas::{TableName, TableRow},
};

#[derive(Debug, Default)]
struct State {
    tables: BTreeMap<PathBuf, (TableTarget, RecordBatch)>,
    writes: usize,
}

/// Keeps the last batch written to every destination.
///
/// Writes to the tables passed to [`MemoryDatasetWriter::failing_on`] are rejected
/// without touching what was stored before.
#[derive(Debug, Default)]
pub struct MemoryDatasetWriter {
    state: Mutex<State>,
    failing: BTreeSet<TableName>,
}

impl MemoryDatasetWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failing_on(tables: impl IntoIterator<Item = TableName>) -> Self {
        Self {
            failing: tables.into_iter().collect(),
            ..Self::default()
        }
    }

    /// The rows currently stored at `destination`, if anything was written there.
    ///
    /// # Panics
    ///
    /// Panics if the stored batch isn't a `T` table.
    #[must_use]
    pub fn rows<T: TableRow>(&self, destination: impl AsRef<Path>) -> Option<Vec<T>> {
        let state = self.state.lock().unwrap();
        let (target, batch) = state.tables.get(destination.as_ref())?;
        assert_eq!(target.table, T::TABLE, "wrong row type for {}", target.table);
        Some(T::from_record_batch(batch).unwrap())
    }

    /// The target last written to `destination`.
    #[must_use]
    pub fn target(&self, destination: impl AsRef<Path>) -> Option<TableTarget> {
        let state = self.state.lock().unwrap();
        state
            .tables
            .get(destination.as_ref())
            .map(|(target, _)| target.clone())
    }

    #[must_use]
    pub fn destinations(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().tables.keys().cloned().collect()
    }

    /// Number of successful writes so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.state.lock().unwrap().writes
    }
}

impl DatasetWriter for MemoryDatasetWriter {
    fn write(&self, target: &TableTarget, batch: &RecordBatch) -> StorageResult<WriteSummary> {
        if self.failing.contains(&target.table) {
            return Err(Error::io(
                &target.destination,
                std::io::Error::other("injected failure"),
            ));
        }

        // same validation and partition counting as the file-backed writers
        let split = split_by_partition(target.table, batch, &target.partition_by)?;
        let summary = WriteSummary {
            rows: batch.num_rows(),
            partitions: split.partitions.len(),
            files: split.partitions.len().max(1),
        };

        let mut state = self.state.lock().unwrap();
        state
            .tables
            .insert(target.destination.clone(), (target.clone(), batch.clone()));
        state.writes += 1;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        schemas::{ArtistRow, SongplayRow, UserRow},
        test_utils::{artist_row, user_row},
        writer::write_rows,
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn test_keeps_last_write() {
        let writer = MemoryDatasetWriter::new();
        let target = TableTarget::new(TableName::Users, "users", &[]);

        write_rows(&writer, &target, &[user_row("15", "free")]).unwrap();
        write_rows(&writer, &target, &[user_row("15", "paid"), user_row("49", "free")]).unwrap();

        assert_eq!(writer.write_count(), 2);
        assert_eq!(writer.destinations(), [PathBuf::from("users")]);
        assert_eq!(
            writer.rows::<UserRow>("users"),
            Some(vec![user_row("15", "paid"), user_row("49", "free")])
        );
    }

    #[test]
    fn test_keeps_target() {
        let writer = MemoryDatasetWriter::new();
        let target = TableTarget::new(TableName::Artists, "dims/artists", &["artist_id"]);

        let summary = write_rows(
            &writer,
            &target,
            &[artist_row("AR1", "Artist"), artist_row("AR2", "Other")],
        )
        .unwrap();

        assert_eq!(summary.partitions, 2);
        assert_eq!(writer.target("dims/artists"), Some(target));
        assert_eq!(writer.rows::<ArtistRow>("dims/artists").map(|r| r.len()), Some(2));
        assert_eq!(writer.target("artists"), None);
    }

    #[test]
    fn test_failing_table_keeps_previous_rows() {
        let writer = MemoryDatasetWriter::failing_on([TableName::Songplays]);
        let users = TableTarget::new(TableName::Users, "users", &[]);
        let plays = TableTarget::new(TableName::Songplays, "songplays", &[]);

        write_rows(&writer, &users, &[user_row("15", "free")]).unwrap();
        let result = write_rows::<SongplayRow, _>(&writer, &plays, &[]);

        assert!(matches!(result, Err(Error::Io { .. })));
        assert_eq!(writer.write_count(), 1);
        assert!(writer.rows::<SongplayRow>("songplays").is_none());
    }

    #[test]
    fn test_rejects_unknown_partition_columns() {
        let writer = MemoryDatasetWriter::new();
        let target = TableTarget::new(TableName::Users, "users", &["age"]);

        let result = write_rows(&writer, &target, &[user_row("15", "free")]);

        assert!(matches!(result, Err(Error::UnknownPartitionColumn { .. })));
        assert_eq!(writer.write_count(), 0);
    }
}
