//! Helpers for tests that write to, and read back from, a lake on disk.

use std::{
    fs::File,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use arrow::{
    array::{ArrayRef, StringArray},
    compute::cast,
    record_batch::RecordBatch,
};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use percent_encoding::percent_decode_str;
use tempfile::TempDir;
use walkdir::WalkDir;

use crate::{
    schemas::{ArtistRow, SongRow, SongplayRow, TableRow, UserRow},
    writer::partition::DEFAULT_PARTITION,
};

/// A fresh, empty directory to use as the root of a lake.
///
/// # Panics
///
/// Panics if the directory can't be created.
#[must_use]
pub fn lake_dir() -> TempDir {
    tempfile::tempdir().expect("failed to create a temporary lake")
}

/// Every file below `root`, relative to it, sorted.
///
/// # Panics
///
/// Panics if `root` can't be walked.
#[must_use]
pub fn relative_files(root: &Path) -> Vec<PathBuf> {
    let mut files = WalkDir::new(root)
        .into_iter()
        .map(|entry| entry.expect("failed to walk the lake"))
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.path().strip_prefix(root).unwrap().to_owned())
        .collect::<Vec<_>>();
    files.sort();
    files
}

/// Parse the `col=value` components of a partition directory.
fn partition_values(relative_dir: &Path) -> Result<Vec<(String, Option<String>)>> {
    relative_dir
        .iter()
        .map(|component| {
            let component = component.to_string_lossy();
            let (column, value) = component
                .split_once('=')
                .ok_or_else(|| anyhow!("`{component}` is not a partition directory"))?;
            let value = if value == DEFAULT_PARTITION {
                None
            } else {
                Some(percent_decode_str(value).decode_utf8()?.into_owned())
            };
            Ok((column.to_owned(), value))
        })
        .collect()
}

/// Read a whole table back from the dataset at `dir`, sorted.
///
/// Partition columns are restored from the directory names.
///
/// # Errors
///
/// Fails if the dataset can't be read or doesn't match `T`'s schema.
pub fn read_table<T: TableRow>(dir: &Path) -> Result<Vec<T>> {
    let schema = T::schema();
    let mut rows = Vec::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if entry.path().extension().is_none_or(|ext| ext != "parquet") {
            continue;
        }
        let relative = entry.path().strip_prefix(dir)?;
        let partitions = partition_values(relative.parent().unwrap_or(Path::new("")))?;

        let file = File::open(entry.path())
            .with_context(|| format!("failed to open {}", entry.path().display()))?;
        for batch in ParquetRecordBatchReaderBuilder::try_new(file)?.build()? {
            let batch = batch?;
            let columns = schema
                .fields()
                .iter()
                .map(|field| {
                    if let Some((_, value)) = partitions.iter().find(|(c, _)| c == field.name()) {
                        let values = StringArray::from(vec![value.as_deref(); batch.num_rows()]);
                        Ok(cast(&values, field.data_type())?)
                    } else {
                        batch.column_by_name(field.name()).cloned().ok_or_else(|| {
                            anyhow!("{} has no column `{}`", entry.path().display(), field.name())
                        })
                    }
                })
                .collect::<Result<Vec<ArrayRef>>>()?;
            rows.extend(T::from_record_batch(&RecordBatch::try_new(
                schema.clone(),
                columns,
            )?)?);
        }
    }

    rows.sort();
    Ok(rows)
}

#[must_use]
pub fn song_row(song_id: &str, artist_id: &str, title: &str) -> SongRow {
    SongRow {
        song_id: song_id.into(),
        artist_id: artist_id.into(),
        title: Some(title.into()),
        year: Some(2004),
        duration: noisy_float::types::N64::try_new(215.5),
    }
}

#[must_use]
pub fn artist_row(artist_id: &str, name: &str) -> ArtistRow {
    ArtistRow {
        artist_id: artist_id.into(),
        name: Some(name.into()),
        location: None,
        latitude: None,
        longitude: None,
    }
}

#[must_use]
pub fn user_row(user_id: &str, level: &str) -> UserRow {
    UserRow {
        user_id: Some(user_id.into()),
        first_name: Some(format!("First{user_id}").into()),
        last_name: Some(format!("Last{user_id}").into()),
        gender: Some("F".into()),
        level: Some(level.into()),
    }
}

#[must_use]
pub fn songplay_row(start_time: i64, user_id: &str, song: Option<(&str, &str)>) -> SongplayRow {
    SongplayRow {
        start_time,
        user_id: Some(user_id.into()),
        song_id: song.map(|(song_id, _)| song_id.into()),
        artist_id: song.map(|(_, artist_id)| artist_id.into()),
        level: Some("free".into()),
        session_id: Some(1),
        location: None,
        user_agent: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_partition_values() {
        let values = partition_values(Path::new(&format!(
            "song_id=SO1/artist_id={DEFAULT_PARTITION}/name=AC%2FDC"
        )))
        .unwrap();
        assert_eq!(
            values,
            [
                ("song_id".to_owned(), Some("SO1".to_owned())),
                ("artist_id".to_owned(), None),
                ("name".to_owned(), Some("AC/DC".to_owned())),
            ]
        );
    }

    #[test]
    fn test_partition_values_rejects_plain_directories() {
        assert!(partition_values(Path::new("songs")).is_err());
    }
}
