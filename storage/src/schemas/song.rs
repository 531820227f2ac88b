//! The `songs` dimension.

use std::sync::Arc;

use arrow::{
    array::{Float64Array, Int32Array, StringArray},
    datatypes::{DataType, Field, Schema, SchemaRef},
    error::ArrowError,
    record_batch::RecordBatch,
};
use noisy_float::types::N64;
use once_cell::sync::Lazy;

use super::{
    TableName, TableRow, column, float_column, int32_column, opt_f64, opt_i32, opt_str,
    string_column,
};
use crate::errors::StorageResult;

static SCHEMA: Lazy<SchemaRef> = Lazy::new(|| {
    Arc::new(Schema::new(vec![
        Field::new("song_id", DataType::Utf8, false),
        Field::new("artist_id", DataType::Utf8, false),
        Field::new("title", DataType::Utf8, true),
        Field::new("year", DataType::Int32, true),
        Field::new("duration", DataType::Float64, true),
    ]))
});

/// A row of the `songs` dimension.
///
/// Two rows sharing a `song_id` but differing elsewhere are both kept.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SongRow {
    pub song_id: Arc<str>,
    pub artist_id: Arc<str>,
    pub title: Option<Arc<str>>,
    /// Release year, `0` in the source data when unknown.
    pub year: Option<i32>,
    /// Length in seconds.
    pub duration: Option<N64>,
}

impl TableRow for SongRow {
    const TABLE: TableName = TableName::Songs;

    fn schema() -> SchemaRef {
        SCHEMA.clone()
    }

    fn to_record_batch(rows: &[Self]) -> Result<RecordBatch, ArrowError> {
        RecordBatch::try_new(
            Self::schema(),
            vec![
                string_column(rows, |r| Some(&*r.song_id)),
                string_column(rows, |r| Some(&*r.artist_id)),
                string_column(rows, |r| r.title.as_deref()),
                int32_column(rows, |r| r.year),
                float_column(rows, |r| r.duration),
            ],
        )
    }

    fn from_record_batch(batch: &RecordBatch) -> StorageResult<Vec<Self>> {
        let song_id = column::<StringArray>(batch, Self::TABLE, "song_id")?;
        let artist_id = column::<StringArray>(batch, Self::TABLE, "artist_id")?;
        let title = column::<StringArray>(batch, Self::TABLE, "title")?;
        let year = column::<Int32Array>(batch, Self::TABLE, "year")?;
        let duration = column::<Float64Array>(batch, Self::TABLE, "duration")?;

        Ok((0..batch.num_rows())
            .map(|i| Self {
                song_id: Arc::from(song_id.value(i)),
                artist_id: Arc::from(artist_id.value(i)),
                title: opt_str(title, i),
                year: opt_i32(year, i),
                duration: opt_f64(duration, i),
            })
            .collect())
    }
}
