//! The `songplays` fact table.

use std::sync::Arc;

use arrow::{
    array::{Int64Array, StringArray},
    datatypes::{DataType, Field, Schema, SchemaRef},
    error::ArrowError,
    record_batch::RecordBatch,
};
use once_cell::sync::Lazy;

use super::{TableName, TableRow, column, int64_column, opt_i64, opt_str, string_column};
use crate::errors::StorageResult;

static SCHEMA: Lazy<SchemaRef> = Lazy::new(|| {
    Arc::new(Schema::new(vec![
        Field::new("start_time", DataType::Int64, false),
        Field::new("user_id", DataType::Utf8, true),
        Field::new("song_id", DataType::Utf8, true),
        Field::new("artist_id", DataType::Utf8, true),
        Field::new("level", DataType::Utf8, true),
        Field::new("session_id", DataType::Int64, true),
        Field::new("location", DataType::Utf8, true),
        Field::new("user_agent", DataType::Utf8, true),
    ]))
});

/// A single song play.
///
/// There is no synthetic key, a play is identified by `(start_time, user_id, song_id)`.
/// `song_id` and `artist_id` are `None` when the play matched nothing in the song catalog.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SongplayRow {
    pub start_time: i64,
    pub user_id: Option<Arc<str>>,
    pub song_id: Option<Arc<str>>,
    pub artist_id: Option<Arc<str>>,
    pub level: Option<Arc<str>>,
    pub session_id: Option<i64>,
    pub location: Option<Arc<str>>,
    pub user_agent: Option<Arc<str>>,
}

impl SongplayRow {
    #[must_use]
    pub const fn is_matched(&self) -> bool {
        self.song_id.is_some()
    }
}

impl TableRow for SongplayRow {
    const TABLE: TableName = TableName::Songplays;

    fn schema() -> SchemaRef {
        SCHEMA.clone()
    }

    fn to_record_batch(rows: &[Self]) -> Result<RecordBatch, ArrowError> {
        RecordBatch::try_new(
            Self::schema(),
            vec![
                int64_column(rows, |r| Some(r.start_time)),
                string_column(rows, |r| r.user_id.as_deref()),
                string_column(rows, |r| r.song_id.as_deref()),
                string_column(rows, |r| r.artist_id.as_deref()),
                string_column(rows, |r| r.level.as_deref()),
                int64_column(rows, |r| r.session_id),
                string_column(rows, |r| r.location.as_deref()),
                string_column(rows, |r| r.user_agent.as_deref()),
            ],
        )
    }

    fn from_record_batch(batch: &RecordBatch) -> StorageResult<Vec<Self>> {
        let start_time = column::<Int64Array>(batch, Self::TABLE, "start_time")?;
        let user_id = column::<StringArray>(batch, Self::TABLE, "user_id")?;
        let song_id = column::<StringArray>(batch, Self::TABLE, "song_id")?;
        let artist_id = column::<StringArray>(batch, Self::TABLE, "artist_id")?;
        let level = column::<StringArray>(batch, Self::TABLE, "level")?;
        let session_id = column::<Int64Array>(batch, Self::TABLE, "session_id")?;
        let location = column::<StringArray>(batch, Self::TABLE, "location")?;
        let user_agent = column::<StringArray>(batch, Self::TABLE, "user_agent")?;

        Ok((0..batch.num_rows())
            .map(|i| Self {
                start_time: start_time.value(i),
                user_id: opt_str(user_id, i),
                song_id: opt_str(song_id, i),
                artist_id: opt_str(artist_id, i),
                level: opt_str(level, i),
                session_id: opt_i64(session_id, i),
                location: opt_str(location, i),
                user_agent: opt_str(user_agent, i),
            })
            .collect())
    }
}
