//! The `artists` dimension.

use std::sync::Arc;

use arrow::{
    array::{Float64Array, StringArray},
    datatypes::{DataType, Field, Schema, SchemaRef},
    error::ArrowError,
    record_batch::RecordBatch,
};
use noisy_float::types::N64;
use once_cell::sync::Lazy;

use super::{TableName, TableRow, column, float_column, opt_f64, opt_str, string_column};
use crate::errors::StorageResult;

static SCHEMA: Lazy<SchemaRef> = Lazy::new(|| {
    Arc::new(Schema::new(vec![
        Field::new("artist_id", DataType::Utf8, false),
        Field::new("artist_name", DataType::Utf8, true),
        Field::new("artist_location", DataType::Utf8, true),
        Field::new("artist_latitude", DataType::Float64, true),
        Field::new("artist_longitude", DataType::Float64, true),
    ]))
});

/// A row of the `artists` dimension.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ArtistRow {
    pub artist_id: Arc<str>,
    pub name: Option<Arc<str>>,
    pub location: Option<Arc<str>>,
    pub latitude: Option<N64>,
    pub longitude: Option<N64>,
}

impl TableRow for ArtistRow {
    const TABLE: TableName = TableName::Artists;

    fn schema() -> SchemaRef {
        SCHEMA.clone()
    }

    fn to_record_batch(rows: &[Self]) -> Result<RecordBatch, ArrowError> {
        RecordBatch::try_new(
            Self::schema(),
            vec![
                string_column(rows, |r| Some(&*r.artist_id)),
                string_column(rows, |r| r.name.as_deref()),
                string_column(rows, |r| r.location.as_deref()),
                float_column(rows, |r| r.latitude),
                float_column(rows, |r| r.longitude),
            ],
        )
    }

    fn from_record_batch(batch: &RecordBatch) -> StorageResult<Vec<Self>> {
        let artist_id = column::<StringArray>(batch, Self::TABLE, "artist_id")?;
        let name = column::<StringArray>(batch, Self::TABLE, "artist_name")?;
        let location = column::<StringArray>(batch, Self::TABLE, "artist_location")?;
        let latitude = column::<Float64Array>(batch, Self::TABLE, "artist_latitude")?;
        let longitude = column::<Float64Array>(batch, Self::TABLE, "artist_longitude")?;

        Ok((0..batch.num_rows())
            .map(|i| Self {
                artist_id: Arc::from(artist_id.value(i)),
                name: opt_str(name, i),
                location: opt_str(location, i),
                latitude: opt_f64(latitude, i),
                longitude: opt_f64(longitude, i),
            })
            .collect())
    }
}
