//! The `time` dimension.

use std::sync::Arc;

use arrow::{
    array::{Int32Array, Int64Array},
    datatypes::{DataType, Field, Schema, SchemaRef},
    error::ArrowError,
    record_batch::RecordBatch,
};
use once_cell::sync::Lazy;

use super::{TableName, TableRow, column, int32_column, int64_column};
use crate::{errors::StorageResult, util::decompose_timestamp};

static SCHEMA: Lazy<SchemaRef> = Lazy::new(|| {
    Arc::new(Schema::new(vec![
        Field::new("start_time", DataType::Int64, false),
        Field::new("hour", DataType::Int32, false),
        Field::new("day", DataType::Int32, false),
        Field::new("week", DataType::Int32, false),
        Field::new("month", DataType::Int32, false),
        Field::new("year", DataType::Int32, false),
        Field::new("weekday", DataType::Int32, false),
    ]))
});

/// A row of the `time` dimension, keyed by the play's epoch-milliseconds timestamp.
///
/// See [`CalendarParts`](crate::util::CalendarParts) for the conventions behind each field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeRow {
    pub start_time: i64,
    pub hour: i32,
    pub day: i32,
    pub week: i32,
    pub month: i32,
    pub year: i32,
    pub weekday: i32,
}

impl TimeRow {
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn from_timestamp(start_time: i64) -> Self {
        let parts = decompose_timestamp(start_time);
        // every part but the year is at most 53
        Self {
            start_time,
            hour: parts.hour as i32,
            day: parts.day as i32,
            week: parts.week as i32,
            month: parts.month as i32,
            year: parts.year,
            weekday: parts.weekday as i32,
        }
    }
}

impl TableRow for TimeRow {
    const TABLE: TableName = TableName::Time;

    fn schema() -> SchemaRef {
        SCHEMA.clone()
    }

    fn to_record_batch(rows: &[Self]) -> Result<RecordBatch, ArrowError> {
        RecordBatch::try_new(
            Self::schema(),
            vec![
                int64_column(rows, |r| Some(r.start_time)),
                int32_column(rows, |r| Some(r.hour)),
                int32_column(rows, |r| Some(r.day)),
                int32_column(rows, |r| Some(r.week)),
                int32_column(rows, |r| Some(r.month)),
                int32_column(rows, |r| Some(r.year)),
                int32_column(rows, |r| Some(r.weekday)),
            ],
        )
    }

    fn from_record_batch(batch: &RecordBatch) -> StorageResult<Vec<Self>> {
        let start_time = column::<Int64Array>(batch, Self::TABLE, "start_time")?;
        let hour = column::<Int32Array>(batch, Self::TABLE, "hour")?;
        let day = column::<Int32Array>(batch, Self::TABLE, "day")?;
        let week = column::<Int32Array>(batch, Self::TABLE, "week")?;
        let month = column::<Int32Array>(batch, Self::TABLE, "month")?;
        let year = column::<Int32Array>(batch, Self::TABLE, "year")?;
        let weekday = column::<Int32Array>(batch, Self::TABLE, "weekday")?;

        Ok((0..batch.num_rows())
            .map(|i| Self {
                start_time: start_time.value(i),
                hour: hour.value(i),
                day: day.value(i),
                week: week.value(i),
                month: month.value(i),
                year: year.value(i),
                weekday: weekday.value(i),
            })
            .collect())
    }
}
