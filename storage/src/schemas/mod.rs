//! Row types for every table of the star schema, along with their Arrow schemas.
//!
//! Each row type implements [`TableRow`], which is how the rest of the workspace turns
//! a deduplicated `Vec` of rows into a [`RecordBatch`] that a
//! [`DatasetWriter`](crate::writer::DatasetWriter) can persist (and back again, for tests
//! and for anyone reading the lake with this crate).
//!
//! Rows are `Ord` rather than `Hash`: whole-row deduplication is a sort followed by a
//! `dedup`, which also gives every table a stable order on disk.

pub mod artist;
pub mod song;
pub mod songplay;
pub mod time;
pub mod user;

use std::sync::Arc;

use arrow::{
    array::{Array, ArrayRef, Float64Array, Int32Array, Int64Array, StringArray},
    datatypes::SchemaRef,
    error::ArrowError,
    record_batch::RecordBatch,
};
use noisy_float::types::N64;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoStaticStr};

use crate::errors::{Error, StorageResult};

pub use artist::ArtistRow;
pub use song::SongRow;
pub use songplay::SongplayRow;
pub use time::TimeRow;
pub use user::UserRow;

/// The tables this workspace produces.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumIter,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TableName {
    Songs,
    Artists,
    Users,
    Time,
    Songplays,
}

impl TableName {
    /// The Arrow schema of this table, including any columns that end up as partition
    /// directories once written.
    #[must_use]
    pub fn schema(self) -> SchemaRef {
        match self {
            Self::Songs => SongRow::schema(),
            Self::Artists => ArtistRow::schema(),
            Self::Users => UserRow::schema(),
            Self::Time => TimeRow::schema(),
            Self::Songplays => SongplayRow::schema(),
        }
    }

    /// Check that `columns` is a usable list of partition columns for this table.
    ///
    /// # Errors
    ///
    /// Fails if a column doesn't exist, is listed twice, or if the list would leave no
    /// data columns in the written files.
    pub fn validate_partition_columns<S: AsRef<str>>(self, columns: &[S]) -> StorageResult<()> {
        let schema = self.schema();

        for (i, column) in columns.iter().enumerate() {
            let column = column.as_ref();
            if schema.field_with_name(column).is_err() {
                return Err(Error::UnknownPartitionColumn {
                    table: self,
                    column: column.to_owned(),
                });
            }
            if columns[..i].iter().any(|c| c.as_ref() == column) {
                return Err(Error::Rejected {
                    table: self,
                    reason: format!("`{column}` is listed as a partition column more than once"),
                });
            }
        }

        if !columns.is_empty() && columns.len() >= schema.fields().len() {
            return Err(Error::Rejected {
                table: self,
                reason: "cannot partition by every column of the table".into(),
            });
        }

        Ok(())
    }
}

/// A row of one of the tables in [`TableName`].
pub trait TableRow: Clone + Ord + Send + Sync + Sized + 'static {
    const TABLE: TableName;

    fn schema() -> SchemaRef;

    /// Build a single batch holding `rows`, in order.
    ///
    /// # Errors
    ///
    /// Only fails if the columns don't line up with [`Self::schema`], which would be a bug.
    fn to_record_batch(rows: &[Self]) -> Result<RecordBatch, ArrowError>;

    /// Read rows back out of a batch with this table's schema.
    ///
    /// # Errors
    ///
    /// Fails if a column is missing or has an unexpected type.
    fn from_record_batch(batch: &RecordBatch) -> StorageResult<Vec<Self>>;
}

//---------------------------------------------------------------------------------------- builders

pub(crate) fn string_column<'a, T: 'a>(
    rows: &'a [T],
    f: impl Fn(&'a T) -> Option<&'a str>,
) -> ArrayRef {
    Arc::new(StringArray::from(rows.iter().map(f).collect::<Vec<_>>()))
}

pub(crate) fn float_column<T>(rows: &[T], f: impl Fn(&T) -> Option<N64>) -> ArrayRef {
    Arc::new(Float64Array::from(
        rows.iter()
            .map(|r| f(r).map(N64::raw))
            .collect::<Vec<_>>(),
    ))
}

pub(crate) fn int32_column<T>(rows: &[T], f: impl Fn(&T) -> Option<i32>) -> ArrayRef {
    Arc::new(Int32Array::from(rows.iter().map(f).collect::<Vec<_>>()))
}

pub(crate) fn int64_column<T>(rows: &[T], f: impl Fn(&T) -> Option<i64>) -> ArrayRef {
    Arc::new(Int64Array::from(rows.iter().map(f).collect::<Vec<_>>()))
}

//----------------------------------------------------------------------------------------- readers

pub(crate) fn column<'a, A: Array + 'static>(
    batch: &'a RecordBatch,
    table: TableName,
    name: &str,
) -> StorageResult<&'a A> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<A>())
        .ok_or_else(|| Error::ColumnMismatch {
            table,
            column: name.to_owned(),
        })
}

pub(crate) fn opt_str(array: &StringArray, i: usize) -> Option<Arc<str>> {
    array.is_valid(i).then(|| Arc::from(array.value(i)))
}

pub(crate) fn opt_f64(array: &Float64Array, i: usize) -> Option<N64> {
    array.is_valid(i).then(|| N64::try_new(array.value(i))).flatten()
}

pub(crate) fn opt_i32(array: &Int32Array, i: usize) -> Option<i32> {
    array.is_valid(i).then(|| array.value(i))
}

pub(crate) fn opt_i64(array: &Int64Array, i: usize) -> Option<i64> {
    array.is_valid(i).then(|| array.value(i))
}
