//! The `users` dimension.

use std::sync::Arc;

use arrow::{
    array::StringArray,
    datatypes::{DataType, Field, Schema, SchemaRef},
    error::ArrowError,
    record_batch::RecordBatch,
};
use once_cell::sync::Lazy;

use super::{TableName, TableRow, column, opt_str, string_column};
use crate::errors::StorageResult;

static SCHEMA: Lazy<SchemaRef> = Lazy::new(|| {
    Arc::new(Schema::new(vec![
        Field::new("user_id", DataType::Utf8, true),
        Field::new("first_name", DataType::Utf8, true),
        Field::new("last_name", DataType::Utf8, true),
        Field::new("gender", DataType::Utf8, true),
        Field::new("level", DataType::Utf8, true),
    ]))
});

/// A row of the `users` dimension.
///
/// A user whose subscription `level` changed between plays shows up once per distinct
/// level; no "latest" row is picked.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct UserRow {
    pub user_id: Option<Arc<str>>,
    pub first_name: Option<Arc<str>>,
    pub last_name: Option<Arc<str>>,
    pub gender: Option<Arc<str>>,
    /// `free` or `paid`
    pub level: Option<Arc<str>>,
}

impl TableRow for UserRow {
    const TABLE: TableName = TableName::Users;

    fn schema() -> SchemaRef {
        SCHEMA.clone()
    }

    fn to_record_batch(rows: &[Self]) -> Result<RecordBatch, ArrowError> {
        RecordBatch::try_new(
            Self::schema(),
            vec![
                string_column(rows, |r| r.user_id.as_deref()),
                string_column(rows, |r| r.first_name.as_deref()),
                string_column(rows, |r| r.last_name.as_deref()),
                string_column(rows, |r| r.gender.as_deref()),
                string_column(rows, |r| r.level.as_deref()),
            ],
        )
    }

    fn from_record_batch(batch: &RecordBatch) -> StorageResult<Vec<Self>> {
        let user_id = column::<StringArray>(batch, Self::TABLE, "user_id")?;
        let first_name = column::<StringArray>(batch, Self::TABLE, "first_name")?;
        let last_name = column::<StringArray>(batch, Self::TABLE, "last_name")?;
        let gender = column::<StringArray>(batch, Self::TABLE, "gender")?;
        let level = column::<StringArray>(batch, Self::TABLE, "level")?;

        Ok((0..batch.num_rows())
            .map(|i| Self {
                user_id: opt_str(user_id, i),
                first_name: opt_str(first_name, i),
                last_name: opt_str(last_name, i),
                gender: opt_str(gender, i),
                level: opt_str(level, i),
            })
            .collect())
    }
}
