//! Hive-style partitioning of a table batch.
//!
//! Rows are grouped by the values of the partition columns. Each group becomes a
//! `col=value/col=value` relative path holding the group's rows without the partition
//! columns, the same layout Spark and Hive readers expect.

use std::{collections::BTreeMap, path::PathBuf, sync::Arc};

use arrow::{
    array::{Array as _, StringArray, UInt32Array},
    compute::{cast, take_record_batch},
    datatypes::{DataType, SchemaRef},
    record_batch::RecordBatch,
};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

use crate::{
    errors::{Error, StorageResult},
    schemas::TableName,
};

/// Directory name used for a null (or empty) partition value.
pub const DEFAULT_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";

/// Characters escaped in partition directory names.
const PARTITION_VALUE: &AsciiSet = &CONTROLS
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'\'')
    .add(b'*')
    .add(b'/')
    .add(b':')
    .add(b'=')
    .add(b'?')
    .add(b'\\')
    .add(b'[')
    .add(b']')
    .add(b'^')
    .add(b'{');

/// The rows of a single partition.
#[derive(Clone, Debug)]
pub struct PartitionSlice {
    /// Relative directory of the partition, empty for an unpartitioned table.
    pub path: PathBuf,
    /// The partition's rows, without the partition columns.
    pub batch: RecordBatch,
}

/// A table batch split into its partitions.
#[derive(Clone, Debug)]
pub struct PartitionedBatch {
    /// Schema of the files, i.e. the table schema minus the partition columns.
    pub data_schema: SchemaRef,
    /// Non-empty partitions, ordered by their path.
    ///
    /// An unpartitioned table always has exactly one slice, even when empty.
    /// A partitioned table with no rows has none.
    pub partitions: Vec<PartitionSlice>,
}

/// Render one partition value as a directory name component.
#[must_use]
pub fn encode_partition_value(value: Option<&str>) -> String {
    match value {
        None | Some("") => DEFAULT_PARTITION.to_owned(),
        Some(value) => utf8_percent_encode(value, PARTITION_VALUE).to_string(),
    }
}

/// Split `batch` by the values of `partition_by`.
///
/// # Errors
///
/// Fails if the partition columns aren't valid for `table`, or if a partition column
/// can't be rendered as a string.
pub fn split_by_partition(
    table: TableName,
    batch: &RecordBatch,
    partition_by: &[String],
) -> StorageResult<PartitionedBatch> {
    table.validate_partition_columns(partition_by)?;

    let schema = batch.schema();
    let partition_indices = partition_by
        .iter()
        .map(|column| {
            schema
                .index_of(column)
                .map_err(|_| Error::UnknownPartitionColumn {
                    table,
                    column: column.clone(),
                })
        })
        .collect::<StorageResult<Vec<_>>>()?;
    let data_indices = (0..schema.fields().len())
        .filter(|i| !partition_indices.contains(i))
        .collect::<Vec<_>>();
    let data_schema = Arc::new(schema.project(&data_indices)?);

    if partition_by.is_empty() {
        return Ok(PartitionedBatch {
            data_schema,
            partitions: vec![PartitionSlice {
                path: PathBuf::new(),
                batch: batch.clone(),
            }],
        });
    }

    let rendered = partition_indices
        .iter()
        .zip(partition_by)
        .map(|(&i, column)| {
            let as_strings = cast(batch.column(i), &DataType::Utf8)?;
            as_strings
                .as_any()
                .downcast_ref::<StringArray>()
                .cloned()
                .ok_or_else(|| Error::ColumnMismatch {
                    table,
                    column: column.clone(),
                })
        })
        .collect::<StorageResult<Vec<_>>>()?;

    // group row indices by the partition they belong to, keeping the original row order
    let mut groups: BTreeMap<PathBuf, Vec<u32>> = BTreeMap::new();
    for row in 0..batch.num_rows() {
        let path = partition_by
            .iter()
            .zip(&rendered)
            .map(|(column, values)| {
                let value = values.is_valid(row).then(|| values.value(row));
                format!("{column}={}", encode_partition_value(value))
            })
            .collect::<PathBuf>();
        let row = u32::try_from(row).map_err(|_| Error::Rejected {
            table,
            reason: "too many rows for a single batch".into(),
        })?;
        groups.entry(path).or_default().push(row);
    }

    let data = batch.project(&data_indices)?;
    let partitions = groups
        .into_iter()
        .map(|(path, rows)| {
            let batch = take_record_batch(&data, &UInt32Array::from(rows))?;
            Ok(PartitionSlice { path, batch })
        })
        .collect::<StorageResult<Vec<_>>>()?;

    Ok(PartitionedBatch {
        data_schema,
        partitions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::{SongplayRow, TableRow, TimeRow};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(None, DEFAULT_PARTITION)]
    #[case(Some(""), DEFAULT_PARTITION)]
    #[case(Some("ARJIE2Y1187B994AB7"), "ARJIE2Y1187B994AB7")]
    #[case(Some("AC/DC"), "AC%2FDC")]
    #[case(Some("a=b"), "a%3Db")]
    #[case(Some("50%"), "50%25")]
    fn test_encode_partition_value(#[case] value: Option<&str>, #[case] expected: &str) {
        assert_eq!(encode_partition_value(value), expected);
    }

    #[test]
    fn test_split_time_by_year_and_month() {
        let rows = [
            1_541_990_258_796, // 2018-11
            1_543_622_400_000, // 2018-12
            1_541_990_300_000, // 2018-11
        ]
        .map(TimeRow::from_timestamp);
        let batch = TimeRow::to_record_batch(&rows).unwrap();

        let split = split_by_partition(
            TableName::Time,
            &batch,
            &["year".to_owned(), "month".to_owned()],
        )
        .unwrap();

        let fields = split
            .data_schema
            .fields()
            .iter()
            .map(|f| f.name().as_str())
            .collect::<Vec<_>>();
        assert_eq!(fields, ["start_time", "hour", "day", "week", "weekday"]);

        let partitions = split
            .partitions
            .iter()
            .map(|p| (p.path.clone(), p.batch.num_rows()))
            .collect::<Vec<_>>();
        assert_eq!(
            partitions,
            [
                (PathBuf::from("year=2018/month=11"), 2),
                (PathBuf::from("year=2018/month=12"), 1),
            ]
        );
        assert_eq!(split.partitions[0].batch.num_columns(), 5);
    }

    #[test]
    fn test_split_null_partition_values() {
        let play = |song_id: Option<&str>| SongplayRow {
            start_time: 1,
            user_id: Some("8".into()),
            song_id: song_id.map(Into::into),
            artist_id: song_id.map(|_| "AR1".into()),
            level: Some("free".into()),
            session_id: Some(139),
            location: None,
            user_agent: None,
        };
        let batch = SongplayRow::to_record_batch(&[play(None), play(Some("SO1"))]).unwrap();

        let split = split_by_partition(
            TableName::Songplays,
            &batch,
            &["song_id".to_owned(), "artist_id".to_owned()],
        )
        .unwrap();

        let paths = split
            .partitions
            .iter()
            .map(|p| p.path.clone())
            .collect::<Vec<_>>();
        assert_eq!(
            paths,
            [
                PathBuf::from("song_id=SO1/artist_id=AR1"),
                PathBuf::from(format!(
                    "song_id={DEFAULT_PARTITION}/artist_id={DEFAULT_PARTITION}"
                )),
            ]
        );
    }

    #[test]
    fn test_split_unpartitioned_keeps_everything() {
        let batch = TimeRow::to_record_batch(&[]).unwrap();
        let split = split_by_partition(TableName::Time, &batch, &[]).unwrap();
        assert_eq!(split.partitions.len(), 1);
        assert_eq!(split.partitions[0].path, PathBuf::new());
        assert_eq!(split.data_schema, TimeRow::schema());
    }

    #[test]
    fn test_split_empty_partitioned_has_no_partitions() {
        let batch = TimeRow::to_record_batch(&[]).unwrap();
        let split = split_by_partition(TableName::Time, &batch, &["year".to_owned()]).unwrap();
        assert!(split.partitions.is_empty());
        assert_eq!(split.data_schema.fields().len(), 6);
    }

    #[test]
    fn test_split_rejects_unknown_column() {
        let batch = TimeRow::to_record_batch(&[]).unwrap();
        let result = split_by_partition(TableName::Time, &batch, &["decade".to_owned()]);
        assert!(matches!(
            result,
            Err(Error::UnknownPartitionColumn { column, .. }) if column == "decade"
        ));
    }
}
