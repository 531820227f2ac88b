//! The transformations of the pipeline, and the steps that run them.

pub mod activity_log;
pub mod join;
pub mod song_catalog;

use log::{error, info};
use playlake_storage::{
    schemas::TableRow,
    writer::{DatasetWriter, TableTarget, write_rows},
};
use rayon::prelude::*;

use crate::{
    errors::PipelineError,
    report::{RunReport, TableOutcome},
};

/// Drop rows that are equal to another row, leaving the rest sorted.
pub fn dedup<T: Ord + Send>(mut rows: Vec<T>) -> Vec<T> {
    rows.par_sort_unstable();
    rows.dedup();
    rows
}

/// Write `rows` to `target`, recording the outcome in `report`.
fn write_table<T: TableRow>(
    writer: &dyn DatasetWriter,
    target: &TableTarget,
    rows: &[T],
    report: &mut RunReport,
) -> Result<(), PipelineError> {
    match write_rows(writer, target, rows) {
        Ok(summary) => {
            info!(
                "wrote {} rows to the {} table at {}",
                summary.rows,
                target.table,
                target.destination.display()
            );
            report.record(target.table, TableOutcome::Written(summary));
            Ok(())
        }
        Err(source) => {
            error!("failed to write the {} table: {source}", target.table);
            report.record(target.table, TableOutcome::Failed(source.to_string()));
            Err(PipelineError::Write {
                table: target.table,
                source,
            })
        }
    }
}
