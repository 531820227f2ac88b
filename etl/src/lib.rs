//! The playlake pipeline: reads raw song metadata and activity logs, and writes them out
//! as a star schema of five tables.
//!
//! - `songs` and `artists`, from the song metadata source
//! - `users` and `time`, from the song plays in the activity log
//! - `songplays`, the song plays joined with the song catalog
//!
//! Every run overwrites all five tables.

use log::{error, info};
use playlake_core::{
    config::Settings,
    logger::{init_logger, init_tracing},
};
use playlake_storage::writer::{DatasetWriter, parquet::ParquetDatasetWriter};
use tracing::instrument;
use ulid::Ulid;

pub mod context;
pub mod errors;
pub mod records;
pub mod report;
pub mod services;
pub mod source;
#[cfg(test)]
mod test_utils;

use crate::{
    context::ExecutionContext,
    errors::{PipelineError, RunError},
    report::RunReport,
    services::{activity_log::process_log_data, song_catalog::process_song_data},
};

/// Run the pipeline once, writing every table with `writer`.
///
/// The run stops at the first failure. Tables written before it stay written, and the
/// returned error says which stage failed and carries the report of what got done.
///
/// # Errors
///
/// Fails if the worker pool can't be started, if a source can't be read, or if a table
/// can't be written.
#[inline]
#[instrument(skip_all)]
pub fn run(settings: &Settings, writer: &dyn DatasetWriter) -> Result<RunReport, RunError> {
    let run_id = Ulid::new();
    let mut report = RunReport::new(run_id);
    info!(
        "run {run_id}: {} -> {}",
        settings.pipeline.input_root.display(),
        settings.pipeline.output_root.display()
    );

    let ctx = match ExecutionContext::new(run_id, settings.pipeline.workers) {
        Ok(ctx) => ctx,
        Err(e) => return Err(fail(report, PipelineError::from(e))),
    };

    let result = run_stages(&ctx, settings, writer, &mut report);

    report.elapsed = ctx.stop();
    report.log_summary();

    match result {
        Ok(()) => Ok(report),
        Err(e) => Err(fail(report, e)),
    }
}

fn run_stages(
    ctx: &ExecutionContext,
    settings: &Settings,
    writer: &dyn DatasetWriter,
    report: &mut RunReport,
) -> Result<(), PipelineError> {
    let catalog = process_song_data(ctx, settings, writer, report)?;
    let catalog = settings.pipeline.reuse_song_catalog.then_some(catalog);
    process_log_data(ctx, settings, writer, catalog, report)
}

fn fail(report: RunReport, source: PipelineError) -> RunError {
    let error = RunError {
        stage: source.stage(),
        report: Box::new(report),
        source,
    };
    error!("{error}");
    error
}

/// Set up logging, then run the pipeline, writing parquet files below
/// `settings.pipeline.output_root`.
///
/// # Errors
///
/// Fails if the tracing subscriber can't be installed, or if the run fails.
///
/// # Panics
///
/// Panics if the logger was already initialized.
#[inline]
pub fn start(settings: Settings) -> anyhow::Result<RunReport> {
    init_logger(settings.log.level);
    tracing::subscriber::set_global_default(init_tracing(settings.log.trace_spans))?;

    let writer = ParquetDatasetWriter::new(&settings.pipeline.output_root, settings.output.into());

    Ok(run(&settings, &writer)?)
}
