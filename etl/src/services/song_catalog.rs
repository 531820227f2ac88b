//! The song and artist dimensions, extracted from the song metadata source.

use playlake_core::config::Settings;
use playlake_storage::{
    schemas::{ArtistRow, SongRow, TableName},
    writer::DatasetWriter,
};
use rayon::prelude::*;
use tracing::instrument;

use super::{dedup, write_table};
use crate::{
    context::ExecutionContext,
    errors::{PipelineError, Stage},
    records::SongMetadata,
    report::RunReport,
    source::{SourceBatch, read_source},
};

/// One row per distinct song.
#[must_use]
pub fn extract_songs(records: &[SongMetadata]) -> Vec<SongRow> {
    dedup(records.par_iter().map(SongMetadata::song_row).collect())
}

/// One row per distinct artist.
///
/// Only exact duplicates are dropped: an artist whose records disagree on, say, its location
/// gets a row for each version.
#[must_use]
pub fn extract_artists(records: &[SongMetadata]) -> Vec<ArtistRow> {
    dedup(records.par_iter().map(SongMetadata::artist_row).collect())
}

/// Read the song metadata source.
///
/// # Errors
///
/// Fails if the source can't be read, `stage` says which read this is.
pub fn read_song_catalog(
    ctx: &ExecutionContext,
    settings: &Settings,
    stage: Stage,
) -> Result<SourceBatch<SongMetadata>, PipelineError> {
    read_source(ctx, &settings.pipeline.input_root, &settings.sources.songs)
        .map_err(|source| PipelineError::Source { stage, source })
}

/// Read the song source, then extract and write the song and artist tables.
///
/// Returns the song records read, for anything else that needs the catalog.
///
/// # Errors
///
/// Fails if the song source can't be read or if either table can't be written.
#[instrument(skip_all, fields(run_id = %ctx.run_id()))]
pub fn process_song_data(
    ctx: &ExecutionContext,
    settings: &Settings,
    writer: &dyn DatasetWriter,
    report: &mut RunReport,
) -> Result<Vec<SongMetadata>, PipelineError> {
    let batch = read_song_catalog(ctx, settings, Stage::ReadSongs)?;
    report.songs = Some(batch.stats);

    let songs = ctx.install(|| extract_songs(&batch.records));
    write_table(
        writer,
        &settings.tables.target(TableName::Songs),
        &songs,
        report,
    )?;

    let artists = ctx.install(|| extract_artists(&batch.records));
    write_table(
        writer,
        &settings.tables.target(TableName::Artists),
        &artists,
        report,
    )?;

    Ok(batch.records)
}
