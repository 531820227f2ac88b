//! The user and time dimensions and the songplays fact table, extracted from the activity log.

use log::{debug, info};
use playlake_core::config::Settings;
use playlake_storage::{
    schemas::{SongplayRow, TableName, TimeRow, UserRow},
    writer::DatasetWriter,
};
use rayon::prelude::*;
use tracing::instrument;

use super::{
    dedup,
    join::{CatalogIndex, JoinPredicate, predicate_for},
    song_catalog::read_song_catalog,
    write_table,
};
use crate::{
    context::ExecutionContext,
    errors::{PipelineError, Stage},
    records::{LogEvent, SongMetadata},
    report::RunReport,
    source::read_source,
};

/// The events that are song plays.
#[must_use]
pub fn filter_song_plays(events: &[LogEvent]) -> Vec<&LogEvent> {
    events.par_iter().filter(|e| e.is_song_play()).collect()
}

/// One row per distinct user state.
///
/// A user that went from the free level to the paid one gets a row for each level.
#[must_use]
pub fn extract_users(plays: &[&LogEvent]) -> Vec<UserRow> {
    dedup(plays.par_iter().map(|e| e.user_row()).collect())
}

/// One row per distinct play timestamp.
#[must_use]
pub fn extract_time(plays: &[&LogEvent]) -> Vec<TimeRow> {
    dedup(plays.par_iter().map(|e| e.ts).collect())
        .into_par_iter()
        .map(TimeRow::from_timestamp)
        .collect()
}

/// Join `plays` with `catalog`.
///
/// A play matching several songs gets a row for each of them, a play matching none gets a
/// single row without song and artist.
#[must_use]
pub fn build_songplays(
    plays: &[&LogEvent],
    catalog: &[SongMetadata],
    predicate: &dyn JoinPredicate,
) -> Vec<SongplayRow> {
    join_plays(plays, &CatalogIndex::new(catalog, predicate)).0
}

/// The songplays of `plays`, and how many of the plays matched at least one song.
fn join_plays(plays: &[&LogEvent], index: &CatalogIndex<'_>) -> (Vec<SongplayRow>, usize) {
    let joined: Vec<(bool, Vec<SongplayRow>)> = plays
        .par_iter()
        .map(|event| {
            let songs = index.lookup(event);
            if songs.is_empty() {
                (false, vec![event.songplay_row(None)])
            } else {
                let rows = songs
                    .into_iter()
                    .map(|song| event.songplay_row(Some(song)))
                    .collect();
                (true, rows)
            }
        })
        .collect();

    let matched = joined.iter().filter(|(matched, _)| *matched).count();
    let rows = joined.into_iter().flat_map(|(_, rows)| rows).collect();

    (dedup(rows), matched)
}

/// Read the log source, then extract and write the user, time, and songplays tables.
///
/// The songplays join uses `catalog` if given, and otherwise reads the song source again.
///
/// # Errors
///
/// Fails if a source can't be read or if a table can't be written.
#[instrument(skip_all, fields(run_id = %ctx.run_id()))]
pub fn process_log_data(
    ctx: &ExecutionContext,
    settings: &Settings,
    writer: &dyn DatasetWriter,
    catalog: Option<Vec<SongMetadata>>,
    report: &mut RunReport,
) -> Result<(), PipelineError> {
    let events = read_source::<LogEvent>(ctx, &settings.pipeline.input_root, &settings.sources.logs)
        .map_err(|source| PipelineError::Source {
            stage: Stage::ReadLogs,
            source,
        })?;
    report.logs = Some(events.stats);

    let plays = ctx.install(|| filter_song_plays(&events.records));
    report.plays = plays.len();
    debug!(
        "{} of {} events are song plays",
        plays.len(),
        events.records.len()
    );

    let users = ctx.install(|| extract_users(&plays));
    write_table(
        writer,
        &settings.tables.target(TableName::Users),
        &users,
        report,
    )?;

    let time = ctx.install(|| extract_time(&plays));
    write_table(
        writer,
        &settings.tables.target(TableName::Time),
        &time,
        report,
    )?;

    let catalog = match catalog {
        Some(catalog) => {
            debug!("reusing the song catalog ({} records)", catalog.len());
            catalog
        }
        None => {
            let batch = read_song_catalog(ctx, settings, Stage::ReadCatalog)?;
            report.catalog = Some(batch.stats);
            batch.records
        }
    };

    let predicate = predicate_for(
        settings.pipeline.join_strategy,
        settings.pipeline.duration_tolerance,
    );
    let index = CatalogIndex::new(&catalog, predicate.as_ref());
    let (songplays, matched) = ctx.install(|| join_plays(&plays, &index));
    report.matched_plays = matched;
    info!(
        "{} songplays, {} of {} plays matched a song using {predicate:?}",
        songplays.len(),
        report.matched_plays,
        report.plays
    );
    write_table(
        writer,
        &settings.tables.target(TableName::Songplays),
        &songplays,
        report,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        services::join::ArtistNameMatch,
        test_utils::{event, play, settings_for, song, write_input},
    };
    use playlake_storage::writer::memory::MemoryDatasetWriter;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use ulid::Ulid;

    #[test]
    fn test_filter_song_plays() {
        let events = [
            event("NextSong", 1, "1"),
            event("Home", 2, "1"),
            event("nextsong", 3, "1"),
            event("NextSong ", 4, "1"),
            event("NextSong", 5, "2"),
        ];

        let plays = filter_song_plays(&events);

        assert_eq!(plays.iter().map(|e| e.ts).collect::<Vec<_>>(), [1, 5]);
    }

    #[test]
    fn test_extract_users_keeps_level_changes() {
        let mut upgraded = event("NextSong", 2, "15");
        upgraded.level = Some("paid".into());
        let events = [event("NextSong", 1, "15"), event("NextSong", 3, "15"), upgraded];
        let plays = events.iter().collect::<Vec<_>>();

        let users = extract_users(&plays);

        let levels = users
            .iter()
            .map(|u| (u.user_id.as_deref(), u.level.as_deref()))
            .collect::<Vec<_>>();
        assert_eq!(levels, [(Some("15"), Some("free")), (Some("15"), Some("paid"))]);
    }

    #[test]
    fn test_extract_time_one_row_per_timestamp() {
        let events = [
            event("NextSong", 1_541_990_258_796, "1"),
            event("NextSong", 1_541_990_258_796, "2"),
            event("NextSong", 1_543_622_400_000, "1"),
        ];
        let plays = events.iter().collect::<Vec<_>>();

        let time = extract_time(&plays);

        assert_eq!(
            time,
            [
                TimeRow::from_timestamp(1_541_990_258_796),
                TimeRow::from_timestamp(1_543_622_400_000)
            ]
        );
    }

    #[rstest]
    #[case::matched(Some("Artist X"), Some(("SOA", "ARX")))]
    #[case::unmatched(Some("Nobody"), None)]
    #[case::no_artist(None, None)]
    fn test_build_songplays(
        #[case] artist: Option<&str>,
        #[case] expected: Option<(&str, &str)>,
    ) {
        let catalog = [
            song("SOA", "ARX", "Artist X", "Song A", 200.0),
            song("SOB", "ARY", "Artist Y", "Song B", 200.0),
        ];
        let mut event = event("NextSong", 7, "3");
        event.artist = artist.map(Into::into);

        let songplays = build_songplays(&[&event], &catalog, &ArtistNameMatch);

        assert_eq!(songplays.len(), 1);
        assert_eq!(
            (songplays[0].song_id.as_deref(), songplays[0].artist_id.as_deref()),
            expected.map_or((None, None), |(s, a)| (Some(s), Some(a)))
        );
        assert_eq!(songplays[0].start_time, 7);
        assert_eq!(songplays[0].user_id.as_deref(), Some("3"));
    }

    #[test]
    fn test_build_songplays_fans_out_over_every_match() {
        let catalog = [
            song("SOA", "ARX", "Artist X", "Song A", 200.0),
            song("SOC", "ARX", "Artist X", "Song C", 200.0),
        ];
        let play = play(7, "3", "Artist X", "Song A");

        let songplays = build_songplays(&[&play], &catalog, &ArtistNameMatch);

        let songs = songplays
            .iter()
            .map(|row| row.song_id.as_deref())
            .collect::<Vec<_>>();
        assert_eq!(songs, [Some("SOA"), Some("SOC")]);
    }

    #[test]
    fn test_build_songplays_drops_duplicates() {
        // the same song twice in the catalog, the same play twice in the log
        let catalog = [
            song("SOA", "ARX", "Artist X", "Song A", 200.0),
            song("SOA", "ARX", "Artist X", "Song A", 200.0),
        ];
        let play = play(7, "3", "Artist X", "Song A");

        let songplays = build_songplays(&[&play, &play], &catalog, &ArtistNameMatch);

        assert_eq!(songplays.len(), 1);
    }

    #[test]
    fn test_no_plays_gives_empty_tables() {
        let plays: Vec<&LogEvent> = Vec::new();
        let catalog = [song("SOA", "ARX", "Artist X", "Song A", 200.0)];

        assert!(extract_users(&plays).is_empty());
        assert!(extract_time(&plays).is_empty());
        assert!(build_songplays(&plays, &catalog, &ArtistNameMatch).is_empty());
    }

    #[rstest]
    #[case::fresh_catalog(None)]
    #[case::reused_catalog(Some(vec![song("SOA", "ARX", "Artist X", "Song A", 200.0)]))]
    fn test_process_log_data(#[case] catalog: Option<Vec<SongMetadata>>) {
        let input = tempfile::tempdir().unwrap();
        write_input(
            input.path(),
            &[song("SOA", "ARX", "Artist X", "Song A", 200.0)],
            &[
                play(1, "1", "Artist X", "Song A"),
                play(2, "2", "Someone Else", "Song Z"),
                event("Home", 3, "1"),
            ],
        );
        let settings = settings_for(input.path(), "/unused");
        let ctx = ExecutionContext::new(Ulid::new(), 2).unwrap();
        let writer = MemoryDatasetWriter::new();
        let mut report = RunReport::new(ctx.run_id());
        let reused = catalog.is_some();

        process_log_data(&ctx, &settings, &writer, catalog, &mut report).unwrap();

        assert_eq!(report.catalog.is_some(), !reused);
        assert_eq!(report.plays, 2);
        assert_eq!(report.matched_plays, 1);
        assert_eq!(writer.rows::<UserRow>("users").map(|r| r.len()), Some(2));
        assert_eq!(writer.rows::<TimeRow>("time").map(|r| r.len()), Some(2));
        let songplays = writer.rows::<SongplayRow>("songplays").unwrap();
        assert_eq!(
            songplays
                .iter()
                .map(|row| (row.start_time, row.song_id.as_deref()))
                .collect::<Vec<_>>(),
            [(1, Some("SOA")), (2, None)]
        );
    }

    #[test]
    fn test_process_log_data_without_catalog_source() {
        let input = tempfile::tempdir().unwrap();
        write_input(input.path(), &[], &[play(1, "1", "Artist X", "Song A")]);
        std::fs::remove_dir_all(input.path().join("song_data")).unwrap();
        let settings = settings_for(input.path(), "/unused");
        let ctx = ExecutionContext::new(Ulid::new(), 1).unwrap();
        let writer = MemoryDatasetWriter::new();
        let mut report = RunReport::new(ctx.run_id());

        let result = process_log_data(&ctx, &settings, &writer, None, &mut report);

        assert!(matches!(
            result,
            Err(PipelineError::Source {
                stage: Stage::ReadCatalog,
                ..
            })
        ));
        assert_eq!(report.written(), [TableName::Users, TableName::Time]);
        assert_eq!(report.not_attempted().last(), Some(&TableName::Songplays));
    }
}
