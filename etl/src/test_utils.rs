//! utilities used for testing
//!
//! NOTE: helpers for reading written tables back are in the `playlake_storage` crate
//! behind the `test_utils` feature flag.

use std::{
    fs::OpenOptions,
    io::Write as _,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use noisy_float::types::n64;
use playlake_core::{
    config::Settings,
    logger::{init_logger, init_tracing},
};
use serde_json::{Value, json};

use crate::records::{LogEvent, NEXT_SONG, SongMetadata};

static INIT: OnceLock<()> = OnceLock::new();

pub fn init() {
    INIT.get_or_init(|| {
        init_logger(log::LevelFilter::Debug);
        if let Err(e) = tracing::subscriber::set_global_default(init_tracing(false)) {
            panic!("Error setting global default tracing subscriber: {e:?}")
        }
    });
}

/// Write `contents` to `root/relative`, creating the parent directories.
pub fn write_file(root: &Path, relative: &str, contents: &str) -> PathBuf {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, contents).unwrap();
    path
}

fn append_line(path: &Path, line: &Value) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .unwrap();
    writeln!(file, "{line}").unwrap();
}

#[must_use]
pub fn song(
    song_id: &str,
    artist_id: &str,
    artist_name: &str,
    title: &str,
    duration: f64,
) -> SongMetadata {
    SongMetadata {
        song_id: song_id.into(),
        artist_id: artist_id.into(),
        title: Some(title.into()),
        year: Some(2004),
        duration: Some(n64(duration)),
        artist_name: Some(artist_name.into()),
        artist_location: None,
        artist_latitude: None,
        artist_longitude: None,
        num_songs: Some(1),
    }
}

/// An event of a free user, on `page`, that isn't about any song.
#[must_use]
pub fn event(page: &str, ts: i64, user_id: &str) -> LogEvent {
    LogEvent {
        page: page.into(),
        ts,
        user_id: Some(user_id.into()),
        first_name: Some("Test".into()),
        last_name: Some(format!("User {user_id}").into()),
        gender: None,
        level: Some("free".into()),
        artist: None,
        song: None,
        length: None,
        session_id: Some(1),
        location: None,
        user_agent: None,
        item_in_session: None,
        auth: Some("Logged In".into()),
        method: Some("PUT".into()),
        status: Some(200),
        registration: None,
    }
}

/// A play of `title` by `artist`, lasting 200 seconds.
#[must_use]
pub fn play(ts: i64, user_id: &str, artist: &str, title: &str) -> LogEvent {
    LogEvent {
        artist: Some(artist.into()),
        song: Some(title.into()),
        length: Some(n64(200.0)),
        ..event(NEXT_SONG, ts, user_id)
    }
}

fn song_json(song: &SongMetadata) -> Value {
    json!({
        "num_songs": song.num_songs,
        "artist_id": &*song.artist_id,
        "artist_latitude": song.artist_latitude.map(|v| v.raw()),
        "artist_longitude": song.artist_longitude.map(|v| v.raw()),
        "artist_location": song.artist_location.as_deref(),
        "artist_name": song.artist_name.as_deref(),
        "song_id": &*song.song_id,
        "title": song.title.as_deref(),
        "duration": song.duration.map(|v| v.raw()),
        "year": song.year,
    })
}

fn event_json(event: &LogEvent) -> Value {
    json!({
        "artist": event.artist.as_deref(),
        "auth": event.auth.as_deref(),
        "firstName": event.first_name.as_deref(),
        "gender": event.gender.as_deref(),
        "itemInSession": event.item_in_session,
        "lastName": event.last_name.as_deref(),
        "length": event.length.map(|v| v.raw()),
        "level": event.level.as_deref(),
        "location": event.location.as_deref(),
        "method": event.method.as_deref(),
        "page": &*event.page,
        "registration": event.registration.map(|v| v.raw()),
        "sessionId": event.session_id,
        "song": event.song.as_deref(),
        "status": event.status,
        "ts": event.ts,
        "userAgent": event.user_agent.as_deref(),
        // the raw logs use an empty string for logged out users
        "userId": event.user_id.as_deref().unwrap_or(""),
    })
}

/// Lay out `songs` and `events` below `root` the way the raw sources are laid out.
///
/// Every song gets a file of its own, all events go to a single day's file.
/// Both source directories are created even when there is nothing to put in them.
pub fn write_input(root: &Path, songs: &[SongMetadata], events: &[LogEvent]) {
    std::fs::create_dir_all(root.join("song_data")).unwrap();
    std::fs::create_dir_all(root.join("log_data")).unwrap();

    for (i, song) in songs.iter().enumerate() {
        append_line(
            &root.join(format!("song_data/A/B/C/TRAAA{i:04}.json")),
            &song_json(song),
        );
    }
    for event in events {
        append_line(
            &root.join("log_data/2018/11/2018-11-12-events.json"),
            &event_json(event),
        );
    }
}

/// The default settings, reading from `input_root` and writing to `output_root`.
#[must_use]
pub fn settings_for(input_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Settings {
    let mut settings = Settings::default();
    settings.pipeline.input_root = input_root.into();
    settings.pipeline.output_root = output_root.into();
    settings.pipeline.workers = 2;
    settings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::parse_lines;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_written_input_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut logged_out = event("Home", 2, "");
        logged_out.user_id = None;
        let songs = [song("SOA", "ARX", "Artist X", "Song A", 200.5)];
        let events = [play(1, "7", "Artist X", "Song A"), logged_out];

        write_input(dir.path(), &songs, &events);

        let path = dir.path().join("song_data/A/B/C/TRAAA0000.json");
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(parse_lines::<SongMetadata>(&path, &bytes), (songs.to_vec(), 0));

        let path = dir.path().join("log_data/2018/11/2018-11-12-events.json");
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(parse_lines::<LogEvent>(&path, &bytes), (events.to_vec(), 0));
    }
}
