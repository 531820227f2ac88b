//! Records as they appear in the raw sources, one JSON object per line.

use std::sync::Arc;

use noisy_float::types::N64;
use playlake_storage::schemas::{ArtistRow, SongRow, SongplayRow, UserRow};
use serde::{Deserialize, Deserializer};

/// The value of [`LogEvent::page`] for an event that is a song play.
pub const NEXT_SONG: &str = "NextSong";

/// A record of the song metadata source.
///
/// Every record describes one song and the artist that performed it.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct SongMetadata {
    pub song_id: Arc<str>,
    pub artist_id: Arc<str>,
    pub title: Option<Arc<str>>,
    /// `0` when the year is unknown.
    pub year: Option<i32>,
    /// In seconds.
    #[serde(default, deserialize_with = "de_finite")]
    pub duration: Option<N64>,
    pub artist_name: Option<Arc<str>>,
    pub artist_location: Option<Arc<str>>,
    #[serde(default, deserialize_with = "de_finite")]
    pub artist_latitude: Option<N64>,
    #[serde(default, deserialize_with = "de_finite")]
    pub artist_longitude: Option<N64>,
    pub num_songs: Option<i64>,
}

impl SongMetadata {
    #[must_use]
    pub fn song_row(&self) -> SongRow {
        SongRow {
            song_id: self.song_id.clone(),
            artist_id: self.artist_id.clone(),
            title: self.title.clone(),
            year: self.year,
            duration: self.duration,
        }
    }

    #[must_use]
    pub fn artist_row(&self) -> ArtistRow {
        ArtistRow {
            artist_id: self.artist_id.clone(),
            name: self.artist_name.clone(),
            location: self.artist_location.clone(),
            latitude: self.artist_latitude,
            longitude: self.artist_longitude,
        }
    }
}

/// A record of the activity log source.
///
/// Only events whose `page` is [`NEXT_SONG`] are song plays, everything else
/// (logins, visits to the home page, ...) is ignored by the pipeline.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    pub page: Arc<str>,
    /// Epoch milliseconds.
    pub ts: i64,
    /// Logged-out events have an empty user id, which is read as `None`.
    #[serde(default, deserialize_with = "de_user_id")]
    pub user_id: Option<Arc<str>>,
    pub first_name: Option<Arc<str>>,
    pub last_name: Option<Arc<str>>,
    pub gender: Option<Arc<str>>,
    pub level: Option<Arc<str>>,
    /// Name of the artist of the song played.
    pub artist: Option<Arc<str>>,
    /// Title of the song played.
    pub song: Option<Arc<str>>,
    /// Duration of the song played, in seconds.
    #[serde(default, deserialize_with = "de_finite")]
    pub length: Option<N64>,
    pub session_id: Option<i64>,
    pub location: Option<Arc<str>>,
    pub user_agent: Option<Arc<str>>,
    pub item_in_session: Option<i64>,
    pub auth: Option<Arc<str>>,
    pub method: Option<Arc<str>>,
    pub status: Option<i64>,
    #[serde(default, deserialize_with = "de_finite")]
    pub registration: Option<N64>,
}

impl LogEvent {
    #[must_use]
    pub fn is_song_play(&self) -> bool {
        &*self.page == NEXT_SONG
    }

    #[must_use]
    pub fn user_row(&self) -> UserRow {
        UserRow {
            user_id: self.user_id.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            gender: self.gender.clone(),
            level: self.level.clone(),
        }
    }

    /// The songplay for this event, attributed to `song` if it matched one.
    #[must_use]
    pub fn songplay_row(&self, song: Option<&SongMetadata>) -> SongplayRow {
        SongplayRow {
            start_time: self.ts,
            user_id: self.user_id.clone(),
            song_id: song.map(|s| s.song_id.clone()),
            artist_id: song.map(|s| s.artist_id.clone()),
            level: self.level.clone(),
            session_id: self.session_id,
            location: self.location.clone(),
            user_agent: self.user_agent.clone(),
        }
    }
}

/// Accepts any JSON number, `NaN`s and infinities (which can only come from overflowing
/// literals like `1e400`) become `None`.
fn de_finite<'de, D>(deserializer: D) -> Result<Option<N64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.and_then(N64::try_new))
}

fn de_user_id<'de, D>(deserializer: D) -> Result<Option<Arc<str>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawUserId {
        Text(Arc<str>),
        Number(serde_json::Number),
    }

    Ok(
        match Option::<RawUserId>::deserialize(deserializer)? {
            None => None,
            Some(RawUserId::Text(text)) if text.is_empty() => None,
            Some(RawUserId::Text(text)) => Some(text),
            Some(RawUserId::Number(number)) => Some(number.to_string().into()),
        },
    )
}
