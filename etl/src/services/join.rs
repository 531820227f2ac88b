//! Matching song plays to songs in the catalog.

use std::{collections::HashMap, fmt::Debug};

use playlake_core::config::JoinStrategy;

use crate::records::{LogEvent, SongMetadata};

/// Decides whether a song play is a play of a song in the catalog.
///
/// Predicates that can only match rows agreeing on some key (say, the artist name) should
/// say so with [`JoinPredicate::keyed`] and the two key functions, which lets
/// [`CatalogIndex`] look up candidates instead of comparing every play with every song.
pub trait JoinPredicate: Send + Sync + Debug {
    fn matches(&self, event: &LogEvent, song: &SongMetadata) -> bool;

    /// When `true`, [`JoinPredicate::matches`] only ever holds for pairs whose keys are
    /// both present and equal.
    fn keyed(&self) -> bool {
        false
    }

    fn event_key<'e>(&self, _event: &'e LogEvent) -> Option<&'e str> {
        None
    }

    fn catalog_key<'s>(&self, _song: &'s SongMetadata) -> Option<&'s str> {
        None
    }
}

/// Matches when the play's artist name is exactly the catalog's artist name.
///
/// This is deliberately loose: every song by the artist matches, whatever the title.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArtistNameMatch;

impl JoinPredicate for ArtistNameMatch {
    fn matches(&self, event: &LogEvent, song: &SongMetadata) -> bool {
        event.artist.is_some() && event.artist == song.artist_name
    }

    fn keyed(&self) -> bool {
        true
    }

    fn event_key<'e>(&self, event: &'e LogEvent) -> Option<&'e str> {
        event.artist.as_deref()
    }

    fn catalog_key<'s>(&self, song: &'s SongMetadata) -> Option<&'s str> {
        song.artist_name.as_deref()
    }
}

/// Matches when artist name and song title are equal, and the durations are no more than
/// `tolerance` seconds apart.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ArtistTitleDurationMatch {
    pub tolerance: f64,
}

impl JoinPredicate for ArtistTitleDurationMatch {
    fn matches(&self, event: &LogEvent, song: &SongMetadata) -> bool {
        if !ArtistNameMatch.matches(event, song) || event.song.is_none() || event.song != song.title
        {
            return false;
        }
        match (event.length, song.duration) {
            (Some(length), Some(duration)) => (length.raw() - duration.raw()).abs() <= self.tolerance,
            _ => false,
        }
    }

    fn keyed(&self) -> bool {
        true
    }

    fn event_key<'e>(&self, event: &'e LogEvent) -> Option<&'e str> {
        ArtistNameMatch.event_key(event)
    }

    fn catalog_key<'s>(&self, song: &'s SongMetadata) -> Option<&'s str> {
        ArtistNameMatch.catalog_key(song)
    }
}

/// The predicate configured by `strategy`.
#[must_use]
pub fn predicate_for(strategy: JoinStrategy, duration_tolerance: f64) -> Box<dyn JoinPredicate> {
    match strategy {
        JoinStrategy::ArtistName => Box::new(ArtistNameMatch),
        JoinStrategy::ArtistTitleDuration => Box::new(ArtistTitleDurationMatch {
            tolerance: duration_tolerance,
        }),
    }
}

/// The song catalog, prepared for matching plays against it with a given predicate.
#[derive(Debug)]
pub struct CatalogIndex<'a> {
    predicate: &'a dyn JoinPredicate,
    catalog: &'a [SongMetadata],
    /// Songs by key, for keyed predicates.
    keyed: Option<HashMap<&'a str, Vec<&'a SongMetadata>>>,
}

impl<'a> CatalogIndex<'a> {
    #[must_use]
    pub fn new(catalog: &'a [SongMetadata], predicate: &'a dyn JoinPredicate) -> Self {
        let keyed = predicate.keyed().then(|| {
            let mut index: HashMap<&'a str, Vec<&'a SongMetadata>> = HashMap::new();
            for song in catalog {
                if let Some(key) = predicate.catalog_key(song) {
                    index.entry(key).or_default().push(song);
                }
            }
            index
        });

        Self {
            predicate,
            catalog,
            keyed,
        }
    }

    /// Every song in the catalog that `event` is a play of, in catalog order.
    #[must_use]
    pub fn lookup(&self, event: &LogEvent) -> Vec<&'a SongMetadata> {
        match &self.keyed {
            Some(index) => self
                .predicate
                .event_key(event)
                .and_then(|key| index.get(key))
                .map(|candidates| {
                    candidates
                        .iter()
                        .copied()
                        .filter(|song| self.predicate.matches(event, song))
                        .collect()
                })
                .unwrap_or_default(),
            None => self
                .catalog
                .iter()
                .filter(|song| self.predicate.matches(event, song))
                .collect(),
        }
    }
}
