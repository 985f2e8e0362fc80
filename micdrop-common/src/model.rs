//! Domain model for parties and their song queues

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::duration::parse_iso8601_seconds;

/// Lifecycle state of a party session.
///
/// `Open` is both the initial state and the intermission state between
/// performance blocks; `Closed` is terminal and rejects further mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyStatus {
    Open,
    Started,
    Closed,
}

impl PartyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartyStatus::Open => "open",
            PartyStatus::Started => "started",
            PartyStatus::Closed => "closed",
        }
    }

    /// Parse the database TEXT representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(PartyStatus::Open),
            "started" => Some(PartyStatus::Started),
            "closed" => Some(PartyStatus::Closed),
            _ => None,
        }
    }
}

/// One playlist entry of a party.
///
/// A song is created by an add action, mutated exactly once by a play
/// action (`played_at` is set monotonically and never cleared), and either
/// removed or kept forever as history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    /// External video/track identifier; unique among *unplayed* entries
    /// of a party.
    pub external_id: String,
    pub title: String,
    pub artist_hint: Option<String>,
    pub song_hint: Option<String>,
    pub cover_url: String,
    /// ISO-8601 duration string (e.g. `PT3M45S`), parsed on demand.
    pub duration_iso: Option<String>,
    /// Free-text submitter identity; fairness grouping key.
    pub singer_name: String,
    /// Submission timestamp; primary tie-break within a singer's bucket
    /// and within a fairness round.
    pub added_at: DateTime<Utc>,
    /// None while queued; set exactly once when the song completes.
    pub played_at: Option<DateTime<Utc>>,
    /// Boosts the item above standard fairness ordering, below the pinned
    /// current song.
    pub is_priority: bool,
    /// Operator-fixed absolute position among standard items.
    pub is_manual: bool,
    pub order_index: Option<i64>,
    /// Stable random value generated once at creation; breaks ties between
    /// items that are otherwise unorderable (same singer, same timestamp).
    pub tie_breaker: i64,
}

impl Song {
    /// Build a fresh queue entry for a submission arriving now.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        external_id: String,
        title: String,
        cover_url: String,
        singer_name: String,
        duration_iso: Option<String>,
        artist_hint: Option<String>,
        song_hint: Option<String>,
    ) -> Self {
        Song {
            external_id,
            title,
            artist_hint,
            song_hint,
            cover_url,
            duration_iso,
            singer_name,
            added_at: Utc::now(),
            played_at: None,
            is_priority: false,
            is_manual: false,
            order_index: None,
            tie_breaker: rand::random::<i64>(),
        }
    }

    pub fn is_unplayed(&self) -> bool {
        self.played_at.is_none()
    }

    /// Song length in seconds, derived from the ISO-8601 duration hint.
    pub fn duration_seconds(&self) -> Option<i64> {
        self.duration_iso
            .as_deref()
            .and_then(parse_iso8601_seconds)
    }
}

/// One party session row.
///
/// The handle is the public, unguessable route key. All timestamps are
/// stored as unix milliseconds in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Party {
    pub handle: String,
    pub status: PartyStatus,
    pub fairness_enabled: bool,
    /// External id of the song pinned as "now playing". Must reference an
    /// existing unplayed song or be absent.
    pub current_song_eid: Option<String>,
    pub current_song_started_at: Option<DateTime<Utc>>,
    /// Advisory playback-progress hint supplied by the operator player.
    pub current_song_remaining_secs: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl Party {
    /// Fresh party in its initial state (fairness on, nothing playing).
    pub fn new(handle: String) -> Self {
        let now = Utc::now();
        Party {
            handle,
            status: PartyStatus::Open,
            fairness_enabled: true,
            current_song_eid: None,
            current_song_started_at: None,
            current_song_remaining_secs: None,
            created_at: now,
            last_activity_at: now,
        }
    }

    /// Drop the "now playing" pin and its progress hints.
    pub fn clear_current_song(&mut self) {
        self.current_song_eid = None;
        self.current_song_started_at = None;
        self.current_song_remaining_secs = None;
    }
}

/// Validate a party handle as a route key: 1-64 characters of
/// `[A-Za-z0-9_-]`.
pub fn is_valid_handle(handle: &str) -> bool {
    !handle.is_empty()
        && handle.len() <= 64
        && handle
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [PartyStatus::Open, PartyStatus::Started, PartyStatus::Closed] {
            assert_eq!(PartyStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(PartyStatus::parse("paused"), None);
    }

    #[test]
    fn test_new_song_is_unplayed() {
        let song = Song::new(
            "yt:abc123".to_string(),
            "Bohemian Rhapsody (Karaoke)".to_string(),
            "https://img.example/abc123.jpg".to_string(),
            "Freddie".to_string(),
            Some("PT5M55S".to_string()),
            None,
            None,
        );
        assert!(song.is_unplayed());
        assert!(!song.is_priority);
        assert!(!song.is_manual);
        assert_eq!(song.duration_seconds(), Some(355));
    }

    #[test]
    fn test_song_without_duration_hint() {
        let mut song = Song::new(
            "yt:x".to_string(),
            "t".to_string(),
            "c".to_string(),
            "s".to_string(),
            None,
            None,
            None,
        );
        assert_eq!(song.duration_seconds(), None);

        song.duration_iso = Some("not a duration".to_string());
        assert_eq!(song.duration_seconds(), None);
    }

    #[test]
    fn test_clear_current_song() {
        let mut party = Party::new("p1".to_string());
        party.status = PartyStatus::Started;
        party.current_song_eid = Some("yt:abc".to_string());
        party.current_song_started_at = Some(Utc::now());
        party.current_song_remaining_secs = Some(120);

        party.clear_current_song();
        assert!(party.current_song_eid.is_none());
        assert!(party.current_song_started_at.is_none());
        assert!(party.current_song_remaining_secs.is_none());
    }

    #[test]
    fn test_handle_validation() {
        assert!(is_valid_handle("a"));
        assert!(is_valid_handle("fever-dream_42"));
        assert!(is_valid_handle(&"x".repeat(64)));
        assert!(!is_valid_handle(""));
        assert!(!is_valid_handle(&"x".repeat(65)));
        assert!(!is_valid_handle("no spaces"));
        assert!(!is_valid_handle("sneaky/../path"));
    }
}
