//! Wire types: client message protocol, broadcast snapshots, catalog DTOs
//!
//! Every inbound client action is one tagged JSON message; deserialization
//! into [`ClientMessage`] is the schema validation the protocol requires.
//! Outbound state is always a complete assembled [`PartyView`] snapshot,
//! never a diff — the same shape is returned on explicit fetch and pushed
//! on every broadcast.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{PartyStatus, Song};

/// Connection-originated protocol message, tagged by `type`.
///
/// Unknown tags or malformed payloads fail deserialization and are dropped
/// by the caller (logged, never propagated to other connections).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Append a song to the queue. No-op if an unplayed song with the same
    /// `externalId` already exists in the party.
    #[serde(rename_all = "camelCase")]
    AddSong {
        external_id: String,
        title: String,
        cover_url: String,
        singer_name: String,
        #[serde(default)]
        duration_iso: Option<String>,
        #[serde(default)]
        artist_hint: Option<String>,
        #[serde(default)]
        song_hint: Option<String>,
    },
    /// Remove the first matching entry (played or unplayed); no-op
    /// otherwise.
    #[serde(rename_all = "camelCase")]
    RemoveSong { external_id: String },
    /// Set `playedAt` on the first unplayed match; idempotent.
    #[serde(rename_all = "camelCase")]
    MarkPlayed { external_id: String },
}

impl ClientMessage {
    /// Schema-validating constructor: parse a raw JSON value into a
    /// protocol message and check the semantic constraints serde cannot
    /// express (non-empty identifiers).
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let msg: ClientMessage = serde_json::from_value(value)
            .map_err(|e| Error::InvalidInput(format!("invalid message: {}", e)))?;
        msg.validate()?;
        Ok(msg)
    }

    fn validate(&self) -> Result<()> {
        let external_id = match self {
            ClientMessage::AddSong {
                external_id,
                title,
                singer_name,
                ..
            } => {
                if title.trim().is_empty() {
                    return Err(Error::InvalidInput("empty title".to_string()));
                }
                if singer_name.trim().is_empty() {
                    return Err(Error::InvalidInput("empty singerName".to_string()));
                }
                external_id
            }
            ClientMessage::RemoveSong { external_id } => external_id,
            ClientMessage::MarkPlayed { external_id } => external_id,
        };
        if external_id.trim().is_empty() {
            return Err(Error::InvalidInput("empty externalId".to_string()));
        }
        Ok(())
    }
}

/// Party settings as exposed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartySettings {
    pub fairness_enabled: bool,
}

/// Complete assembled snapshot of one party.
///
/// This is what new connections fetch to establish initial state and what
/// every broadcast pushes to all connections of the party.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyView {
    /// The pinned "now playing" song; only present while the party is
    /// started.
    pub current_song: Option<Song>,
    pub unplayed: Vec<Song>,
    /// Play history, most recently completed first.
    pub played: Vec<Song>,
    /// Remaining playback estimate for the active song, seconds.
    pub remaining_seconds: Option<i64>,
    pub settings: PartySettings,
    pub status: PartyStatus,
}

/// Persisted party state as stored, without queue assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPartyView {
    pub songs: Vec<Song>,
    pub settings: PartySettings,
    pub status: PartyStatus,
}

/// Video-search result from the catalog collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfo {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub duration_iso: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

/// Track-matching result: a messy video title split into artist/song,
/// optionally with the external music-catalog identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackMatch {
    pub artist: String,
    pub song: String,
    #[serde(default)]
    pub catalog_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_add_song_parses() {
        let msg = ClientMessage::from_value(json!({
            "type": "add-song",
            "externalId": "yt:dQw4w9WgXcQ",
            "title": "Never Gonna Give You Up (Karaoke)",
            "coverUrl": "https://img.example/dQw4w9WgXcQ.jpg",
            "singerName": "Rick",
            "durationIso": "PT3M33S"
        }))
        .unwrap();

        match msg {
            ClientMessage::AddSong {
                external_id,
                singer_name,
                duration_iso,
                artist_hint,
                ..
            } => {
                assert_eq!(external_id, "yt:dQw4w9WgXcQ");
                assert_eq!(singer_name, "Rick");
                assert_eq!(duration_iso.as_deref(), Some("PT3M33S"));
                assert!(artist_hint.is_none());
            }
            other => panic!("parsed wrong variant: {:?}", other),
        }
    }

    #[test]
    fn test_remove_and_mark_played_parse() {
        let remove = ClientMessage::from_value(
            json!({"type": "remove-song", "externalId": "yt:a"}),
        )
        .unwrap();
        assert_eq!(
            remove,
            ClientMessage::RemoveSong {
                external_id: "yt:a".to_string()
            }
        );

        let played = ClientMessage::from_value(
            json!({"type": "mark-played", "externalId": "yt:b"}),
        )
        .unwrap();
        assert_eq!(
            played,
            ClientMessage::MarkPlayed {
                external_id: "yt:b".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_type_rejected() {
        let err = ClientMessage::from_value(json!({
            "type": "skip-song",
            "externalId": "yt:a"
        }));
        assert!(matches!(err, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_missing_field_rejected() {
        // add-song without a singer is not a valid payload
        let err = ClientMessage::from_value(json!({
            "type": "add-song",
            "externalId": "yt:a",
            "title": "T",
            "coverUrl": "c"
        }));
        assert!(err.is_err());
    }

    #[test]
    fn test_blank_identifier_rejected() {
        let err = ClientMessage::from_value(json!({
            "type": "mark-played",
            "externalId": "   "
        }));
        assert!(matches!(err, Err(Error::InvalidInput(_))));

        let err = ClientMessage::from_value(json!({
            "type": "add-song",
            "externalId": "yt:a",
            "title": "T",
            "coverUrl": "c",
            "singerName": ""
        }));
        assert!(matches!(err, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_view_serializes_camel_case() {
        let view = PartyView {
            current_song: None,
            unplayed: vec![],
            played: vec![],
            remaining_seconds: Some(42),
            settings: PartySettings {
                fairness_enabled: true,
            },
            status: PartyStatus::Open,
        };
        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(value["remainingSeconds"], 42);
        assert_eq!(value["settings"]["fairnessEnabled"], true);
        assert_eq!(value["status"], "open");
        assert!(value["currentSong"].is_null());
    }
}
