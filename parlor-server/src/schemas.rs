use lazy_static::lazy_static;
use parlor_core::{MemberId, PlaybackState, SignalPayload};
use regex::Regex;
use serde::Deserialize;
use validator::Validate;

lazy_static! {
    static ref SLUG: Regex = Regex::new(r"^[a-z0-9-]+$").unwrap();
}

#[derive(Debug, Validate, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomSchema {
    #[validate(length(min = 1, max = 64), regex(path = *SLUG))]
    pub slug: String,
}

#[derive(Debug, Validate, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomSchema {
    #[validate(length(min = 1, max = 64), regex(path = *SLUG))]
    pub slug: String,
    #[validate(length(min = 1, max = 32))]
    pub name: String,
}

#[derive(Debug, Validate, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageSchema {
    #[serde(default)]
    #[validate(length(max = 4000))]
    pub text: String,
    #[validate(url)]
    pub image_url: Option<String>,
    #[validate(url)]
    pub audio_url: Option<String>,
}

#[derive(Debug, Validate, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMessageSchema {
    pub message_id: i32,
}

#[derive(Debug, Validate, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionSchema {
    pub message_id: i32,
    #[validate(length(min = 1, max = 16))]
    pub emoji: String,
}

#[derive(Debug, Validate, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileSchema {
    #[validate(length(min = 1, max = 32))]
    pub name: Option<String>,
    #[validate(url)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebrtcSignalSchema {
    pub to: MemberId,
    pub signal: SignalPayload,
}

/// The playback state as written by a client.
/// Who wrote it is decided by the server, so `updatedBy` is ignored.
#[derive(Debug, Validate, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicSyncSchema {
    #[validate(length(max = 2048))]
    pub url: String,
    pub playing: bool,
    #[serde(default)]
    pub current_time: f64,
}

impl From<MusicSyncSchema> for PlaybackState {
    fn from(value: MusicSyncSchema) -> Self {
        Self {
            url: value.url,
            playing: value.playing,
            current_time: value.current_time,
            updated_by: None,
        }
    }
}

#[derive(Debug, Validate, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartGameSchema {
    #[validate(length(min = 1, max = 64))]
    pub game_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_rules() {
        let valid = CreateRoomSchema {
            slug: "movie-night-2".to_string(),
        };
        assert!(valid.validate().is_ok());

        for slug in ["", "Lobby", "two words", "über"] {
            let invalid = CreateRoomSchema {
                slug: slug.to_string(),
            };

            assert!(invalid.validate().is_err(), "{:?} should be rejected", slug);
        }
    }

    #[test]
    fn test_name_length_counts_characters() {
        let join = |name: &str| JoinRoomSchema {
            slug: "lobby".to_string(),
            name: name.to_string(),
        };

        assert!(join("Ålesund Ærø").validate().is_ok());
        assert!(join(&"é".repeat(32)).validate().is_ok());
        assert!(join(&"é".repeat(33)).validate().is_err());
        assert!(join("").validate().is_err());
    }

    #[test]
    fn test_attachments_must_be_urls() {
        let message = SendMessageSchema {
            text: String::new(),
            image_url: Some("https://example.com/cat.png".to_string()),
            audio_url: None,
        };
        assert!(message.validate().is_ok());

        let message = SendMessageSchema {
            text: "look".to_string(),
            image_url: Some("cat.png".to_string()),
            audio_url: None,
        };
        assert!(message.validate().is_err());
    }

    #[test]
    fn test_music_sync_ignores_claimed_writer() {
        let schema: MusicSyncSchema = serde_json::from_str(
            r#"{"url":"https://youtu.be/x","playing":true,"currentTime":4.5,"updatedBy":99}"#,
        )
        .unwrap();

        let state = PlaybackState::from(schema);

        assert_eq!(state.updated_by, None);
        assert_eq!(state.current_time, 4.5);
    }
}
