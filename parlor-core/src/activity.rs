use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::MemberId;

/// The shared music/video playback of a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    /// The media being played. Empty means playback was stopped.
    pub url: String,
    pub playing: bool,
    /// The playback position, in seconds.
    pub current_time: f64,
    /// The member that wrote this state last.
    #[serde(default)]
    pub updated_by: Option<MemberId>,
}

impl PlaybackState {
    /// Returns true if this state stops playback entirely.
    pub fn is_stop(&self) -> bool {
        self.url.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameCategory {
    Action,
    Racing,
    Puzzle,
    Sports,
    Io,
    Nes,
    Snes,
    Gba,
    N64,
    Ps1,
}

/// A launchable game from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameItem {
    pub id: String,
    pub name: String,
    pub description: String,
    pub thumbnail: String,
    pub url: String,
    pub max_players: String,
    pub category: GameCategory,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// The game a room is currently playing together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveGame {
    pub game: GameItem,
    pub started_by: MemberId,
    pub started_by_name: String,
    pub started_at: DateTime<Utc>,
}
