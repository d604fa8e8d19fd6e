use chrono::Utc;
use log::{info, warn};
use parlor_core::{ActiveGame, ConnectionId, PlaybackState};

use super::{RoomError, RoomManager};

impl RoomManager {
    /// Replaces the playback of the connection's room, and sends it to everyone else
    pub fn sync_music(
        &self,
        connection_id: ConnectionId,
        state: PlaybackState,
    ) -> Result<PlaybackState, RoomError> {
        let room = self.room_of(connection_id).ok_or(RoomError::NotInRoom)?;
        room.set_music(connection_id, state)
    }

    /// Starts a game from the catalog for the whole room.
    /// Replaces any game that is already running.
    pub async fn start_game(
        &self,
        connection_id: ConnectionId,
        game_id: &str,
    ) -> Result<ActiveGame, RoomError> {
        let (room, member_id) = self.bound(connection_id)?;

        let game = self
            .context
            .catalog
            .get(game_id)
            .cloned()
            .ok_or(RoomError::GameNotFound)?;

        let started_by_name = match self.context.database.member_by_id(member_id).await {
            Ok(member) => member.name,
            Err(e) => {
                warn!("Could not look up game starter {}: {}", member_id, e);
                "Unknown".to_string()
            }
        };

        let active = ActiveGame {
            game,
            started_by: member_id,
            started_by_name,
            started_at: Utc::now(),
        };

        room.start_game(active.clone());

        info!(
            "{} started {} in room {}",
            active.started_by_name,
            active.game.name,
            room.data().slug
        );

        Ok(active)
    }

    /// Ends the active game of the connection's room, if there is one
    pub fn end_game(&self, connection_id: ConnectionId) -> Result<(), RoomError> {
        let room = self.room_of(connection_id).ok_or(RoomError::NotInRoom)?;

        if room.end_game(connection_id)? {
            info!("Game ended in room {}", room.data().slug);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use parlor_core::{ConnectionId, MemberId, PlaybackState};

    use crate::{events::CollabEvent, rooms::testing::harness, rooms::RoomError};

    fn playback(url: &str, current_time: f64) -> PlaybackState {
        PlaybackState {
            url: url.to_string(),
            playing: true,
            current_time,
            updated_by: None,
        }
    }

    #[tokio::test]
    async fn test_music_last_writer_wins() {
        let h = harness();
        let a = ConnectionId::new();
        let b = ConnectionId::new();

        let alice = h.collab.rooms.join(a, "lobby", "alice").await.unwrap();
        let bob = h.collab.rooms.join(b, "lobby", "bob").await.unwrap();
        h.channel.clear();

        h.collab
            .rooms
            .sync_music(a, playback("https://youtu.be/first", 10.0))
            .unwrap();
        h.collab
            .rooms
            .sync_music(b, playback("https://youtu.be/second", 42.0))
            .unwrap();

        let music = alice.room.music().unwrap();
        assert_eq!(music.url, "https://youtu.be/second");
        assert_eq!(music.current_time, 42.0);
        assert_eq!(music.updated_by, Some(bob.member.id));

        // Writers do not receive their own update
        assert_eq!(h.channel.take_kinds(a), vec!["music-update"]);
        assert_eq!(h.channel.take_kinds(b), vec!["music-update"]);
    }

    #[tokio::test]
    async fn test_writer_cannot_spoof_updated_by() {
        let h = harness();
        let a = ConnectionId::new();

        let alice = h.collab.rooms.join(a, "lobby", "alice").await.unwrap();

        let mut state = playback("https://youtu.be/track", 0.0);
        state.updated_by = Some(MemberId(12345));

        let stored = h.collab.rooms.sync_music(a, state).unwrap();
        assert_eq!(stored.updated_by, Some(alice.member.id));
    }

    #[tokio::test]
    async fn test_stop_clears_music_and_late_joiners_get_snapshot() {
        let h = harness();
        let a = ConnectionId::new();
        let late = ConnectionId::new();
        let later = ConnectionId::new();

        let alice = h.collab.rooms.join(a, "lobby", "alice").await.unwrap();
        h.collab
            .rooms
            .sync_music(a, playback("https://youtu.be/track", 5.0))
            .unwrap();

        h.collab.rooms.join(late, "lobby", "bob").await.unwrap();
        assert_eq!(h.channel.take_kinds(late), vec!["room-joined", "music-update"]);

        h.collab.rooms.sync_music(a, playback("", 0.0)).unwrap();
        assert!(alice.room.music().is_none());
        assert_eq!(h.channel.take_kinds(late), vec!["music-update"]);

        h.collab.rooms.join(later, "lobby", "carol").await.unwrap();
        assert_eq!(h.channel.take_kinds(later), vec!["room-joined"]);
    }

    #[tokio::test]
    async fn test_start_and_end_game() {
        let h = harness();
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        let late = ConnectionId::new();

        let alice = h.collab.rooms.join(a, "lobby", "alice").await.unwrap();
        h.collab.rooms.join(b, "lobby", "bob").await.unwrap();
        h.channel.clear();

        let game = h.collab.rooms.start_game(a, "smash-karts").await.unwrap();

        assert_eq!(game.started_by, alice.member.id);
        assert_eq!(game.started_by_name, "alice");
        assert_eq!(h.channel.take_kinds(a), vec!["game-started"]);
        assert_eq!(h.channel.take_kinds(b), vec!["game-started"]);

        h.collab.rooms.join(late, "lobby", "carol").await.unwrap();
        let events = h.channel.take(late);
        assert!(matches!(
            events.last(),
            Some(CollabEvent::GameState { game }) if game.game.id == "smash-karts"
        ));
        h.channel.clear();

        h.collab.rooms.end_game(b).unwrap();
        assert_eq!(h.channel.take_kinds(a), vec!["game-ended"]);
        assert!(alice.room.game().is_none());
        h.channel.clear();

        // Ending again does nothing
        h.collab.rooms.end_game(b).unwrap();
        assert_eq!(h.channel.total(), 0);
    }

    #[tokio::test]
    async fn test_later_game_replaces_earlier() {
        let h = harness();
        let a = ConnectionId::new();
        let b = ConnectionId::new();

        let alice = h.collab.rooms.join(a, "lobby", "alice").await.unwrap();
        h.collab.rooms.join(b, "lobby", "bob").await.unwrap();

        h.collab.rooms.start_game(a, "smash-karts").await.unwrap();
        h.collab.rooms.start_game(b, "krunker").await.unwrap();

        let game = alice.room.game().unwrap();
        assert_eq!(game.game.id, "krunker");
        assert_eq!(game.started_by_name, "bob");
    }

    #[tokio::test]
    async fn test_unknown_game_is_rejected() {
        let h = harness();
        let a = ConnectionId::new();
        let b = ConnectionId::new();

        h.collab.rooms.join(a, "lobby", "alice").await.unwrap();
        h.collab.rooms.join(b, "lobby", "bob").await.unwrap();
        h.channel.clear();

        let result = h.collab.rooms.start_game(a, "not-a-game").await;

        assert!(matches!(result, Err(RoomError::GameNotFound)));
        assert_eq!(h.channel.total(), 0);
    }

    #[tokio::test]
    async fn test_starter_name_falls_back_when_storage_fails() {
        let h = harness();
        let a = ConnectionId::new();

        h.collab.rooms.join(a, "lobby", "alice").await.unwrap();
        h.database.set_available(false);

        let game = h.collab.rooms.start_game(a, "krunker").await.unwrap();
        assert_eq!(game.started_by_name, "Unknown");
    }
}
