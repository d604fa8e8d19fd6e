use std::{collections::HashMap, sync::Arc};

use log::debug;
use parking_lot::Mutex;
use parlor_core::{ActiveGame, ConnectionId, MemberId, PlaybackState, SignalPayload};

use crate::{events::CollabEvent, MemberData, RoomData, RoomId, SignalChannel};

use super::{CallRoster, RoomError, Slot};

/// A parlor room, containing who is connected, who is in the call, and what is playing.
///
/// All state is guarded by a single lock per room. Events are delivered while the lock
/// is held, so every connection sees changes in the order they were made.
pub struct Room {
    data: RoomData,
    channel: Arc<dyn SignalChannel>,
    state: Mutex<RoomState>,
}

#[derive(Default)]
struct RoomState {
    /// The connections that joined this room, and the member each is bound to
    presence: HashMap<ConnectionId, MemberId>,
    roster: CallRoster,
    music: Slot<PlaybackState>,
    game: Slot<ActiveGame>,
}

/// The result of a connection leaving a room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detached {
    pub member_id: MemberId,
    /// Whether the connection was in the call
    pub left_call: bool,
}

impl Room {
    pub fn new(data: RoomData, channel: Arc<dyn SignalChannel>) -> Self {
        Self {
            data,
            channel,
            state: Default::default(),
        }
    }

    /// Binds a connection to a member of this room.
    ///
    /// The connection receives `joined` followed by the current music and game,
    /// and everyone else is told the member joined.
    pub fn attach(&self, connection_id: ConnectionId, member: MemberData, joined: CollabEvent) {
        let mut state = self.state.lock();

        state.presence.insert(connection_id, member.id);

        self.channel.deliver(connection_id, joined);

        if let Some(music) = state.music.get() {
            self.channel.deliver(
                connection_id,
                CollabEvent::MusicUpdate {
                    state: music.clone(),
                },
            );
        }

        if let Some(game) = state.game.get() {
            self.channel
                .deliver(connection_id, CollabEvent::GameState { game: game.clone() });
        }

        self.broadcast_except(&state, connection_id, CollabEvent::MemberJoined { member });
    }

    /// Unbinds a connection from this room, removing it from the call if needed
    pub fn detach(&self, connection_id: ConnectionId) -> Option<Detached> {
        let mut state = self.state.lock();

        let member_id = state.presence.remove(&connection_id)?;
        let left_call = state.roster.leave_by_connection(connection_id).is_some();

        if left_call {
            self.broadcast_except(&state, connection_id, CollabEvent::UserLeftCall { member_id });
        }

        Some(Detached {
            member_id,
            left_call,
        })
    }

    /// Tells the room a member went offline, unless it is still connected elsewhere.
    /// Returns true if the update was sent.
    pub fn announce_offline(&self, member_id: MemberId) -> bool {
        let state = self.state.lock();

        if Self::find_connection(&state, member_id).is_some() {
            return false;
        }

        self.broadcast(
            &state,
            CollabEvent::PresenceUpdate {
                member_id,
                online: false,
            },
        );

        true
    }

    /// Returns a connection in this room that is bound to the member, if any
    pub fn connection_of(&self, member_id: MemberId) -> Option<ConnectionId> {
        Self::find_connection(&self.state.lock(), member_id)
    }

    /// Returns the member a connection is bound to in this room
    pub fn member_of(&self, connection_id: ConnectionId) -> Result<MemberId, RoomError> {
        self.state
            .lock()
            .presence
            .get(&connection_id)
            .copied()
            .ok_or(RoomError::NotInRoom)
    }

    /// Adds the connection's member to the call.
    ///
    /// The joining connection always receives the members that were already in the call,
    /// and the rest of the room is told about the new participant.
    pub fn join_call(&self, connection_id: ConnectionId) -> Result<Vec<MemberId>, RoomError> {
        let mut state = self.state.lock();

        let member_id = Self::bound_member(&state, connection_id)?;
        let existing = state.roster.join(member_id, connection_id);

        self.channel.deliver(
            connection_id,
            CollabEvent::CallParticipants {
                participants: existing.clone(),
            },
        );

        self.broadcast_except(&state, connection_id, CollabEvent::UserJoinedCall { member_id });

        Ok(existing)
    }

    /// Removes the connection from the call. Returns false if it was not in it.
    pub fn leave_call(&self, connection_id: ConnectionId) -> bool {
        let mut state = self.state.lock();

        match state.roster.leave_by_connection(connection_id) {
            Some(member_id) => {
                self.broadcast_except(&state, connection_id, CollabEvent::UserLeftCall { member_id });
                true
            }
            None => false,
        }
    }

    /// Sends a signaling payload to a member in the call.
    ///
    /// If the target is not in the call, the payload is dropped. Returns true if it was delivered.
    pub fn relay(
        &self,
        connection_id: ConnectionId,
        to: MemberId,
        signal: SignalPayload,
    ) -> Result<bool, RoomError> {
        let state = self.state.lock();
        let from = Self::bound_member(&state, connection_id)?;

        match state.roster.resolve(to) {
            Some(target) => {
                self.channel
                    .deliver(target, CollabEvent::Signal { from, signal });
                Ok(true)
            }
            None => {
                debug!(
                    "Dropped {} from member {} to {}, target is not in the call",
                    signal.kind(),
                    from,
                    to
                );
                Ok(false)
            }
        }
    }

    /// Replaces the room's playback and sends it to everyone but the writer.
    /// An empty url clears the playback.
    pub fn set_music(
        &self,
        connection_id: ConnectionId,
        mut music: PlaybackState,
    ) -> Result<PlaybackState, RoomError> {
        let mut state = self.state.lock();

        music.updated_by = Some(Self::bound_member(&state, connection_id)?);

        if music.is_stop() {
            state.music.clear();
        } else {
            state.music.set(music.clone());
        }

        self.broadcast_except(
            &state,
            connection_id,
            CollabEvent::MusicUpdate {
                state: music.clone(),
            },
        );

        Ok(music)
    }

    pub fn music(&self) -> Option<PlaybackState> {
        self.state.lock().music.get().cloned()
    }

    /// Replaces the active game and tells everyone in the room, including the starter
    pub fn start_game(&self, game: ActiveGame) {
        let mut state = self.state.lock();

        state.game.set(game.clone());
        self.broadcast(&state, CollabEvent::GameStarted { game });
    }

    /// Ends the active game. Returns false if no game was active.
    pub fn end_game(&self, connection_id: ConnectionId) -> Result<bool, RoomError> {
        let mut state = self.state.lock();
        Self::bound_member(&state, connection_id)?;

        if state.game.clear().is_none() {
            return Ok(false);
        }

        self.broadcast(&state, CollabEvent::GameEnded);
        Ok(true)
    }

    pub fn game(&self) -> Option<ActiveGame> {
        self.state.lock().game.get().cloned()
    }

    /// Sends an event to every connection in the room
    pub fn emit(&self, event: CollabEvent) {
        let state = self.state.lock();
        self.broadcast(&state, event);
    }

    /// Returns the members in the call, in join order
    pub fn call_participants(&self) -> Vec<MemberId> {
        self.state.lock().roster.participants()
    }

    /// Returns which of two call participants sends the first offer
    pub fn call_initiator(&self, a: MemberId, b: MemberId) -> Option<MemberId> {
        self.state.lock().roster.initiator(a, b)
    }

    /// The amount of live connections in the room
    pub fn connection_count(&self) -> usize {
        self.state.lock().presence.len()
    }

    pub fn data(&self) -> &RoomData {
        &self.data
    }

    pub fn id(&self) -> RoomId {
        self.data.id
    }

    fn bound_member(state: &RoomState, connection_id: ConnectionId) -> Result<MemberId, RoomError> {
        state
            .presence
            .get(&connection_id)
            .copied()
            .ok_or(RoomError::NotInRoom)
    }

    fn find_connection(state: &RoomState, member_id: MemberId) -> Option<ConnectionId> {
        state
            .presence
            .iter()
            .find(|(_, &m)| m == member_id)
            .map(|(&c, _)| c)
    }

    fn broadcast(&self, state: &RoomState, event: CollabEvent) {
        for &connection_id in state.presence.keys() {
            self.channel.deliver(connection_id, event.clone());
        }
    }

    fn broadcast_except(&self, state: &RoomState, except: ConnectionId, event: CollabEvent) {
        for &connection_id in state.presence.keys().filter(|&&c| c != except) {
            self.channel.deliver(connection_id, event.clone());
        }
    }
}
