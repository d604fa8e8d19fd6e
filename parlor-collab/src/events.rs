use parlor_core::{ActiveGame, ConnectionId, MemberId, PlaybackState, SignalPayload};

use crate::{MemberData, MessageData, MessageId, ReactionData, RoomData};

/// Events emitted by the collab system to connected clients
#[derive(Debug, Clone)]
pub enum CollabEvent {
    /// Sent to a connection that joined a room
    RoomJoined {
        room: RoomData,
        members: Vec<MemberData>,
        messages: Vec<MessageData>,
        member_id: MemberId,
    },
    MemberJoined {
        member: MemberData,
    },
    PresenceUpdate {
        member_id: MemberId,
        online: bool,
    },
    MemberUpdated {
        member: MemberData,
    },
    NewMessage {
        message: MessageData,
    },
    MessageDeleted {
        message_id: MessageId,
    },
    ReactionAdded {
        message_id: MessageId,
        reaction: ReactionData,
    },
    ReactionRemoved {
        message_id: MessageId,
        member_id: MemberId,
        emoji: String,
    },
    /// The members already in a call, sent only to the member joining it
    CallParticipants {
        participants: Vec<MemberId>,
    },
    UserJoinedCall {
        member_id: MemberId,
    },
    UserLeftCall {
        member_id: MemberId,
    },
    /// A signaling envelope relayed from another member
    Signal {
        from: MemberId,
        signal: SignalPayload,
    },
    MusicUpdate {
        state: PlaybackState,
    },
    GameStarted {
        game: ActiveGame,
    },
    /// The active game, sent to a member joining a room while a game is running
    GameState {
        game: ActiveGame,
    },
    GameEnded,
}

impl CollabEvent {
    /// A short name for log lines
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RoomJoined { .. } => "room-joined",
            Self::MemberJoined { .. } => "member-joined",
            Self::PresenceUpdate { .. } => "presence-update",
            Self::MemberUpdated { .. } => "member-updated",
            Self::NewMessage { .. } => "new-message",
            Self::MessageDeleted { .. } => "message-deleted",
            Self::ReactionAdded { .. } => "reaction-added",
            Self::ReactionRemoved { .. } => "reaction-removed",
            Self::CallParticipants { .. } => "call-participants",
            Self::UserJoinedCall { .. } => "user-joined-call",
            Self::UserLeftCall { .. } => "user-left-call",
            Self::Signal { .. } => "webrtc-signal",
            Self::MusicUpdate { .. } => "music-update",
            Self::GameStarted { .. } => "game-started",
            Self::GameState { .. } => "game-state",
            Self::GameEnded => "game-ended",
        }
    }
}

/// Delivers events to live connections.
///
/// Implementations must keep the order of events delivered to the same connection,
/// and must not block, since this is called while room state is locked.
pub trait SignalChannel: Send + Sync {
    fn deliver(&self, connection_id: ConnectionId, event: CollabEvent);
}
