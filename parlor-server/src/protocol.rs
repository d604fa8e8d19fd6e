use parlor_collab::CollabEvent;
use parlor_core::{ActiveGame, PlaybackState, SignalPayload};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors};

use crate::{
    schemas::{
        CreateRoomSchema, DeleteMessageSchema, JoinRoomSchema, MusicSyncSchema, ReactionSchema,
        SendMessageSchema, StartGameSchema, UpdateProfileSchema, WebrtcSignalSchema,
    },
    serialized::{Member, Message, Reaction, Room, ToSerialized},
};

/// A frame sent by a client over the gateway.
///
/// When `id` is set, the client is answered with an [ServerFrame::Ack] carrying the same id.
#[derive(Debug, Deserialize)]
pub struct ClientRequest {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(flatten)]
    pub message: ClientMessage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    CreateRoom(CreateRoomSchema),
    JoinRoom(JoinRoomSchema),
    SendMessage(SendMessageSchema),
    DeleteMessage(DeleteMessageSchema),
    ReactMessage(ReactionSchema),
    RemoveReaction(ReactionSchema),
    UpdateProfile(UpdateProfileSchema),
    JoinCall,
    LeaveCall,
    WebrtcSignal(WebrtcSignalSchema),
    MusicSync(MusicSyncSchema),
    StartGame(StartGameSchema),
    EndGame,
}

impl ClientMessage {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        match self {
            Self::CreateRoom(body) => body.validate(),
            Self::JoinRoom(body) => body.validate(),
            Self::SendMessage(body) => body.validate(),
            Self::DeleteMessage(body) => body.validate(),
            Self::ReactMessage(body) | Self::RemoveReaction(body) => body.validate(),
            Self::UpdateProfile(body) => body.validate(),
            Self::MusicSync(body) => body.validate(),
            Self::StartGame(body) => body.validate(),
            Self::JoinCall | Self::LeaveCall | Self::WebrtcSignal(_) | Self::EndGame => Ok(()),
        }
    }

    /// What the client tried to do, for error messages
    pub fn action(&self) -> &'static str {
        match self {
            Self::CreateRoom(_) => "create room",
            Self::JoinRoom(_) => "join room",
            Self::SendMessage(_) => "send message",
            Self::DeleteMessage(_) => "delete message",
            Self::ReactMessage(_) => "add reaction",
            Self::RemoveReaction(_) => "remove reaction",
            Self::UpdateProfile(_) => "update profile",
            Self::JoinCall => "join call",
            Self::LeaveCall => "leave call",
            Self::WebrtcSignal(_) => "relay signal",
            Self::MusicSync(_) => "sync music",
            Self::StartGame(_) => "start game",
            Self::EndGame => "end game",
        }
    }
}

/// A frame sent to a client over the gateway
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerFrame {
    /// The connection joined a room
    RoomJoined {
        room: Room,
        members: Vec<Member>,
        messages: Vec<Message>,
        member_id: i32,
    },
    MemberJoined {
        member: Member,
    },
    PresenceUpdate {
        member_id: i32,
        online: bool,
    },
    MemberUpdated {
        member: Member,
    },
    NewMessage {
        message: Message,
    },
    MessageDeleted {
        message_id: i32,
    },
    ReactionAdded {
        message_id: i32,
        reaction: Reaction,
    },
    ReactionRemoved {
        message_id: i32,
        member_id: i32,
        emoji: String,
    },
    /// Who was already in the call, only sent to the member that joined it
    CallParticipants {
        participants: Vec<i32>,
    },
    UserJoinedCall {
        member_id: i32,
    },
    UserLeftCall {
        member_id: i32,
    },
    /// A signaling envelope from another member of the call
    WebrtcSignal {
        from: i32,
        signal: SignalPayload,
    },
    MusicUpdate(PlaybackState),
    GameStarted(ActiveGame),
    GameState(ActiveGame),
    GameEnded,
    /// A request without an id failed
    Error {
        message: String,
    },
    /// The outcome of a request with an id
    Ack {
        id: u64,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl From<CollabEvent> for ServerFrame {
    fn from(value: CollabEvent) -> Self {
        match value {
            CollabEvent::RoomJoined {
                room,
                members,
                messages,
                member_id,
            } => Self::RoomJoined {
                room: room.to_serialized(),
                members: members.to_serialized(),
                messages: messages.to_serialized(),
                member_id: member_id.to_serialized(),
            },
            CollabEvent::MemberJoined { member } => Self::MemberJoined {
                member: member.to_serialized(),
            },
            CollabEvent::PresenceUpdate { member_id, online } => Self::PresenceUpdate {
                member_id: member_id.to_serialized(),
                online,
            },
            CollabEvent::MemberUpdated { member } => Self::MemberUpdated {
                member: member.to_serialized(),
            },
            CollabEvent::NewMessage { message } => Self::NewMessage {
                message: message.to_serialized(),
            },
            CollabEvent::MessageDeleted { message_id } => Self::MessageDeleted { message_id },
            CollabEvent::ReactionAdded {
                message_id,
                reaction,
            } => Self::ReactionAdded {
                message_id,
                reaction: reaction.to_serialized(),
            },
            CollabEvent::ReactionRemoved {
                message_id,
                member_id,
                emoji,
            } => Self::ReactionRemoved {
                message_id,
                member_id: member_id.to_serialized(),
                emoji,
            },
            CollabEvent::CallParticipants { participants } => Self::CallParticipants {
                participants: participants.to_serialized(),
            },
            CollabEvent::UserJoinedCall { member_id } => Self::UserJoinedCall {
                member_id: member_id.to_serialized(),
            },
            CollabEvent::UserLeftCall { member_id } => Self::UserLeftCall {
                member_id: member_id.to_serialized(),
            },
            CollabEvent::Signal { from, signal } => Self::WebrtcSignal {
                from: from.to_serialized(),
                signal,
            },
            CollabEvent::MusicUpdate { state } => Self::MusicUpdate(state),
            CollabEvent::GameStarted { game } => Self::GameStarted(game),
            CollabEvent::GameState { game } => Self::GameState(game),
            CollabEvent::GameEnded => Self::GameEnded,
        }
    }
}
