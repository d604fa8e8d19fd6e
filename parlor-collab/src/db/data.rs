use chrono::{DateTime, Utc};
use parlor_core::{ConnectionId, MemberId, PrimaryKey};

pub type RoomId = PrimaryKey;
pub type MessageId = PrimaryKey;

/// A parlor room
#[derive(Debug, Clone)]
pub struct RoomData {
    pub id: RoomId,
    /// A slug used to identify the room
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

/// A member of a room. One exists per (room, display name).
#[derive(Debug, Clone)]
pub struct MemberData {
    pub id: MemberId,
    pub room_id: RoomId,
    pub name: String,
    pub avatar_url: Option<String>,
    pub online: bool,
    /// The connection this member is bound to. Always `None` while offline.
    pub connection_id: Option<ConnectionId>,
    pub created_at: DateTime<Utc>,
}

/// A chat message, with its author and reactions
#[derive(Debug, Clone)]
pub struct MessageData {
    pub id: MessageId,
    pub room_id: RoomId,
    pub member_id: MemberId,
    pub member: MemberData,
    pub text: String,
    pub image_url: Option<String>,
    pub audio_url: Option<String>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub reactions: Vec<ReactionData>,
}

/// An emoji reaction. Unique per (message, member, emoji).
#[derive(Debug, Clone, PartialEq)]
pub struct ReactionData {
    pub id: PrimaryKey,
    pub message_id: MessageId,
    pub member_id: MemberId,
    pub emoji: String,
}
