//! All shapes that are sent to clients are defined here
//! along with the ToSerialized impls

use chrono::{DateTime, Utc};
use parlor_collab::{MemberData, MessageData, ReactionData, RoomData};
use parlor_core::MemberId;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    id: i32,
    slug: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    id: i32,
    room_id: i32,
    name: String,
    avatar_url: Option<String>,
    online: bool,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    id: i32,
    room_id: i32,
    member_id: i32,
    member: Member,
    text: String,
    image_url: Option<String>,
    audio_url: Option<String>,
    is_deleted: bool,
    created_at: DateTime<Utc>,
    reactions: Vec<Reaction>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    id: i32,
    message_id: i32,
    member_id: i32,
    emoji: String,
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl ToSerialized<i32> for MemberId {
    fn to_serialized(&self) -> i32 {
        self.value()
    }
}

impl ToSerialized<Room> for RoomData {
    fn to_serialized(&self) -> Room {
        Room {
            id: self.id,
            slug: self.slug.clone(),
            created_at: self.created_at,
        }
    }
}

impl ToSerialized<Member> for MemberData {
    fn to_serialized(&self) -> Member {
        Member {
            id: self.id.value(),
            room_id: self.room_id,
            name: self.name.clone(),
            avatar_url: self.avatar_url.clone(),
            online: self.online,
            created_at: self.created_at,
        }
    }
}

impl ToSerialized<Message> for MessageData {
    fn to_serialized(&self) -> Message {
        Message {
            id: self.id,
            room_id: self.room_id,
            member_id: self.member_id.value(),
            member: self.member.to_serialized(),
            text: self.text.clone(),
            image_url: self.image_url.clone(),
            audio_url: self.audio_url.clone(),
            is_deleted: self.is_deleted,
            created_at: self.created_at,
            reactions: self.reactions.to_serialized(),
        }
    }
}

impl ToSerialized<Reaction> for ReactionData {
    fn to_serialized(&self) -> Reaction {
        Reaction {
            id: self.id,
            message_id: self.message_id,
            member_id: self.member_id.value(),
            emoji: self.emoji.clone(),
        }
    }
}
