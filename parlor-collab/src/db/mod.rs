use std::sync::Arc;

use async_trait::async_trait;
use parlor_core::{ConnectionId, MemberId};
use thiserror::Error;

mod data;
pub use data::*;

mod memory;
pub use memory::*;

mod pg;
pub use pg::*;

pub type Result<T> = std::result::Result<T, DatabaseError>;
pub type SharedDatabase = Arc<dyn Database>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// An unknown or internal error happened with the database
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// A resource already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        /// The resource in question
        resource: &'static str,
        /// The field that is conflicting
        field: &'static str,
        /// The conflicting value
        value: String,
    },
    /// A resource in the database doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
}

impl DatabaseError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Helper trait to reduce boilerplate
pub trait IntoDatabaseError {
    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError;
    fn any(self) -> DatabaseError;
}

/// Helper trait to reduce boilerplate
pub trait DatabaseResult<T> {
    /// Turns the Result into a conflict error if it's Ok()
    fn conflict_or_ok(self, resource: &'static str, field: &'static str, value: &str)
        -> Result<()>;
    /// Turns a NotFound error into `None`
    fn optional(self) -> Result<Option<T>>;
}

impl<T> DatabaseResult<T> for Result<T> {
    fn conflict_or_ok(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> Result<()> {
        match self {
            Ok(_) => Err(DatabaseError::Conflict {
                resource,
                field,
                value: value.to_string(),
            }),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Represents the chat storage behind parlor rooms.
///
/// Call and playback state never goes through here, it is kept in memory.
#[async_trait]
pub trait Database: Send + Sync {
    async fn room_by_slug(&self, slug: &str) -> Result<RoomData>;
    async fn create_room(&self, slug: &str) -> Result<RoomData>;

    async fn member_by_id(&self, member_id: MemberId) -> Result<MemberData>;
    async fn member_by_name(&self, room_id: RoomId, name: &str) -> Result<MemberData>;
    async fn list_members(&self, room_id: RoomId) -> Result<Vec<MemberData>>;
    /// Creates a member that is online and bound to the given connection
    async fn create_member(&self, new_member: NewMember) -> Result<MemberData>;
    async fn update_member(&self, updated_member: UpdatedMember) -> Result<MemberData>;
    /// Marks a member online and binds it to a connection
    async fn bind_member(
        &self,
        member_id: MemberId,
        connection_id: ConnectionId,
    ) -> Result<MemberData>;
    /// Marks a member offline, but only if it is still bound to the given connection.
    /// Returns true if the member was unbound.
    async fn unbind_member(&self, member_id: MemberId, connection_id: ConnectionId)
        -> Result<bool>;
    /// Marks every member offline
    async fn clear_presence(&self) -> Result<()>;

    async fn message_by_id(&self, message_id: MessageId) -> Result<MessageData>;
    /// Returns the latest messages of a room, oldest first
    async fn recent_messages(&self, room_id: RoomId, limit: usize) -> Result<Vec<MessageData>>;
    async fn create_message(&self, new_message: NewMessage) -> Result<MessageData>;
    /// Soft deletes a message
    async fn mark_message_deleted(&self, message_id: MessageId) -> Result<()>;

    /// Creates the reaction, or returns the existing one
    async fn upsert_reaction(&self, new_reaction: NewReaction) -> Result<ReactionData>;
    async fn delete_reaction(
        &self,
        message_id: MessageId,
        member_id: MemberId,
        emoji: &str,
    ) -> Result<()>;
}

#[derive(Debug)]
pub struct NewMember {
    pub room_id: RoomId,
    pub name: String,
    pub connection_id: ConnectionId,
}

#[derive(Debug)]
pub struct UpdatedMember {
    pub id: MemberId,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug)]
pub struct NewMessage {
    pub room_id: RoomId,
    pub member_id: MemberId,
    pub text: String,
    pub image_url: Option<String>,
    pub audio_url: Option<String>,
}

#[derive(Debug)]
pub struct NewReaction {
    pub message_id: MessageId,
    pub member_id: MemberId,
    pub emoji: String,
}
