use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use parlor_core::{ConnectionId, MemberId, PrimaryKey};

use crate::{
    Database, DatabaseError, MemberData, MessageData, MessageId, NewMember, NewMessage,
    NewReaction, ReactionData, Result, RoomData, RoomId, UpdatedMember,
};

/// A database that lives in process memory. Used when no `DATABASE_URL` is configured.
pub struct MemoryDatabase {
    state: Mutex<MemoryState>,
    available: AtomicBool,
}

#[derive(Default)]
struct MemoryState {
    next_id: PrimaryKey,
    rooms: Vec<RoomData>,
    members: Vec<MemberData>,
    messages: Vec<StoredMessage>,
    reactions: Vec<ReactionData>,
}

struct StoredMessage {
    id: MessageId,
    room_id: RoomId,
    member_id: MemberId,
    text: String,
    image_url: Option<String>,
    audio_url: Option<String>,
    is_deleted: bool,
    created_at: chrono::DateTime<Utc>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self {
            state: Default::default(),
            available: AtomicBool::new(true),
        }
    }

    /// Makes every call fail as if the storage was unreachable
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst)
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DatabaseError::Internal("memory database is unavailable".into()))
        }
    }
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryState {
    fn next_id(&mut self) -> PrimaryKey {
        self.next_id += 1;
        self.next_id
    }

    fn member(&self, member_id: MemberId) -> Result<&MemberData> {
        self.members
            .iter()
            .find(|m| m.id == member_id)
            .ok_or(DatabaseError::NotFound {
                resource: "member",
                identifier: "id",
            })
    }

    fn member_mut(&mut self, member_id: MemberId) -> Result<&mut MemberData> {
        self.members
            .iter_mut()
            .find(|m| m.id == member_id)
            .ok_or(DatabaseError::NotFound {
                resource: "member",
                identifier: "id",
            })
    }

    fn hydrate(&self, message: &StoredMessage) -> Result<MessageData> {
        let member = self.member(message.member_id)?.clone();
        let reactions = self
            .reactions
            .iter()
            .filter(|r| r.message_id == message.id)
            .cloned()
            .collect();

        Ok(MessageData {
            id: message.id,
            room_id: message.room_id,
            member_id: message.member_id,
            member,
            text: message.text.clone(),
            image_url: message.image_url.clone(),
            audio_url: message.audio_url.clone(),
            is_deleted: message.is_deleted,
            created_at: message.created_at,
            reactions,
        })
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn room_by_slug(&self, slug: &str) -> Result<RoomData> {
        self.ensure_available()?;

        self.state
            .lock()
            .rooms
            .iter()
            .find(|r| r.slug == slug)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "room",
                identifier: "slug",
            })
    }

    async fn create_room(&self, slug: &str) -> Result<RoomData> {
        self.ensure_available()?;
        let mut state = self.state.lock();

        if state.rooms.iter().any(|r| r.slug == slug) {
            return Err(DatabaseError::Conflict {
                resource: "room",
                field: "slug",
                value: slug.to_string(),
            });
        }

        let room = RoomData {
            id: state.next_id(),
            slug: slug.to_string(),
            created_at: Utc::now(),
        };

        state.rooms.push(room.clone());
        Ok(room)
    }

    async fn member_by_id(&self, member_id: MemberId) -> Result<MemberData> {
        self.ensure_available()?;
        self.state.lock().member(member_id).cloned()
    }

    async fn member_by_name(&self, room_id: RoomId, name: &str) -> Result<MemberData> {
        self.ensure_available()?;

        self.state
            .lock()
            .members
            .iter()
            .find(|m| m.room_id == room_id && m.name == name)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "member",
                identifier: "name",
            })
    }

    async fn list_members(&self, room_id: RoomId) -> Result<Vec<MemberData>> {
        self.ensure_available()?;

        Ok(self
            .state
            .lock()
            .members
            .iter()
            .filter(|m| m.room_id == room_id)
            .cloned()
            .collect())
    }

    async fn create_member(&self, new_member: NewMember) -> Result<MemberData> {
        self.ensure_available()?;
        let mut state = self.state.lock();

        let taken = state
            .members
            .iter()
            .any(|m| m.room_id == new_member.room_id && m.name == new_member.name);

        if taken {
            return Err(DatabaseError::Conflict {
                resource: "member",
                field: "name",
                value: new_member.name,
            });
        }

        let member = MemberData {
            id: MemberId(state.next_id()),
            room_id: new_member.room_id,
            name: new_member.name,
            avatar_url: None,
            online: true,
            connection_id: Some(new_member.connection_id),
            created_at: Utc::now(),
        };

        state.members.push(member.clone());
        Ok(member)
    }

    async fn update_member(&self, updated_member: UpdatedMember) -> Result<MemberData> {
        self.ensure_available()?;
        let mut state = self.state.lock();

        let room_id = state.member(updated_member.id)?.room_id;

        if let Some(name) = &updated_member.name {
            let taken = state
                .members
                .iter()
                .any(|m| m.room_id == room_id && &m.name == name && m.id != updated_member.id);

            if taken {
                return Err(DatabaseError::Conflict {
                    resource: "member",
                    field: "name",
                    value: name.clone(),
                });
            }
        }

        let member = state.member_mut(updated_member.id)?;

        if let Some(name) = updated_member.name {
            member.name = name;
        }

        if let Some(avatar_url) = updated_member.avatar_url {
            member.avatar_url = Some(avatar_url);
        }

        Ok(member.clone())
    }

    async fn bind_member(
        &self,
        member_id: MemberId,
        connection_id: ConnectionId,
    ) -> Result<MemberData> {
        self.ensure_available()?;
        let mut state = self.state.lock();
        let member = state.member_mut(member_id)?;

        member.online = true;
        member.connection_id = Some(connection_id);

        Ok(member.clone())
    }

    async fn unbind_member(
        &self,
        member_id: MemberId,
        connection_id: ConnectionId,
    ) -> Result<bool> {
        self.ensure_available()?;
        let mut state = self.state.lock();
        let member = state.member_mut(member_id)?;

        if member.connection_id != Some(connection_id) {
            return Ok(false);
        }

        member.online = false;
        member.connection_id = None;

        Ok(true)
    }

    async fn clear_presence(&self) -> Result<()> {
        self.ensure_available()?;

        for member in self.state.lock().members.iter_mut() {
            member.online = false;
            member.connection_id = None;
        }

        Ok(())
    }

    async fn message_by_id(&self, message_id: MessageId) -> Result<MessageData> {
        self.ensure_available()?;
        let state = self.state.lock();

        let message = state
            .messages
            .iter()
            .find(|m| m.id == message_id)
            .ok_or(DatabaseError::NotFound {
                resource: "message",
                identifier: "id",
            })?;

        state.hydrate(message)
    }

    async fn recent_messages(&self, room_id: RoomId, limit: usize) -> Result<Vec<MessageData>> {
        self.ensure_available()?;
        let state = self.state.lock();

        let in_room: Vec<_> = state
            .messages
            .iter()
            .filter(|m| m.room_id == room_id)
            .collect();

        let skip = in_room.len().saturating_sub(limit);

        in_room
            .into_iter()
            .skip(skip)
            .map(|m| state.hydrate(m))
            .collect()
    }

    async fn create_message(&self, new_message: NewMessage) -> Result<MessageData> {
        self.ensure_available()?;
        let mut state = self.state.lock();

        // Ensure the author exists
        state.member(new_message.member_id)?;

        let message = StoredMessage {
            id: state.next_id(),
            room_id: new_message.room_id,
            member_id: new_message.member_id,
            text: new_message.text,
            image_url: new_message.image_url,
            audio_url: new_message.audio_url,
            is_deleted: false,
            created_at: Utc::now(),
        };

        let hydrated = state.hydrate(&message)?;
        state.messages.push(message);

        Ok(hydrated)
    }

    async fn mark_message_deleted(&self, message_id: MessageId) -> Result<()> {
        self.ensure_available()?;

        self.state
            .lock()
            .messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .map(|m| m.is_deleted = true)
            .ok_or(DatabaseError::NotFound {
                resource: "message",
                identifier: "id",
            })
    }

    async fn upsert_reaction(&self, new_reaction: NewReaction) -> Result<ReactionData> {
        self.ensure_available()?;
        let mut state = self.state.lock();

        let existing = state.reactions.iter().find(|r| {
            r.message_id == new_reaction.message_id
                && r.member_id == new_reaction.member_id
                && r.emoji == new_reaction.emoji
        });

        if let Some(reaction) = existing {
            return Ok(reaction.clone());
        }

        if !state.messages.iter().any(|m| m.id == new_reaction.message_id) {
            return Err(DatabaseError::NotFound {
                resource: "message",
                identifier: "id",
            });
        }

        let reaction = ReactionData {
            id: state.next_id(),
            message_id: new_reaction.message_id,
            member_id: new_reaction.member_id,
            emoji: new_reaction.emoji,
        };

        state.reactions.push(reaction.clone());
        Ok(reaction)
    }

    async fn delete_reaction(
        &self,
        message_id: MessageId,
        member_id: MemberId,
        emoji: &str,
    ) -> Result<()> {
        self.ensure_available()?;
        let mut state = self.state.lock();
        let before = state.reactions.len();

        state.reactions.retain(|r| {
            !(r.message_id == message_id && r.member_id == member_id && r.emoji == emoji)
        });

        if state.reactions.len() == before {
            return Err(DatabaseError::NotFound {
                resource: "reaction",
                identifier: "message_id, member_id, emoji",
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::DatabaseResult;

    use super::*;

    #[tokio::test]
    async fn test_member_binding_is_conditional() {
        let db = MemoryDatabase::new();
        let room = db.create_room("lobby").await.unwrap();

        let first = ConnectionId::new();
        let second = ConnectionId::new();

        let member = db
            .create_member(NewMember {
                room_id: room.id,
                name: "alice".to_string(),
                connection_id: first,
            })
            .await
            .unwrap();

        // Rebinding to a new connection before the old one is unbound
        db.bind_member(member.id, second).await.unwrap();

        let unbound = db.unbind_member(member.id, first).await.unwrap();
        assert!(!unbound, "stale connection must not unbind the member");
        assert!(db.member_by_id(member.id).await.unwrap().online);

        let unbound = db.unbind_member(member.id, second).await.unwrap();
        let member = db.member_by_id(member.id).await.unwrap();

        assert!(unbound);
        assert!(!member.online);
        assert_eq!(member.connection_id, None);
    }

    #[tokio::test]
    async fn test_recent_messages_keeps_latest_in_order() {
        let db = MemoryDatabase::new();
        let room = db.create_room("lobby").await.unwrap();
        let member = db
            .create_member(NewMember {
                room_id: room.id,
                name: "bob".to_string(),
                connection_id: ConnectionId::new(),
            })
            .await
            .unwrap();

        for i in 0..5 {
            db.create_message(NewMessage {
                room_id: room.id,
                member_id: member.id,
                text: format!("message {}", i),
                image_url: None,
                audio_url: None,
            })
            .await
            .unwrap();
        }

        let texts: Vec<_> = db
            .recent_messages(room.id, 3)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.text)
            .collect();

        assert_eq!(texts, vec!["message 2", "message 3", "message 4"]);
    }

    #[tokio::test]
    async fn test_reactions_are_unique() {
        let db = MemoryDatabase::new();
        let room = db.create_room("lobby").await.unwrap();
        let member = db
            .create_member(NewMember {
                room_id: room.id,
                name: "carol".to_string(),
                connection_id: ConnectionId::new(),
            })
            .await
            .unwrap();
        let message = db
            .create_message(NewMessage {
                room_id: room.id,
                member_id: member.id,
                text: "hi".to_string(),
                image_url: None,
                audio_url: None,
            })
            .await
            .unwrap();

        let reaction = NewReaction {
            message_id: message.id,
            member_id: member.id,
            emoji: "🎉".to_string(),
        };
        let first = db.upsert_reaction(reaction).await.unwrap();
        let second = db
            .upsert_reaction(NewReaction {
                message_id: message.id,
                member_id: member.id,
                emoji: "🎉".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(db.message_by_id(message.id).await.unwrap().reactions.len(), 1);

        db.delete_reaction(message.id, member.id, "🎉").await.unwrap();
        let missing = db.delete_reaction(message.id, member.id, "🎉").await;
        assert!(missing.optional().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unavailable_fails_every_call() {
        let db = MemoryDatabase::new();
        db.set_available(false);

        let result = db.create_room("lobby").await;
        assert!(matches!(result, Err(DatabaseError::Internal(_))));
    }
}
