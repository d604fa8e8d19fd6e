mod activity;
mod calls;
mod chat;
mod room;
mod roster;
mod slot;

use std::sync::Arc;

use log::{error, info, warn};
use parlor_core::{ConnectionId, MemberId};
use thiserror::Error;

use crate::{
    events::CollabEvent, CollabContext, DatabaseError, DatabaseResult, MemberData, NewMember,
    RoomData, UpdatedMember,
};

pub use room::*;
pub use roster::*;
pub use slot::*;

pub struct RoomManager {
    context: CollabContext,
}

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Not in a room")]
    NotInRoom,
    #[error("Room already exists")]
    RoomExists,
    #[error("Game not found")]
    GameNotFound,
    #[error("Message not found")]
    MessageNotFound,
    #[error("Cannot delete this message")]
    CannotDeleteMessage,
    #[error("Failed to join room")]
    Join(#[source] DatabaseError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// What a connection gets back from joining a room
#[derive(Clone)]
pub struct JoinedRoom {
    pub room: Arc<Room>,
    pub member: MemberData,
}

impl RoomManager {
    pub fn new(context: &CollabContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Marks every member offline on start-up, since no connection survives a restart
    pub async fn restore(&self) -> Result<(), DatabaseError> {
        self.context.database.clear_presence().await?;
        info!("Cleared stale presence");

        Ok(())
    }

    /// Creates a new room
    pub async fn create_room(&self, slug: &str) -> Result<RoomData, RoomError> {
        match self.context.database.create_room(slug).await {
            Ok(room) => {
                info!("Created room {}", room.slug);
                Ok(room)
            }
            Err(DatabaseError::Conflict { .. }) => Err(RoomError::RoomExists),
            Err(e) => Err(e.into()),
        }
    }

    /// Joins a room under a display name, creating the room and member as needed.
    ///
    /// A member that already exists with the same name is reused, so reconnecting keeps
    /// the same member id. If the connection was in another room, it leaves that first.
    pub async fn join(
        &self,
        connection_id: ConnectionId,
        slug: &str,
        name: &str,
    ) -> Result<JoinedRoom, RoomError> {
        if self.context.connections.contains_key(&connection_id) {
            self.disconnect(connection_id).await;
        }

        let database = &self.context.database;

        let room_data = match database.room_by_slug(slug).await.optional() {
            Ok(Some(room)) => room,
            Ok(None) => self.find_or_create_room(slug).await.map_err(RoomError::Join)?,
            Err(e) => return Err(RoomError::Join(e)),
        };

        let member = self
            .bind_or_create_member(&room_data, name, connection_id)
            .await
            .map_err(RoomError::Join)?;

        let members = database
            .list_members(room_data.id)
            .await
            .map_err(RoomError::Join)?;

        let messages = database
            .recent_messages(room_data.id, self.context.config.history_limit)
            .await
            .map_err(RoomError::Join)?;

        let room = self.room_for_data(room_data.clone());

        self.context.connections.insert(connection_id, room.id());

        room.attach(
            connection_id,
            member.clone(),
            CollabEvent::RoomJoined {
                room: room_data,
                members,
                messages,
                member_id: member.id,
            },
        );

        info!(
            "Member {} ({}) joined room {} on connection {}",
            member.name,
            member.id,
            room.data().slug,
            connection_id
        );

        Ok(JoinedRoom { room, member })
    }

    /// Removes a connection from its room.
    ///
    /// Does nothing if the connection is not in a room, so it is safe to call more than once.
    pub async fn disconnect(&self, connection_id: ConnectionId) {
        let Some((_, room_id)) = self.context.connections.remove(&connection_id) else {
            return;
        };

        let Some(room) = self.context.rooms.get(&room_id).map(|r| r.clone()) else {
            return;
        };

        let Some(detached) = room.detach(connection_id) else {
            return;
        };

        let member_id = detached.member_id;
        let database = &self.context.database;

        match database.unbind_member(member_id, connection_id).await {
            // The member is bound to a newer connection in storage
            Ok(false) => {}
            Ok(true) => match room.connection_of(member_id) {
                Some(other) => self.rebind(&room, member_id, other).await,
                None => {
                    room.announce_offline(member_id);
                }
            },
            Err(e) => {
                error!("Failed to mark member {} offline: {}", member_id, e);
                room.announce_offline(member_id);
            }
        }

        info!(
            "Connection {} left room {} (member {})",
            connection_id,
            room.data().slug,
            detached.member_id
        );
    }

    /// Binds a member in storage to another of its connections in the room,
    /// after the connection it was bound to went away.
    async fn rebind(&self, room: &Room, member_id: MemberId, connection_id: ConnectionId) {
        let database = &self.context.database;

        if let Err(e) = database.bind_member(member_id, connection_id).await {
            error!(
                "Failed to bind member {} to connection {}: {}",
                member_id, connection_id, e
            );
            return;
        }

        // That connection may have closed while we were writing
        if room.member_of(connection_id).is_err() {
            if let Ok(true) = database.unbind_member(member_id, connection_id).await {
                room.announce_offline(member_id);
            }
        }
    }

    /// Changes the display name or avatar of the connection's member
    pub async fn update_profile(
        &self,
        connection_id: ConnectionId,
        name: Option<String>,
        avatar_url: Option<String>,
    ) -> Result<MemberData, RoomError> {
        let (room, member_id) = self.bound(connection_id)?;

        let member = self
            .context
            .database
            .update_member(UpdatedMember {
                id: member_id,
                name,
                avatar_url,
            })
            .await?;

        room.emit(CollabEvent::MemberUpdated {
            member: member.clone(),
        });

        Ok(member)
    }

    /// Returns a room by id, if anyone has joined it since start-up
    pub fn get(&self, room_id: crate::RoomId) -> Option<Arc<Room>> {
        self.context.rooms.get(&room_id).map(|r| r.clone())
    }

    /// Returns the room a connection is in
    pub fn room_of(&self, connection_id: ConnectionId) -> Option<Arc<Room>> {
        let room_id = *self.context.connections.get(&connection_id)?;
        self.get(room_id)
    }

    /// Get all rooms in memory
    pub fn list_all(&self) -> Vec<Arc<Room>> {
        self.context.rooms.iter().map(|r| r.clone()).collect()
    }

    /// Returns the room and member a connection is bound to
    fn bound(&self, connection_id: ConnectionId) -> Result<(Arc<Room>, MemberId), RoomError> {
        let room = self.room_of(connection_id).ok_or(RoomError::NotInRoom)?;
        let member_id = room.member_of(connection_id)?;

        Ok((room, member_id))
    }

    fn room_for_data(&self, data: RoomData) -> Arc<Room> {
        self.context
            .rooms
            .entry(data.id)
            .or_insert_with(|| Arc::new(Room::new(data, self.context.channel.clone())))
            .clone()
    }

    async fn find_or_create_room(&self, slug: &str) -> Result<RoomData, DatabaseError> {
        match self.context.database.create_room(slug).await {
            Ok(room) => Ok(room),
            // Someone else created it in the meantime
            Err(DatabaseError::Conflict { .. }) => self.context.database.room_by_slug(slug).await,
            Err(e) => Err(e),
        }
    }

    async fn bind_or_create_member(
        &self,
        room: &RoomData,
        name: &str,
        connection_id: ConnectionId,
    ) -> Result<MemberData, DatabaseError> {
        let database = &self.context.database;

        if let Some(existing) = database.member_by_name(room.id, name).await.optional()? {
            return database.bind_member(existing.id, connection_id).await;
        }

        let created = database
            .create_member(NewMember {
                room_id: room.id,
                name: name.to_string(),
                connection_id,
            })
            .await;

        match created {
            Ok(member) => Ok(member),
            Err(DatabaseError::Conflict { .. }) => {
                warn!("Member {} was created concurrently, reusing it", name);

                let existing = database.member_by_name(room.id, name).await?;
                database.bind_member(existing.id, connection_id).await
            }
            Err(e) => Err(e),
        }
    }
}
