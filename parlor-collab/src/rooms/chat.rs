use log::debug;
use parlor_core::ConnectionId;

use crate::{
    events::CollabEvent, DatabaseError, MessageData, MessageId, NewMessage, NewReaction,
    ReactionData,
};

use super::{Room, RoomError, RoomManager};

impl RoomManager {
    /// Posts a message to the connection's room. Everyone receives it, including the author.
    pub async fn send_message(
        &self,
        connection_id: ConnectionId,
        text: String,
        image_url: Option<String>,
        audio_url: Option<String>,
    ) -> Result<MessageData, RoomError> {
        let (room, member_id) = self.bound(connection_id)?;

        let message = self
            .context
            .database
            .create_message(NewMessage {
                room_id: room.id(),
                member_id,
                text,
                image_url,
                audio_url,
            })
            .await?;

        room.emit(CollabEvent::NewMessage {
            message: message.clone(),
        });

        Ok(message)
    }

    /// Marks a message as deleted. Only the author may delete a message.
    pub async fn delete_message(
        &self,
        connection_id: ConnectionId,
        message_id: MessageId,
    ) -> Result<(), RoomError> {
        let (room, member_id) = self.bound(connection_id)?;
        let message = self.message_in_room(&room, message_id).await?;

        if message.member_id != member_id {
            return Err(RoomError::CannotDeleteMessage);
        }

        self.context
            .database
            .mark_message_deleted(message_id)
            .await?;

        room.emit(CollabEvent::MessageDeleted { message_id });

        Ok(())
    }

    /// Adds an emoji reaction to a message. Reacting twice with the same emoji does nothing new.
    pub async fn react(
        &self,
        connection_id: ConnectionId,
        message_id: MessageId,
        emoji: String,
    ) -> Result<ReactionData, RoomError> {
        let (room, member_id) = self.bound(connection_id)?;
        self.message_in_room(&room, message_id).await?;

        let reaction = self
            .context
            .database
            .upsert_reaction(NewReaction {
                message_id,
                member_id,
                emoji,
            })
            .await?;

        room.emit(CollabEvent::ReactionAdded {
            message_id,
            reaction: reaction.clone(),
        });

        Ok(reaction)
    }

    /// Removes the member's reaction from a message
    pub async fn remove_reaction(
        &self,
        connection_id: ConnectionId,
        message_id: MessageId,
        emoji: String,
    ) -> Result<(), RoomError> {
        let (room, member_id) = self.bound(connection_id)?;
        self.message_in_room(&room, message_id).await?;

        self.context
            .database
            .delete_reaction(message_id, member_id, &emoji)
            .await?;

        room.emit(CollabEvent::ReactionRemoved {
            message_id,
            member_id,
            emoji,
        });

        Ok(())
    }

    async fn message_in_room(
        &self,
        room: &Room,
        message_id: MessageId,
    ) -> Result<MessageData, RoomError> {
        match self.context.database.message_by_id(message_id).await {
            Ok(message) if message.room_id == room.id() => Ok(message),
            Ok(_) => Err(RoomError::MessageNotFound),
            Err(e @ DatabaseError::NotFound { .. }) => {
                debug!("Message lookup failed: {}", e);
                Err(RoomError::MessageNotFound)
            }
            Err(e) => Err(e.into()),
        }
    }
}
