use log::info;
use parlor_core::{ConnectionId, MemberId, SignalPayload};

use super::{RoomError, RoomManager};

impl RoomManager {
    /// Puts the connection's member in the room's call.
    /// Returns the members that were already in the call, which the caller has to offer to.
    pub fn join_call(&self, connection_id: ConnectionId) -> Result<Vec<MemberId>, RoomError> {
        let room = self.room_of(connection_id).ok_or(RoomError::NotInRoom)?;
        let existing = room.join_call(connection_id)?;

        info!(
            "Connection {} joined the call in {} with {} other participant(s)",
            connection_id,
            room.data().slug,
            existing.len()
        );

        Ok(existing)
    }

    /// Takes the connection out of the call. Does nothing if it was not in it.
    pub fn leave_call(&self, connection_id: ConnectionId) -> Result<(), RoomError> {
        let room = self.room_of(connection_id).ok_or(RoomError::NotInRoom)?;

        if room.leave_call(connection_id) {
            info!(
                "Connection {} left the call in {}",
                connection_id,
                room.data().slug
            );
        }

        Ok(())
    }

    /// Forwards a signaling payload to another member of the call.
    ///
    /// A target that is not in the call is not an error, it most likely just left.
    pub fn relay(
        &self,
        connection_id: ConnectionId,
        to: MemberId,
        signal: SignalPayload,
    ) -> Result<(), RoomError> {
        let room = self.room_of(connection_id).ok_or(RoomError::NotInRoom)?;
        room.relay(connection_id, to, signal)?;

        Ok(())
    }
}
