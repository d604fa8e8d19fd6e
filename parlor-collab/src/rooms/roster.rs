use parlor_core::{ConnectionId, MemberId};

/// A member currently in a room's call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RosterEntry {
    pub member_id: MemberId,
    pub connection_id: ConnectionId,
    /// Increases with every join, so later joiners have a higher sequence
    pub seq: u64,
}

/// The members of a room that are currently in the call.
///
/// A member appears at most once. Joining again replaces the previous entry,
/// which happens when a member reconnects before the old connection is cleaned up.
#[derive(Debug, Default)]
pub struct CallRoster {
    entries: Vec<RosterEntry>,
    next_seq: u64,
}

impl CallRoster {
    /// Adds a member to the call and returns the members that were already in it.
    ///
    /// The returned list is taken before the member is inserted, so it never contains
    /// the joining member. The joining member is expected to call everyone in it.
    pub fn join(&mut self, member_id: MemberId, connection_id: ConnectionId) -> Vec<MemberId> {
        self.entries.retain(|e| e.member_id != member_id);

        let existing = self.participants();

        self.next_seq += 1;
        self.entries.push(RosterEntry {
            member_id,
            connection_id,
            seq: self.next_seq,
        });

        existing
    }

    /// Removes the entry belonging to a connection, returning its member if there was one
    pub fn leave_by_connection(&mut self, connection_id: ConnectionId) -> Option<MemberId> {
        let index = self
            .entries
            .iter()
            .position(|e| e.connection_id == connection_id)?;

        Some(self.entries.remove(index).member_id)
    }

    /// Returns the connection a member is in the call with
    pub fn resolve(&self, member_id: MemberId) -> Option<ConnectionId> {
        self.entry(member_id).map(|e| e.connection_id)
    }

    /// Returns which of two participants has to send the first offer.
    ///
    /// This is always the one that joined last, since it received the other in its
    /// participant list. Returns `None` if either is not in the call.
    pub fn initiator(&self, a: MemberId, b: MemberId) -> Option<MemberId> {
        let a = self.entry(a)?;
        let b = self.entry(b)?;

        if a.seq > b.seq {
            Some(a.member_id)
        } else {
            Some(b.member_id)
        }
    }

    pub fn contains(&self, member_id: MemberId) -> bool {
        self.entry(member_id).is_some()
    }

    /// The members in the call, in join order
    pub fn participants(&self) -> Vec<MemberId> {
        self.entries.iter().map(|e| e.member_id).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, member_id: MemberId) -> Option<&RosterEntry> {
        self.entries.iter().find(|e| e.member_id == member_id)
    }
}
