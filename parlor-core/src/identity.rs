use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::Id;

/// The type used for primary keys of persisted records.
pub type PrimaryKey = i32;

/// Marker for a live transport session between a client and the server.
pub enum Connection {}

/// Identifies a single live connection. Assigned by the server when the
/// transport opens and never reused for another connection.
pub type ConnectionId = Id<Connection>;

/// The durable identity of a member within a room.
///
/// Unlike a [ConnectionId], a member id survives reconnects: rejoining a
/// room under the same display name yields the same member id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub PrimaryKey);

impl MemberId {
    pub fn value(&self) -> PrimaryKey {
        self.0
    }
}

impl From<PrimaryKey> for MemberId {
    fn from(value: PrimaryKey) -> Self {
        Self(value)
    }
}

impl Display for MemberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
