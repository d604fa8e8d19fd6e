use crossbeam::channel::{Receiver, Sender};
use parlor_core::{MemberId, SignalPayload};

use crate::{LinkState, RemoteTrack};

pub type EventSender = Sender<MeshEvent>;
pub type EventReceiver = Receiver<MeshEvent>;

/// Events emitted by the [crate::PeerManager] for the user interface
#[derive(Debug, Clone, PartialEq)]
pub enum MeshEvent {
    /// A peer started sending a track
    RemoteStream {
        member_id: MemberId,
        track: RemoteTrack,
    },
    /// A peer is gone, either because it left or because the connection was lost
    RemoteLeft { member_id: MemberId },
    /// A link moved to another state
    LinkStateChanged {
        member_id: MemberId,
        state: LinkState,
    },
}

/// Sends signaling payloads to other members, through the server's relay
pub trait SignalSender: Send + Sync {
    fn send(&self, to: MemberId, signal: SignalPayload);
}
