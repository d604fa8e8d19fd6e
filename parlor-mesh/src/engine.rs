use async_trait::async_trait;
use parlor_core::{IceCandidate, Id, MemberId};
use thiserror::Error;

use crate::{LocalTrack, MeshConfig};

/// Marker for a track sender within a peer connection.
pub enum Sender {}

/// Identifies a track that was added to a [PeerConnection].
pub type SenderId = Id<Sender>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpKind {
    Offer,
    Answer,
}

/// A session description as exchanged between peers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// The connectivity of a peer connection, as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    New,
    Checking,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl ConnectivityState {
    /// Returns true if the connection cannot carry media anymore
    pub fn is_lost(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Failed)
    }
}

#[derive(Debug, Error)]
pub enum PeerError {
    /// The engine rejected an operation
    #[error("WebRTC engine error: {0}")]
    Engine(String),
    /// The engine could not create a connection
    #[error("Could not create a peer connection: {0}")]
    Create(String),
    /// There is no link to this member
    #[error("No peer link for member {0}")]
    NoLink(MemberId),
}

/// A single WebRTC peer connection, provided by the platform's engine.
///
/// Engine events (produced ICE candidates, incoming tracks, connectivity changes) are not
/// part of this trait. The embedder forwards them to the [crate::PeerManager].
#[async_trait]
pub trait PeerConnection: Send {
    /// Creates an offer. Does not apply it.
    async fn create_offer(&mut self) -> Result<String, PeerError>;

    /// Creates an answer to the applied remote offer. Does not apply it.
    async fn create_answer(&mut self) -> Result<String, PeerError>;

    async fn set_local_description(
        &mut self,
        description: SessionDescription,
    ) -> Result<(), PeerError>;

    async fn set_remote_description(
        &mut self,
        description: SessionDescription,
    ) -> Result<(), PeerError>;

    /// Discards the applied local offer, returning the connection to a stable state.
    async fn rollback(&mut self) -> Result<(), PeerError>;

    async fn add_ice_candidate(&mut self, candidate: IceCandidate) -> Result<(), PeerError>;

    /// Starts sending a local track to the peer
    fn add_track(&mut self, track: &LocalTrack) -> Result<SenderId, PeerError>;

    /// Stops sending a track to the peer
    fn remove_track(&mut self, sender: SenderId) -> Result<(), PeerError>;

    fn close(&mut self);
}

/// Creates peer connections. Implemented by the platform's WebRTC engine.
pub trait PeerFactory: Send {
    fn create(
        &mut self,
        member_id: MemberId,
        config: &MeshConfig,
    ) -> Result<Box<dyn PeerConnection>, PeerError>;
}
