use std::collections::HashMap;

use log::{debug, warn};
use parlor_core::{IceCandidate, Id, MemberId};

use crate::{LocalTrack, PeerConnection, PeerError, SenderId, SessionDescription};

/// The state of a link to a single peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    New,
    /// We sent the first offer and are waiting for the answer
    Offering,
    /// We answered the first offer and are waiting for connectivity
    Answering,
    Connected,
    /// We sent a new offer on an answered or connected link and are waiting for the answer
    Renegotiating,
    Closed,
}

/// A peer connection to another member of the call
pub struct PeerLink {
    member_id: MemberId,
    state: LinkState,
    connection: Box<dyn PeerConnection>,
    has_remote_description: bool,
    /// Candidates that arrived before the remote description
    pending_candidates: Vec<IceCandidate>,
    senders: HashMap<Id<LocalTrack>, SenderId>,
}

impl PeerLink {
    pub fn new(member_id: MemberId, connection: Box<dyn PeerConnection>) -> Self {
        Self {
            member_id,
            state: LinkState::New,
            connection,
            has_remote_description: false,
            pending_candidates: vec![],
            senders: HashMap::new(),
        }
    }

    pub fn member_id(&self) -> MemberId {
        self.member_id
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Returns true if a local offer is waiting for an answer
    pub fn awaiting_answer(&self) -> bool {
        matches!(self.state, LinkState::Offering | LinkState::Renegotiating)
    }

    /// Returns true if signaling is stable, so a new offer can be made.
    /// An answered link is stable even before connectivity is reported.
    pub fn can_renegotiate(&self) -> bool {
        matches!(self.state, LinkState::Connected | LinkState::Answering)
    }

    pub fn has_remote_description(&self) -> bool {
        self.has_remote_description
    }

    pub fn pending_candidates(&self) -> usize {
        self.pending_candidates.len()
    }

    pub fn is_sending(&self, track: &LocalTrack) -> bool {
        self.senders.contains_key(&track.id)
    }

    pub fn add_track(&mut self, track: &LocalTrack) -> Result<(), PeerError> {
        if self.is_sending(track) {
            return Ok(());
        }

        let sender = self.connection.add_track(track)?;
        self.senders.insert(track.id, sender);

        Ok(())
    }

    /// Stops sending a track. Returns false if it was not being sent.
    pub fn remove_track(&mut self, track: &LocalTrack) -> Result<bool, PeerError> {
        let Some(sender) = self.senders.remove(&track.id) else {
            return Ok(false);
        };

        self.connection.remove_track(sender)?;
        Ok(true)
    }

    /// Creates and applies an offer, returning it so it can be sent to the peer
    pub async fn make_offer(&mut self) -> Result<String, PeerError> {
        let next = match self.state {
            LinkState::New => LinkState::Offering,
            LinkState::Connected | LinkState::Answering => LinkState::Renegotiating,
            other => {
                return Err(PeerError::Engine(format!(
                    "cannot offer while link is {:?}",
                    other
                )))
            }
        };

        let sdp = self.connection.create_offer().await?;
        self.connection
            .set_local_description(SessionDescription::offer(sdp.clone()))
            .await?;

        self.state = next;
        Ok(sdp)
    }

    /// Applies an offer from the peer and returns the answer to send back.
    ///
    /// If our own offer is still waiting for an answer, it is rolled back and the
    /// peer's offer wins.
    pub async fn accept_offer(&mut self, sdp: String) -> Result<String, PeerError> {
        let was_established = matches!(
            self.state,
            LinkState::Connected | LinkState::Renegotiating
        );

        if self.awaiting_answer() {
            debug!(
                "Offer collision with member {}, rolling back local offer",
                self.member_id
            );

            self.connection.rollback().await?;
        }

        self.connection
            .set_remote_description(SessionDescription::offer(sdp))
            .await?;

        self.has_remote_description = true;
        self.flush_candidates().await;

        let answer = self.connection.create_answer().await?;
        self.connection
            .set_local_description(SessionDescription::answer(answer.clone()))
            .await?;

        self.state = if was_established {
            LinkState::Connected
        } else {
            LinkState::Answering
        };

        Ok(answer)
    }

    /// Applies an answer from the peer.
    ///
    /// Answers that arrive while no offer is pending are stale and ignored.
    /// Returns true if the answer was applied.
    pub async fn accept_answer(&mut self, sdp: String) -> Result<bool, PeerError> {
        if !self.awaiting_answer() {
            debug!(
                "Ignoring answer from member {}, link is {:?}",
                self.member_id, self.state
            );

            return Ok(false);
        }

        self.connection
            .set_remote_description(SessionDescription::answer(sdp))
            .await?;

        self.has_remote_description = true;
        self.state = LinkState::Connected;
        self.flush_candidates().await;

        Ok(true)
    }

    /// Adds a candidate from the peer, or keeps it until the remote description is set.
    /// Returns true if it was applied right away.
    pub async fn add_candidate(&mut self, candidate: IceCandidate) -> Result<bool, PeerError> {
        if !self.has_remote_description {
            self.pending_candidates.push(candidate);
            return Ok(false);
        }

        self.connection.add_ice_candidate(candidate).await?;
        Ok(true)
    }

    /// Called when the engine reports the connection is up
    pub fn mark_connected(&mut self) -> bool {
        if self.state == LinkState::Answering {
            self.state = LinkState::Connected;
            return true;
        }

        false
    }

    pub fn close(&mut self) {
        if self.state == LinkState::Closed {
            return;
        }

        self.connection.close();
        self.senders.clear();
        self.pending_candidates.clear();
        self.state = LinkState::Closed;
    }

    async fn flush_candidates(&mut self) {
        for candidate in std::mem::take(&mut self.pending_candidates) {
            if let Err(e) = self.connection.add_ice_candidate(candidate).await {
                warn!(
                    "Dropped buffered candidate for member {}: {}",
                    self.member_id, e
                );
            }
        }
    }
}
