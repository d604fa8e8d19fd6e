use std::{collections::HashMap, sync::Arc};

use crossbeam::channel::unbounded;
use log::{debug, info, warn};
use parlor_core::{IceCandidate, MemberId, SignalPayload};

use crate::{
    ConnectivityState, EventReceiver, EventSender, LinkState, LocalMedia, LocalTrack, MediaDevices,
    MediaError, MeshConfig, MeshEvent, PeerError, PeerFactory, PeerLink, RemoteTrack,
    SignalSender, TrackSource,
};

/// Maintains one peer link per other member of the call.
///
/// Only the member that joins a call later sends the first offer, to each member in the
/// participant list it receives. Offers that still collide are resolved by the receiving
/// side rolling back its own offer.
pub struct PeerManager {
    config: MeshConfig,
    factory: Box<dyn PeerFactory>,
    devices: Box<dyn MediaDevices>,
    signals: Arc<dyn SignalSender>,

    links: HashMap<MemberId, PeerLink>,
    media: LocalMedia,
    muted: bool,

    event_sender: EventSender,
    event_receiver: EventReceiver,
}

impl PeerManager {
    pub fn new(
        config: MeshConfig,
        factory: Box<dyn PeerFactory>,
        devices: Box<dyn MediaDevices>,
        signals: Arc<dyn SignalSender>,
    ) -> Self {
        let (event_sender, event_receiver) = unbounded();

        Self {
            config,
            factory,
            devices,
            signals,
            links: HashMap::new(),
            media: LocalMedia::default(),
            muted: false,
            event_sender,
            event_receiver,
        }
    }

    /// Acquires the microphone. Calls start audio-only.
    ///
    /// If this fails, no call should be joined.
    pub async fn start_call(&mut self) -> Result<(), MediaError> {
        if self.media.microphone.is_some() {
            return Ok(());
        }

        let track = self.devices.acquire(TrackSource::Microphone).await?;
        track.set_enabled(!self.muted);

        self.media.microphone = Some(LocalTrack::new(TrackSource::Microphone, track));
        info!("Call started");

        Ok(())
    }

    pub fn in_call(&self) -> bool {
        self.media.microphone.is_some()
    }

    /// Offers to every member that was already in the call when we joined it
    pub async fn on_call_participants(&mut self, participants: Vec<MemberId>) {
        for member_id in participants {
            if let Err(e) = self.initiate(member_id).await {
                warn!("Could not call member {}: {}", member_id, e);
            }
        }
    }

    /// Creates a link to a member and sends it an offer.
    ///
    /// Must only be called for members received in the participant list of our own call join,
    /// never for members that joined after us.
    pub async fn initiate(&mut self, target: MemberId) -> Result<(), PeerError> {
        if self.links.contains_key(&target) {
            debug!("Already linked to member {}, not initiating", target);
            return Ok(());
        }

        let mut link = self.create_link(target)?;

        match link.make_offer().await {
            Ok(sdp) => {
                self.links.insert(target, link);
                self.signals.send(target, SignalPayload::Offer { sdp });
                self.emit_state(target, LinkState::Offering);

                Ok(())
            }
            Err(e) => {
                link.close();
                Err(e)
            }
        }
    }

    /// Handles a signaling payload relayed from another member
    pub async fn on_signal(&mut self, from: MemberId, signal: SignalPayload) -> Result<(), PeerError> {
        match signal {
            SignalPayload::Offer { sdp } => self.handle_incoming_offer(from, sdp).await,
            SignalPayload::Answer { sdp } => self.handle_incoming_answer(from, sdp).await,
            SignalPayload::Candidate { candidate } => {
                self.handle_incoming_candidate(from, candidate).await
            }
        }
    }

    pub async fn handle_incoming_offer(&mut self, from: MemberId, sdp: String) -> Result<(), PeerError> {
        if !self.links.contains_key(&from) {
            let link = self.create_link(from)?;
            self.links.insert(from, link);
        }

        let link = self.links.get_mut(&from).ok_or(PeerError::NoLink(from))?;
        let before = link.state();

        let answer = link.accept_offer(sdp).await?;
        let after = link.state();

        self.signals.send(from, SignalPayload::Answer { sdp: answer });

        if before != after {
            self.emit_state(from, after);
        }

        Ok(())
    }

    pub async fn handle_incoming_answer(&mut self, from: MemberId, sdp: String) -> Result<(), PeerError> {
        let Some(link) = self.links.get_mut(&from) else {
            debug!("Ignoring answer from member {}, no link", from);
            return Ok(());
        };

        if link.accept_answer(sdp).await? {
            self.emit_state(from, LinkState::Connected);
        }

        Ok(())
    }

    pub async fn handle_incoming_candidate(
        &mut self,
        from: MemberId,
        candidate: IceCandidate,
    ) -> Result<(), PeerError> {
        let Some(link) = self.links.get_mut(&from) else {
            debug!("Ignoring candidate from member {}, no link", from);
            return Ok(());
        };

        if let Err(e) = link.add_candidate(candidate).await {
            warn!("Could not add candidate from member {}: {}", from, e);
        }

        Ok(())
    }

    /// Sends a new offer to a member after our tracks changed.
    ///
    /// Only happens when signaling on the link is stable, meaning it is connected or we
    /// answered its offer, and no other offer is in flight. Otherwise it is skipped, and
    /// the next track change will try again. Returns true if an offer was sent.
    pub async fn renegotiate(&mut self, member_id: MemberId) -> Result<bool, PeerError> {
        let link = self
            .links
            .get_mut(&member_id)
            .ok_or(PeerError::NoLink(member_id))?;

        if !link.can_renegotiate() {
            debug!(
                "Skipping renegotiation with member {}, link is {:?}",
                member_id,
                link.state()
            );

            return Ok(false);
        }

        let sdp = link.make_offer().await?;

        self.signals.send(member_id, SignalPayload::Offer { sdp });
        self.emit_state(member_id, LinkState::Renegotiating);

        Ok(true)
    }

    /// Forwards a candidate produced by our engine to the peer
    pub fn on_local_candidate(&mut self, member_id: MemberId, candidate: IceCandidate) {
        if !self.links.contains_key(&member_id) {
            return;
        }

        self.signals
            .send(member_id, SignalPayload::Candidate { candidate });
    }

    /// Called by the engine when a peer starts sending a track
    pub fn on_remote_track(&mut self, member_id: MemberId, track: RemoteTrack) {
        if !self.links.contains_key(&member_id) {
            return;
        }

        self.emit(MeshEvent::RemoteStream { member_id, track });
    }

    /// Called by the engine when the connectivity of a link changes
    pub fn on_connectivity(&mut self, member_id: MemberId, state: ConnectivityState) {
        let Some(link) = self.links.get_mut(&member_id) else {
            return;
        };

        if state == ConnectivityState::Connected && link.mark_connected() {
            self.emit_state(member_id, LinkState::Connected);
        }

        if state.is_lost() {
            info!("Lost connection to member {} ({:?})", member_id, state);
            self.drop_link(member_id);
        }
    }

    /// Called when the server reports a member left the call
    pub fn on_user_left_call(&mut self, member_id: MemberId) {
        self.drop_link(member_id);
    }

    /// Turns the camera on and sends it to every peer
    pub async fn enable_camera(&mut self) -> Result<(), MediaError> {
        self.add_local_track(TrackSource::Camera).await
    }

    /// Turns the camera off, releasing the device
    pub async fn disable_camera(&mut self) {
        self.remove_local_track(TrackSource::Camera).await
    }

    pub async fn start_screen_share(&mut self) -> Result<(), MediaError> {
        self.add_local_track(TrackSource::Screen).await
    }

    pub async fn stop_screen_share(&mut self) {
        self.remove_local_track(TrackSource::Screen).await
    }

    /// Mutes or unmutes the microphone without releasing it
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;

        if let Some(microphone) = &self.media.microphone {
            microphone.track.set_enabled(!muted);
        }
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Closes the link to a single member
    pub fn close(&mut self, member_id: MemberId) {
        if let Some(mut link) = self.links.remove(&member_id) {
            link.close();
            self.emit_state(member_id, LinkState::Closed);
        }
    }

    /// Closes every link and releases all local media. Safe to call more than once.
    pub fn close_all(&mut self) {
        let members: Vec<_> = self.links.keys().copied().collect();

        for member_id in members {
            self.close(member_id);
        }

        if !self.media.is_empty() {
            info!("Releasing local media");
        }

        self.media.stop_all();
    }

    pub fn link_state(&self, member_id: MemberId) -> Option<LinkState> {
        self.links.get(&member_id).map(|l| l.state())
    }

    /// The members we currently have links to
    pub fn linked_members(&self) -> Vec<MemberId> {
        self.links.keys().copied().collect()
    }

    pub fn local_track(&self, source: TrackSource) -> Option<&LocalTrack> {
        match source {
            TrackSource::Microphone => self.media.microphone.as_ref(),
            TrackSource::Camera => self.media.camera.as_ref(),
            TrackSource::Screen => self.media.screen.as_ref(),
        }
    }

    pub fn config(&self) -> &MeshConfig {
        &self.config
    }

    /// Receive events for the user interface
    pub fn events(&self) -> EventReceiver {
        self.event_receiver.clone()
    }

    fn create_link(&mut self, member_id: MemberId) -> Result<PeerLink, PeerError> {
        let connection = self.factory.create(member_id, &self.config)?;
        let mut link = PeerLink::new(member_id, connection);

        for track in self.media.tracks() {
            link.add_track(track)?;
        }

        Ok(link)
    }

    fn drop_link(&mut self, member_id: MemberId) {
        if self.links.contains_key(&member_id) {
            self.close(member_id);
            self.emit(MeshEvent::RemoteLeft { member_id });
        }
    }

    async fn add_local_track(&mut self, source: TrackSource) -> Result<(), MediaError> {
        if !self.in_call() {
            return Err(MediaError::NotInCall);
        }

        if self.media.slot(source).is_some() {
            return Ok(());
        }

        let track = LocalTrack::new(source, self.devices.acquire(source).await?);

        for link in self.links.values_mut() {
            if let Err(e) = link.add_track(&track) {
                warn!(
                    "Could not send {:?} to member {}: {}",
                    source,
                    link.member_id(),
                    e
                );
            }
        }

        *self.media.slot(source) = Some(track);
        self.renegotiate_all().await;

        Ok(())
    }

    async fn remove_local_track(&mut self, source: TrackSource) {
        let Some(track) = self.media.slot(source).take() else {
            return;
        };

        track.track.stop();

        for link in self.links.values_mut() {
            if let Err(e) = link.remove_track(&track) {
                warn!(
                    "Could not stop sending {:?} to member {}: {}",
                    source,
                    link.member_id(),
                    e
                );
            }
        }

        self.renegotiate_all().await;
    }

    async fn renegotiate_all(&mut self) {
        let members: Vec<_> = self.links.keys().copied().collect();

        for member_id in members {
            if let Err(e) = self.renegotiate(member_id).await {
                warn!("Renegotiation with member {} failed: {}", member_id, e);
            }
        }
    }

    fn emit_state(&self, member_id: MemberId, state: LinkState) {
        self.emit(MeshEvent::LinkStateChanged { member_id, state })
    }

    fn emit(&self, event: MeshEvent) {
        self.event_sender.send(event).expect("event is sent");
    }
}

impl Drop for PeerManager {
    fn drop(&mut self) {
        self.close_all();
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Arc, thread};

    use parking_lot::Mutex;
    use parlor_collab::{Collab, CollabEvent, Config, GameCatalog, MemoryDatabase, SignalChannel};
    use parlor_core::{ConnectionId, IceCandidate, MemberId, SignalPayload};

    use crate::{
        testing::{connect, FakeSignaling, Peer},
        ConnectivityState, LinkState, MediaError, MediaTrack, MeshEvent, RemoteTrack, TrackKind,
        TrackSource,
    };

    fn drain(peer: &Peer) -> Vec<MeshEvent> {
        peer.manager.events().try_iter().collect()
    }

    #[tokio::test]
    async fn test_joiner_offers_and_both_sides_connect() {
        let mut existing = Peer::new(1);
        let mut joiner = Peer::new(2);

        connect(&mut existing, &mut joiner).await;

        assert_eq!(
            existing.manager.link_state(joiner.id),
            Some(LinkState::Connected)
        );
        assert_eq!(
            joiner.manager.link_state(existing.id),
            Some(LinkState::Connected)
        );

        assert_eq!(
            drain(&joiner),
            vec![
                MeshEvent::LinkStateChanged {
                    member_id: existing.id,
                    state: LinkState::Offering
                },
                MeshEvent::LinkStateChanged {
                    member_id: existing.id,
                    state: LinkState::Connected
                },
            ]
        );
        assert_eq!(
            drain(&existing),
            vec![
                MeshEvent::LinkStateChanged {
                    member_id: joiner.id,
                    state: LinkState::Answering
                },
                MeshEvent::LinkStateChanged {
                    member_id: joiner.id,
                    state: LinkState::Connected
                },
            ]
        );

        // Both sides send their microphone
        assert_eq!(existing.factory.log(joiner.id).lock().senders.len(), 1);
        assert_eq!(joiner.factory.log(existing.id).lock().senders.len(), 1);
    }

    #[tokio::test]
    async fn test_offer_collision_rolls_back_on_both_sides() {
        let mut existing = Peer::new(1);
        let mut joiner = Peer::new(2);

        connect(&mut existing, &mut joiner).await;

        existing.manager.enable_camera().await.unwrap();
        joiner.manager.enable_camera().await.unwrap();

        assert_eq!(
            existing.manager.link_state(joiner.id),
            Some(LinkState::Renegotiating)
        );
        assert_eq!(
            joiner.manager.link_state(existing.id),
            Some(LinkState::Renegotiating)
        );

        // Both offers cross on the wire
        let from_existing = existing.signals.take();
        let from_joiner = joiner.signals.take();

        for (_, signal) in from_joiner {
            existing.manager.on_signal(joiner.id, signal).await.unwrap();
        }

        for (_, signal) in from_existing {
            joiner.manager.on_signal(existing.id, signal).await.unwrap();
        }

        // The answers arrive after both links settled and are ignored
        existing.deliver_to(&mut joiner).await;
        joiner.deliver_to(&mut existing).await;

        for (peer, other) in [(&existing, joiner.id), (&joiner, existing.id)] {
            assert_eq!(peer.manager.link_state(other), Some(LinkState::Connected));

            let log = peer.factory.log(other);
            let log = log.lock();

            assert_eq!(log.rollbacks, 1);
            assert_eq!(log.signaling, FakeSignaling::Stable);
        }
    }

    #[tokio::test]
    async fn test_stale_answer_is_ignored() {
        let mut existing = Peer::new(1);
        let mut joiner = Peer::new(2);

        connect(&mut existing, &mut joiner).await;

        joiner
            .manager
            .on_signal(
                existing.id,
                SignalPayload::Answer {
                    sdp: "late".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(
            joiner.manager.link_state(existing.id),
            Some(LinkState::Connected)
        );
        assert_eq!(
            joiner.factory.log(existing.id).lock().signaling,
            FakeSignaling::Stable
        );
    }

    #[tokio::test]
    async fn test_candidates_wait_for_remote_description() {
        let mut peer = Peer::new(1);
        let other = Peer::new(2).id;

        peer.manager.start_call().await.unwrap();
        peer.manager.on_call_participants(vec![other]).await;
        peer.signals.take();

        peer.manager
            .on_signal(
                other,
                SignalPayload::Candidate {
                    candidate: IceCandidate::new("candidate:1"),
                },
            )
            .await
            .unwrap();

        assert!(peer.factory.log(other).lock().candidates.is_empty());

        peer.manager
            .on_signal(
                other,
                SignalPayload::Answer {
                    sdp: "answer".to_string(),
                },
            )
            .await
            .unwrap();

        let log = peer.factory.log(other);
        assert_eq!(log.lock().candidates, vec![IceCandidate::new("candidate:1")]);

        peer.manager
            .on_signal(
                other,
                SignalPayload::Candidate {
                    candidate: IceCandidate::new("candidate:2"),
                },
            )
            .await
            .unwrap();

        assert_eq!(log.lock().candidates.len(), 2);
    }

    #[tokio::test]
    async fn test_signals_from_unknown_members_are_ignored() {
        let mut peer = Peer::new(1);
        let stranger = Peer::new(9).id;

        peer.manager
            .on_signal(
                stranger,
                SignalPayload::Candidate {
                    candidate: IceCandidate::new("candidate:1"),
                },
            )
            .await
            .unwrap();

        peer.manager
            .on_signal(
                stranger,
                SignalPayload::Answer {
                    sdp: "answer".to_string(),
                },
            )
            .await
            .unwrap();

        peer.manager.on_remote_track(
            stranger,
            RemoteTrack {
                id: "audio".to_string(),
                kind: TrackKind::Audio,
            },
        );

        assert!(peer.manager.linked_members().is_empty());
        assert!(drain(&peer).is_empty());
    }

    #[tokio::test]
    async fn test_renegotiation_is_skipped_while_offer_is_pending() {
        let mut peer = Peer::new(1);
        let other = Peer::new(2).id;

        peer.manager.start_call().await.unwrap();
        peer.manager.initiate(other).await.unwrap();
        peer.signals.take();

        peer.manager.enable_camera().await.unwrap();

        assert_eq!(peer.manager.link_state(other), Some(LinkState::Offering));
        assert!(peer.signals.take().is_empty());

        // The camera is still attached, and goes out with the next offer
        assert_eq!(peer.factory.log(other).lock().senders.len(), 2);
        assert!(!peer.manager.renegotiate(other).await.unwrap());
    }

    #[tokio::test]
    async fn test_camera_enabled_while_answering_is_offered() {
        let mut existing = Peer::new(1);
        let mut joiner = Peer::new(2);

        existing.manager.start_call().await.unwrap();
        joiner.manager.start_call().await.unwrap();
        joiner.manager.on_call_participants(vec![existing.id]).await;
        joiner.deliver_to(&mut existing).await;

        assert_eq!(
            existing.manager.link_state(joiner.id),
            Some(LinkState::Answering)
        );

        // The answer is still on its way when the camera turns on
        let answer = existing.signals.take();
        existing.manager.enable_camera().await.unwrap();

        let sent = existing.signals.take();
        assert!(matches!(sent[..], [(_, SignalPayload::Offer { .. })]));
        assert_eq!(
            existing.manager.link_state(joiner.id),
            Some(LinkState::Renegotiating)
        );

        for (_, signal) in answer.into_iter().chain(sent) {
            joiner.manager.on_signal(existing.id, signal).await.unwrap();
        }
        joiner.deliver_to(&mut existing).await;

        existing
            .manager
            .on_connectivity(joiner.id, ConnectivityState::Connected);

        assert_eq!(
            existing.manager.link_state(joiner.id),
            Some(LinkState::Connected)
        );
        assert_eq!(joiner.manager.link_state(existing.id), Some(LinkState::Connected));
        assert_eq!(existing.factory.log(joiner.id).lock().senders.len(), 2);
        assert_eq!(
            joiner.factory.log(existing.id).lock().signaling,
            FakeSignaling::Stable
        );
    }

    #[tokio::test]
    async fn test_initiating_twice_keeps_one_link() {
        let mut peer = Peer::new(1);
        let other = Peer::new(2).id;

        peer.manager.start_call().await.unwrap();
        peer.manager.initiate(other).await.unwrap();
        peer.manager.initiate(other).await.unwrap();

        let offers = peer
            .signals
            .take()
            .into_iter()
            .filter(|(_, s)| matches!(s, SignalPayload::Offer { .. }))
            .count();

        assert_eq!(offers, 1);
        assert_eq!(peer.manager.linked_members(), vec![other]);
    }

    #[tokio::test]
    async fn test_lost_connectivity_drops_the_peer() {
        let mut existing = Peer::new(1);
        let mut joiner = Peer::new(2);

        connect(&mut existing, &mut joiner).await;
        drain(&joiner);

        joiner
            .manager
            .on_connectivity(existing.id, ConnectivityState::Failed);

        assert!(joiner.manager.linked_members().is_empty());
        assert!(joiner.factory.log(existing.id).lock().closed);
        assert_eq!(
            drain(&joiner),
            vec![
                MeshEvent::LinkStateChanged {
                    member_id: existing.id,
                    state: LinkState::Closed
                },
                MeshEvent::RemoteLeft {
                    member_id: existing.id
                },
            ]
        );

        // Reported twice, handled once
        joiner
            .manager
            .on_connectivity(existing.id, ConnectivityState::Disconnected);
        assert!(drain(&joiner).is_empty());
    }

    #[tokio::test]
    async fn test_left_call_closes_link_and_remote_stream_is_forwarded() {
        let mut existing = Peer::new(1);
        let mut joiner = Peer::new(2);

        connect(&mut existing, &mut joiner).await;
        drain(&existing);

        let track = RemoteTrack {
            id: "mic".to_string(),
            kind: TrackKind::Audio,
        };

        existing.manager.on_remote_track(joiner.id, track.clone());
        existing.manager.on_user_left_call(joiner.id);

        let events = drain(&existing);

        assert_eq!(
            events[0],
            MeshEvent::RemoteStream {
                member_id: joiner.id,
                track
            }
        );
        assert!(events.contains(&MeshEvent::RemoteLeft {
            member_id: joiner.id
        }));
        assert_eq!(existing.manager.link_state(joiner.id), None);
    }

    #[tokio::test]
    async fn test_denied_microphone_aborts_call() {
        let mut peer = Peer::new(1);
        peer.devices.denied.lock().insert(TrackSource::Microphone);

        let result = peer.manager.start_call().await;

        assert!(matches!(
            result,
            Err(MediaError::PermissionDenied(TrackSource::Microphone))
        ));
        assert!(!peer.manager.in_call());
        assert!(matches!(
            peer.manager.enable_camera().await,
            Err(MediaError::NotInCall)
        ));
        assert!(peer.manager.linked_members().is_empty());
    }

    #[tokio::test]
    async fn test_denied_camera_keeps_call_running() {
        let mut existing = Peer::new(1);
        let mut joiner = Peer::new(2);

        connect(&mut existing, &mut joiner).await;
        joiner.devices.denied.lock().insert(TrackSource::Camera);

        assert!(joiner.manager.enable_camera().await.is_err());
        assert!(joiner.manager.local_track(TrackSource::Camera).is_none());
        assert_eq!(
            joiner.manager.link_state(existing.id),
            Some(LinkState::Connected)
        );
    }

    #[tokio::test]
    async fn test_disable_camera_releases_device_and_renegotiates() {
        let mut existing = Peer::new(1);
        let mut joiner = Peer::new(2);

        connect(&mut existing, &mut joiner).await;

        joiner.manager.enable_camera().await.unwrap();
        joiner.deliver_to(&mut existing).await;
        existing.deliver_to(&mut joiner).await;

        let log = joiner.factory.log(existing.id);
        assert_eq!(log.lock().senders.len(), 2);

        let camera = joiner.devices.acquired.lock()[1].clone();
        joiner.manager.disable_camera().await;

        assert!(camera.is_stopped());
        assert!(joiner.manager.local_track(TrackSource::Camera).is_none());
        assert_eq!(log.lock().senders.len(), 1);

        let sent = joiner.signals.take();
        assert!(matches!(sent[..], [(_, SignalPayload::Offer { .. })]));
    }

    #[tokio::test]
    async fn test_mute_disables_without_releasing() {
        let mut peer = Peer::new(1);

        peer.manager.set_muted(true);
        peer.manager.start_call().await.unwrap();

        let microphone = peer.devices.acquired.lock()[0].clone();
        assert!(!microphone.is_enabled());

        peer.manager.set_muted(false);

        assert!(microphone.is_enabled());
        assert!(!microphone.is_stopped());
        assert!(!peer.manager.is_muted());
    }

    #[tokio::test]
    async fn test_close_all_is_idempotent_and_releases_media() {
        let mut existing = Peer::new(1);
        let mut joiner = Peer::new(2);

        connect(&mut existing, &mut joiner).await;
        joiner.manager.start_screen_share().await.unwrap();
        drain(&joiner);

        joiner.manager.close_all();
        joiner.manager.close_all();

        assert!(joiner.manager.linked_members().is_empty());
        assert!(!joiner.manager.in_call());
        assert!(joiner.factory.log(existing.id).lock().closed);
        assert!(joiner
            .devices
            .acquired
            .lock()
            .iter()
            .all(|track| track.is_stopped()));

        assert_eq!(
            drain(&joiner),
            vec![MeshEvent::LinkStateChanged {
                member_id: existing.id,
                state: LinkState::Closed
            }]
        );
    }

    /// Collects what the room delivers to each connection
    #[derive(Default)]
    struct Inbox {
        delivered: Mutex<Vec<(ConnectionId, CollabEvent)>>,
    }

    impl SignalChannel for Inbox {
        fn deliver(&self, connection_id: ConnectionId, event: CollabEvent) {
            self.delivered.lock().push((connection_id, event));
        }
    }

    #[tokio::test]
    async fn test_simultaneous_call_joins_connect_every_pair_once() {
        let inbox = Arc::new(Inbox::default());
        let collab = Collab::new(
            Config::default(),
            Arc::new(MemoryDatabase::new()),
            GameCatalog::embedded().unwrap(),
            inbox.clone(),
        );

        let mut members: Vec<(ConnectionId, MemberId)> = Vec::new();

        for name in ["alice", "bob", "carol"] {
            let connection = ConnectionId::new();
            let joined = collab.rooms.join(connection, "lobby", name).await.unwrap();

            members.push((connection, joined.member.id));
        }

        let lists: Vec<Vec<MemberId>> = thread::scope(|scope| {
            let handles: Vec<_> = members
                .iter()
                .map(|&(connection, _)| {
                    let collab = &collab;
                    scope.spawn(move || collab.rooms.join_call(connection).unwrap())
                })
                .collect();

            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let mut peers: Vec<Peer> = members.iter().map(|&(_, id)| Peer::new(id.0)).collect();

        for (peer, list) in peers.iter_mut().zip(&lists) {
            peer.manager.start_call().await.unwrap();
            peer.manager.on_call_participants(list.clone()).await;
        }

        let mut pending: Vec<_> = peers.iter().map(|p| p.signals.take()).collect();

        let offers: HashSet<(MemberId, MemberId)> = pending
            .iter()
            .zip(&peers)
            .flat_map(|(sent, peer)| {
                sent.iter()
                    .filter(|(_, signal)| matches!(signal, SignalPayload::Offer { .. }))
                    .map(move |(to, _)| (peer.id, *to))
            })
            .collect();

        for (i, &(_, a)) in members.iter().enumerate() {
            for &(_, b) in &members[i + 1..] {
                let directions = [(a, b), (b, a)]
                    .iter()
                    .filter(|pair| offers.contains(*pair))
                    .count();

                assert_eq!(directions, 1, "{} and {} are called exactly once", a, b);
            }
        }

        inbox.delivered.lock().clear();

        // Relay every signal through the room until the handshakes settle
        while pending.iter().any(|sent| !sent.is_empty()) {
            for (sent, &(connection, _)) in pending.into_iter().zip(&members) {
                for (to, signal) in sent {
                    collab.rooms.relay(connection, to, signal).unwrap();
                }
            }

            let delivered = std::mem::take(&mut *inbox.delivered.lock());

            for (connection, event) in delivered {
                let CollabEvent::Signal { from, signal } = event else {
                    continue;
                };

                let target = members.iter().position(|&(c, _)| c == connection).unwrap();
                peers[target].manager.on_signal(from, signal).await.unwrap();
            }

            pending = peers.iter().map(|p| p.signals.take()).collect();
        }

        for i in 0..peers.len() {
            for j in 0..peers.len() {
                if i != j {
                    let other = peers[j].id;
                    peers[i]
                        .manager
                        .on_connectivity(other, ConnectivityState::Connected);
                }
            }
        }

        for peer in &peers {
            assert_eq!(peer.manager.linked_members().len(), 2);

            for &(_, other) in members.iter().filter(|&&(_, m)| m != peer.id) {
                assert_eq!(peer.manager.link_state(other), Some(LinkState::Connected));
            }
        }
    }
}
