use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use parking_lot::Mutex;
use parlor_core::{IceCandidate, MemberId, SignalPayload};

use crate::{
    LocalTrack, MediaDevices, MediaError, MediaTrack, MeshConfig, PeerConnection, PeerError,
    PeerFactory, PeerManager, SdpKind, SenderId, SessionDescription, SignalSender, TrackSource,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum FakeSignaling {
    #[default]
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
}

/// What happened to a fake peer connection
#[derive(Debug, Default)]
pub struct PeerLog {
    pub signaling: FakeSignaling,
    pub has_remote: bool,
    pub rollbacks: usize,
    pub candidates: Vec<IceCandidate>,
    pub senders: Vec<SenderId>,
    pub closed: bool,
}

/// A peer connection that enforces the signaling state machine of a real engine
pub struct FakePeer {
    name: String,
    offers: usize,
    log: Arc<Mutex<PeerLog>>,
}

fn reject(operation: &str, state: FakeSignaling) -> PeerError {
    PeerError::Engine(format!("{} not allowed in {:?}", operation, state))
}

#[async_trait]
impl PeerConnection for FakePeer {
    async fn create_offer(&mut self) -> Result<String, PeerError> {
        self.offers += 1;
        Ok(format!("offer-{}-{}", self.name, self.offers))
    }

    async fn create_answer(&mut self) -> Result<String, PeerError> {
        let log = self.log.lock();

        if log.signaling != FakeSignaling::HaveRemoteOffer {
            return Err(reject("create_answer", log.signaling));
        }

        Ok(format!("answer-{}", self.name))
    }

    async fn set_local_description(
        &mut self,
        description: SessionDescription,
    ) -> Result<(), PeerError> {
        let mut log = self.log.lock();

        log.signaling = match (description.kind, log.signaling) {
            (SdpKind::Offer, FakeSignaling::Stable) => FakeSignaling::HaveLocalOffer,
            (SdpKind::Answer, FakeSignaling::HaveRemoteOffer) => FakeSignaling::Stable,
            (_, state) => return Err(reject("set_local_description", state)),
        };

        Ok(())
    }

    async fn set_remote_description(
        &mut self,
        description: SessionDescription,
    ) -> Result<(), PeerError> {
        let mut log = self.log.lock();

        log.signaling = match (description.kind, log.signaling) {
            (SdpKind::Offer, FakeSignaling::Stable) => FakeSignaling::HaveRemoteOffer,
            (SdpKind::Answer, FakeSignaling::HaveLocalOffer) => FakeSignaling::Stable,
            (_, state) => return Err(reject("set_remote_description", state)),
        };

        log.has_remote = true;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), PeerError> {
        let mut log = self.log.lock();

        if log.signaling != FakeSignaling::HaveLocalOffer {
            return Err(reject("rollback", log.signaling));
        }

        log.signaling = FakeSignaling::Stable;
        log.rollbacks += 1;
        Ok(())
    }

    async fn add_ice_candidate(&mut self, candidate: IceCandidate) -> Result<(), PeerError> {
        let mut log = self.log.lock();

        if !log.has_remote {
            return Err(PeerError::Engine("no remote description".to_string()));
        }

        log.candidates.push(candidate);
        Ok(())
    }

    fn add_track(&mut self, _track: &LocalTrack) -> Result<SenderId, PeerError> {
        let sender = SenderId::new();
        self.log.lock().senders.push(sender);

        Ok(sender)
    }

    fn remove_track(&mut self, sender: SenderId) -> Result<(), PeerError> {
        self.log.lock().senders.retain(|s| *s != sender);
        Ok(())
    }

    fn close(&mut self) {
        self.log.lock().closed = true;
    }
}

#[derive(Clone, Default)]
pub struct FakeFactory {
    pub peers: Arc<Mutex<HashMap<MemberId, Arc<Mutex<PeerLog>>>>>,
}

impl FakeFactory {
    pub fn log(&self, member_id: MemberId) -> Arc<Mutex<PeerLog>> {
        self.peers
            .lock()
            .get(&member_id)
            .cloned()
            .expect("peer was created")
    }
}

impl PeerFactory for FakeFactory {
    fn create(
        &mut self,
        member_id: MemberId,
        _config: &MeshConfig,
    ) -> Result<Box<dyn PeerConnection>, PeerError> {
        let log = Arc::new(Mutex::new(PeerLog::default()));
        self.peers.lock().insert(member_id, log.clone());

        Ok(Box::new(FakePeer {
            name: member_id.to_string(),
            offers: 0,
            log,
        }))
    }
}

#[derive(Default)]
pub struct FakeTrack {
    enabled: AtomicBool,
    stopped: AtomicBool,
}

impl MediaTrack for FakeTrack {
    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst)
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst)
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Default)]
pub struct FakeDevices {
    pub denied: Arc<Mutex<HashSet<TrackSource>>>,
    pub acquired: Arc<Mutex<Vec<Arc<FakeTrack>>>>,
}

#[async_trait]
impl MediaDevices for FakeDevices {
    async fn acquire(&mut self, source: TrackSource) -> Result<Arc<dyn MediaTrack>, MediaError> {
        if self.denied.lock().contains(&source) {
            return Err(MediaError::PermissionDenied(source));
        }

        let track = Arc::new(FakeTrack::default());
        track.set_enabled(true);
        self.acquired.lock().push(track.clone());

        Ok(track)
    }
}

#[derive(Default)]
pub struct RecordingSignals {
    sent: Mutex<Vec<(MemberId, SignalPayload)>>,
}

impl RecordingSignals {
    pub fn take(&self) -> Vec<(MemberId, SignalPayload)> {
        std::mem::take(&mut *self.sent.lock())
    }
}

impl SignalSender for RecordingSignals {
    fn send(&self, to: MemberId, signal: SignalPayload) {
        self.sent.lock().push((to, signal));
    }
}

/// A peer manager wired to fakes
pub struct Peer {
    pub id: MemberId,
    pub manager: PeerManager,
    pub factory: FakeFactory,
    pub devices: FakeDevices,
    pub signals: Arc<RecordingSignals>,
}

impl Peer {
    pub fn new(id: i32) -> Self {
        let factory = FakeFactory::default();
        let devices = FakeDevices::default();
        let signals = Arc::new(RecordingSignals::default());

        let manager = PeerManager::new(
            MeshConfig::default(),
            Box::new(factory.clone()),
            Box::new(devices.clone()),
            signals.clone(),
        );

        Self {
            id: MemberId(id),
            manager,
            factory,
            devices,
            signals,
        }
    }

    /// Delivers everything this peer sent to `other`, as the server relay would
    pub async fn deliver_to(&self, other: &mut Peer) {
        for (to, signal) in self.signals.take() {
            assert_eq!(to, other.id, "signal was addressed to another member");
            other.manager.on_signal(self.id, signal).await.unwrap();
        }
    }
}

/// Runs the call set up between two peers, `joiner` having received `existing` in its participant list
pub async fn connect(existing: &mut Peer, joiner: &mut Peer) {
    existing.manager.start_call().await.unwrap();
    joiner.manager.start_call().await.unwrap();

    existing.manager.on_call_participants(vec![]).await;
    joiner.manager.on_call_participants(vec![existing.id]).await;

    joiner.deliver_to(existing).await;
    existing.deliver_to(joiner).await;

    existing
        .manager
        .on_connectivity(joiner.id, crate::ConnectivityState::Connected);
    joiner
        .manager
        .on_connectivity(existing.id, crate::ConnectivityState::Connected);
}
