use std::sync::Arc;

use async_trait::async_trait;
use parlor_core::Id;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

/// Where a local track comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackSource {
    Microphone,
    Camera,
    Screen,
}

impl TrackSource {
    pub fn kind(&self) -> TrackKind {
        match self {
            Self::Microphone => TrackKind::Audio,
            Self::Camera | Self::Screen => TrackKind::Video,
        }
    }
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Permission to use the {0:?} was denied")]
    PermissionDenied(TrackSource),
    #[error("No {0:?} is available")]
    NoDevice(TrackSource),
    #[error("Could not access the {device:?}: {reason}")]
    Hardware { device: TrackSource, reason: String },
    #[error("No call has been started")]
    NotInCall,
}

/// A media track captured by a local device.
///
/// Disabling a track sends silence or black frames. Stopping it releases the device.
pub trait MediaTrack: Send + Sync {
    fn set_enabled(&self, enabled: bool);
    fn is_enabled(&self) -> bool;
    fn stop(&self);
    fn is_stopped(&self) -> bool;
}

/// Acquires local media, prompting the user if needed.
///
/// Acquisition may wait indefinitely on the user's decision.
#[async_trait]
pub trait MediaDevices: Send {
    async fn acquire(&mut self, source: TrackSource) -> Result<Arc<dyn MediaTrack>, MediaError>;
}

/// A track owned by the peer manager
#[derive(Clone)]
pub struct LocalTrack {
    pub id: Id<LocalTrack>,
    pub source: TrackSource,
    pub track: Arc<dyn MediaTrack>,
}

impl LocalTrack {
    pub fn new(source: TrackSource, track: Arc<dyn MediaTrack>) -> Self {
        Self {
            id: Id::new(),
            source,
            track,
        }
    }

    pub fn kind(&self) -> TrackKind {
        self.source.kind()
    }
}

impl std::fmt::Debug for LocalTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTrack")
            .field("id", &self.id)
            .field("source", &self.source)
            .field("enabled", &self.track.is_enabled())
            .finish()
    }
}

/// A track received from a peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack {
    /// The engine's identifier for the track
    pub id: String,
    pub kind: TrackKind,
}

/// The local media of a call
#[derive(Debug, Default)]
pub struct LocalMedia {
    pub microphone: Option<LocalTrack>,
    pub camera: Option<LocalTrack>,
    pub screen: Option<LocalTrack>,
}

impl LocalMedia {
    pub fn slot(&mut self, source: TrackSource) -> &mut Option<LocalTrack> {
        match source {
            TrackSource::Microphone => &mut self.microphone,
            TrackSource::Camera => &mut self.camera,
            TrackSource::Screen => &mut self.screen,
        }
    }

    /// Every track that is currently live
    pub fn tracks(&self) -> impl Iterator<Item = &LocalTrack> {
        [&self.microphone, &self.camera, &self.screen]
            .into_iter()
            .flatten()
    }

    /// Stops every track and forgets them
    pub fn stop_all(&mut self) {
        for slot in [&mut self.microphone, &mut self.camera, &mut self.screen] {
            if let Some(track) = slot.take() {
                track.track.stop();
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tracks().next().is_none()
    }
}
