//! The client side of parlor calls: a mesh of WebRTC peer links, one per call participant.
//!
//! The WebRTC engine and media devices are provided by the platform through the
//! [PeerFactory] and [MediaDevices] traits.

mod config;
mod engine;
mod events;
mod link;
mod manager;
mod media;

#[cfg(test)]
mod testing;

pub use config::*;
pub use engine::*;
pub use events::*;
pub use link::*;
pub use manager::*;
pub use media::*;
