pub mod connection;
pub mod ice;
pub mod media;
pub mod state;
pub mod types;

use crate::error::PeerError;
use crate::signaling::Signaler;
use crate::stats::rtp::RtcStatsReport;
use async_trait::async_trait;
use std::sync::Arc;

pub use connection::{WebRtcPeer, WebRtcPeerFactory};
pub use types::{IceCandidate, MediaKind, Role, ServerConfig};

/// The media transport behind a session, one per presenter/viewer attempt
#[async_trait]
pub trait MediaPeer: Send + Sync {
    fn role(&self) -> Role;

    /// Creates the SDP offer and installs it as local description
    async fn generate_offer(&self) -> Result<String, PeerError>;

    /// Applies the media server's SDP answer
    async fn process_answer(&self, sdp_answer: &str) -> Result<(), PeerError>;

    /// Adds a remote candidate (queued until the answer is applied)
    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), PeerError>;

    /// Kinds of media this peer sends
    fn local_kinds(&self) -> Vec<MediaKind>;

    /// Kinds of media received so far
    fn remote_kinds(&self) -> Vec<MediaKind>;

    async fn stats(&self) -> Result<RtcStatsReport, PeerError>;

    async fn close(&self);
}

/// Builds peers; local ICE candidates are relayed through `signaler`
#[async_trait]
pub trait PeerFactory: Send + Sync {
    async fn create(&self, role: Role, signaler: Signaler)
        -> Result<Arc<dyn MediaPeer>, PeerError>;
}
