use crate::peer::types::Role;
use crate::peer::MediaPeer;
use crate::signaling::LatencyData;
use crate::stats::SampleLog;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// offer sent, waiting for the server's answer
    Negotiating,
    Active,
}

/// Everything one client remembers about its (at most one) session.
/// Owned by the client event loop, so no locking.
pub struct SessionContext {
    state: SessionState,
    role: Option<Role>,
    peer: Option<Arc<dyn MediaPeer>>,
    generation: u64,
    polling: Option<u64>,
    latency: Option<LatencyData>,
    samples: SampleLog,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            role: None,
            peer: None,
            generation: 0,
            polling: None,
            latency: None,
            samples: SampleLog::default(),
        }
    }

    /// Installs a fresh peer and moves to `Negotiating`. Returns the new generation.
    pub fn open(&mut self, role: Role, peer: Arc<dyn MediaPeer>) -> u64 {
        self.generation += 1;
        self.role = Some(role);
        self.peer = Some(peer);
        self.polling = None;
        self.state = SessionState::Negotiating;
        self.generation
    }

    pub fn activate(&mut self) {
        if self.peer.is_some() {
            self.state = SessionState::Active;
        }
    }

    /// Closes the peer and forgets role and latency. The sample log survives.
    /// Returns whether there was a peer to release.
    pub async fn dispose(&mut self) -> bool {
        let peer = self.peer.take();
        self.role = None;
        self.latency = None;
        self.polling = None;
        self.state = SessionState::Idle;
        self.generation += 1;
        match peer {
            Some(peer) => {
                peer.close().await;
                true
            }
            None => false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn peer(&self) -> Option<Arc<dyn MediaPeer>> {
        self.peer.clone()
    }

    pub fn has_peer(&self) -> bool {
        self.peer.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True when `generation` still names the live session
    pub fn is_current(&self, generation: u64) -> bool {
        self.peer.is_some() && self.generation == generation
    }

    /// Marks the sampler as running; false if it already is for this session
    pub fn start_polling(&mut self) -> bool {
        if self.polling == Some(self.generation) {
            return false;
        }
        self.polling = Some(self.generation);
        true
    }

    pub fn is_polling(&self) -> bool {
        self.polling.is_some() && self.polling == Some(self.generation) && self.peer.is_some()
    }

    pub fn set_latency(&mut self, data: Option<LatencyData>) {
        self.latency = data;
    }

    /// Takes the latest latency snapshot; each one is reported once
    pub fn take_latency(&mut self) -> Option<LatencyData> {
        self.latency.take()
    }

    pub fn samples(&self) -> &SampleLog {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut SampleLog {
        &mut self.samples
    }
}
