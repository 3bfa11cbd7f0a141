//! Scripted peers for exercising the client without a media stack.

use crate::error::PeerError;
use crate::peer::types::{IceCandidate, MediaKind, Role};
use crate::peer::{MediaPeer, PeerFactory};
use crate::signaling::Signaler;
use crate::stats::rtp::RtcStatsReport;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub struct FakePeer {
    role: Role,
    pub answers: Mutex<Vec<String>>,
    pub candidates: Mutex<Vec<IceCandidate>>,
    pub closed: AtomicBool,
    pub local: Vec<MediaKind>,
    pub remote: Vec<MediaKind>,
    pub report: Mutex<Vec<Value>>,
    pub fail_answer: bool,
}

impl FakePeer {
    pub fn new(role: Role) -> Self {
        let (local, remote) = match role {
            Role::Presenter => (MediaKind::ALL.to_vec(), Vec::new()),
            Role::Viewer => (Vec::new(), MediaKind::ALL.to_vec()),
        };
        Self {
            role,
            answers: Mutex::new(Vec::new()),
            candidates: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            local,
            remote,
            report: Mutex::new(default_report(role)),
            fail_answer: false,
        }
    }

    pub fn with_kinds(mut self, local: Vec<MediaKind>, remote: Vec<MediaKind>) -> Self {
        self.local = local;
        self.remote = remote;
        self
    }

    pub fn with_report(self, report: Vec<Value>) -> Self {
        *self.report.lock().unwrap() = report;
        self
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn answers(&self) -> Vec<String> {
        self.answers.lock().unwrap().clone()
    }
}

/// A report with one RTP stream per kind in the role's direction
pub fn default_report(role: Role) -> Vec<Value> {
    let rtp_type = match role {
        Role::Presenter => "outbound-rtp",
        Role::Viewer => "inbound-rtp",
    };
    vec![
        json!({"id": "a", "type": rtp_type, "kind": "audio", "transportId": "T",
               "packetsSent": 1, "packetsReceived": 1}),
        json!({"id": "v", "type": rtp_type, "kind": "video", "transportId": "T",
               "packetsSent": 2, "packetsReceived": 2}),
        json!({"id": "cp", "type": "candidate-pair", "transportId": "T",
               "currentRoundTripTime": 0.01, "availableOutgoingBitrate": 1000.0,
               "availableIncomingBitrate": 2000.0}),
    ]
}

#[async_trait]
impl MediaPeer for FakePeer {
    fn role(&self) -> Role {
        self.role
    }

    async fn generate_offer(&self) -> Result<String, PeerError> {
        Ok(format!("offer-{}", self.role))
    }

    async fn process_answer(&self, sdp_answer: &str) -> Result<(), PeerError> {
        self.answers.lock().unwrap().push(sdp_answer.to_owned());
        if self.fail_answer {
            return Err(PeerError::Closed);
        }
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), PeerError> {
        self.candidates.lock().unwrap().push(candidate);
        Ok(())
    }

    fn local_kinds(&self) -> Vec<MediaKind> {
        self.local.clone()
    }

    fn remote_kinds(&self) -> Vec<MediaKind> {
        self.remote.clone()
    }

    async fn stats(&self) -> Result<RtcStatsReport, PeerError> {
        Ok(RtcStatsReport::new(self.report.lock().unwrap().clone()))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Hands out `FakePeer`s and remembers them
#[derive(Default)]
pub struct FakeFactory {
    pub created: Mutex<Vec<Arc<FakePeer>>>,
    pub fail: bool,
    pub fail_answer: bool,
}

impl FakeFactory {
    pub fn last(&self) -> Arc<FakePeer> {
        self.created
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no peer created")
    }

    pub fn count(&self) -> usize {
        self.created.lock().unwrap().len()
    }
}

#[async_trait]
impl PeerFactory for FakeFactory {
    async fn create(
        &self,
        role: Role,
        _signaler: Signaler,
    ) -> Result<Arc<dyn MediaPeer>, PeerError> {
        if self.fail {
            return Err(PeerError::Closed);
        }
        let mut peer = FakePeer::new(role);
        peer.fail_answer = self.fail_answer;
        let peer = Arc::new(peer);
        self.created.lock().unwrap().push(peer.clone());
        Ok(peer)
    }
}
