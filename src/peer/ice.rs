use crate::error::PeerError;
use crate::logger::dump_candidate;
use crate::peer::state::PeerState;
use crate::peer::types::{IceCandidate, ServerConfig};
use crate::signaling::{OutgoingMessage, Signaler};
use crate::utils::add_ice_url_scheme;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::RTCPeerConnection;

/// Forwards every local candidate to the server as soon as it is gathered
pub fn relay_local_candidates(pc: &RTCPeerConnection, signaler: Signaler) {
    pc.on_ice_candidate(Box::new(move |cand: Option<RTCIceCandidate>| {
        let signaler = signaler.clone();
        Box::pin(async move {
            let Some(c) = cand else {
                tracing::debug!("ICE candidate gathering completed");
                return;
            };
            dump_candidate("LOCAL", &c);
            match c.to_json() {
                Ok(init) => {
                    if let Err(e) = signaler.send(local_candidate_message(init)) {
                        tracing::warn!(error = %e, "local candidate not sent");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "could not serialize local candidate"),
            }
        })
    }));

    pc.on_ice_gathering_state_change(Box::new(move |state| {
        tracing::debug!("ICE gathering state changed to: {state:?}");
        Box::pin(async {})
    }));
}

pub fn local_candidate_message(init: RTCIceCandidateInit) -> OutgoingMessage {
    OutgoingMessage::OnIceCandidate {
        candidate: init.into(),
    }
}

/// Applies a remote candidate, or queues it while the answer is still pending
pub async fn add_remote_candidate(
    pc: &RTCPeerConnection,
    state: &PeerState,
    candidate: IceCandidate,
) -> Result<(), PeerError> {
    if state.is_closed() {
        return Err(PeerError::Closed);
    }
    if !state.is_answered() {
        let queued = state.queue_remote(candidate);
        tracing::debug!(queued, "remote description not set yet, queuing candidate");
        return Ok(());
    }
    pc.add_ice_candidate(candidate.into()).await?;
    tracing::debug!("added remote ICE candidate");
    Ok(())
}

/// Applies everything queued before the answer; failures are logged per candidate
pub async fn apply_pending_candidates(pc: &RTCPeerConnection, state: &PeerState) {
    for candidate in state.answer_applied() {
        tracing::debug!(candidate = %candidate.candidate, "applying pending candidate");
        if let Err(e) = pc.add_ice_candidate(candidate.into()).await {
            tracing::warn!(error = %e, "failed to apply pending candidate");
        }
    }
}

pub fn ice_servers(servers: &[ServerConfig]) -> Vec<RTCIceServer> {
    servers
        .iter()
        .map(|config| RTCIceServer {
            urls: vec![add_ice_url_scheme(config)],
            username: config.username.clone().unwrap_or_default(),
            credential: config.credential.clone().unwrap_or_default(),
        })
        .collect()
}
