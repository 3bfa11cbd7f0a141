use crate::config::{ClientConfig, MediaSources};
use crate::error::PeerError;
use crate::logger::dump_selected_pair;
use crate::peer::ice::{add_remote_candidate, apply_pending_candidates, ice_servers, relay_local_candidates};
use crate::peer::media::{add_presenter_tracks, add_viewer_transceivers};
use crate::peer::state::PeerState;
use crate::peer::types::{IceCandidate, MediaKind, Role, ServerConfig};
use crate::peer::{MediaPeer, PeerFactory};
use crate::signaling::Signaler;
use crate::stats::rtp::RtcStatsReport;
use async_trait::async_trait;
use std::sync::{Arc, Weak};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::policy::bundle_policy::RTCBundlePolicy;
use webrtc::peer_connection::policy::rtcp_mux_policy::RTCRtcpMuxPolicy;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;

/// Creates real peer connections from the client configuration
pub struct WebRtcPeerFactory {
    ice_servers: Vec<ServerConfig>,
    media: MediaSources,
}

impl WebRtcPeerFactory {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            ice_servers: config.ice_servers.clone(),
            media: config.media.clone(),
        }
    }
}

#[async_trait]
impl PeerFactory for WebRtcPeerFactory {
    async fn create(
        &self,
        role: Role,
        signaler: Signaler,
    ) -> Result<Arc<dyn MediaPeer>, PeerError> {
        let peer = WebRtcPeer::new(role, &self.ice_servers, &self.media, signaler).await?;
        Ok(Arc::new(peer))
    }
}

/// A presenter (send-only) or viewer (receive-only) peer connection
pub struct WebRtcPeer {
    role: Role,
    pc: Arc<RTCPeerConnection>,
    state: Arc<PeerState>,
}

impl WebRtcPeer {
    pub async fn new(
        role: Role,
        servers: &[ServerConfig],
        media: &MediaSources,
        signaler: Signaler,
    ) -> Result<Self, PeerError> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;
        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let pc = Arc::new(api.new_peer_connection(rtc_config(servers)).await?);
        let state = Arc::new(PeerState::default());

        relay_local_candidates(&pc, signaler);
        watch_connection_state(&pc, role);

        let setup = match role {
            Role::Presenter => add_presenter_tracks(&pc, &state, media).await,
            Role::Viewer => add_viewer_transceivers(&pc, Arc::clone(&state)).await,
        };
        if let Err(e) = setup {
            state.close();
            if let Err(close_err) = pc.close().await {
                tracing::warn!(error = %close_err, "closing half-built peer failed");
            }
            return Err(e);
        }

        tracing::debug!(%role, "peer connection created");
        Ok(Self { role, pc, state })
    }

    fn ensure_open(&self) -> Result<(), PeerError> {
        if self.state.is_closed() {
            Err(PeerError::Closed)
        } else {
            Ok(())
        }
    }
}

/// Builds the connection config for the given ICE servers
fn rtc_config(servers: &[ServerConfig]) -> RTCConfiguration {
    RTCConfiguration {
        ice_servers: ice_servers(servers),
        ice_candidate_pool_size: 10,
        bundle_policy: RTCBundlePolicy::MaxBundle,
        rtcp_mux_policy: RTCRtcpMuxPolicy::Require,
        ..Default::default()
    }
}

fn watch_connection_state(pc: &Arc<RTCPeerConnection>, role: Role) {
    let weak: Weak<RTCPeerConnection> = Arc::downgrade(pc);
    pc.on_peer_connection_state_change(Box::new(move |st: RTCPeerConnectionState| {
        tracing::info!(%role, "Peer connection state changed to: {st:?}");
        if matches!(
            st,
            RTCPeerConnectionState::Failed | RTCPeerConnectionState::Disconnected
        ) {
            if let Some(pc) = weak.upgrade() {
                tokio::spawn(async move {
                    dump_selected_pair(&pc, "BEFORE-FAIL").await;
                });
            }
        }
        Box::pin(async {})
    }));

    pc.on_ice_connection_state_change(Box::new(move |st| {
        tracing::debug!(%role, "ICE connection state changed to: {st:?}");
        Box::pin(async {})
    }));
}

#[async_trait]
impl MediaPeer for WebRtcPeer {
    fn role(&self) -> Role {
        self.role
    }

    async fn generate_offer(&self) -> Result<String, PeerError> {
        self.ensure_open()?;
        let offer = self.pc.create_offer(None).await?;
        self.pc.set_local_description(offer).await?;
        let local = self
            .pc
            .local_description()
            .await
            .ok_or(PeerError::NoLocalDescription)?;
        tracing::debug!(role = %self.role, "local offer set");
        Ok(local.sdp)
    }

    async fn process_answer(&self, sdp_answer: &str) -> Result<(), PeerError> {
        self.ensure_open()?;
        let answer = RTCSessionDescription::answer(sdp_answer.to_owned())?;
        self.pc.set_remote_description(answer).await?;
        tracing::debug!(role = %self.role, "remote answer set");
        apply_pending_candidates(&self.pc, &self.state).await;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), PeerError> {
        add_remote_candidate(&self.pc, &self.state, candidate).await
    }

    fn local_kinds(&self) -> Vec<MediaKind> {
        self.state.local_kinds()
    }

    fn remote_kinds(&self) -> Vec<MediaKind> {
        self.state.remote_kinds()
    }

    async fn stats(&self) -> Result<RtcStatsReport, PeerError> {
        self.ensure_open()?;
        let report = self.pc.get_stats().await;
        Ok(RtcStatsReport::from_webrtc(&report))
    }

    async fn close(&self) {
        if !self.state.close() {
            return;
        }
        if let Err(e) = self.pc.close().await {
            tracing::warn!(error = %e, "peer connection close failed");
        }
        tracing::debug!(role = %self.role, "peer connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;

    #[test]
    fn config_bundles_and_muxes() {
        let cfg = rtc_config(&[ServerConfig::stun("stun.example.org:3478")]);
        assert_eq!(cfg.ice_servers.len(), 1);
        assert_eq!(cfg.bundle_policy, RTCBundlePolicy::MaxBundle);
        assert_eq!(cfg.rtcp_mux_policy, RTCRtcpMuxPolicy::Require);
    }

    #[tokio::test]
    async fn viewer_offer_receives_audio_and_video() {
        let (signaler, _rx) = Signaler::detached();
        let peer = WebRtcPeer::new(Role::Viewer, &[], &MediaSources::default(), signaler)
            .await
            .unwrap();
        let sdp = peer.generate_offer().await.unwrap();
        assert!(sdp.contains("m=audio"));
        assert!(sdp.contains("m=video"));
        assert!(sdp.contains("a=recvonly"));
        assert!(peer.local_kinds().is_empty());
        assert_eq!(
            peer.pc.local_description().await.map(|d| d.sdp_type),
            Some(RTCSdpType::Offer)
        );
        peer.close().await;
        assert!(matches!(peer.stats().await, Err(PeerError::Closed)));
    }

    #[tokio::test]
    async fn presenter_publishes_both_tracks() {
        let (signaler, _rx) = Signaler::detached();
        let peer = WebRtcPeer::new(Role::Presenter, &[], &MediaSources::default(), signaler)
            .await
            .unwrap();
        assert_eq!(peer.local_kinds(), vec![MediaKind::Video, MediaKind::Audio]);
        let sdp = peer.generate_offer().await.unwrap();
        assert!(sdp.contains("VP8"));
        assert!(sdp.to_lowercase().contains("opus"));
        peer.close().await;
    }

    #[tokio::test]
    async fn candidates_wait_for_the_answer() {
        let (signaler, _rx) = Signaler::detached();
        let peer = WebRtcPeer::new(Role::Viewer, &[], &MediaSources::default(), signaler)
            .await
            .unwrap();
        let candidate = IceCandidate {
            candidate: "candidate:1 1 UDP 2013266431 10.0.0.1 9 typ host".into(),
            sdp_mid: Some("0".into()),
            sdp_mline_index: Some(0),
        };
        peer.add_ice_candidate(candidate).await.unwrap();
        assert!(!peer.state.is_answered());
        peer.close().await;
    }

    #[tokio::test]
    async fn missing_media_file_fails_creation() {
        let (signaler, _rx) = Signaler::detached();
        let media = MediaSources {
            video: Some("/nonexistent/clip.ivf".into()),
            audio: None,
        };
        let result = WebRtcPeer::new(Role::Presenter, &[], &media, signaler).await;
        assert!(matches!(result, Err(PeerError::Media { .. })));
    }
}
