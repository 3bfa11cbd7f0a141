//! The client event loop.
//!
//! One task owns the [`SessionContext`] and handles, strictly one at a time,
//! inbound signaling frames, user commands and its own timer/stat events.
//! Statistics are gathered on spawned tasks and come back as events tagged
//! with the session generation they started under, so results for a session
//! that has since been disposed are dropped instead of cancelled.

use crate::commands::UserCommand;
use crate::config::ClientConfig;
use crate::error::{ClientError, StatsError};
use crate::peer::types::Role;
use crate::peer::PeerFactory;
use crate::session::{SessionContext, SessionState};
use crate::signaling::{
    parse_incoming, IncomingMessage, LatencyStatsResponse, NegotiationResponse, OutgoingMessage,
    Signaler,
};
use crate::stats::dump::write_dump;
use crate::stats::latency::{latency_request, LatencySnapshot};
use crate::stats::{incoming_stats, outgoing_stats, BrowserStats, SampleStats};
use crate::utils::now_millis;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

#[derive(Debug)]
pub enum ClientEvent {
    /// the sampler's one-shot timer fired
    StatsTick { generation: u64 },
    /// a poll finished gathering
    StatsGathered {
        generation: u64,
        timestamp: i64,
        browser_send: Result<BrowserStats, StatsError>,
        browser_recv: Result<BrowserStats, StatsError>,
        latency: Result<LatencySnapshot, StatsError>,
    },
}

pub struct Client {
    config: ClientConfig,
    ctx: SessionContext,
    signaler: Signaler,
    factory: Arc<dyn PeerFactory>,
    events_tx: mpsc::UnboundedSender<ClientEvent>,
    events_rx: mpsc::UnboundedReceiver<ClientEvent>,
    state_tx: watch::Sender<SessionState>,
}

impl Client {
    pub fn new(config: ClientConfig, signaler: Signaler, factory: Arc<dyn PeerFactory>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(SessionState::Idle);
        Self {
            config,
            ctx: SessionContext::new(),
            signaler,
            factory,
            events_tx,
            events_rx,
            state_tx,
        }
    }

    pub fn session(&self) -> &SessionContext {
        &self.ctx
    }

    /// Follows the session state as the loop changes it
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Runs until `Quit` (or the command channel closes) or until the socket
    /// goes away. Either way the session is torn down, samples dumped and
    /// the signaling socket closed, even while peers still hold a signaler.
    pub async fn run(
        mut self,
        inbound: mpsc::UnboundedReceiver<String>,
        commands: mpsc::UnboundedReceiver<UserCommand>,
    ) -> Result<(), ClientError> {
        let result = self.serve(inbound, commands).await;
        self.signaler.close();
        result
    }

    async fn serve(
        &mut self,
        mut inbound: mpsc::UnboundedReceiver<String>,
        mut commands: mpsc::UnboundedReceiver<UserCommand>,
    ) -> Result<(), ClientError> {
        loop {
            tokio::select! {
                frame = inbound.recv() => match frame {
                    Some(text) => self.handle_text(&text).await,
                    None => {
                        tracing::warn!("signaling channel closed");
                        self.dispose().await;
                        self.dump();
                        return Err(ClientError::WsClosed);
                    }
                },
                command = commands.recv() => match command {
                    Some(UserCommand::Quit) | None => {
                        if self.ctx.has_peer() {
                            self.stop().await;
                        }
                        return Ok(());
                    }
                    Some(command) => self.handle_command(command).await,
                },
                Some(event) = self.events_rx.recv() => self.handle_event(event).await,
            }
        }
    }

    pub async fn handle_command(&mut self, command: UserCommand) {
        match command {
            UserCommand::Presenter => self.start(Role::Presenter).await,
            UserCommand::Viewer => self.start(Role::Viewer).await,
            UserCommand::Stop => self.stop().await,
            UserCommand::Quit => {}
        }
    }

    pub async fn handle_text(&mut self, text: &str) {
        tracing::info!("Received message: {text}");
        match parse_incoming(text) {
            Ok(message) => self.handle_message(message).await,
            Err(e) => tracing::error!(error = %e, "ignoring signaling frame"),
        }
    }

    pub async fn handle_message(&mut self, message: IncomingMessage) {
        match message {
            IncomingMessage::PresenterResponse(response) | IncomingMessage::ViewerResponse(response) => {
                self.negotiation_response(response).await;
            }
            IncomingMessage::IceCandidate { candidate } => {
                let Some(peer) = self.ctx.peer() else {
                    tracing::warn!("remote candidate without a session, dropped");
                    return;
                };
                if let Err(e) = peer.add_ice_candidate(candidate).await {
                    tracing::error!(error = %e, "Error adding candidate");
                }
            }
            IncomingMessage::MediaStateChanged => tracing::debug!("media state changed"),
            IncomingMessage::ActivateStatsTimeout => self.activate_stats(),
            IncomingMessage::LatencyStatsResponse(response) => self.latency_response(response),
            IncomingMessage::StopCommunication => {
                tracing::info!("server stopped the communication");
                self.dispose().await;
                self.dump();
            }
            IncomingMessage::Unrecognized => tracing::error!("Unrecognized message"),
        }
    }

    pub async fn handle_event(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::StatsTick { generation } => {
                if !self.ctx.is_current(generation) || !self.ctx.is_polling() {
                    tracing::debug!(generation, "sampler tick for a finished session");
                    return;
                }
                self.poll(generation);
                self.schedule_tick(generation);
            }
            ClientEvent::StatsGathered {
                generation,
                timestamp,
                browser_send,
                browser_recv,
                latency,
            } => {
                if !self.ctx.is_current(generation) {
                    tracing::debug!(generation, "discarding stats of a disposed session");
                    return;
                }
                let stats = SampleStats {
                    browser_send: keep(browser_send, "browser outgoing"),
                    browser_recv: keep(browser_recv, "browser incoming"),
                    latency: keep(latency, "latency"),
                };
                let stored = self.ctx.samples_mut().push(timestamp, stats);
                tracing::debug!(timestamp = stored, total = self.ctx.samples().len(), "stats sample");
            }
        }
    }

    // ========== SESSION ==========

    async fn start(&mut self, role: Role) {
        if self.ctx.has_peer() {
            tracing::warn!(%role, "a session is already running; stop it first");
            return;
        }
        let peer = match self.factory.create(role, self.signaler.clone()).await {
            Ok(peer) => peer,
            Err(e) => {
                tracing::error!(error = %e, %role, "could not create peer connection");
                self.publish();
                return;
            }
        };
        let generation = self.ctx.open(role, peer.clone());
        self.publish();
        tracing::info!(%role, generation, "negotiating");

        let sdp_offer = match peer.generate_offer().await {
            Ok(sdp) => sdp,
            Err(e) => {
                tracing::error!(error = %e, "Error generating the offer");
                self.dispose().await;
                return;
            }
        };
        let message = match role {
            Role::Presenter => OutgoingMessage::Presenter { sdp_offer },
            Role::Viewer => OutgoingMessage::Viewer { sdp_offer },
        };
        if let Err(e) = self.signaler.send(message) {
            tracing::error!(error = %e, "could not send the offer");
            self.dispose().await;
        }
    }

    async fn negotiation_response(&mut self, response: NegotiationResponse) {
        if !response.is_accepted() {
            tracing::info!(
                "Call not accepted for the following reason: {}",
                response.reason()
            );
            self.dispose().await;
            return;
        }
        let Some(peer) = self.ctx.peer() else {
            tracing::warn!("answer arrived without a session, ignored");
            return;
        };
        let Some(sdp_answer) = response.sdp_answer else {
            tracing::error!("accepted response carries no sdpAnswer");
            return;
        };
        match peer.process_answer(&sdp_answer).await {
            Ok(()) => {
                self.ctx.activate();
                self.publish();
                tracing::info!(role = %peer.role(), "session active");
            }
            Err(e) => tracing::error!(error = %e, "could not apply the SDP answer"),
        }
    }

    async fn stop(&mut self) {
        if let Err(e) = self.signaler.send(OutgoingMessage::Stop) {
            tracing::warn!(error = %e, "could not send stop");
        }
        self.dispose().await;
        self.dump();
    }

    async fn dispose(&mut self) {
        if self.ctx.dispose().await {
            tracing::info!("session disposed");
        }
        self.publish();
    }

    fn dump(&self) {
        let samples = self.ctx.samples();
        match write_dump(&self.config.stats_dir, samples) {
            Ok(Some(path)) => {
                tracing::info!(path = %path.display(), samples = samples.len(), "JSON data dumped");
            }
            Ok(None) => tracing::debug!("no stats samples to dump"),
            Err(e) => tracing::error!(error = %e, "could not write stats dump"),
        }
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.ctx.state());
    }

    // ========== STATS ==========

    fn latency_response(&mut self, response: LatencyStatsResponse) {
        if response.is_accepted() {
            tracing::debug!(data = ?response.data, "endpoint latency");
            self.ctx.set_latency(response.data);
        } else {
            tracing::info!(
                "Request was not accepted for the following reason: {}",
                response.reason()
            );
            self.ctx.set_latency(None);
        }
    }

    fn activate_stats(&mut self) {
        if !self.ctx.has_peer() {
            tracing::warn!("stats activation without a session, ignored");
            return;
        }
        if !self.ctx.start_polling() {
            tracing::debug!("stats sampler already running");
            return;
        }
        tracing::info!(interval = ?self.config.stats_interval, "stats sampler started");
        self.schedule_tick(self.ctx.generation());
    }

    fn schedule_tick(&self, generation: u64) {
        let tx = self.events_tx.clone();
        let interval = self.config.stats_interval;
        tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            let _ = tx.send(ClientEvent::StatsTick { generation });
        });
    }

    fn poll(&mut self, generation: u64) {
        let timestamp = now_millis();
        let latency = match latency_request(self.ctx.role(), timestamp) {
            Ok(request) => {
                if let Err(e) = self.signaler.send(request) {
                    tracing::warn!(error = %e, "could not request latency stats");
                }
                self.ctx
                    .take_latency()
                    .map(|data| LatencySnapshot::from_data(&data, timestamp))
                    .ok_or(StatsError::NoLatencySnapshot)
            }
            Err(e) => Err(e),
        };

        let peer = self.ctx.peer();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let browser_send = outgoing_stats(peer.as_deref()).await;
            let browser_recv = incoming_stats(peer.as_deref()).await;
            let _ = tx.send(ClientEvent::StatsGathered {
                generation,
                timestamp,
                browser_send,
                browser_recv,
                latency,
            });
        });
    }
}

fn keep<T>(result: Result<T, StatsError>, what: &str) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("could not gather {what} stats: {e}");
            None
        }
    }
}
