//! Signaling channel: JSON messages discriminated by `id` over one WebSocket.

use crate::error::{ClientError, SignalingError};
use crate::peer::types::IceCandidate;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

/// Status value the media server uses for a granted request
pub const ACCEPTED: &str = "accepted";

// ========== MESSAGES ==========

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "id", rename_all = "camelCase")]
pub enum IncomingMessage {
    PresenterResponse(NegotiationResponse),
    ViewerResponse(NegotiationResponse),
    IceCandidate { candidate: IceCandidate },
    MediaStateChanged,
    ActivateStatsTimeout,
    LatencyStatsResponse(LatencyStatsResponse),
    StopCommunication,
    #[serde(other)]
    Unrecognized,
}

/// Reply to `presenter` / `viewer`
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NegotiationResponse {
    #[serde(default)]
    pub response: String,
    pub sdp_answer: Option<String>,
    pub message: Option<String>,
}

impl NegotiationResponse {
    pub fn is_accepted(&self) -> bool {
        self.response == ACCEPTED
    }

    pub fn reason(&self) -> &str {
        self.message.as_deref().unwrap_or("Unknown error")
    }
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LatencyStatsResponse {
    #[serde(default)]
    pub response: String,
    pub data: Option<LatencyData>,
    pub message: Option<String>,
    /// echo of the request timestamp
    pub send_time: Option<i64>,
}

impl LatencyStatsResponse {
    pub fn is_accepted(&self) -> bool {
        self.response == ACCEPTED
    }

    pub fn reason(&self) -> &str {
        self.message.as_deref().unwrap_or("Unknown error")
    }
}

/// Endpoint latency sample as reported by the media server (nanoseconds)
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LatencyData {
    pub timestamp_millis: Option<i64>,
    pub input_audio_latency: Option<f64>,
    #[serde(rename = "audioE2ELatency")]
    pub audio_e2e_latency: Option<f64>,
    pub input_video_latency: Option<f64>,
    #[serde(rename = "videoE2ELatency")]
    pub video_e2e_latency: Option<f64>,
    pub presenter_timestamp: Option<i64>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "id", rename_all = "camelCase")]
pub enum OutgoingMessage {
    #[serde(rename_all = "camelCase")]
    Presenter { sdp_offer: String },
    #[serde(rename_all = "camelCase")]
    Viewer { sdp_offer: String },
    OnIceCandidate { candidate: IceCandidate },
    #[serde(rename_all = "camelCase")]
    GetLatencyStats {
        timestamp: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_presenter: Option<bool>,
    },
    Stop,
}

pub fn parse_incoming(text: &str) -> Result<IncomingMessage, SignalingError> {
    Ok(serde_json::from_str(text)?)
}

pub fn encode_outgoing(message: &OutgoingMessage) -> Result<String, SignalingError> {
    Ok(serde_json::to_string(message)?)
}

/// Builds the signaling endpoint for a host, or passes a full ws(s) URL through
pub fn signaling_url(target: &str) -> Result<String, ClientError> {
    if target.starts_with("ws://") || target.starts_with("wss://") {
        return Ok(target.to_owned());
    }
    if let Some(rest) = target.strip_prefix("https://") {
        return Ok(format!("wss://{}/call", rest.trim_end_matches('/')));
    }
    if let Some(rest) = target.strip_prefix("http://") {
        return Ok(format!("ws://{}/call", rest.trim_end_matches('/')));
    }
    if target.is_empty() || target.contains("://") {
        return Err(ClientError::InvalidUrl(target.to_owned()));
    }
    Ok(format!("wss://{}/call", target.trim_end_matches('/')))
}

// ========== CHANNEL ==========

/// Cloneable handle for queueing outbound messages onto the socket
#[derive(Clone, Debug)]
pub struct Signaler {
    tx: mpsc::UnboundedSender<OutgoingMessage>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl Signaler {
    pub fn new(tx: mpsc::UnboundedSender<OutgoingMessage>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            tx,
            shutdown: Arc::new(shutdown),
        }
    }

    /// Signaler plus the receiving end, without a socket behind it
    pub fn detached() -> (Self, mpsc::UnboundedReceiver<OutgoingMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn send(&self, message: OutgoingMessage) -> Result<(), SignalingError> {
        if self.is_closed() {
            return Err(SignalingError::Closed);
        }
        self.tx.send(message).map_err(|_| SignalingError::Closed)
    }

    /// Flushes what is queued and closes the socket, for every clone.
    /// Later sends fail with `Closed`.
    pub fn close(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }

    fn closing(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }
}

/// An open signaling socket: outbound handle plus inbound text frames.
/// `inbound` yields `None` once the socket is gone.
pub struct SignalingChannel {
    pub signaler: Signaler,
    pub inbound: mpsc::UnboundedReceiver<String>,
}

pub async fn connect(url: &str) -> Result<SignalingChannel, ClientError> {
    let (stream, _) = connect_async(url)
        .await
        .map_err(|error| ClientError::WsConnect(Box::new(error)))?;
    tracing::info!(%url, "signaling socket open");

    let (mut sink, mut source) = stream.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<OutgoingMessage>();
    let (in_tx, in_rx) = mpsc::unbounded_channel::<String>();
    let signaler = Signaler::new(out_tx);
    let mut closing = signaler.closing();

    tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                biased;
                message = out_rx.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
                _ = closing.changed() => {
                    out_rx.close();
                    match out_rx.recv().await {
                        Some(message) => message,
                        None => break,
                    }
                }
            };
            let text = match encode_outgoing(&message) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(error = %e, "dropping unencodable message");
                    continue;
                }
            };
            tracing::debug!("Sending message: {text}");
            if let Err(e) = sink.send(Message::Text(text.into())).await {
                tracing::warn!(error = %e, "signaling send failed");
                break;
            }
        }
        let _ = sink.close().await;
    });

    tokio::spawn(async move {
        while let Some(frame) = source.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    if in_tx.send(text.to_string()).is_err() {
                        break;
                    }
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "signaling receive failed");
                    break;
                }
            }
        }
        tracing::info!("signaling socket closed");
    });

    Ok(SignalingChannel {
        signaler,
        inbound: in_rx,
    })
}
