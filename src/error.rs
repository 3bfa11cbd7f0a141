use crate::peer::types::{MediaKind, Role};

/// Top-level failure that ends a client run.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid signaling URL: {0}")]
    InvalidUrl(String),
    #[error("websocket connect failed: {0}")]
    WsConnect(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("websocket closed")]
    WsClosed,
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("ICE server URL cannot be empty")]
    EmptyIceUrl,
    #[error("TURN server {0} requires username and credential")]
    TurnCredentials(String),
    #[error("stats interval must be greater than zero")]
    ZeroStatsInterval,
}

#[derive(Debug, thiserror::Error)]
pub enum SignalingError {
    #[error("malformed signaling message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("signaling channel closed")]
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    #[error("webrtc: {0}")]
    WebRtc(#[from] webrtc::Error),
    #[error("local description missing after offer")]
    NoLocalDescription,
    #[error("media source {path}: {source}")]
    Media {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("peer connection already closed")]
    Closed,
}

/// Why one statistics source produced nothing on a poll. Never fatal.
#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    #[error("cannot get stats from null peer connection")]
    NullPeer,
    #[error("non existent local stream: cannot read stats")]
    NoLocalStream,
    #[error("non existent remote stream: cannot read stats")]
    NoRemoteStream,
    #[error("non existent local {0} track: cannot read stats")]
    NoLocalTrack(MediaKind),
    #[error("non existent remote {0} track: cannot read stats")]
    NoRemoteTrack(MediaKind),
    #[error("no RTP reports found in stats")]
    NoRtpReports,
    #[error("session role is not set")]
    NoRole,
    #[error("cannot get latency stats as {0}")]
    LatencyRole(Role),
    #[error("non existent latency stats")]
    NoLatencySnapshot,
    #[error("stats query failed: {0}")]
    Peer(#[from] PeerError),
}
