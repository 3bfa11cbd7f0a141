// Client configuration.
// Log verbosity follows the build profile unless overridden.

use crate::error::ConfigError;
use crate::peer::types::ServerConfig;
use std::path::PathBuf;
use std::time::Duration;

#[cfg(debug_assertions)]
pub const DEFAULT_LOG_FILTER: &str = "one2many=debug,webrtc=warn";

#[cfg(not(debug_assertions))]
pub const DEFAULT_LOG_FILTER: &str = "one2many=info,webrtc=error";

pub const DEFAULT_STATS_INTERVAL: Duration = Duration::from_secs(1);

/// Public STUN servers used when none are configured
pub const DEFAULT_STUN_SERVERS: [&str; 2] = [
    "stun:stun.l.google.com:19302",
    "stun:stun1.l.google.com:19302",
];

/// Files the presenter streams from; without them only silence is sent
#[derive(Debug, Clone, Default)]
pub struct MediaSources {
    /// VP8 in an IVF container
    pub video: Option<PathBuf>,
    /// Opus in an OGG container
    pub audio: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub signaling_url: String,
    pub ice_servers: Vec<ServerConfig>,
    pub stats_interval: Duration,
    pub stats_dir: PathBuf,
    pub media: MediaSources,
}

impl ClientConfig {
    pub fn new(signaling_url: impl Into<String>) -> Self {
        Self {
            signaling_url: signaling_url.into(),
            ice_servers: DEFAULT_STUN_SERVERS
                .iter()
                .map(|url| ServerConfig::stun(*url))
                .collect(),
            stats_interval: DEFAULT_STATS_INTERVAL,
            stats_dir: PathBuf::from("."),
            media: MediaSources::default(),
        }
    }

    /// Replaces the ICE servers after validating them
    pub fn with_ice_servers(mut self, servers: Vec<ServerConfig>) -> Result<Self, ConfigError> {
        for server in &servers {
            if server.url.is_empty() {
                return Err(ConfigError::EmptyIceUrl);
            }
            if server.r#type == "turn" && (server.username.is_none() || server.credential.is_none())
            {
                return Err(ConfigError::TurnCredentials(server.url.clone()));
            }
        }
        if !servers.is_empty() {
            self.ice_servers = servers;
        }
        Ok(self)
    }

    pub fn with_stats_interval(mut self, interval: Duration) -> Result<Self, ConfigError> {
        if interval.is_zero() {
            return Err(ConfigError::ZeroStatsInterval);
        }
        self.stats_interval = interval;
        Ok(self)
    }

    pub fn with_stats_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.stats_dir = dir.into();
        self
    }

    pub fn with_media(mut self, media: MediaSources) -> Self {
        self.media = media;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_public_stun_and_one_second_polling() {
        let cfg = ClientConfig::new("wss://localhost:8443/call");
        assert_eq!(cfg.ice_servers.len(), 2);
        assert!(cfg.ice_servers.iter().all(|s| s.r#type == "stun"));
        assert_eq!(cfg.stats_interval, Duration::from_secs(1));
    }

    #[test]
    fn turn_without_credentials_rejected() {
        let err = ClientConfig::new("wss://h/call")
            .with_ice_servers(vec![ServerConfig::turn("turn:h", Some("u".into()), None)])
            .unwrap_err();
        assert_eq!(err, ConfigError::TurnCredentials("turn:h".into()));
    }

    #[test]
    fn empty_url_rejected() {
        let err = ClientConfig::new("wss://h/call")
            .with_ice_servers(vec![ServerConfig::stun("")])
            .unwrap_err();
        assert_eq!(err, ConfigError::EmptyIceUrl);
    }

    #[test]
    fn empty_server_list_keeps_defaults() {
        let cfg = ClientConfig::new("wss://h/call")
            .with_ice_servers(Vec::new())
            .unwrap();
        assert_eq!(cfg.ice_servers.len(), 2);
    }

    #[test]
    fn zero_interval_rejected() {
        let err = ClientConfig::new("wss://h/call")
            .with_stats_interval(Duration::ZERO)
            .unwrap_err();
        assert_eq!(err, ConfigError::ZeroStatsInterval);
    }
}
