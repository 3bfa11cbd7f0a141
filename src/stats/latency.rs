use crate::error::StatsError;
use crate::peer::types::Role;
use crate::signaling::{LatencyData, OutgoingMessage};
use serde::Serialize;

pub const NANOS_PER_MILLI: f64 = 1_000_000.0;

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct LatencyPair {
    #[serde(rename = "inputLatency", skip_serializing_if = "Option::is_none")]
    pub input_latency: Option<f64>,
    #[serde(rename = "E2ELatency", skip_serializing_if = "Option::is_none")]
    pub e2e_latency: Option<f64>,
}

/// Server-reported latency converted to milliseconds
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct LatencySnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    pub audio: LatencyPair,
    pub video: LatencyPair,
    /// seconds between the presenter's timestamp and now
    #[serde(rename = "browserE2ELatency", skip_serializing_if = "Option::is_none")]
    pub browser_e2e_latency: Option<f64>,
}

impl LatencySnapshot {
    pub fn from_data(data: &LatencyData, now_millis: i64) -> Self {
        let ms = |nanos: Option<f64>| nanos.map(|n| n / NANOS_PER_MILLI);
        Self {
            timestamp: data.timestamp_millis,
            audio: LatencyPair {
                input_latency: ms(data.input_audio_latency),
                e2e_latency: ms(data.audio_e2e_latency),
            },
            video: LatencyPair {
                input_latency: ms(data.input_video_latency),
                e2e_latency: ms(data.video_e2e_latency),
            },
            browser_e2e_latency: data
                .presenter_timestamp
                .map(|ts| (now_millis - ts) as f64 / 1000.0),
        }
    }
}

/// The `getLatencyStats` request for this role. Only the presenter asks.
pub fn latency_request(role: Option<Role>, now_millis: i64) -> Result<OutgoingMessage, StatsError> {
    match role {
        Some(Role::Presenter) => Ok(OutgoingMessage::GetLatencyStats {
            timestamp: now_millis,
            is_presenter: Some(true),
        }),
        Some(Role::Viewer) => Err(StatsError::LatencyRole(Role::Viewer)),
        None => Err(StatsError::NoRole),
    }
}
