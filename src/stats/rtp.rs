//! RTP stream statistics, read from W3C-shaped stats objects.
//!
//! Reports are kept as JSON objects keyed the way `getStats()` names them
//! (`type`, `kind`, `transportId`, `currentRoundTripTime`, ...), so the pairing
//! of an RTP report with its candidate pair does not depend on how the
//! transport library lays out its structs.

use crate::peer::types::MediaKind;
use serde::Serialize;
use serde_json::{Map, Value};
use webrtc::stats::{StatsReport, StatsReportType};

pub const OUTBOUND_RTP: &str = "outbound-rtp";
pub const INBOUND_RTP: &str = "inbound-rtp";
pub const CANDIDATE_PAIR: &str = "candidate-pair";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outbound,
    Inbound,
}

impl Direction {
    fn report_type(self) -> &'static str {
        match self {
            Direction::Outbound => OUTBOUND_RTP,
            Direction::Inbound => INBOUND_RTP,
        }
    }

    fn bitrate_key(self) -> &'static str {
        match self {
            Direction::Outbound => "availableOutgoingBitrate",
            Direction::Inbound => "availableIncomingBitrate",
        }
    }
}

/// One stats snapshot of a peer connection
#[derive(Debug, Clone, Default)]
pub struct RtcStatsReport {
    entries: Vec<Map<String, Value>>,
}

impl RtcStatsReport {
    /// Entries are ordered by `id` so "first report" is stable between polls
    pub fn new(entries: Vec<Value>) -> Self {
        let mut entries: Vec<Map<String, Value>> = entries
            .into_iter()
            .filter_map(|v| match v {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect();
        entries.sort_by(|a, b| str_field(a, "id").cmp(&str_field(b, "id")));
        Self { entries }
    }

    pub fn from_webrtc(report: &StatsReport) -> Self {
        let mut entries = Vec::new();
        for stat in report.reports.values() {
            let (report_type, value) = match stat {
                StatsReportType::CandidatePair(s) => (CANDIDATE_PAIR, serde_json::to_value(s)),
                StatsReportType::InboundRTP(s) => (INBOUND_RTP, serde_json::to_value(s)),
                StatsReportType::OutboundRTP(s) => (OUTBOUND_RTP, serde_json::to_value(s)),
                _ => continue,
            };
            match value {
                Ok(Value::Object(mut map)) => {
                    map.insert("type".into(), Value::from(report_type));
                    entries.push(Value::Object(map));
                }
                Ok(_) => {}
                Err(e) => tracing::debug!(error = %e, report_type, "unserializable stats entry"),
            }
        }
        Self::new(entries)
    }

    fn of_type<'a>(&'a self, report_type: &'a str) -> impl Iterator<Item = &'a Map<String, Value>> {
        self.entries
            .iter()
            .filter(move |e| str_field(e, "type") == Some(report_type))
    }

    /// First RTP report of the given direction and kind
    fn rtp_report(&self, direction: Direction, kind: MediaKind) -> Option<&Map<String, Value>> {
        self.of_type(direction.report_type())
            .find(|e| str_field(e, "kind") == Some(kind.as_str()))
    }

    /// Candidate pair carrying the RTP report's transport. Without a transport
    /// id on the RTP side the nominated pair is used.
    fn candidate_pair(&self, rtp: &Map<String, Value>) -> Option<&Map<String, Value>> {
        match str_field(rtp, "transportId") {
            Some(transport) => self
                .of_type(CANDIDATE_PAIR)
                .find(|p| str_field(p, "transportId") == Some(transport)),
            None => self
                .of_type(CANDIDATE_PAIR)
                .find(|p| p.get("nominated").and_then(Value::as_bool) == Some(true)),
        }
    }

    pub fn stream_stats(&self, direction: Direction, kind: MediaKind) -> Option<RtpStreamStats> {
        let rtp = self.rtp_report(direction, kind)?;
        let mut stats = RtpStreamStats {
            is_remote: direction == Direction::Inbound,
            timestamp: f64_field(rtp, "timestamp"),
            ssrc: u64_field(rtp, "ssrc"),
            nack_count: u64_field(rtp, "nackCount"),
            fir_count: nonzero(rtp, "firCount"),
            pli_count: nonzero(rtp, "pliCount"),
            sli_count: nonzero(rtp, "sliCount"),
            qp_sum: nonzero(rtp, "qpSum"),
            ..RtpStreamStats::default()
        };
        match direction {
            Direction::Outbound => {
                stats.packets_sent = u64_field(rtp, "packetsSent");
                stats.bytes_sent = u64_field(rtp, "bytesSent");
                stats.frames_encoded = nonzero(rtp, "framesEncoded");
            }
            Direction::Inbound => {
                stats.packets_received = u64_field(rtp, "packetsReceived");
                stats.packets_discarded = u64_field(rtp, "packetsDiscarded");
                stats.packets_lost = rtp.get("packetsLost").and_then(Value::as_i64);
                stats.jitter = f64_field(rtp, "jitter");
                stats.bytes_received = u64_field(rtp, "bytesReceived");
                stats.frames_decoded = nonzero(rtp, "framesDecoded");
            }
        }
        if let Some(pair) = self.candidate_pair(rtp) {
            stats.ice_round_trip_time = f64_field(pair, "currentRoundTripTime");
            stats.available_bitrate = f64_field(pair, direction.bitrate_key());
        }
        Some(stats)
    }
}

/// Send- or receive-side metrics of one track
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RtpStreamStats {
    pub is_remote: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssrc: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packets_sent: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_sent: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packets_received: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packets_discarded: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packets_lost: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jitter: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_received: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nack_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fir_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pli_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sli_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frames_encoded: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frames_decoded: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qp_sum: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ice_round_trip_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_bitrate: Option<f64>,
}

fn str_field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key).and_then(Value::as_str)
}

fn u64_field(map: &Map<String, Value>, key: &str) -> Option<u64> {
    map.get(key).and_then(Value::as_u64)
}

fn f64_field(map: &Map<String, Value>, key: &str) -> Option<f64> {
    map.get(key).and_then(Value::as_f64)
}

/// Optional counters are only reported once they moved
fn nonzero(map: &Map<String, Value>, key: &str) -> Option<u64> {
    u64_field(map, key).filter(|v| *v != 0)
}
