//! Connection statistics sampled once per tick while a session is up.

pub mod dump;
pub mod latency;
pub mod rtp;

use crate::error::StatsError;
use crate::peer::types::MediaKind;
use crate::peer::MediaPeer;
use latency::LatencySnapshot;
use rtp::{Direction, RtpStreamStats};
use serde::Serialize;

/// Per-track RTP metrics for one direction
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct BrowserStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<RtpStreamStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<RtpStreamStats>,
}

impl BrowserStats {
    fn set(&mut self, kind: MediaKind, stats: RtpStreamStats) {
        match kind {
            MediaKind::Audio => self.audio = Some(stats),
            MediaKind::Video => self.video = Some(stats),
        }
    }
}

/// What one poll gathered. Sources that failed are left out.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct SampleStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser_send: Option<BrowserStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser_recv: Option<BrowserStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<LatencySnapshot>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct StatsSample {
    pub timestamp: i64,
    pub stats: SampleStats,
}

/// Append-only log of samples with strictly increasing timestamps
#[derive(Debug, Default)]
pub struct SampleLog {
    samples: Vec<StatsSample>,
}

impl SampleLog {
    /// Appends a sample; a timestamp not after the previous one is moved
    /// 1 ms past it. Returns the timestamp actually stored.
    pub fn push(&mut self, timestamp: i64, stats: SampleStats) -> i64 {
        let timestamp = match self.samples.last() {
            Some(last) if timestamp <= last.timestamp => last.timestamp + 1,
            _ => timestamp,
        };
        self.samples.push(StatsSample { timestamp, stats });
        timestamp
    }

    pub fn samples(&self) -> &[StatsSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Send-side stats: both local tracks must exist
pub async fn outgoing_stats(peer: Option<&dyn MediaPeer>) -> Result<BrowserStats, StatsError> {
    let peer = peer.ok_or(StatsError::NullPeer)?;
    let kinds = peer.local_kinds();
    if kinds.is_empty() {
        return Err(StatsError::NoLocalStream);
    }
    if let Some(missing) = MediaKind::ALL.into_iter().find(|k| !kinds.contains(k)) {
        return Err(StatsError::NoLocalTrack(missing));
    }
    direction_stats(peer, Direction::Outbound).await
}

/// Receive-side stats: both remote tracks must have arrived
pub async fn incoming_stats(peer: Option<&dyn MediaPeer>) -> Result<BrowserStats, StatsError> {
    let peer = peer.ok_or(StatsError::NullPeer)?;
    let kinds = peer.remote_kinds();
    if kinds.is_empty() {
        return Err(StatsError::NoRemoteStream);
    }
    if let Some(missing) = MediaKind::ALL.into_iter().find(|k| !kinds.contains(k)) {
        return Err(StatsError::NoRemoteTrack(missing));
    }
    direction_stats(peer, Direction::Inbound).await
}

async fn direction_stats(
    peer: &dyn MediaPeer,
    direction: Direction,
) -> Result<BrowserStats, StatsError> {
    let report = peer.stats().await?;
    let mut out = BrowserStats::default();
    let mut found = false;
    for kind in MediaKind::ALL {
        match report.stream_stats(direction, kind) {
            Some(stats) => {
                tracing::debug!(?direction, %kind, ?stats, "rtp stats");
                out.set(kind, stats);
                found = true;
            }
            None => tracing::warn!(?direction, %kind, "No RTP reports found in stats"),
        }
    }
    if found {
        Ok(out)
    } else {
        Err(StatsError::NoRtpReports)
    }
}
