//! Presenter tracks and viewer receivers.
//!
//! The presenter publishes one VP8 and one Opus track. Their samples come from
//! IVF/OGG files (played in a loop) or, for audio, from generated silence.
//! The viewer only receives: it offers two recv-only transceivers and drains
//! whatever arrives so the RTP stats keep moving.

use crate::config::MediaSources;
use crate::error::PeerError;
use crate::peer::state::{PeerState, OPUS_FRAME, OPUS_SILENCE, RTP_BUFFER, STREAM_ID};
use crate::peer::types::MediaKind;
use bytes::Bytes;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::media::io::ivf_reader::{IVFFileHeader, IVFReader};
use webrtc::media::io::ogg_reader::OggReader;
use webrtc::media::Sample;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::{RTCRtpTransceiver, RTCRtpTransceiverInit};
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

/// Opus clock rate, used to turn granule positions into durations
const OPUS_CLOCK_RATE: u64 = 48_000;

type IvfSource = (IVFReader<BufReader<File>>, IVFFileHeader);
type OggSource = OggReader<BufReader<File>>;

pub fn media_kind(codec: RTPCodecType) -> Option<MediaKind> {
    match codec {
        RTPCodecType::Audio => Some(MediaKind::Audio),
        RTPCodecType::Video => Some(MediaKind::Video),
        _ => None,
    }
}

// ========== PRESENTER ==========

/// Adds the VP8 and Opus tracks and starts feeding them.
/// Media files are opened here so a bad path fails the session up front.
pub async fn add_presenter_tracks(
    pc: &RTCPeerConnection,
    state: &PeerState,
    media: &MediaSources,
) -> Result<(), PeerError> {
    let video_source = media.video.as_deref().map(open_ivf).transpose()?;
    let audio_source = media.audio.as_deref().map(open_ogg).transpose()?;

    let video = local_track(MIME_TYPE_VP8, MediaKind::Video);
    let sender = pc
        .add_track(Arc::clone(&video) as Arc<dyn TrackLocal + Send + Sync>)
        .await?;
    state.track_task(tokio::spawn(drain_rtcp(sender)));
    state.add_local_kind(MediaKind::Video);

    let audio = local_track(MIME_TYPE_OPUS, MediaKind::Audio);
    let sender = pc
        .add_track(Arc::clone(&audio) as Arc<dyn TrackLocal + Send + Sync>)
        .await?;
    state.track_task(tokio::spawn(drain_rtcp(sender)));
    state.add_local_kind(MediaKind::Audio);

    match (video_source, &media.video) {
        (Some(source), Some(path)) => {
            tracing::info!(path = %path.display(), "streaming video file");
            state.track_task(tokio::spawn(pump_ivf(path.clone(), video, source)));
        }
        _ => tracing::info!("no video source, the video track stays idle"),
    }
    match (audio_source, &media.audio) {
        (Some(source), Some(path)) => {
            tracing::info!(path = %path.display(), "streaming audio file");
            state.track_task(tokio::spawn(pump_ogg(path.clone(), audio, source)));
        }
        _ => state.track_task(tokio::spawn(pump_silence(audio))),
    }
    Ok(())
}

fn local_track(mime_type: &str, kind: MediaKind) -> Arc<TrackLocalStaticSample> {
    Arc::new(TrackLocalStaticSample::new(
        RTCRtpCodecCapability {
            mime_type: mime_type.to_owned(),
            ..Default::default()
        },
        kind.as_str().to_owned(),
        STREAM_ID.to_owned(),
    ))
}

/// RTCP has to be read for interceptors (NACK, reports) to work
async fn drain_rtcp(sender: Arc<RTCRtpSender>) {
    let mut buf = vec![0u8; RTP_BUFFER];
    while sender.read(&mut buf).await.is_ok() {}
}

fn media_error(path: &Path, source: std::io::Error) -> PeerError {
    PeerError::Media {
        path: path.display().to_string(),
        source,
    }
}

fn open_ivf(path: &Path) -> Result<IvfSource, PeerError> {
    let file = File::open(path).map_err(|e| media_error(path, e))?;
    IVFReader::new(BufReader::new(file))
        .map_err(|e| media_error(path, std::io::Error::other(e.to_string())))
}

fn open_ogg(path: &Path) -> Result<OggSource, PeerError> {
    let file = File::open(path).map_err(|e| media_error(path, e))?;
    let (reader, _header) = OggReader::new(BufReader::new(file), true)
        .map_err(|e| media_error(path, std::io::Error::other(e.to_string())))?;
    Ok(reader)
}

fn frame_duration(header: &IVFFileHeader) -> Duration {
    let denominator = u64::from(header.timebase_denominator.max(1));
    let millis = 1000 * u64::from(header.timebase_numerator) / denominator;
    Duration::from_millis(millis.max(1))
}

fn granule_duration(granules: u64) -> Duration {
    Duration::from_micros(granules.saturating_mul(1_000_000) / OPUS_CLOCK_RATE)
}

/// Duration of one OGG page. A page whose granule position is all ones holds
/// no finished packet, so it counts for nothing and keeps the previous position.
fn page_duration(last_granule: &mut u64, granule_position: u64) -> Duration {
    if granule_position == u64::MAX {
        return Duration::ZERO;
    }
    let granules = granule_position.saturating_sub(*last_granule);
    *last_granule = granule_position;
    granule_duration(granules)
}

async fn pump_ivf(path: PathBuf, track: Arc<TrackLocalStaticSample>, first: IvfSource) {
    let mut source = first;
    loop {
        let (mut ivf, header) = source;
        let duration = frame_duration(&header);
        let mut ticker = tokio::time::interval(duration);
        let mut frames = 0u64;
        loop {
            ticker.tick().await;
            let Ok((frame, _)) = ivf.parse_next_frame() else {
                break;
            };
            frames += 1;
            let sample = Sample {
                data: frame.freeze(),
                duration,
                ..Default::default()
            };
            if let Err(e) = track.write_sample(&sample).await {
                tracing::warn!(error = %e, "video write_sample failed");
                return;
            }
        }
        if frames == 0 {
            tracing::warn!(path = %path.display(), "no VP8 frames in file");
            return;
        }
        tracing::debug!(frames, "video file ended, looping");
        source = match open_ivf(&path) {
            Ok(source) => source,
            Err(e) => {
                tracing::error!(error = %e, "cannot reopen video file");
                return;
            }
        };
    }
}

async fn pump_ogg(path: PathBuf, track: Arc<TrackLocalStaticSample>, first: OggSource) {
    let mut ogg = first;
    loop {
        let mut ticker = tokio::time::interval(OPUS_FRAME);
        let mut last_granule = 0u64;
        let mut pages = 0u64;
        loop {
            ticker.tick().await;
            let Ok((page, header)) = ogg.parse_next_page() else {
                break;
            };
            pages += 1;
            let sample = Sample {
                data: page.freeze(),
                duration: page_duration(&mut last_granule, header.granule_position),
                ..Default::default()
            };
            if let Err(e) = track.write_sample(&sample).await {
                tracing::warn!(error = %e, "audio write_sample failed");
                return;
            }
        }
        if pages == 0 {
            tracing::warn!(path = %path.display(), "no Opus pages in file");
            return;
        }
        tracing::debug!(pages, "audio file ended, looping");
        ogg = match open_ogg(&path) {
            Ok(ogg) => ogg,
            Err(e) => {
                tracing::error!(error = %e, "cannot reopen audio file");
                return;
            }
        };
    }
}

async fn pump_silence(track: Arc<TrackLocalStaticSample>) {
    let mut ticker = tokio::time::interval(OPUS_FRAME);
    loop {
        ticker.tick().await;
        let sample = Sample {
            data: Bytes::from_static(&OPUS_SILENCE),
            duration: OPUS_FRAME,
            ..Default::default()
        };
        if let Err(e) = track.write_sample(&sample).await {
            tracing::warn!(error = %e, "silence write_sample failed");
            return;
        }
    }
}

// ========== VIEWER ==========

/// Offers to receive audio and video, and records remote tracks as they arrive
pub async fn add_viewer_transceivers(
    pc: &RTCPeerConnection,
    state: Arc<PeerState>,
) -> Result<(), PeerError> {
    for kind in [RTPCodecType::Audio, RTPCodecType::Video] {
        pc.add_transceiver_from_kind(
            kind,
            Some(RTCRtpTransceiverInit {
                direction: RTCRtpTransceiverDirection::Recvonly,
                send_encodings: vec![],
            }),
        )
        .await?;
    }

    pc.on_track(Box::new(
        move |track: Arc<TrackRemote>,
              _receiver: Arc<RTCRtpReceiver>,
              _transceiver: Arc<RTCRtpTransceiver>| {
            let state = Arc::clone(&state);
            Box::pin(async move {
                let Some(kind) = media_kind(track.kind()) else {
                    tracing::warn!("remote track of unknown kind ignored");
                    return;
                };
                tracing::info!(
                    %kind,
                    codec = %track.codec().capability.mime_type,
                    ssrc = track.ssrc(),
                    "remote track"
                );
                state.add_remote_kind(kind);
                state.track_task(tokio::spawn(drain_remote(track, kind)));
            })
        },
    ));
    Ok(())
}

async fn drain_remote(track: Arc<TrackRemote>, kind: MediaKind) {
    let mut packets = 0u64;
    while track.read_rtp().await.is_ok() {
        packets += 1;
        if packets == 1 {
            tracing::debug!(%kind, "first RTP packet received");
        }
    }
    tracing::debug!(%kind, packets, "remote track ended");
}
