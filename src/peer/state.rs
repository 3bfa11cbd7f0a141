use crate::peer::types::{IceCandidate, MediaKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

// ========== PEER STATE ==========

/// Bookkeeping for one peer connection, shared with its webrtc callbacks
#[derive(Default)]
pub struct PeerState {
    pending_remote: Mutex<Vec<IceCandidate>>,
    answered: AtomicBool,
    local_kinds: Mutex<Vec<MediaKind>>,
    remote_kinds: Mutex<Vec<MediaKind>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PeerState {
    /// Remote candidates that arrived before the answer
    pub fn queue_remote(&self, candidate: IceCandidate) -> usize {
        let mut pending = lock(&self.pending_remote);
        pending.push(candidate);
        pending.len()
    }

    /// Marks the answer applied and hands back what was queued, oldest first
    pub fn answer_applied(&self) -> Vec<IceCandidate> {
        self.answered.store(true, Ordering::SeqCst);
        lock(&self.pending_remote).drain(..).collect()
    }

    pub fn is_answered(&self) -> bool {
        self.answered.load(Ordering::SeqCst)
    }

    pub fn add_local_kind(&self, kind: MediaKind) {
        push_unique(&mut lock(&self.local_kinds), kind);
    }

    pub fn add_remote_kind(&self, kind: MediaKind) {
        push_unique(&mut lock(&self.remote_kinds), kind);
    }

    pub fn local_kinds(&self) -> Vec<MediaKind> {
        lock(&self.local_kinds).clone()
    }

    pub fn remote_kinds(&self) -> Vec<MediaKind> {
        lock(&self.remote_kinds).clone()
    }

    /// Keeps a background task so `close` can stop it. A task handed in
    /// after close is aborted right away.
    pub fn track_task(&self, handle: JoinHandle<()>) {
        if self.is_closed() {
            handle.abort();
            return;
        }
        lock(&self.tasks).push(handle);
    }

    /// Returns false if already closed
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        for handle in lock(&self.tasks).drain(..) {
            handle.abort();
        }
        lock(&self.pending_remote).clear();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

fn push_unique(kinds: &mut Vec<MediaKind>, kind: MediaKind) {
    if !kinds.contains(&kind) {
        kinds.push(kind);
    }
}

// ========== CONSTANTS ==========

/// Stream id of the presenter's local tracks
pub const STREAM_ID: &str = "one2many";

/// Opus frame length used by the silence generator
pub const OPUS_FRAME: Duration = Duration::from_millis(20);

/// A single Opus frame of silence (TOC 0xf8: CELT FB 20 ms)
pub const OPUS_SILENCE: [u8; 3] = [0xf8, 0xff, 0xfe];

/// Buffer for draining RTCP and remote RTP
pub const RTP_BUFFER: usize = 1500;
