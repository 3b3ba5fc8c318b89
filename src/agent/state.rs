//! Per-session turn-taking state.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::OwnedMutexGuard;
use tokio::time::Instant;

use crate::core::reasoner::Utterance;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Processing,
    Speaking,
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnState::Idle => write!(f, "idle"),
            TurnState::Processing => write!(f, "processing"),
            TurnState::Speaking => write!(f, "speaking"),
        }
    }
}

/// Turn-state flags shared by the coordinator, dispatcher and speech streamer.
///
/// Processing is claimed with a non-blocking compare-exchange; Speaking is an
/// async FIFO gate so at most one speaker writes to the outbound sink.
#[derive(Debug, Default)]
pub struct TurnFlags {
    processing: AtomicBool,
    speaking: AtomicBool,
    speech_gate: Arc<tokio::sync::Mutex<()>>,
}

impl TurnFlags {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Speaking takes precedence when both flags are held.
    pub fn state(&self) -> TurnState {
        if self.speaking.load(Ordering::Acquire) {
            TurnState::Speaking
        } else if self.processing.load(Ordering::Acquire) {
            TurnState::Processing
        } else {
            TurnState::Idle
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state() == TurnState::Idle
    }

    /// Claim the Processing flag, or `None` if a turn is already in flight.
    pub fn try_begin_processing(self: &Arc<Self>) -> Option<ProcessingGuard> {
        self.processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ProcessingGuard {
                flags: Arc::clone(self),
            })
    }

    /// Wait for the speech gate and mark Speaking.
    pub async fn begin_speaking(self: &Arc<Self>) -> SpeakingGuard {
        let permit = Arc::clone(&self.speech_gate).lock_owned().await;
        self.speaking.store(true, Ordering::Release);
        SpeakingGuard {
            flags: Arc::clone(self),
            _permit: permit,
        }
    }
}

/// Releases Processing on drop.
#[derive(Debug)]
pub struct ProcessingGuard {
    flags: Arc<TurnFlags>,
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        self.flags.processing.store(false, Ordering::Release);
    }
}

/// Releases Speaking and the speech gate on drop.
#[derive(Debug)]
pub struct SpeakingGuard {
    flags: Arc<TurnFlags>,
    _permit: OwnedMutexGuard<()>,
}

impl Drop for SpeakingGuard {
    fn drop(&mut self) {
        // Cleared before the permit drops so the next speaker sets it again.
        self.flags.speaking.store(false, Ordering::Release);
    }
}

/// Suppresses a repeated final transcript inside a short window.
#[derive(Debug, Clone)]
pub struct DedupWindow {
    window: Duration,
    last: Option<(String, Instant)>,
}

impl DedupWindow {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    pub fn is_duplicate(&self, text: &str, now: Instant) -> bool {
        match &self.last {
            Some((last_text, at)) => last_text == text && now.saturating_duration_since(*at) < self.window,
            None => false,
        }
    }

    pub fn record(&mut self, text: &str, now: Instant) {
        self.last = Some((text.to_string(), now));
    }

    pub fn last_text(&self) -> Option<&str> {
        self.last.as_ref().map(|(text, _)| text.as_str())
    }
}

/// Append-only conversation history for one session.
#[derive(Debug, Clone, Default)]
pub struct ChatHistory {
    inner: Arc<Mutex<Vec<Utterance>>>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, utterance: Utterance) {
        self.inner.lock().push(utterance);
    }

    /// Copy of the history, oldest first.
    pub fn snapshot(&self) -> Vec<Utterance> {
        self.inner.lock().clone()
    }

    /// Copy of the history without the most recent `n` entries.
    pub fn snapshot_excluding_last(&self, n: usize) -> Vec<Utterance> {
        let guard = self.inner.lock();
        let end = guard.len().saturating_sub(n);
        guard[..end].to_vec()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
