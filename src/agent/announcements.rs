//! Out-of-band narrations ("Let me look that up...") produced while the
//! reasoner runs tools.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, Notify, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::speech::SpeechOutputStreamer;
use super::transcript::TranscriptSink;
use crate::core::reasoner::AnnouncementCallback;

struct Inner {
    tx: mpsc::UnboundedSender<String>,
    rx: Mutex<mpsc::UnboundedReceiver<String>>,
    /// Enqueued but not yet fully spoken
    outstanding: AtomicUsize,
    drained: Notify,
}

/// Unbounded FIFO of narrations with a drain barrier.
#[derive(Clone)]
pub struct AnnouncementChannel {
    inner: Arc<Inner>,
}

impl Default for AnnouncementChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl AnnouncementChannel {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Inner {
                tx,
                rx: Mutex::new(rx),
                outstanding: AtomicUsize::new(0),
                drained: Notify::new(),
            }),
        }
    }

    /// Enqueue a narration. Synchronous, non-blocking and infallible.
    pub fn announce(&self, text: impl Into<String>) {
        let text = text.into();
        if text.trim().is_empty() {
            return;
        }
        self.inner.outstanding.fetch_add(1, Ordering::AcqRel);
        if self.inner.tx.send(text).is_err() {
            self.mark_done();
        }
    }

    /// Callback suitable for [`BaseReasoner::on_tool_announcement`].
    ///
    /// [`BaseReasoner::on_tool_announcement`]: crate::core::reasoner::BaseReasoner::on_tool_announcement
    pub fn callback(&self) -> AnnouncementCallback {
        let channel = self.clone();
        Arc::new(move |text: String| channel.announce(text))
    }

    /// Narrations enqueued and not yet spoken.
    pub fn pending(&self) -> usize {
        self.inner.outstanding.load(Ordering::Acquire)
    }

    /// Resolve once every enqueued narration has been spoken or discarded.
    pub async fn wait_drained(&self) {
        loop {
            let notified = self.inner.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Next narration, or `None` if nothing arrives within `poll`.
    pub async fn next(&self, poll: Duration) -> Option<String> {
        let mut rx = self.inner.rx.lock().await;
        tokio::time::timeout(poll, rx.recv()).await.ok().flatten()
    }

    fn mark_done(&self) {
        let previous = self
            .inner
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .unwrap_or(0);
        if previous <= 1 {
            self.inner.drained.notify_waiters();
        }
    }

    /// Discard everything still queued. Returns how many were dropped.
    pub fn drain(&self) -> usize {
        let Ok(mut rx) = self.inner.rx.try_lock() else {
            return 0;
        };
        let mut dropped = 0;
        while rx.try_recv().is_ok() {
            dropped += 1;
            self.mark_done();
        }
        dropped
    }
}

/// Marks one narration finished even if speaking is cancelled.
struct Completion<'a>(&'a AnnouncementChannel);

impl Drop for Completion<'_> {
    fn drop(&mut self) {
        self.0.mark_done();
    }
}

/// Consumer task: emit and speak each narration in arrival order.
pub async fn run_announcements(
    channel: AnnouncementChannel,
    transcript: TranscriptSink,
    speech: SpeechOutputStreamer,
    poll: Duration,
    cancel: CancellationToken,
) {
    debug!("Announcement consumer started");
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = channel.next(poll) => next,
        };
        let Some(text) = next else { continue };

        let _done = Completion(&channel);
        info!(text_length = text.len(), "Speaking tool announcement");
        transcript.emit(&text, false).await;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = speech.speak(&text) => {}
        }
    }
    debug!("Announcement consumer stopped");
}
