//! Gates recognizer events into conversational turns.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, Fuse, FusedFuture};
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::dispatcher::ResponseDispatcher;
use super::state::{ChatHistory, DedupWindow, TurnFlags};
use super::transcript::TranscriptSink;
use crate::core::reasoner::Utterance;
use crate::core::stt::SpeechEvent;

/// Why an event did not start a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Interim,
    Empty,
    Duplicate,
    Busy,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Interim => write!(f, "interim"),
            Rejection::Empty => write!(f, "empty"),
            Rejection::Duplicate => write!(f, "duplicate"),
            Rejection::Busy => write!(f, "busy"),
        }
    }
}

pub struct TranscriptionCoordinator {
    flags: Arc<TurnFlags>,
    dedup: DedupWindow,
    history: ChatHistory,
    transcript: TranscriptSink,
    dispatcher: ResponseDispatcher,
}

impl TranscriptionCoordinator {
    pub fn new(
        flags: Arc<TurnFlags>,
        dedup_window: Duration,
        history: ChatHistory,
        transcript: TranscriptSink,
        dispatcher: ResponseDispatcher,
    ) -> Self {
        Self {
            flags,
            dedup: DedupWindow::new(dedup_window),
            history,
            transcript,
            dispatcher,
        }
    }

    /// Apply the gating rules in order: interim, empty, duplicate, busy.
    pub fn gate(&self, event: &SpeechEvent, now: Instant) -> Result<String, Rejection> {
        if !event.is_final() {
            return Err(Rejection::Interim);
        }
        let text = event.top_text().map(str::trim).unwrap_or_default();
        if text.is_empty() {
            return Err(Rejection::Empty);
        }
        if self.dedup.is_duplicate(text, now) {
            return Err(Rejection::Duplicate);
        }
        if !self.flags.is_idle() {
            return Err(Rejection::Busy);
        }
        Ok(text.to_string())
    }

    /// Accept or drop one event. On acceptance returns the turn to drive.
    pub fn handle(&mut self, event: &SpeechEvent) -> Result<BoxFuture<'static, ()>, Rejection> {
        let now = Instant::now();
        let text = self.gate(event, now)?;
        let processing = self.flags.try_begin_processing().ok_or(Rejection::Busy)?;

        self.dedup.record(&text, now);
        self.history.push(Utterance::user(text.clone()));
        let prior = self.history.snapshot_excluding_last(1);
        info!(text_length = text.len(), "User turn accepted");

        let transcript = self.transcript.clone();
        let dispatcher = self.dispatcher.clone();
        Ok(async move {
            let _processing = processing;
            transcript.emit(&text, true).await;
            let outcome = dispatcher.dispatch(&text, prior).await;
            debug!(?outcome, "Turn finished");
        }
        .boxed())
    }

    /// Consume recognizer events until the stream ends or `cancel` fires.
    ///
    /// The in-flight turn is driven here alongside event consumption, so
    /// events arriving mid-turn are evaluated and dropped, never queued.
    pub async fn run(mut self, mut events: BoxStream<'static, SpeechEvent>, cancel: CancellationToken) {
        let mut turn: Fuse<BoxFuture<'static, ()>> = Fuse::terminated();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = &mut turn, if !turn.is_terminated() => {}
                event = events.next() => {
                    let Some(event) = event else {
                        info!("Recognizer event stream ended");
                        break;
                    };
                    match self.handle(&event) {
                        Ok(next) => turn = next.fuse(),
                        Err(reason) => debug!(%reason, %event, "Recognizer event dropped"),
                    }
                }
            }
        }

        if !turn.is_terminated() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {}
                _ = &mut turn => {}
            }
        }
        debug!("Transcription coordinator stopped");
    }
}
