//! One conversational turn: wait out the pre-think delay, ask the reasoner,
//! then speak the reply or fall back to an apology transcript.
//!
//! Tool narrations queued while the reasoner works are always drained first,
//! on success and on failure alike.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use super::announcements::AnnouncementChannel;
use super::speech::{SpeakOutcome, SpeechOutputStreamer};
use super::state::ChatHistory;
use super::transcript::TranscriptSink;
use crate::core::reasoner::{BaseReasoner, Utterance};

/// Spoken-to-transcript fallback when the reasoner fails.
pub const APOLOGY: &str = "I'm sorry, I encountered an error. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Replied(SpeakOutcome),
    /// The reasoner failed; only the apology transcript was emitted
    Failed,
}

/// Turns one accepted utterance into a spoken reply.
#[derive(Clone)]
pub struct ResponseDispatcher {
    reasoner: Arc<dyn BaseReasoner>,
    history: ChatHistory,
    transcript: TranscriptSink,
    speech: SpeechOutputStreamer,
    announcements: AnnouncementChannel,
    pre_think_delay: Duration,
}

impl ResponseDispatcher {
    pub fn new(
        reasoner: Arc<dyn BaseReasoner>,
        history: ChatHistory,
        transcript: TranscriptSink,
        speech: SpeechOutputStreamer,
        announcements: AnnouncementChannel,
        pre_think_delay: Duration,
    ) -> Self {
        Self {
            reasoner,
            history,
            transcript,
            speech,
            announcements,
            pre_think_delay,
        }
    }

    /// `prior` is the history up to, but excluding, `utterance`.
    pub async fn dispatch(&self, utterance: &str, prior: Vec<Utterance>) -> DispatchOutcome {
        tokio::time::sleep(self.pre_think_delay).await;

        match self.reasoner.respond(utterance, &prior).await {
            Ok(reply) => {
                self.announcements.wait_drained().await;

                info!(text_length = reply.len(), "Agent reply ready");
                self.history.push(Utterance::assistant(reply.clone()));
                self.transcript.emit(&reply, false).await;
                DispatchOutcome::Replied(self.speech.speak(&reply).await)
            }
            Err(e) => {
                error!("Reasoner failed: {e}");
                self.announcements.wait_drained().await;
                self.transcript.emit(APOLOGY, false).await;
                DispatchOutcome::Failed
            }
        }
    }
}
