//! Real-time turn-taking orchestrator.
//!
//! One [`AgentSession`] per room join. The session wires the recognizer,
//! reasoner and synthesizer together through four long-running tasks:
//!
//! - audio ingest: inbound frames into the recognizer
//! - transcription: recognizer events gated into turns and dispatched
//! - announcements: tool narrations spoken as they arrive
//! - disconnect watch: room state polling
//!
//! All four share one cancellation token owned by the [`ShutdownCoordinator`].

use std::time::Duration;

use thiserror::Error;

use crate::core::stt::STTError;

pub mod announcements;
pub mod coordinator;
pub mod dispatcher;
pub mod ingest;
pub mod room;
pub mod session;
pub mod setup;
pub mod shutdown;
pub mod speech;
pub mod state;
pub mod transcript;

pub use announcements::{AnnouncementChannel, run_announcements};
pub use coordinator::{Rejection, TranscriptionCoordinator};
pub use dispatcher::{APOLOGY, DispatchOutcome, ResponseDispatcher};
pub use ingest::run_ingest;
pub use room::{
    AGENT_TRACK_NAME, AudioSink, AudioStream, OutboundTrack, RoomConnection,
    RoomConnectionState, RoomError, TRANSCRIPT_TOPIC,
};
pub use session::{AgentSession, DEFAULT_GREETING, SessionConfig, SessionSummary};
pub use setup::{ConnectionSetup, Established, SetupConfig};
pub use shutdown::{CleanupGuard, ShutdownCoordinator, ShutdownPhase, ShutdownTrigger};
pub use speech::{SpeakOutcome, SpeechOutputStreamer};
pub use state::{ChatHistory, DedupWindow, TurnFlags, TurnState};
pub use transcript::{TranscriptEvent, TranscriptSink};

/// Session setup failures. Fatal to the session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No participant joined within {0:?}")]
    NoParticipant(Duration),

    #[error("No audio track from participant '{participant}' within {waited:?}")]
    NoAudioTrack { participant: String, waited: Duration },

    #[error("Room error: {0}")]
    Room(#[from] RoomError),

    #[error("Recognizer error: {0}")]
    Recognizer(#[from] STTError),
}
