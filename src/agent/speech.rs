//! Streams synthesized speech into the agent's outbound track.

use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, error, warn};

use super::room::{OutboundTrack, RoomConnection};
use super::state::TurnFlags;
use crate::core::tts::{BaseTTS, TTSError};

/// How a `speak` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakOutcome {
    /// Every chunk was handed to the sink
    Completed { frames_sent: usize },
    /// Nothing was spoken because the room is not connected
    RoomDisconnected,
    /// Nothing was spoken because the outbound track is gone
    TrackUnpublished,
    /// The room or track went away mid-stream
    Interrupted { frames_sent: usize },
    QuotaExceeded { frames_sent: usize },
    SynthesisFailed { frames_sent: usize },
}

impl SpeakOutcome {
    pub fn frames_sent(&self) -> usize {
        match self {
            SpeakOutcome::Completed { frames_sent }
            | SpeakOutcome::Interrupted { frames_sent }
            | SpeakOutcome::QuotaExceeded { frames_sent }
            | SpeakOutcome::SynthesisFailed { frames_sent } => *frames_sent,
            SpeakOutcome::RoomDisconnected | SpeakOutcome::TrackUnpublished => 0,
        }
    }
}

#[derive(Clone)]
pub struct SpeechOutputStreamer {
    room: Arc<dyn RoomConnection>,
    track: Arc<OutboundTrack>,
    tts: Arc<dyn BaseTTS>,
    flags: Arc<TurnFlags>,
}

impl SpeechOutputStreamer {
    pub fn new(
        room: Arc<dyn RoomConnection>,
        track: Arc<OutboundTrack>,
        tts: Arc<dyn BaseTTS>,
        flags: Arc<TurnFlags>,
    ) -> Self {
        Self {
            room,
            track,
            tts,
            flags,
        }
    }

    fn precheck(&self, text: &str) -> Option<SpeakOutcome> {
        if !self.room.is_connected() {
            warn!(
                room_state = %self.room.connection_state(),
                text_length = text.len(),
                "Audio: Room disconnected, skipping output"
            );
            return Some(SpeakOutcome::RoomDisconnected);
        }
        if !self.track.is_published() {
            warn!(
                text_length = text.len(),
                "Audio: Track not published, skipping output"
            );
            return Some(SpeakOutcome::TrackUnpublished);
        }
        None
    }

    /// Synthesize `text` and stream it to the outbound track.
    ///
    /// Holds Speaking for the whole call. Never fails: problems are logged
    /// and reported through the returned outcome.
    pub async fn speak(&self, text: &str) -> SpeakOutcome {
        if let Some(outcome) = self.precheck(text) {
            return outcome;
        }

        let _speaking = self.flags.begin_speaking().await;

        // The gate may have been held by another speaker while the room went away.
        if let Some(outcome) = self.precheck(text) {
            return outcome;
        }

        let mut chunks = match self.tts.synthesize(text).await {
            Ok(chunks) => chunks,
            Err(e) => return synthesis_failed(e, text, 0),
        };

        let mut frames_sent = 0usize;
        while let Some(chunk) = chunks.next().await {
            if !self.room.is_connected() || !self.track.is_published() {
                debug!(
                    room_state = %self.room.connection_state(),
                    frames_sent,
                    "Audio: Room disconnected during synthesis"
                );
                return SpeakOutcome::Interrupted { frames_sent };
            }

            let frame = match chunk {
                Ok(Some(frame)) if !frame.is_empty() => frame,
                Ok(_) => continue,
                Err(e) => return synthesis_failed(e, text, frames_sent),
            };

            match self.track.sink().capture_frame(&frame).await {
                Ok(()) => frames_sent += 1,
                Err(e) if e.is_disconnect() => {
                    warn!(
                        frames_sent,
                        room_state = %self.room.connection_state(),
                        "Audio: Capture failed (invalid state): {e}"
                    );
                    return SpeakOutcome::Interrupted { frames_sent };
                }
                Err(e) => {
                    error!(frames_sent, "Audio: Error during frame capture: {e}");
                }
            }
        }

        if frames_sent > 0 {
            debug!(frames_sent, text_length = text.len(), "Audio: Output completed");
        }
        SpeakOutcome::Completed { frames_sent }
    }
}

fn synthesis_failed(e: TTSError, text: &str, frames_sent: usize) -> SpeakOutcome {
    if e.is_quota() {
        warn!(text_length = text.len(), frames_sent, "Audio: TTS quota exceeded: {e}");
        SpeakOutcome::QuotaExceeded { frames_sent }
    } else {
        error!(text_length = text.len(), frames_sent, "Audio: TTS synthesis error: {e}");
        SpeakOutcome::SynthesisFailed { frames_sent }
    }
}
