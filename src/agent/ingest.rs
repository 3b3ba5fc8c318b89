use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::room::AudioStream;
use crate::core::stt::{STTError, STTInput};

/// Forward inbound frames to the recognizer until the stream closes, the
/// recognizer stops accepting input, or `cancel` fires.
///
/// Returns the number of frames forwarded.
pub async fn run_ingest(
    mut audio: AudioStream,
    recognizer: Arc<dyn STTInput>,
    cancel: CancellationToken,
) -> u64 {
    let mut frames_forwarded = 0u64;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = audio.next() => next,
        };

        match next {
            None => {
                info!(frames_forwarded, "Inbound audio stream closed");
                break;
            }
            Some(Ok(frame)) if frame.is_empty() => continue,
            Some(Ok(frame)) => match recognizer.push_frame(frame) {
                Ok(()) => frames_forwarded += 1,
                Err(STTError::InputClosed) => {
                    debug!(frames_forwarded, "Recognizer input closed, stopping ingest");
                    break;
                }
                Err(e) => {
                    error!(frames_forwarded, "Failed to forward audio frame: {e}");
                    break;
                }
            },
            Some(Err(e)) => {
                error!(frames_forwarded, "Inbound audio stream failed: {e}");
                break;
            }
        }
    }

    debug!(frames_forwarded, "Audio ingest stopped");
    frames_forwarded
}
