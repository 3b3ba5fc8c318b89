use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::room::{RoomConnection, TRANSCRIPT_TOPIC};

/// Transcript line pushed to the caller's UI over the data channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub text: String,
    pub is_user: bool,
}

impl TranscriptEvent {
    pub fn new(text: impl Into<String>, is_user: bool) -> Self {
        Self {
            event_type: "transcript".to_string(),
            text: text.into(),
            is_user,
        }
    }
}

/// Best-effort sink for transcript events. Failures are logged, never returned.
#[derive(Clone)]
pub struct TranscriptSink {
    room: Arc<dyn RoomConnection>,
}

impl TranscriptSink {
    pub fn new(room: Arc<dyn RoomConnection>) -> Self {
        Self { room }
    }

    pub async fn emit(&self, text: &str, is_user: bool) {
        if !self.room.is_connected() {
            debug!(is_user, "Room not connected, dropping transcript");
            return;
        }

        let payload = match serde_json::to_vec(&TranscriptEvent::new(text, is_user)) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to encode transcript: {e}");
                return;
            }
        };

        if let Err(e) = self.room.publish_data(TRANSCRIPT_TOPIC, payload).await {
            warn!(is_user, "Failed to publish transcript: {e}");
        }
    }
}
