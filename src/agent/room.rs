//! Contract between the orchestrator and the real-time room transport.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::core::audio::AudioFrame;

/// Well-known name of the agent's outbound audio track.
pub const AGENT_TRACK_NAME: &str = "agent-voice";

/// Data topic carrying transcript events.
pub const TRANSCRIPT_TOPIC: &str = "transcript";

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Room disconnected")]
    Disconnected,

    /// The transport rejected the call because the track or peer is gone
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Publish failed: {0}")]
    PublishFailed(String),

    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl RoomError {
    /// Whether further writes to the room are pointless.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, RoomError::Disconnected | RoomError::InvalidState(_))
    }

    /// Classify a raw transport error message.
    pub fn from_transport_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if message.contains("InvalidState") || lower.contains("invalid state") || message.contains("RtcError") {
            RoomError::InvalidState(message)
        } else if lower.contains("disconnected") || lower.contains("closed") {
            RoomError::Disconnected
        } else {
            RoomError::Transport(message)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomConnectionState {
    Disconnected,
    Connected,
    Reconnecting,
}

impl fmt::Display for RoomConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomConnectionState::Disconnected => write!(f, "disconnected"),
            RoomConnectionState::Connected => write!(f, "connected"),
            RoomConnectionState::Reconnecting => write!(f, "reconnecting"),
        }
    }
}

/// Inbound audio from a remote participant.
pub type AudioStream = BoxStream<'static, Result<AudioFrame, RoomError>>;

/// Writable end of a published outbound track.
#[async_trait]
pub trait AudioSink: Send + Sync {
    async fn capture_frame(&self, frame: &AudioFrame) -> Result<(), RoomError>;
}

/// A joined room.
#[async_trait]
pub trait RoomConnection: Send + Sync {
    fn connection_state(&self) -> RoomConnectionState;

    fn is_connected(&self) -> bool {
        self.connection_state() == RoomConnectionState::Connected
    }

    /// Identities of the remote participants currently present.
    fn remote_participants(&self) -> Vec<String>;

    /// Open the participant's first audio track, if one is subscribed yet.
    async fn open_audio_stream(
        &self,
        participant: &str,
        sample_rate: u32,
        num_channels: u32,
    ) -> Result<Option<AudioStream>, RoomError>;

    /// Create and publish an outbound audio track.
    async fn publish_audio_track(
        &self,
        name: &str,
        sample_rate: u32,
        num_channels: u32,
    ) -> Result<Arc<dyn AudioSink>, RoomError>;

    async fn unpublish_audio_track(&self, name: &str) -> Result<(), RoomError>;

    /// Send a reliable data packet on `topic`.
    async fn publish_data(&self, topic: &str, payload: Vec<u8>) -> Result<(), RoomError>;

    /// Leave the room.
    async fn disconnect(&self) -> Result<(), RoomError>;
}

/// The agent's published voice track.
pub struct OutboundTrack {
    name: String,
    sink: Arc<dyn AudioSink>,
    sample_rate: u32,
    num_channels: u32,
    published: AtomicBool,
}

impl OutboundTrack {
    pub fn new(name: impl Into<String>, sink: Arc<dyn AudioSink>, sample_rate: u32, num_channels: u32) -> Self {
        Self {
            name: name.into(),
            sink,
            sample_rate,
            num_channels,
            published: AtomicBool::new(true),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sink(&self) -> &Arc<dyn AudioSink> {
        &self.sink
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn num_channels(&self) -> u32 {
        self.num_channels
    }

    pub fn is_published(&self) -> bool {
        self.published.load(Ordering::Acquire)
    }

    /// Returns true on the first call only.
    pub fn mark_unpublished(&self) -> bool {
        self.published.swap(false, Ordering::AcqRel)
    }
}

impl fmt::Debug for OutboundTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutboundTrack")
            .field("name", &self.name)
            .field("sample_rate", &self.sample_rate)
            .field("published", &self.is_published())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_message_classification() {
        assert!(RoomError::from_transport_message("RtcError { error_type: InvalidState }").is_disconnect());
        assert!(RoomError::from_transport_message("track in invalid state").is_disconnect());
        assert!(RoomError::from_transport_message("engine disconnected").is_disconnect());
        assert!(!RoomError::from_transport_message("buffer full").is_disconnect());
        assert!(!RoomError::CaptureFailed("x".into()).is_disconnect());
    }

    struct NullSink;

    #[async_trait]
    impl AudioSink for NullSink {
        async fn capture_frame(&self, _: &AudioFrame) -> Result<(), RoomError> {
            Ok(())
        }
    }

    #[test]
    fn test_outbound_track_unpublish_once() {
        let track = OutboundTrack::new(AGENT_TRACK_NAME, Arc::new(NullSink), 24000, 1);
        assert!(track.is_published());
        assert!(track.mark_unpublished());
        assert!(!track.mark_unpublished());
        assert!(!track.is_published());
    }
}
