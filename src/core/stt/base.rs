//! Base traits and types for streaming speech recognizers.
//!
//! A recognizer is opened once per session with [`BaseSTT::stream`], which
//! splits it into an input half (frames are pushed from the ingest task) and
//! an event half (consumed by the transcription task).

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::audio::AudioFrame;

/// Errors produced by speech recognizers.
#[derive(Debug, Error)]
pub enum STTError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Audio processing error: {0}")]
    AudioProcessingError(String),

    /// Input was pushed after `end_input` or `close`
    #[error("Recognizer input closed")]
    InputClosed,

    #[error("Operation timed out: {0}")]
    Timeout(String),
}

/// Configuration shared by all recognizer providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct STTConfig {
    /// Provider name (e.g., "openai")
    pub provider: String,
    /// API key for the provider
    pub api_key: String,
    /// Language code (e.g., "en")
    pub language: String,
    /// Sample rate of the pushed audio in Hz
    pub sample_rate: u32,
    /// Number of channels of the pushed audio
    pub channels: u16,
    /// Model name (provider specific)
    pub model: String,
}

impl Default for STTConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            api_key: String::new(),
            language: "en".to_string(),
            sample_rate: 16000,
            channels: 1,
            model: "whisper-1".to_string(),
        }
    }
}

/// One ranked hypothesis of a recognition result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechAlternative {
    pub text: String,
    pub confidence: f32,
}

impl SpeechAlternative {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// Event emitted by a recognizer stream.
#[derive(Debug, Clone, PartialEq)]
pub enum SpeechEvent {
    /// Partial hypothesis that may still change
    Interim { alternatives: Vec<SpeechAlternative> },
    /// Stable, complete hypothesis for an utterance
    Final { alternatives: Vec<SpeechAlternative> },
}

impl SpeechEvent {
    /// Convenience constructor for a final event with a single alternative.
    pub fn final_text(text: impl Into<String>) -> Self {
        SpeechEvent::Final {
            alternatives: vec![SpeechAlternative::new(text, 1.0)],
        }
    }

    /// Convenience constructor for an interim event with a single alternative.
    pub fn interim_text(text: impl Into<String>) -> Self {
        SpeechEvent::Interim {
            alternatives: vec![SpeechAlternative::new(text, 0.0)],
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, SpeechEvent::Final { .. })
    }

    pub fn alternatives(&self) -> &[SpeechAlternative] {
        match self {
            SpeechEvent::Interim { alternatives } | SpeechEvent::Final { alternatives } => {
                alternatives
            }
        }
    }

    /// Text of the highest ranked alternative, if any.
    pub fn top_text(&self) -> Option<&str> {
        self.alternatives().first().map(|alt| alt.text.as_str())
    }
}

impl fmt::Display for SpeechEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_final() { "final" } else { "interim" };
        write!(f, "{kind}({:?})", self.top_text().unwrap_or(""))
    }
}

/// Input half of an open recognition stream.
#[async_trait]
pub trait STTInput: Send + Sync {
    /// Queue a frame for recognition. Must not block.
    fn push_frame(&self, frame: AudioFrame) -> Result<(), STTError>;

    /// Signal that no more audio will be pushed.
    fn end_input(&self);

    /// Close the stream and wait for in-flight recognition to finish.
    async fn close(&self) -> Result<(), STTError>;
}

/// An open recognition stream.
pub struct STTStream {
    pub input: Arc<dyn STTInput>,
    pub events: BoxStream<'static, SpeechEvent>,
}

impl fmt::Debug for STTStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("STTStream").finish_non_exhaustive()
    }
}

/// Base trait for streaming speech recognizers.
#[async_trait]
pub trait BaseSTT: Send + Sync {
    /// Open a recognition stream for one session.
    async fn stream(&self) -> Result<STTStream, STTError>;

    /// Human readable provider description.
    fn get_provider_info(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_text_picks_first_alternative() {
        let event = SpeechEvent::Final {
            alternatives: vec![
                SpeechAlternative::new("hello there", 0.9),
                SpeechAlternative::new("hollow there", 0.4),
            ],
        };
        assert!(event.is_final());
        assert_eq!(event.top_text(), Some("hello there"));
    }

    #[test]
    fn test_empty_alternatives() {
        let event = SpeechEvent::Interim {
            alternatives: Vec::new(),
        };
        assert!(!event.is_final());
        assert_eq!(event.top_text(), None);
        assert_eq!(event.to_string(), "interim(\"\")");
    }

    #[test]
    fn test_error_display() {
        assert_eq!(STTError::InputClosed.to_string(), "Recognizer input closed");
        let err = STTError::NetworkError("reset".to_string());
        assert!(err.to_string().contains("Network error"));
    }
}
