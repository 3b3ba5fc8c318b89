use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::audio::AudioFrame;

/// Errors produced by speech synthesizers.
#[derive(Debug, Error)]
pub enum TTSError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    /// Account quota exhausted or rate limited (HTTP 429, `insufficient_quota`)
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Audio generation failed: {0}")]
    AudioGenerationFailed(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl TTSError {
    /// Whether the failure is a quota or rate-limit condition.
    ///
    /// Providers that surface quota problems as generic errors are caught by
    /// inspecting the message for the usual markers.
    pub fn is_quota(&self) -> bool {
        match self {
            TTSError::QuotaExceeded(_) => true,
            other => {
                let msg = other.to_string();
                msg.contains("429") || msg.contains("insufficient_quota") || msg.contains("quota")
            }
        }
    }
}

pub type TTSResult<T> = Result<T, TTSError>;

/// Lazy, finite stream of synthesized chunks. `None` marks an empty chunk.
pub type SynthesisStream = BoxStream<'static, TTSResult<Option<AudioFrame>>>;

/// Configuration shared by all synthesizer providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TTSConfig {
    /// Provider name (e.g., "openai")
    pub provider: String,
    pub api_key: String,
    /// Voice identifier (provider specific)
    pub voice_id: Option<String>,
    pub model: String,
    /// Speaking rate multiplier, 1.0 is normal
    pub speaking_rate: Option<f32>,
}

impl Default for TTSConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            api_key: String::new(),
            voice_id: None,
            model: String::new(),
            speaking_rate: None,
        }
    }
}

/// Base trait for text-to-speech providers.
#[async_trait]
pub trait BaseTTS: Send + Sync {
    /// Output sample rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Output channel count.
    fn num_channels(&self) -> u32;

    /// Start synthesizing `text`. Chunks are produced lazily as the stream is polled.
    async fn synthesize(&self, text: &str) -> TTSResult<SynthesisStream>;

    /// Human readable provider description.
    fn get_provider_info(&self) -> &'static str;
}

pub type BoxedTTS = Box<dyn BaseTTS>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_classification() {
        assert!(TTSError::QuotaExceeded("slow down".into()).is_quota());
        assert!(TTSError::ProviderError("HTTP 429 Too Many Requests".into()).is_quota());
        assert!(TTSError::ProviderError("code: insufficient_quota".into()).is_quota());
        assert!(!TTSError::NetworkError("connection reset".into()).is_quota());
        assert!(!TTSError::AudioGenerationFailed("bad pcm".into()).is_quota());
    }
}
