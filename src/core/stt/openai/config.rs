//! Configuration types for the OpenAI (Whisper) recognizer.

use std::time::Duration;

use super::super::base::STTConfig;
use crate::core::openai::OPENAI_BASE_URL;

// =============================================================================
// Silence Detection
// =============================================================================

/// Configuration for silence-based utterance segmentation.
///
/// Durations are measured in audio time (accumulated frame durations), so
/// segmentation is independent of how fast frames are delivered.
#[derive(Debug, Clone, PartialEq)]
pub struct SilenceDetectionConfig {
    /// RMS energy threshold below which audio is considered silent.
    /// Default is 0.01 (relative to normalized audio -1.0 to 1.0).
    pub rms_threshold: f32,

    /// Trailing silence (ms) that closes an utterance. Default 1000ms.
    pub silence_duration_ms: u32,

    /// Minimum buffered audio (ms) before an utterance may be closed.
    /// Default is 500ms.
    pub min_audio_duration_ms: u32,

    /// Upper bound on one utterance (ms); longer speech is cut. Default 30s.
    pub max_segment_duration_ms: u32,
}

impl Default for SilenceDetectionConfig {
    fn default() -> Self {
        Self {
            rms_threshold: 0.01,
            silence_duration_ms: 1000,
            min_audio_duration_ms: 500,
            max_segment_duration_ms: 30_000,
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Configuration specific to the OpenAI transcription API.
#[derive(Debug, Clone)]
pub struct OpenAISTTConfig {
    /// Base STT configuration (shared across all providers).
    pub base: STTConfig,

    /// REST base URL, e.g. `https://api.openai.com/v1`.
    pub base_url: String,

    /// Temperature for sampling (0.0 to 1.0).
    pub temperature: Option<f32>,

    /// Optional text prompt to guide the transcription (place names, spelling).
    pub prompt: Option<String>,

    /// Per-request timeout.
    pub request_timeout: Duration,

    pub silence_detection: SilenceDetectionConfig,
}

impl Default for OpenAISTTConfig {
    fn default() -> Self {
        Self {
            base: STTConfig::default(),
            base_url: OPENAI_BASE_URL.to_string(),
            temperature: Some(0.0),
            prompt: None,
            request_timeout: Duration::from_secs(60),
            silence_detection: SilenceDetectionConfig::default(),
        }
    }
}

impl OpenAISTTConfig {
    /// Create a new configuration from base STTConfig.
    pub fn from_base(base: STTConfig) -> Self {
        Self {
            base,
            ..Default::default()
        }
    }

    /// Transcription endpoint URL.
    pub fn api_url(&self) -> String {
        crate::core::openai::endpoint(&self.base_url, "audio/transcriptions")
    }

    /// Model name sent to the API, falling back to `whisper-1`.
    pub fn model(&self) -> &str {
        if self.base.model.is_empty() {
            "whisper-1"
        } else {
            &self.base.model
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.base.api_key.is_empty() {
            return Err("API key is required".to_string());
        }

        if let Some(temp) = self.temperature
            && !(0.0..=1.0).contains(&temp)
        {
            return Err(format!(
                "Temperature must be between 0.0 and 1.0, got {temp}"
            ));
        }

        let silence = &self.silence_detection;
        if silence.max_segment_duration_ms < silence.min_audio_duration_ms {
            return Err(format!(
                "Max segment duration ({}ms) cannot be below min audio duration ({}ms)",
                silence.max_segment_duration_ms, silence.min_audio_duration_ms
            ));
        }

        Ok(())
    }
}
