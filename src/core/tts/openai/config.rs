//! Configuration for the OpenAI speech synthesizer.

use std::time::Duration;

use crate::core::openai::OPENAI_BASE_URL;
use crate::core::tts::base::TTSConfig;

/// PCM output of the speech endpoint is fixed at 24kHz mono s16le.
pub const OPENAI_PCM_SAMPLE_RATE: u32 = 24000;

/// Voices accepted by the speech endpoint.
pub const SUPPORTED_VOICES: &[&str] = &[
    "alloy", "ash", "ballad", "coral", "echo", "fable", "onyx", "nova", "sage", "shimmer", "verse",
];

#[derive(Debug, Clone)]
pub struct OpenAITTSConfig {
    pub base: TTSConfig,
    /// REST base URL, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Longest wait for the next chunk of audio. Replies are read at playback
    /// speed, so there is no limit on the request as a whole.
    pub read_timeout: Duration,
}

impl Default for OpenAITTSConfig {
    fn default() -> Self {
        Self {
            base: TTSConfig::default(),
            base_url: OPENAI_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(60),
        }
    }
}

impl OpenAITTSConfig {
    pub fn from_base(base: TTSConfig) -> Self {
        Self {
            base,
            ..Default::default()
        }
    }

    pub fn api_url(&self) -> String {
        crate::core::openai::endpoint(&self.base_url, "audio/speech")
    }

    pub fn model(&self) -> &str {
        if self.base.model.is_empty() {
            "tts-1"
        } else {
            &self.base.model
        }
    }

    pub fn voice(&self) -> &str {
        self.base.voice_id.as_deref().unwrap_or("alloy")
    }

    pub fn speed(&self) -> f32 {
        self.base.speaking_rate.unwrap_or(1.0)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.base.api_key.is_empty() {
            return Err("API key is required".to_string());
        }

        let voice = self.voice();
        if !SUPPORTED_VOICES.contains(&voice) {
            return Err(format!(
                "Unsupported voice '{voice}'. Supported voices: {}",
                SUPPORTED_VOICES.join(", ")
            ));
        }

        let speed = self.speed();
        if !(0.25..=4.0).contains(&speed) {
            return Err(format!("Speed must be between 0.25 and 4.0, got {speed}"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyed() -> OpenAITTSConfig {
        OpenAITTSConfig::from_base(TTSConfig {
            api_key: "sk-test".to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_defaults() {
        let config = keyed();
        assert_eq!(config.model(), "tts-1");
        assert_eq!(config.voice(), "alloy");
        assert_eq!(config.speed(), 1.0);
        assert_eq!(config.api_url(), "https://api.openai.com/v1/audio/speech");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_voice() {
        let mut config = keyed();
        config.base.voice_id = Some("robot".to_string());
        assert!(config.validate().unwrap_err().contains("Unsupported voice"));
    }

    #[test]
    fn test_validate_rejects_speed_out_of_range() {
        let mut config = keyed();
        config.base.speaking_rate = Some(5.0);
        assert!(config.validate().unwrap_err().contains("Speed"));
    }

    #[test]
    fn test_validate_requires_key() {
        assert!(
            OpenAITTSConfig::default()
                .validate()
                .unwrap_err()
                .contains("API key")
        );
    }
}
