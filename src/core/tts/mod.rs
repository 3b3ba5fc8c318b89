mod base;
pub mod openai;

pub use base::{BaseTTS, BoxedTTS, SynthesisStream, TTSConfig, TTSError, TTSResult};
pub use openai::{OPENAI_PCM_SAMPLE_RATE, OpenAITTS, OpenAITTSConfig};

/// Factory function to create a TTS provider.
///
/// # Supported Providers
///
/// - `"openai"` - OpenAI TTS API (tts-1, tts-1-hd, gpt-4o-mini-tts)
pub fn create_tts_provider(provider_type: &str, config: TTSConfig) -> TTSResult<Box<dyn BaseTTS>> {
    match provider_type.to_lowercase().as_str() {
        "openai" => Ok(Box::new(OpenAITTS::new(config)?)),
        _ => Err(TTSError::InvalidConfiguration(format!(
            "Unsupported TTS provider: {provider_type}. Supported providers: openai"
        ))),
    }
}
