mod base;
pub mod openai;

// Re-export public types and traits
pub use base::{
    BaseSTT, STTConfig, STTError, STTInput, STTStream, SpeechAlternative, SpeechEvent,
};

// Re-export OpenAI implementation
pub use openai::{OpenAISTT, OpenAISTTConfig, SilenceDetectionConfig};

/// Supported STT providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum STTProvider {
    /// OpenAI Whisper REST API
    OpenAI,
}

impl std::fmt::Display for STTProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            STTProvider::OpenAI => write!(f, "openai"),
        }
    }
}

impl std::str::FromStr for STTProvider {
    type Err = STTError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" | "whisper" => Ok(STTProvider::OpenAI),
            _ => Err(STTError::ConfigurationError(format!(
                "Unsupported STT provider: {s}. Supported providers: openai"
            ))),
        }
    }
}

/// Factory function to create STT providers by name.
///
/// # Examples
/// ```rust,no_run
/// use paradise_agent::core::stt::{create_stt_provider, STTConfig};
///
/// let config = STTConfig {
///     api_key: "sk-...".to_string(),
///     ..Default::default()
/// };
/// let stt = create_stt_provider("openai", config).unwrap();
/// ```
pub fn create_stt_provider(
    provider: &str,
    config: STTConfig,
) -> Result<Box<dyn BaseSTT>, STTError> {
    match provider.parse::<STTProvider>()? {
        STTProvider::OpenAI => Ok(Box::new(OpenAISTT::new(config)?)),
    }
}

/// Get a list of all supported STT providers
pub fn get_supported_stt_providers() -> Vec<&'static str> {
    vec!["openai"]
}
