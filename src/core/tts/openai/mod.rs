//! OpenAI Text-to-Speech integration.

mod config;
mod provider;

pub use config::{OPENAI_PCM_SAMPLE_RATE, OpenAITTSConfig, SUPPORTED_VOICES};
pub use provider::OpenAITTS;
