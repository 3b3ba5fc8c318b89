use serde::Deserialize;
use std::path::Path;

use super::ConfigError;

/// Complete YAML configuration structure
///
/// Every field is optional. Values present here override the environment.
///
/// # Example YAML structure
/// ```yaml
/// livekit:
///   url: "wss://paradise.livekit.cloud"
///   api_key: "your-api-key"
///   api_secret: "your-api-secret"
///
/// openai:
///   api_key: "sk-..."
///   chat_model: "gpt-4o-mini"
///   tts_voice: "alloy"
///
/// agent:
///   identity: "paradise-agent"
///   greeting: "Hello! Where would you like to go?"
///
/// timing:
///   dedup_window_ms: 2000
///   pre_think_delay_ms: 500
///
/// tools:
///   serpapi_api_key: "..."
///   google_places_api_key: "..."
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub livekit: Option<LiveKitYaml>,
    pub openai: Option<OpenAIYaml>,
    pub agent: Option<AgentYaml>,
    pub timing: Option<TimingYaml>,
    pub tools: Option<ToolsYaml>,
}

/// LiveKit connection settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LiveKitYaml {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
}

/// Provider settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct OpenAIYaml {
    pub api_key: Option<String>,
    /// Whisper model used for recognition
    pub stt_model: Option<String>,
    pub tts_model: Option<String>,
    pub tts_voice: Option<String>,
    pub chat_model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tool_rounds: Option<u32>,
}

/// Agent persona from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AgentYaml {
    pub identity: Option<String>,
    pub name: Option<String>,
    /// Empty string disables the greeting
    pub greeting: Option<String>,
    pub language: Option<String>,
    pub system_prompt: Option<String>,
    /// Directory of travel guides for retrieval
    pub knowledge_dir: Option<String>,
}

/// Keys for the live lookup tools; a tool is registered only when its key is set
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ToolsYaml {
    pub serpapi_api_key: Option<String>,
    pub google_places_api_key: Option<String>,
}

/// Orchestrator timings from YAML, all in milliseconds
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TimingYaml {
    pub dedup_window_ms: Option<u64>,
    pub pre_think_delay_ms: Option<u64>,
    pub announcement_poll_ms: Option<u64>,
    pub participant_timeout_ms: Option<u64>,
    pub audio_track_timeout_ms: Option<u64>,
    pub audio_track_poll_ms: Option<u64>,
    pub disconnect_poll_ms: Option<u64>,
    pub recognizer_close_timeout_ms: Option<u64>,
    pub task_shutdown_timeout_ms: Option<u64>,
    pub inbound_sample_rate: Option<u32>,
    pub inbound_channels: Option<u32>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the YAML is malformed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}
