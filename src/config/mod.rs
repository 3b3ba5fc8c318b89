//! Agent configuration.
//!
//! Loaded from environment variables (after `.env` is applied in `main`) or
//! from a YAML file layered over the environment. Priority: YAML > ENV vars >
//! .env values > defaults.
//!
//! # Example
//! ```rust,no_run
//! use paradise_agent::config::AgentConfig;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AgentConfig::from_env()?;
//! let config = AgentConfig::from_file(Path::new("agent.yaml"))?;
//! println!("Joining {}", config.livekit_url);
//! # Ok(())
//! # }
//! ```

use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

mod yaml;

pub use yaml::YamlConfig;

use crate::agent::{DEFAULT_GREETING, SessionConfig, SetupConfig};
use crate::core::reasoner::{GooglePlacesConfig, OpenAIReasonerConfig, SerpApiFlightsConfig};
use crate::core::reasoner::openai::DEFAULT_SYSTEM_PROMPT;
use crate::core::stt::STTConfig;
use crate::core::tts::TTSConfig;
use crate::livekit::AgentIdentity;

/// Variables that must be present before the agent can start.
pub const REQUIRED_VARS: [&str; 4] = [
    "LIVEKIT_URL",
    "LIVEKIT_API_KEY",
    "LIVEKIT_API_SECRET",
    "OPENAI_API_KEY",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variables: {}", .0.join(", "))]
    MissingVariables(Vec<String>),

    #[error("Invalid value for {name}: '{value}' ({reason})")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Failed to read config file {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to parse YAML config: {0}")]
    Parse(String),
}

/// Orchestrator timings and audio formats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingConfig {
    pub dedup_window_ms: u64,
    pub pre_think_delay_ms: u64,
    pub announcement_poll_ms: u64,
    pub participant_timeout_ms: u64,
    pub audio_track_timeout_ms: u64,
    pub audio_track_poll_ms: u64,
    pub disconnect_poll_ms: u64,
    pub recognizer_close_timeout_ms: u64,
    pub task_shutdown_timeout_ms: u64,
    pub inbound_sample_rate: u32,
    pub inbound_channels: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            dedup_window_ms: 2000,
            pre_think_delay_ms: 500,
            announcement_poll_ms: 100,
            participant_timeout_ms: 300_000,
            audio_track_timeout_ms: 10_000,
            audio_track_poll_ms: 100,
            disconnect_poll_ms: 500,
            recognizer_close_timeout_ms: 5000,
            task_shutdown_timeout_ms: 3000,
            inbound_sample_rate: 16000,
            inbound_channels: 1,
        }
    }
}

/// Agent configuration
///
/// Holds the LiveKit and OpenAI credentials, the agent persona and the
/// orchestrator timings. Secrets are zeroized when the value is dropped.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub livekit_url: String,
    pub livekit_api_key: String,
    pub livekit_api_secret: String,
    pub openai_api_key: String,

    pub agent_identity: String,
    pub agent_name: String,
    /// `None` disables the greeting
    pub greeting: Option<String>,
    pub language: String,
    pub system_prompt: String,
    /// Travel guides backing `retrieve_travel_info`; the tool is off when unset
    pub knowledge_dir: Option<PathBuf>,
    /// Enables `get_flight_prices`
    pub serpapi_api_key: Option<String>,
    /// Enables `search_places`
    pub google_places_api_key: Option<String>,

    pub stt_model: String,
    pub tts_model: String,
    pub tts_voice: String,
    pub chat_model: String,
    pub temperature: f32,
    pub max_tool_rounds: u32,

    pub timing: TimingConfig,
}

impl Drop for AgentConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        self.livekit_api_key.zeroize();
        self.livekit_api_secret.zeroize();
        self.openai_api_key.zeroize();
        self.serpapi_api_key.zeroize();
        self.google_places_api_key.zeroize();
    }
}

/// Non-empty value of an environment variable.
fn env_string(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                name: name.to_string(),
                value: raw,
                reason: e.to_string(),
            }),
    }
}

impl AgentConfig {
    /// Load configuration from environment variables only.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load configuration from a YAML file layered over the environment.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let yaml = YamlConfig::from_file(path)?;
        Self::load(Some(yaml))
    }

    fn load(yaml: Option<YamlConfig>) -> Result<Self, ConfigError> {
        let yaml = yaml.unwrap_or_default();
        let livekit = yaml.livekit.unwrap_or_default();
        let openai = yaml.openai.unwrap_or_default();
        let agent = yaml.agent.unwrap_or_default();
        let timing = yaml.timing.unwrap_or_default();
        let tools = yaml.tools.unwrap_or_default();

        // Required values are gathered first so every missing one is reported.
        let mut missing = Vec::new();
        let mut required = |yaml_value: Option<String>, name: &str| {
            match yaml_value.filter(|v| !v.trim().is_empty()).or_else(|| env_string(name)) {
                Some(value) => value,
                None => {
                    missing.push(name.to_string());
                    String::new()
                }
            }
        };
        let livekit_url = required(livekit.url, "LIVEKIT_URL");
        let livekit_api_key = required(livekit.api_key, "LIVEKIT_API_KEY");
        let livekit_api_secret = required(livekit.api_secret, "LIVEKIT_API_SECRET");
        let openai_api_key = required(openai.api_key, "OPENAI_API_KEY");
        if !missing.is_empty() {
            return Err(ConfigError::MissingVariables(missing));
        }

        let defaults = TimingConfig::default();
        let millis = |yaml_value: Option<u64>, name: &str, default: u64| -> Result<u64, ConfigError> {
            Ok(match yaml_value {
                Some(v) => v,
                None => env_parse(name)?.unwrap_or(default),
            })
        };
        let timing = TimingConfig {
            dedup_window_ms: millis(timing.dedup_window_ms, "DEDUP_WINDOW_MS", defaults.dedup_window_ms)?,
            pre_think_delay_ms: millis(
                timing.pre_think_delay_ms,
                "PRE_THINK_DELAY_MS",
                defaults.pre_think_delay_ms,
            )?,
            announcement_poll_ms: millis(
                timing.announcement_poll_ms,
                "ANNOUNCEMENT_POLL_MS",
                defaults.announcement_poll_ms,
            )?,
            participant_timeout_ms: millis(
                timing.participant_timeout_ms,
                "PARTICIPANT_TIMEOUT_MS",
                defaults.participant_timeout_ms,
            )?,
            audio_track_timeout_ms: millis(
                timing.audio_track_timeout_ms,
                "AUDIO_TRACK_TIMEOUT_MS",
                defaults.audio_track_timeout_ms,
            )?,
            audio_track_poll_ms: millis(
                timing.audio_track_poll_ms,
                "AUDIO_TRACK_POLL_MS",
                defaults.audio_track_poll_ms,
            )?,
            disconnect_poll_ms: millis(
                timing.disconnect_poll_ms,
                "DISCONNECT_POLL_MS",
                defaults.disconnect_poll_ms,
            )?,
            recognizer_close_timeout_ms: millis(
                timing.recognizer_close_timeout_ms,
                "RECOGNIZER_CLOSE_TIMEOUT_MS",
                defaults.recognizer_close_timeout_ms,
            )?,
            task_shutdown_timeout_ms: millis(
                timing.task_shutdown_timeout_ms,
                "TASK_SHUTDOWN_TIMEOUT_MS",
                defaults.task_shutdown_timeout_ms,
            )?,
            inbound_sample_rate: match timing.inbound_sample_rate {
                Some(v) => v,
                None => env_parse("INBOUND_SAMPLE_RATE")?.unwrap_or(defaults.inbound_sample_rate),
            },
            inbound_channels: match timing.inbound_channels {
                Some(v) => v,
                None => env_parse("INBOUND_CHANNELS")?.unwrap_or(defaults.inbound_channels),
            },
        };

        // An explicitly empty greeting disables it; an absent one uses the default.
        let greeting = match agent.greeting.or_else(|| env::var("AGENT_GREETING").ok()) {
            Some(text) if text.trim().is_empty() => None,
            Some(text) => Some(text),
            None => Some(DEFAULT_GREETING.to_string()),
        };

        let identity = AgentIdentity::default();
        let temperature = match openai.temperature {
            Some(v) => v,
            None => env_parse("OPENAI_TEMPERATURE")?.unwrap_or(0.7),
        };
        let max_tool_rounds = match openai.max_tool_rounds {
            Some(v) => v,
            None => env_parse("MAX_TOOL_ROUNDS")?.unwrap_or(5),
        };

        let config = Self {
            livekit_url,
            livekit_api_key,
            livekit_api_secret,
            openai_api_key,
            agent_identity: agent
                .identity
                .or_else(|| env_string("AGENT_IDENTITY"))
                .unwrap_or(identity.identity.clone()),
            agent_name: agent
                .name
                .or_else(|| env_string("AGENT_NAME"))
                .unwrap_or(identity.name.clone()),
            greeting,
            language: agent
                .language
                .or_else(|| env_string("STT_LANGUAGE"))
                .unwrap_or_else(|| "en".to_string()),
            system_prompt: agent
                .system_prompt
                .or_else(|| env_string("SYSTEM_PROMPT"))
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            knowledge_dir: agent
                .knowledge_dir
                .or_else(|| env_string("KNOWLEDGE_DIR"))
                .map(PathBuf::from),
            serpapi_api_key: tools
                .serpapi_api_key
                .filter(|v| !v.trim().is_empty())
                .or_else(|| env_string("SERPAPI_API_KEY")),
            google_places_api_key: tools
                .google_places_api_key
                .filter(|v| !v.trim().is_empty())
                .or_else(|| env_string("GOOGLE_PLACES_API_KEY")),
            stt_model: openai
                .stt_model
                .or_else(|| env_string("OPENAI_STT_MODEL"))
                .unwrap_or_else(|| "whisper-1".to_string()),
            tts_model: openai
                .tts_model
                .or_else(|| env_string("OPENAI_TTS_MODEL"))
                .unwrap_or_else(|| "tts-1".to_string()),
            tts_voice: openai
                .tts_voice
                .or_else(|| env_string("OPENAI_TTS_VOICE"))
                .unwrap_or_else(|| "alloy".to_string()),
            chat_model: openai
                .chat_model
                .or_else(|| env_string("OPENAI_CHAT_MODEL"))
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            temperature,
            max_tool_rounds,
            timing,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |name: &str, value: String, reason: &str| ConfigError::InvalidValue {
            name: name.to_string(),
            value,
            reason: reason.to_string(),
        };

        let scheme_ok = url::Url::parse(&self.livekit_url)
            .map(|u| matches!(u.scheme(), "ws" | "wss" | "http" | "https"))
            .unwrap_or(false);
        if !scheme_ok {
            return Err(invalid(
                "LIVEKIT_URL",
                self.livekit_url.clone(),
                "expected a ws://, wss://, http:// or https:// URL",
            ));
        }
        if self.max_tool_rounds == 0 {
            return Err(invalid("MAX_TOOL_ROUNDS", "0".to_string(), "must be at least 1"));
        }
        if self.timing.audio_track_poll_ms == 0 {
            return Err(invalid("AUDIO_TRACK_POLL_MS", "0".to_string(), "must be positive"));
        }
        if self.timing.inbound_channels == 0 || self.timing.inbound_sample_rate == 0 {
            return Err(invalid(
                "INBOUND_SAMPLE_RATE",
                format!("{}/{}", self.timing.inbound_sample_rate, self.timing.inbound_channels),
                "sample rate and channel count must be positive",
            ));
        }
        Ok(())
    }

    pub fn agent_identity(&self) -> AgentIdentity {
        AgentIdentity {
            identity: self.agent_identity.clone(),
            name: self.agent_name.clone(),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        let t = &self.timing;
        SessionConfig {
            dedup_window: Duration::from_millis(t.dedup_window_ms),
            pre_think_delay: Duration::from_millis(t.pre_think_delay_ms),
            announcement_poll: Duration::from_millis(t.announcement_poll_ms),
            disconnect_poll: Duration::from_millis(t.disconnect_poll_ms),
            recognizer_close_timeout: Duration::from_millis(t.recognizer_close_timeout_ms),
            task_shutdown_timeout: Duration::from_millis(t.task_shutdown_timeout_ms),
            greeting: self.greeting.clone(),
            setup: SetupConfig {
                participant_timeout: Duration::from_millis(t.participant_timeout_ms),
                audio_track_timeout: Duration::from_millis(t.audio_track_timeout_ms),
                poll_interval: Duration::from_millis(t.audio_track_poll_ms),
                inbound_sample_rate: t.inbound_sample_rate,
                inbound_channels: t.inbound_channels,
                ..SetupConfig::default()
            },
        }
    }

    pub fn stt_config(&self) -> STTConfig {
        STTConfig {
            provider: "openai".to_string(),
            api_key: self.openai_api_key.clone(),
            language: self.language.clone(),
            sample_rate: self.timing.inbound_sample_rate,
            channels: self.timing.inbound_channels as u16,
            model: self.stt_model.clone(),
        }
    }

    pub fn tts_config(&self) -> TTSConfig {
        TTSConfig {
            provider: "openai".to_string(),
            api_key: self.openai_api_key.clone(),
            voice_id: Some(self.tts_voice.clone()),
            model: self.tts_model.clone(),
            speaking_rate: None,
        }
    }

    /// Flight search settings, when a SerpAPI key is configured.
    pub fn flights_config(&self) -> Option<SerpApiFlightsConfig> {
        self.serpapi_api_key.as_ref().map(|key| SerpApiFlightsConfig {
            api_key: key.clone(),
            ..SerpApiFlightsConfig::default()
        })
    }

    /// Place search settings, when a Google Places key is configured.
    pub fn places_config(&self) -> Option<GooglePlacesConfig> {
        self.google_places_api_key.as_ref().map(|key| GooglePlacesConfig {
            api_key: key.clone(),
            ..GooglePlacesConfig::default()
        })
    }

    pub fn reasoner_config(&self) -> OpenAIReasonerConfig {
        OpenAIReasonerConfig {
            api_key: self.openai_api_key.clone(),
            model: self.chat_model.clone(),
            temperature: Some(self.temperature),
            system_prompt: self.system_prompt.clone(),
            max_tool_rounds: self.max_tool_rounds,
            ..OpenAIReasonerConfig::default()
        }
    }
}
