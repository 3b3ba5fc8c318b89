pub mod agent;
pub mod config;
pub mod core;
pub mod livekit;

// Re-export commonly used items for convenience
pub use agent::{AgentSession, SessionConfig, SessionError, SessionSummary};
pub use config::{AgentConfig, ConfigError};
pub use core::*;
