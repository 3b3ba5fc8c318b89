//! Base trait and types for the conversational reasoner.

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while generating a reply.
#[derive(Debug, Error)]
pub enum ReasonerError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Tool '{name}' failed: {message}")]
    ToolFailed { name: String, message: String },

    #[error("Gave up after {0} tool rounds without a reply")]
    TooManyToolRounds(u32),
}

pub type ReasonerResult<T> = Result<T, ReasonerError>;

/// Who produced an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One turn of the conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub role: Role,
    pub timestamp: SystemTime,
}

impl Utterance {
    pub fn new(text: impl Into<String>, role: Role) -> Self {
        Self {
            text: text.into(),
            role,
            timestamp: SystemTime::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(text, Role::User)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(text, Role::Assistant)
    }
}

/// Receives "I'm about to do X" narrations while the reasoner works.
///
/// Must be synchronous, must not block and must not fail.
pub type AnnouncementCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Base trait for reply generators.
#[async_trait]
pub trait BaseReasoner: Send + Sync {
    /// Produce a reply to `utterance` given the prior conversation.
    ///
    /// `history` holds every earlier utterance of the session, oldest first,
    /// and excludes `utterance` itself.
    async fn respond(&self, utterance: &str, history: &[Utterance]) -> ReasonerResult<String>;

    /// Register the narration sink used before tool invocations.
    fn on_tool_announcement(&mut self, callback: AnnouncementCallback);

    fn get_provider_info(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serde_and_display() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(Role::Assistant.to_string(), "assistant");
    }

    #[test]
    fn test_utterance_constructors() {
        let u = Utterance::user("Hello");
        assert_eq!(u.role, Role::User);
        assert_eq!(u.text, "Hello");
        assert_eq!(Utterance::assistant("Hi there!").role, Role::Assistant);
    }

    #[test]
    fn test_error_display() {
        let err = ReasonerError::ToolFailed {
            name: "search_places".to_string(),
            message: "timeout".to_string(),
        };
        assert_eq!(err.to_string(), "Tool 'search_places' failed: timeout");
        assert!(
            ReasonerError::TooManyToolRounds(5)
                .to_string()
                .contains("5 tool rounds")
        );
    }
}
