//! OpenAI chat-completions reasoner.
//!
//! - API Endpoint: `POST {base_url}/chat/completions`

mod client;
mod config;
mod messages;

pub use client::OpenAIReasoner;
pub use config::{DEFAULT_SYSTEM_PROMPT, OpenAIReasonerConfig};
pub use messages::{ChatMessage, ChatResponse, FunctionCall, ToolCall};
