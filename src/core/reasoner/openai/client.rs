//! OpenAI chat-completions reasoner with function calling.
//!
//! Each reply is a loop: send the conversation, and while the model asks for
//! tool calls, narrate each call, run it and feed the result back. The loop
//! ends with the model's text reply or after `max_tool_rounds` round trips.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::config::OpenAIReasonerConfig;
use super::messages::{ChatMessage, ChatRequest, ChatResponse, ToolCall};
use crate::core::openai::{describe_error, is_quota_error};
use crate::core::reasoner::base::{
    AnnouncementCallback, BaseReasoner, ReasonerError, ReasonerResult, Utterance,
};
use crate::core::reasoner::tools::{ReasonerTool, ToolDef};

pub struct OpenAIReasoner {
    config: OpenAIReasonerConfig,
    http_client: Client,
    tools: Vec<Arc<dyn ReasonerTool>>,
    tool_defs: Vec<ToolDef>,
    announcement_callback: Option<AnnouncementCallback>,
}

impl OpenAIReasoner {
    pub fn new(config: OpenAIReasonerConfig) -> ReasonerResult<Self> {
        config.validate().map_err(ReasonerError::ConfigurationError)?;

        let http_client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                ReasonerError::ConfigurationError(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            config,
            http_client,
            tools: Vec::new(),
            tool_defs: Vec::new(),
            announcement_callback: None,
        })
    }

    /// Make a tool available to the model.
    pub fn with_tool(mut self, tool: Arc<dyn ReasonerTool>) -> Self {
        self.tool_defs.push(tool.definition());
        self.tools.push(tool);
        self
    }

    pub fn tool_names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    fn build_messages(&self, utterance: &str, history: &[Utterance]) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(self.config.system_prompt.clone()));
        messages.extend(history.iter().map(ChatMessage::from));
        messages.push(ChatMessage::user(utterance));
        messages
    }

    async fn complete(&self, messages: &[ChatMessage]) -> ReasonerResult<ChatMessage> {
        let request = ChatRequest {
            model: &self.config.model,
            messages,
            tools: (!self.tool_defs.is_empty()).then_some(self.tool_defs.as_slice()),
            temperature: self.config.temperature,
        };

        let response = self
            .http_client
            .post(self.config.api_url())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ReasonerError::NetworkError(format!("Request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ReasonerError::NetworkError(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let message = describe_error(status, &body);
            return Err(if status.as_u16() == 401 {
                ReasonerError::AuthenticationFailed(message)
            } else if is_quota_error(status.as_u16(), &body) {
                ReasonerError::RateLimitExceeded(message)
            } else {
                ReasonerError::ProviderError(message)
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| ReasonerError::InvalidResponse(format!("Failed to parse response: {e}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| ReasonerError::InvalidResponse("No choices in response".to_string()))
    }

    /// Narrate and run one tool call, returning the text for the model.
    async fn run_tool_call(&self, call: &ToolCall) -> String {
        let name = call.function.name.as_str();
        let args: Value = serde_json::from_str(&call.function.arguments)
            .unwrap_or_else(|_| Value::Object(Default::default()));

        let Some(tool) = self.tools.iter().find(|t| t.name() == name) else {
            warn!(tool = name, "Model requested unknown tool");
            return format!("Unknown tool: {name}");
        };

        if let Some(narration) = tool.narration(&args)
            && let Some(callback) = &self.announcement_callback
        {
            callback(narration);
        }

        info!(tool = name, "Invoking tool");
        match tool.call(args).await {
            Ok(output) => output,
            Err(e) => {
                warn!(tool = name, "Tool failed: {e}");
                format!("Tool error: {e}")
            }
        }
    }
}

#[async_trait]
impl BaseReasoner for OpenAIReasoner {
    async fn respond(&self, utterance: &str, history: &[Utterance]) -> ReasonerResult<String> {
        let mut messages = self.build_messages(utterance, history);

        for round in 0..=self.config.max_tool_rounds {
            let message = self.complete(&messages).await?;

            let calls = match &message.tool_calls {
                Some(calls) if !calls.is_empty() => calls.clone(),
                _ => {
                    let reply = message.content.unwrap_or_default().trim().to_string();
                    if reply.is_empty() {
                        return Err(ReasonerError::InvalidResponse(
                            "Empty reply from model".to_string(),
                        ));
                    }
                    debug!(round, text_length = reply.len(), "Reply generated");
                    return Ok(reply);
                }
            };

            if round == self.config.max_tool_rounds {
                break;
            }

            messages.push(message);
            for call in &calls {
                let output = self.run_tool_call(call).await;
                messages.push(ChatMessage::tool_result(call.id.clone(), output));
            }
        }

        Err(ReasonerError::TooManyToolRounds(self.config.max_tool_rounds))
    }

    fn on_tool_announcement(&mut self, callback: AnnouncementCallback) {
        self.announcement_callback = Some(callback);
    }

    fn get_provider_info(&self) -> &'static str {
        "OpenAI chat completions with function calling"
    }
}
