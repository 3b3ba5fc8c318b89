use std::time::Duration;

use crate::core::openai::OPENAI_BASE_URL;

/// Persona used when no system prompt is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Paradise, a voice travel planning assistant. \
Your replies are spoken aloud, so keep them extremely short and conversational, with no lists or markdown. \
Guide the caller through planning a complete trip: flights, then a place to stay, then restaurants if they want them, \
then a day-by-day itinerary. Suggest the next step after each one. \
Use retrieve_travel_info for attractions, culture and tips from uploaded travel guides. \
Use search_places for live hotel, restaurant and cafe listings. \
Use get_flight_prices only once the caller has explicitly stated the departure city, the arrival city and the date; \
ask for anything missing instead of guessing.";

/// Configuration for the OpenAI chat-completions reasoner.
#[derive(Debug, Clone)]
pub struct OpenAIReasonerConfig {
    pub api_key: String,
    /// REST base URL, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub system_prompt: String,
    /// Model/tool round trips allowed per reply.
    pub max_tool_rounds: u32,
    pub request_timeout: Duration,
}

impl Default for OpenAIReasonerConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: OPENAI_BASE_URL.to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: Some(0.7),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_tool_rounds: 5,
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl OpenAIReasonerConfig {
    pub fn api_url(&self) -> String {
        crate::core::openai::endpoint(&self.base_url, "chat/completions")
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.api_key.is_empty() {
            return Err("API key is required".to_string());
        }
        if self.model.is_empty() {
            return Err("Model is required".to_string());
        }
        if let Some(temp) = self.temperature
            && !(0.0..=2.0).contains(&temp)
        {
            return Err(format!(
                "Temperature must be between 0.0 and 2.0, got {temp}"
            ));
        }
        if self.max_tool_rounds == 0 {
            return Err("max_tool_rounds must be at least 1".to_string());
        }
        Ok(())
    }
}
