//! Pieces shared by the OpenAI recognizer, synthesizer and reasoner clients.

use serde::{Deserialize, Serialize};

/// Default REST base URL. Overridable per client for proxies and tests.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI API error response body.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpenAIErrorResponse {
    pub error: OpenAIError,
}

/// OpenAI API error details.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpenAIError {
    /// Human-readable error message
    pub message: String,

    /// Error type identifier
    #[serde(rename = "type", default)]
    pub error_type: String,

    #[serde(default)]
    pub param: Option<String>,

    /// Error code (e.g. "insufficient_quota")
    #[serde(default)]
    pub code: Option<String>,
}

impl std::fmt::Display for OpenAIError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.error_type)
    }
}

/// Render a non-success response as a readable message.
pub fn describe_error(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<OpenAIErrorResponse>(body) {
        Ok(parsed) => format!("OpenAI API error ({status}): {}", parsed.error),
        Err(_) => format!("OpenAI API error ({status}): {body}"),
    }
}

/// Whether a failure means the account is out of quota or rate limited.
pub fn is_quota_error(status: u16, body: &str) -> bool {
    status == 429 || body.contains("insufficient_quota")
}

/// Join a base URL and an endpoint path without doubling slashes.
pub fn endpoint(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_error_parses_body() {
        let body = r#"{"error":{"message":"You exceeded your current quota","type":"insufficient_quota","code":"insufficient_quota"}}"#;
        let msg = describe_error(reqwest::StatusCode::TOO_MANY_REQUESTS, body);
        assert!(msg.contains("You exceeded your current quota"));
        assert!(msg.contains("429"));
    }

    #[test]
    fn test_describe_error_falls_back_to_raw_body() {
        let msg = describe_error(reqwest::StatusCode::BAD_GATEWAY, "upstream down");
        assert!(msg.ends_with("upstream down"));
    }

    #[test]
    fn test_is_quota_error() {
        assert!(is_quota_error(429, ""));
        assert!(is_quota_error(400, r#"{"error":{"code":"insufficient_quota"}}"#));
        assert!(!is_quota_error(500, "internal"));
    }

    #[test]
    fn test_endpoint_join() {
        assert_eq!(
            endpoint("https://api.openai.com/v1/", "/audio/speech"),
            "https://api.openai.com/v1/audio/speech"
        );
        assert_eq!(
            endpoint("http://127.0.0.1:9000", "chat/completions"),
            "http://127.0.0.1:9000/chat/completions"
        );
    }
}
