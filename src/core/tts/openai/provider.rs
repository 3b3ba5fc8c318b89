//! OpenAI TTS provider implementation.
//!
//! - Endpoint: `POST {base_url}/audio/speech`
//! - Output: `pcm` (24kHz mono s16le), streamed and re-framed to 20ms frames

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, info};

use super::config::{OPENAI_PCM_SAMPLE_RATE, OpenAITTSConfig};
use crate::core::audio::{AudioFrame, samples_per_frame};
use crate::core::openai::{describe_error, is_quota_error};
use crate::core::tts::base::{BaseTTS, SynthesisStream, TTSConfig, TTSError, TTSResult};

/// OpenAI TTS provider using the Audio Speech API.
#[derive(Clone)]
pub struct OpenAITTS {
    config: Arc<OpenAITTSConfig>,
    http_client: Client,
}

impl OpenAITTS {
    pub fn new(config: TTSConfig) -> TTSResult<Self> {
        Self::with_config(OpenAITTSConfig::from_base(config))
    }

    pub fn with_config(config: OpenAITTSConfig) -> TTSResult<Self> {
        config.validate().map_err(TTSError::InvalidConfiguration)?;

        let http_client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .build()
            .map_err(|e| {
                TTSError::InvalidConfiguration(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            config: Arc::new(config),
            http_client,
        })
    }

    fn request_body(&self, text: &str) -> serde_json::Value {
        let mut body = json!({
            "model": self.config.model(),
            "input": text,
            "voice": self.config.voice(),
            "response_format": "pcm",
        });

        let speed = self.config.speed();
        if (speed - 1.0).abs() > 0.001 {
            body["speed"] = json!(speed);
        }
        body
    }
}

/// Cut a byte stream of s16le PCM into fixed-size frames.
///
/// `None` is yielded for empty network chunks; a short tail is emitted last.
fn reframe<S, E>(bytes: S, sample_rate: u32) -> SynthesisStream
where
    S: futures::Stream<Item = Result<bytes::Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let frame_bytes = samples_per_frame(sample_rate, 1) * 2;
    async_stream::stream! {
        futures::pin_mut!(bytes);
        let mut pending: Vec<u8> = Vec::with_capacity(frame_bytes * 2);
        loop {
            match bytes.next().await {
                Some(Ok(chunk)) => {
                    if chunk.is_empty() {
                        yield Ok(None);
                        continue;
                    }
                    pending.extend_from_slice(&chunk);
                    while pending.len() >= frame_bytes {
                        let rest = pending.split_off(frame_bytes);
                        let frame = std::mem::replace(&mut pending, rest);
                        yield Ok(Some(AudioFrame::from_le_bytes(&frame, sample_rate, 1)));
                    }
                }
                Some(Err(e)) => {
                    yield Err(TTSError::NetworkError(format!("Audio stream interrupted: {e}")));
                    break;
                }
                None => {
                    if pending.len() >= 2 {
                        yield Ok(Some(AudioFrame::from_le_bytes(&pending, sample_rate, 1)));
                    }
                    break;
                }
            }
        }
    }
    .boxed()
}

#[async_trait]
impl BaseTTS for OpenAITTS {
    fn sample_rate(&self) -> u32 {
        OPENAI_PCM_SAMPLE_RATE
    }

    fn num_channels(&self) -> u32 {
        1
    }

    async fn synthesize(&self, text: &str) -> TTSResult<SynthesisStream> {
        if text.trim().is_empty() {
            return Ok(futures::stream::empty().boxed());
        }

        debug!(text_length = text.len(), "Requesting speech synthesis");
        let response = self
            .http_client
            .post(self.config.api_url())
            .bearer_auth(&self.config.base.api_key)
            .json(&self.request_body(text))
            .send()
            .await
            .map_err(|e| TTSError::NetworkError(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = describe_error(status, &body);
            return Err(if is_quota_error(status.as_u16(), &body) {
                TTSError::QuotaExceeded(message)
            } else if status.as_u16() == 401 {
                TTSError::ConnectionFailed(message)
            } else {
                TTSError::ProviderError(message)
            });
        }

        info!(text_length = text.len(), "Streaming synthesized audio");
        Ok(reframe(response.bytes_stream(), OPENAI_PCM_SAMPLE_RATE))
    }

    fn get_provider_info(&self) -> &'static str {
        "OpenAI TTS (pcm 24kHz)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn chunks(parts: Vec<Result<Vec<u8>, String>>) -> impl futures::Stream<Item = Result<Bytes, String>> {
        futures::stream::iter(parts.into_iter().map(|p| p.map(Bytes::from)))
    }

    #[tokio::test]
    async fn test_reframe_splits_into_20ms_frames() {
        // 24kHz mono: 480 samples = 960 bytes per frame
        let stream = reframe(chunks(vec![Ok(vec![0u8; 1500]), Ok(vec![0u8; 500])]), 24000);
        let frames: Vec<_> = stream.collect().await;
        assert_eq!(frames.len(), 3);

        let sizes: Vec<usize> = frames
            .into_iter()
            .map(|f| f.unwrap().map(|f| f.data.len()).unwrap_or(0))
            .collect();
        assert_eq!(sizes, vec![480, 480, 40]);
    }

    #[tokio::test]
    async fn test_reframe_marks_empty_chunks() {
        let stream = reframe(chunks(vec![Ok(Vec::new()), Ok(vec![1u8, 0u8])]), 24000);
        let frames: Vec<_> = stream.collect().await;
        assert!(matches!(frames[0], Ok(None)));
        assert_eq!(frames[1].as_ref().unwrap().as_ref().unwrap().data, vec![1]);
    }

    #[tokio::test]
    async fn test_reframe_stops_on_error() {
        let stream = reframe(
            chunks(vec![
                Ok(vec![0u8; 960]),
                Err("reset".to_string()),
                Ok(vec![0u8; 960]),
            ]),
            24000,
        );
        let frames: Vec<_> = stream.collect().await;
        assert_eq!(frames.len(), 2);
        assert!(matches!(frames[1], Err(TTSError::NetworkError(_))));
    }

    #[test]
    fn test_request_body() {
        let tts = OpenAITTS::new(TTSConfig {
            api_key: "sk-test".to_string(),
            voice_id: Some("nova".to_string()),
            speaking_rate: Some(1.25),
            ..Default::default()
        })
        .unwrap();
        let body = tts.request_body("Hello");
        assert_eq!(body["model"], "tts-1");
        assert_eq!(body["voice"], "nova");
        assert_eq!(body["response_format"], "pcm");
        assert_eq!(body["speed"], 1.25);
        assert_eq!(tts.sample_rate(), 24000);
    }

    #[tokio::test]
    async fn test_empty_text_yields_nothing() {
        let tts = OpenAITTS::new(TTSConfig {
            api_key: "sk-test".to_string(),
            ..Default::default()
        })
        .unwrap();
        let frames: Vec<_> = tts.synthesize("   ").await.unwrap().collect().await;
        assert!(frames.is_empty());
    }
}
