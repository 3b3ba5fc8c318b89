//! OpenAI STT (Whisper) client implementation.
//!
//! Whisper is a batch REST API, so this client presents a streaming facade:
//!
//! 1. Pushed frames are queued to a per-stream worker task
//! 2. The worker segments utterances with RMS silence detection
//! 3. Each closed segment is encoded as WAV and uploaded
//! 4. The transcript is emitted as a final [`SpeechEvent`]
//!
//! Ending input flushes the last segment; closing waits for the worker.

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::super::base::{BaseSTT, STTConfig, STTError, STTInput, STTStream, SpeechEvent};
use super::config::{OpenAISTTConfig, SilenceDetectionConfig};
use crate::core::audio::AudioFrame;
use crate::core::openai::describe_error;

/// Transcription response for `response_format=json`.
#[derive(Debug, Clone, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

// =============================================================================
// Silence Segmenter
// =============================================================================

/// One utterance cut from the inbound audio.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Segment {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Segment {
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0;
        }
        self.samples.len() as u64 * 1000 / (u64::from(self.sample_rate) * u64::from(self.channels))
    }
}

/// Accumulates frames and closes a segment after enough trailing silence.
///
/// Leading silence is discarded so that only speech is uploaded.
#[derive(Debug)]
pub(crate) struct SilenceSegmenter {
    config: SilenceDetectionConfig,
    samples: Vec<i16>,
    sample_rate: u32,
    channels: u16,
    buffered_ms: u64,
    silence_ms: u64,
    heard_speech: bool,
}

impl SilenceSegmenter {
    pub fn new(config: SilenceDetectionConfig, sample_rate: u32, channels: u16) -> Self {
        Self {
            config,
            samples: Vec::new(),
            sample_rate,
            channels,
            buffered_ms: 0,
            silence_ms: 0,
            heard_speech: false,
        }
    }

    /// Feed one frame; returns a segment when an utterance closes.
    pub fn push(&mut self, frame: &AudioFrame) -> Option<Segment> {
        if frame.is_empty() {
            return None;
        }

        let is_silent = frame.rms_energy() < self.config.rms_threshold;
        if is_silent && !self.heard_speech {
            return None;
        }

        if self.samples.is_empty() {
            self.sample_rate = frame.sample_rate;
            self.channels = frame.num_channels as u16;
        }

        let frame_ms = frame.duration_ms();
        self.samples.extend_from_slice(&frame.data);
        self.buffered_ms += frame_ms;

        if is_silent {
            self.silence_ms += frame_ms;
        } else {
            if self.silence_ms > 0 {
                debug!("Speech resumed, resetting silence timer");
            }
            self.silence_ms = 0;
            self.heard_speech = true;
        }

        let enough_audio = self.buffered_ms >= u64::from(self.config.min_audio_duration_ms);
        let enough_silence = self.silence_ms >= u64::from(self.config.silence_duration_ms);
        if enough_audio && enough_silence {
            debug!(
                buffered_ms = self.buffered_ms,
                "Silence duration threshold reached, closing segment"
            );
            return self.take();
        }

        if self.buffered_ms >= u64::from(self.config.max_segment_duration_ms) {
            warn!(
                buffered_ms = self.buffered_ms,
                "Segment exceeded maximum duration, forcing cut"
            );
            return self.take();
        }

        None
    }

    /// Flush whatever speech is buffered.
    pub fn finish(&mut self) -> Option<Segment> {
        if self.heard_speech { self.take() } else { None }
    }

    fn take(&mut self) -> Option<Segment> {
        let samples = std::mem::take(&mut self.samples);
        self.buffered_ms = 0;
        self.silence_ms = 0;
        self.heard_speech = false;
        if samples.is_empty() {
            return None;
        }
        Some(Segment {
            samples,
            sample_rate: self.sample_rate,
            channels: self.channels,
        })
    }
}

/// Encode a segment as a 16-bit PCM WAV file.
pub(crate) fn encode_wav(segment: &Segment) -> Result<Vec<u8>, STTError> {
    let spec = hound::WavSpec {
        channels: segment.channels,
        sample_rate: segment.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::with_capacity(44 + segment.samples.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| STTError::AudioProcessingError(format!("WAV header: {e}")))?;
        for sample in &segment.samples {
            writer
                .write_sample(*sample)
                .map_err(|e| STTError::AudioProcessingError(format!("WAV write: {e}")))?;
        }
        writer
            .finalize()
            .map_err(|e| STTError::AudioProcessingError(format!("WAV finalize: {e}")))?;
    }
    Ok(cursor.into_inner())
}

// =============================================================================
// OpenAI STT Client
// =============================================================================

/// OpenAI STT (Whisper) recognizer.
#[derive(Clone)]
pub struct OpenAISTT {
    config: Arc<OpenAISTTConfig>,
    http_client: Client,
}

impl OpenAISTT {
    /// Create a recognizer from base configuration.
    pub fn new(config: STTConfig) -> Result<Self, STTError> {
        Self::with_config(OpenAISTTConfig::from_base(config))
    }

    /// Create a recognizer with provider-specific configuration.
    pub fn with_config(config: OpenAISTTConfig) -> Result<Self, STTError> {
        config.validate().map_err(STTError::ConfigurationError)?;

        let http_client = Client::builder()
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| {
                STTError::ConfigurationError(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            config: Arc::new(config),
            http_client,
        })
    }

    /// Upload one segment and return the trimmed transcript.
    pub(crate) async fn transcribe(&self, segment: &Segment) -> Result<String, STTError> {
        let wav = encode_wav(segment)?;
        info!(
            bytes = wav.len(),
            duration_ms = segment.duration_ms(),
            "Sending audio segment to OpenAI transcription API"
        );

        let file_part = Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| STTError::ConfigurationError(format!("Invalid MIME type: {e}")))?;

        let config = &self.config;
        let mut form = Form::new()
            .part("file", file_part)
            .text("model", config.model().to_string())
            .text("response_format", "json");

        if !config.base.language.is_empty() {
            form = form.text("language", config.base.language.clone());
        }
        if let Some(temp) = config.temperature {
            form = form.text("temperature", temp.to_string());
        }
        if let Some(ref prompt) = config.prompt {
            form = form.text("prompt", prompt.clone());
        }

        let response = self
            .http_client
            .post(config.api_url())
            .bearer_auth(&config.base.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| STTError::NetworkError(format!("Request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| STTError::NetworkError(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let message = describe_error(status, &body);
            return Err(if status.as_u16() == 401 {
                STTError::AuthenticationFailed(message)
            } else {
                STTError::ProviderError(message)
            });
        }

        let parsed: TranscriptionResponse = serde_json::from_str(&body)
            .map_err(|e| STTError::ProviderError(format!("Failed to parse response: {e}")))?;
        Ok(parsed.text.trim().to_string())
    }

    async fn emit(&self, segment: Segment, events: &mpsc::UnboundedSender<SpeechEvent>) {
        match self.transcribe(&segment).await {
            Ok(text) if text.is_empty() => debug!("Transcription returned no text"),
            Ok(text) => {
                info!(text_length = text.len(), "Transcription complete");
                let _ = events.send(SpeechEvent::final_text(text));
            }
            Err(e) => error!("Transcription failed: {e}"),
        }
    }

    /// Per-stream worker: segment frames and upload until input ends.
    async fn run_worker(
        self,
        mut frames: mpsc::UnboundedReceiver<AudioFrame>,
        events: mpsc::UnboundedSender<SpeechEvent>,
    ) {
        let mut segmenter = SilenceSegmenter::new(
            self.config.silence_detection.clone(),
            self.config.base.sample_rate,
            self.config.base.channels,
        );

        while let Some(frame) = frames.recv().await {
            if let Some(segment) = segmenter.push(&frame) {
                self.emit(segment, &events).await;
            }
        }

        if let Some(segment) = segmenter.finish() {
            debug!("Input ended, flushing final segment");
            self.emit(segment, &events).await;
        }
        debug!("Recognizer worker finished");
    }
}

/// Input half handed to the ingest task.
struct WhisperInput {
    frames: Mutex<Option<mpsc::UnboundedSender<AudioFrame>>>,
    worker: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

#[async_trait]
impl STTInput for WhisperInput {
    fn push_frame(&self, frame: AudioFrame) -> Result<(), STTError> {
        match self.frames.lock().as_ref() {
            Some(tx) => tx.send(frame).map_err(|_| STTError::InputClosed),
            None => Err(STTError::InputClosed),
        }
    }

    fn end_input(&self) {
        if self.frames.lock().take().is_some() {
            debug!("Recognizer input ended");
        }
    }

    async fn close(&self) -> Result<(), STTError> {
        self.end_input();
        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle {
            handle
                .await
                .map_err(|e| STTError::ProviderError(format!("Recognizer worker failed: {e}")))?;
        }
        Ok(())
    }
}

#[async_trait]
impl BaseSTT for OpenAISTT {
    async fn stream(&self) -> Result<STTStream, STTError> {
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();

        let worker = tokio::spawn(self.clone().run_worker(frame_rx, event_tx));

        let input = Arc::new(WhisperInput {
            frames: Mutex::new(Some(frame_tx)),
            worker: tokio::sync::Mutex::new(Some(worker)),
        });

        let events = async_stream::stream! {
            while let Some(event) = event_rx.recv().await {
                yield event;
            }
        }
        .boxed();

        Ok(STTStream { input, events })
    }

    fn get_provider_info(&self) -> &'static str {
        "OpenAI Whisper transcription (silence-segmented)"
    }
}
