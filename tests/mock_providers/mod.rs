//! In-memory providers for orchestrator tests.
//!
//! - `FakeRoom`: scripted participants and audio, records data packets and
//!   captured frames, optional disconnect after N frames
//! - `FakeSTT`: recognizer whose events are injected by the test
//! - `FakeTTS`: fixed number of 20 ms frames per utterance, optional quota failure
//! - `FakeReasoner`: scripted replies and tool narrations
//!
//! All of them append to a shared `Timeline` so tests can assert ordering.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use paradise_agent::agent::{
    AudioSink, AudioStream, RoomConnection, RoomConnectionState, RoomError, TRANSCRIPT_TOPIC,
    TranscriptEvent,
};
use paradise_agent::core::reasoner::{
    AnnouncementCallback, BaseReasoner, ReasonerError, ReasonerResult, Utterance,
};
use paradise_agent::core::stt::{BaseSTT, STTError, STTInput, STTStream, SpeechEvent};
use paradise_agent::core::tts::{BaseTTS, SynthesisStream, TTSError, TTSResult};
use paradise_agent::core::AudioFrame;

/// Ordered record of observable side effects.
#[derive(Clone, Default)]
pub struct Timeline(Arc<Mutex<Vec<String>>>);

impl Timeline {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.0.lock().iter().position(|e| e == entry)
    }
}

// =============================================================================
// Room
// =============================================================================

pub struct FakeRoom {
    state: Arc<Mutex<RoomConnectionState>>,
    participants: Mutex<Vec<String>>,
    audio: Mutex<Option<AudioStream>>,
    /// `open_audio_stream` calls that return no track before the audio appears
    audio_delay_attempts: AtomicUsize,
    data: Mutex<Vec<(String, Vec<u8>)>>,
    sink: Arc<FakeSink>,
    pub published_tracks: Mutex<Vec<String>>,
    pub unpublish_calls: AtomicUsize,
    pub disconnect_calls: AtomicUsize,
    timeline: Timeline,
}

impl FakeRoom {
    pub fn new(timeline: Timeline) -> Arc<Self> {
        let state = Arc::new(Mutex::new(RoomConnectionState::Connected));
        Arc::new(Self {
            sink: Arc::new(FakeSink {
                state: Arc::clone(&state),
                frames: Mutex::new(Vec::new()),
                disconnect_after: Mutex::new(None),
                capture_errors: Mutex::new(VecDeque::new()),
            }),
            state,
            participants: Mutex::new(Vec::new()),
            audio: Mutex::new(None),
            audio_delay_attempts: AtomicUsize::new(0),
            data: Mutex::new(Vec::new()),
            published_tracks: Mutex::new(Vec::new()),
            unpublish_calls: AtomicUsize::new(0),
            disconnect_calls: AtomicUsize::new(0),
            timeline,
        })
    }

    /// A connected room with one caller whose audio never ends.
    pub fn with_caller(timeline: Timeline) -> Arc<Self> {
        let room = Self::new(timeline);
        room.add_participant("caller");
        room.set_audio(futures::stream::pending().boxed());
        room
    }

    pub fn add_participant(&self, identity: &str) {
        self.participants.lock().push(identity.to_string());
    }

    pub fn set_audio(&self, audio: AudioStream) {
        *self.audio.lock() = Some(audio);
    }

    pub fn delay_audio(&self, attempts: usize) {
        self.audio_delay_attempts.store(attempts, Ordering::SeqCst);
    }

    pub fn set_state(&self, state: RoomConnectionState) {
        *self.state.lock() = state;
    }

    pub fn sink(&self) -> &Arc<FakeSink> {
        &self.sink
    }

    pub fn transcripts(&self) -> Vec<TranscriptEvent> {
        self.data
            .lock()
            .iter()
            .filter(|(topic, _)| topic == TRANSCRIPT_TOPIC)
            .filter_map(|(_, payload)| serde_json::from_slice(payload).ok())
            .collect()
    }

    /// Transcript texts prefixed with `user:` or `agent:`.
    pub fn transcript_lines(&self) -> Vec<String> {
        self.transcripts()
            .into_iter()
            .map(|e| format!("{}:{}", if e.is_user { "user" } else { "agent" }, e.text))
            .collect()
    }
}

#[async_trait]
impl RoomConnection for FakeRoom {
    fn connection_state(&self) -> RoomConnectionState {
        *self.state.lock()
    }

    fn remote_participants(&self) -> Vec<String> {
        self.participants.lock().clone()
    }

    async fn open_audio_stream(
        &self,
        participant: &str,
        _sample_rate: u32,
        _num_channels: u32,
    ) -> Result<Option<AudioStream>, RoomError> {
        if !self.participants.lock().iter().any(|p| p == participant) {
            return Err(RoomError::InvalidState(format!("no participant {participant}")));
        }
        let delayed = self
            .audio_delay_attempts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if delayed {
            return Ok(None);
        }
        Ok(self.audio.lock().take())
    }

    async fn publish_audio_track(
        &self,
        name: &str,
        _sample_rate: u32,
        _num_channels: u32,
    ) -> Result<Arc<dyn AudioSink>, RoomError> {
        self.published_tracks.lock().push(name.to_string());
        self.timeline.push(format!("publish:{name}"));
        Ok(Arc::clone(&self.sink) as Arc<dyn AudioSink>)
    }

    async fn unpublish_audio_track(&self, name: &str) -> Result<(), RoomError> {
        self.unpublish_calls.fetch_add(1, Ordering::SeqCst);
        self.timeline.push(format!("unpublish:{name}"));
        Ok(())
    }

    async fn publish_data(&self, topic: &str, payload: Vec<u8>) -> Result<(), RoomError> {
        if let Ok(event) = serde_json::from_slice::<TranscriptEvent>(&payload) {
            let who = if event.is_user { "user" } else { "agent" };
            self.timeline.push(format!("transcript:{who}:{}", event.text));
        }
        self.data.lock().push((topic.to_string(), payload));
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), RoomError> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.timeline.push("leave");
        self.set_state(RoomConnectionState::Disconnected);
        Ok(())
    }
}

pub struct FakeSink {
    state: Arc<Mutex<RoomConnectionState>>,
    frames: Mutex<Vec<AudioFrame>>,
    disconnect_after: Mutex<Option<usize>>,
    capture_errors: Mutex<VecDeque<RoomError>>,
}

impl FakeSink {
    pub fn frames_captured(&self) -> usize {
        self.frames.lock().len()
    }

    /// Flip the room to Disconnected once `n` frames have been captured.
    pub fn disconnect_after(&self, n: usize) {
        *self.disconnect_after.lock() = Some(n);
    }

    /// Fail upcoming captures with these errors, in order.
    pub fn fail_next(&self, error: RoomError) {
        self.capture_errors.lock().push_back(error);
    }
}

#[async_trait]
impl AudioSink for FakeSink {
    async fn capture_frame(&self, frame: &AudioFrame) -> Result<(), RoomError> {
        if let Some(error) = self.capture_errors.lock().pop_front() {
            return Err(error);
        }
        let captured = {
            let mut frames = self.frames.lock();
            frames.push(frame.clone());
            frames.len()
        };
        if *self.disconnect_after.lock() == Some(captured) {
            *self.state.lock() = RoomConnectionState::Disconnected;
        }
        Ok(())
    }
}

// =============================================================================
// Recognizer
// =============================================================================

#[derive(Default)]
pub struct FakeInput {
    pub frames: AtomicUsize,
    pub ended: AtomicBool,
    pub close_calls: AtomicUsize,
    /// `close` never completes when set
    pub hang_on_close: AtomicBool,
}

#[async_trait]
impl STTInput for FakeInput {
    fn push_frame(&self, _frame: AudioFrame) -> Result<(), STTError> {
        if self.ended.load(Ordering::SeqCst) {
            return Err(STTError::InputClosed);
        }
        self.frames.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn end_input(&self) {
        self.ended.store(true, Ordering::SeqCst);
    }

    async fn close(&self) -> Result<(), STTError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.end_input();
        if self.hang_on_close.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

/// Recognizer whose events are pushed by the test through `events()`.
pub struct FakeSTT {
    pub input: Arc<FakeInput>,
    tx: mpsc::UnboundedSender<SpeechEvent>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<SpeechEvent>>>,
    pub fail_open: AtomicBool,
}

impl FakeSTT {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            input: Arc::new(FakeInput::default()),
            tx,
            rx: Mutex::new(Some(rx)),
            fail_open: AtomicBool::new(false),
        }
    }

    pub fn events(&self) -> mpsc::UnboundedSender<SpeechEvent> {
        self.tx.clone()
    }
}

#[async_trait]
impl BaseSTT for FakeSTT {
    async fn stream(&self) -> Result<STTStream, STTError> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(STTError::AuthenticationFailed("bad key".into()));
        }
        let rx = self
            .rx
            .lock()
            .take()
            .ok_or_else(|| STTError::ConfigurationError("stream already opened".into()))?;
        let events = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });
        Ok(STTStream {
            input: Arc::clone(&self.input) as Arc<dyn STTInput>,
            events: events.boxed(),
        })
    }

    fn get_provider_info(&self) -> &'static str {
        "fake recognizer"
    }
}

// =============================================================================
// Synthesizer
// =============================================================================

pub const FAKE_TTS_SAMPLE_RATE: u32 = 24000;

pub struct FakeTTS {
    timeline: Timeline,
    /// Frames produced per utterance
    pub frames_per_utterance: usize,
    /// Audio time per frame, slept between frames
    pub frame_interval: Duration,
    pub quota_exhausted: AtomicBool,
    pub calls: Mutex<Vec<String>>,
}

impl FakeTTS {
    pub fn new(timeline: Timeline) -> Self {
        Self {
            timeline,
            frames_per_utterance: 5,
            frame_interval: Duration::from_millis(20),
            quota_exhausted: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl BaseTTS for FakeTTS {
    fn sample_rate(&self) -> u32 {
        FAKE_TTS_SAMPLE_RATE
    }

    fn num_channels(&self) -> u32 {
        1
    }

    async fn synthesize(&self, text: &str) -> TTSResult<SynthesisStream> {
        self.calls.lock().push(text.to_string());
        if self.quota_exhausted.load(Ordering::SeqCst) {
            return Err(TTSError::QuotaExceeded(
                "429 insufficient_quota: You exceeded your current quota".into(),
            ));
        }
        self.timeline.push(format!("speak:{text}"));

        let interval = self.frame_interval;
        let count = self.frames_per_utterance;
        let samples = (FAKE_TTS_SAMPLE_RATE / 50) as usize;
        let stream = futures::stream::iter(0..count).then(move |i| async move {
            if i > 0 {
                tokio::time::sleep(interval).await;
            }
            Ok::<_, TTSError>(Some(AudioFrame::new(vec![100; samples], FAKE_TTS_SAMPLE_RATE, 1)))
        });
        Ok(stream.boxed())
    }

    fn get_provider_info(&self) -> &'static str {
        "fake synthesizer"
    }
}

// =============================================================================
// Reasoner
// =============================================================================

/// One scripted reply.
pub struct Script {
    pub narrations: Vec<String>,
    pub thinking: Duration,
    pub reply: Result<String, String>,
}

impl Script {
    pub fn reply(text: &str) -> Self {
        Self {
            narrations: Vec::new(),
            thinking: Duration::ZERO,
            reply: Ok(text.to_string()),
        }
    }

    pub fn failure(message: &str) -> Self {
        Self {
            narrations: Vec::new(),
            thinking: Duration::ZERO,
            reply: Err(message.to_string()),
        }
    }

    pub fn narrate(mut self, text: &str) -> Self {
        self.narrations.push(text.to_string());
        self
    }

    pub fn thinking(mut self, duration: Duration) -> Self {
        self.thinking = duration;
        self
    }
}

/// Record of one `respond` call.
#[derive(Debug, Clone)]
pub struct ReasonerCall {
    pub utterance: String,
    pub history: Vec<Utterance>,
}

#[derive(Clone, Default)]
pub struct ReasonerLog {
    pub calls: Arc<Mutex<Vec<ReasonerCall>>>,
}

impl ReasonerLog {
    pub fn calls(&self) -> Vec<ReasonerCall> {
        self.calls.lock().clone()
    }
}

pub struct FakeReasoner {
    scripts: Mutex<VecDeque<Script>>,
    callback: Option<AnnouncementCallback>,
    log: ReasonerLog,
}

impl FakeReasoner {
    pub fn new(scripts: Vec<Script>) -> (Self, ReasonerLog) {
        let log = ReasonerLog::default();
        (
            Self {
                scripts: Mutex::new(scripts.into()),
                callback: None,
                log: log.clone(),
            },
            log,
        )
    }
}

#[async_trait]
impl BaseReasoner for FakeReasoner {
    async fn respond(&self, utterance: &str, history: &[Utterance]) -> ReasonerResult<String> {
        self.log.calls.lock().push(ReasonerCall {
            utterance: utterance.to_string(),
            history: history.to_vec(),
        });
        let script = self
            .scripts
            .lock()
            .pop_front()
            .unwrap_or_else(|| Script::reply("Could you say that again?"));

        if let Some(callback) = &self.callback {
            for narration in script.narrations {
                callback(narration);
            }
        }
        tokio::time::sleep(script.thinking).await;
        script.reply.map_err(ReasonerError::ProviderError)
    }

    fn on_tool_announcement(&mut self, callback: AnnouncementCallback) {
        self.callback = Some(callback);
    }

    fn get_provider_info(&self) -> &'static str {
        "fake reasoner"
    }
}
