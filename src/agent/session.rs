//! Session lifecycle: setup, greeting, the four long-running tasks and teardown.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{info, warn};
use uuid::Uuid;

use super::SessionError;
use super::announcements::{AnnouncementChannel, run_announcements};
use super::coordinator::TranscriptionCoordinator;
use super::dispatcher::ResponseDispatcher;
use super::ingest::run_ingest;
use super::room::{AudioStream, RoomConnection};
use super::setup::{ConnectionSetup, SetupConfig};
use super::shutdown::{ShutdownCoordinator, ShutdownTrigger, watch_disconnect};
use super::speech::SpeechOutputStreamer;
use super::state::{ChatHistory, TurnFlags};
use super::transcript::TranscriptSink;
use crate::core::reasoner::BaseReasoner;
use crate::core::stt::{BaseSTT, STTStream};
use crate::core::tts::BaseTTS;

pub const DEFAULT_GREETING: &str =
    "Hey! I'm Paradise, your travel planning buddy. What can I help you with today?";

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Identical finals within this window are suppressed.
    pub dedup_window: Duration,
    /// Pause before the reasoner is called.
    pub pre_think_delay: Duration,
    pub announcement_poll: Duration,
    pub disconnect_poll: Duration,
    pub recognizer_close_timeout: Duration,
    /// How long tasks get to stop after cancellation before being aborted.
    pub task_shutdown_timeout: Duration,
    /// Spoken once after setup. `None` disables it.
    pub greeting: Option<String>,
    pub setup: SetupConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dedup_window: Duration::from_secs(2),
            pre_think_delay: Duration::from_millis(500),
            announcement_poll: Duration::from_millis(100),
            disconnect_poll: Duration::from_millis(500),
            recognizer_close_timeout: Duration::from_secs(5),
            task_shutdown_timeout: Duration::from_secs(3),
            greeting: Some(DEFAULT_GREETING.to_string()),
            setup: SetupConfig::default(),
        }
    }
}

/// What a finished session reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub participant: String,
    pub trigger: ShutdownTrigger,
    /// Utterances recorded in the chat history, both roles.
    pub utterances: usize,
}

/// A fully established session, ready to run.
pub struct AgentSession {
    id: Uuid,
    config: SessionConfig,
    participant: String,
    room: Arc<dyn RoomConnection>,
    shutdown: Arc<ShutdownCoordinator>,
    history: ChatHistory,
    transcript: TranscriptSink,
    speech: SpeechOutputStreamer,
    announcements: AnnouncementChannel,
    coordinator: TranscriptionCoordinator,
    audio: AudioStream,
    recognizer: STTStream,
}

impl AgentSession {
    /// Run connection setup and open the recognizer.
    ///
    /// On failure everything allocated so far is released before the error
    /// is returned.
    pub async fn start(
        room: Arc<dyn RoomConnection>,
        stt: &dyn BaseSTT,
        tts: Arc<dyn BaseTTS>,
        mut reasoner: Box<dyn BaseReasoner>,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let shutdown = Arc::new(ShutdownCoordinator::new(
            config.recognizer_close_timeout,
            config.task_shutdown_timeout,
        ));
        shutdown.register_room(Arc::clone(&room));

        let announcements = AnnouncementChannel::new();
        shutdown.register_announcements(announcements.clone());

        let setup = ConnectionSetup::new(Arc::clone(&room), config.setup.clone());
        let (established, track) = match setup
            .establish(|track| shutdown.register_track(track))
            .await
        {
            Ok(done) => done,
            Err(e) => {
                warn!("Session setup failed: {e}");
                shutdown.cleanup().await;
                return Err(e);
            }
        };

        let recognizer = match stt.stream().await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(provider = stt.get_provider_info(), "Failed to open recognizer: {e}");
                shutdown.cleanup().await;
                return Err(e.into());
            }
        };
        shutdown.register_recognizer(Arc::clone(&recognizer.input));

        reasoner.on_tool_announcement(announcements.callback());
        let reasoner: Arc<dyn BaseReasoner> = Arc::from(reasoner);

        let flags = TurnFlags::new();
        let history = ChatHistory::new();
        let transcript = TranscriptSink::new(Arc::clone(&room));
        let speech = SpeechOutputStreamer::new(Arc::clone(&room), track, tts, Arc::clone(&flags));
        let dispatcher = ResponseDispatcher::new(
            reasoner,
            history.clone(),
            transcript.clone(),
            speech.clone(),
            announcements.clone(),
            config.pre_think_delay,
        );
        let coordinator = TranscriptionCoordinator::new(
            flags,
            config.dedup_window,
            history.clone(),
            transcript.clone(),
            dispatcher,
        );

        let id = Uuid::new_v4();
        info!(session_id = %id, participant = %established.participant, "Session established");
        Ok(Self {
            id,
            config,
            participant: established.participant,
            room,
            shutdown,
            history,
            transcript,
            speech,
            announcements,
            coordinator,
            audio: established.audio,
            recognizer,
        })
    }

    /// Random id tagging this session's log lines.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn participant(&self) -> &str {
        &self.participant
    }

    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Greet the caller, run until a shutdown trigger, then clean up.
    pub async fn run<F>(self, signal: F) -> SessionSummary
    where
        F: Future<Output = ()> + Send,
    {
        let Self {
            id,
            config,
            participant,
            room,
            shutdown,
            history,
            transcript,
            speech,
            announcements,
            coordinator,
            audio,
            recognizer,
        } = self;
        tokio::pin!(signal);

        if let Some(greeting) = config.greeting.as_deref().filter(|g| !g.trim().is_empty()) {
            let greet = async {
                transcript.emit(greeting, false).await;
                speech.speak(greeting).await
            };
            tokio::select! {
                _ = &mut signal => {
                    shutdown.trigger(&ShutdownTrigger::Signal);
                    shutdown.cleanup().await;
                    return SessionSummary {
                        participant,
                        trigger: ShutdownTrigger::Signal,
                        utterances: history.len(),
                    };
                }
                outcome = greet => info!(session_id = %id, ?outcome, "Greeting delivered"),
            }
        }

        let token = shutdown.token();
        let mut tasks = JoinSet::new();
        {
            let token = token.clone();
            let input = Arc::clone(&recognizer.input);
            tasks.spawn(async move {
                run_ingest(audio, input, token).await;
                "ingest"
            });
        }
        {
            let token = token.clone();
            let events = recognizer.events;
            tasks.spawn(async move {
                coordinator.run(events, token).await;
                "transcription"
            });
        }
        {
            let token = token.clone();
            let poll = config.announcement_poll;
            tasks.spawn(async move {
                run_announcements(announcements, transcript, speech, poll, token).await;
                "announcements"
            });
        }
        tasks.spawn(watch_disconnect(Arc::clone(&room), config.disconnect_poll, token));

        let trigger = shutdown.supervise(tasks, signal).await;
        shutdown.cleanup().await;

        let summary = SessionSummary {
            participant,
            trigger,
            utterances: history.len(),
        };
        info!(
            session_id = %id,
            trigger = %summary.trigger,
            utterances = summary.utterances,
            "Session ended"
        );
        summary
    }
}
