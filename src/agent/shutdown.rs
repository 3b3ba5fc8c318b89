//! Session teardown: trigger detection, task cancellation and one-shot cleanup.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::announcements::AnnouncementChannel;
use super::room::{OutboundTrack, RoomConnection, RoomConnectionState};
use crate::core::stt::STTInput;

/// Name returned by the disconnect watcher task.
pub const DISCONNECT_WATCH_TASK: &str = "disconnect_watch";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    Running,
    ShuttingDown,
    Terminated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownTrigger {
    RoomDisconnected,
    Signal,
    /// The session token was cancelled from elsewhere
    Cancelled,
    /// A long-running task returned first
    TaskFinished(&'static str),
    /// A long-running task panicked or was aborted
    TaskFailed(String),
}

impl fmt::Display for ShutdownTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownTrigger::RoomDisconnected => write!(f, "room disconnected"),
            ShutdownTrigger::Signal => write!(f, "termination signal"),
            ShutdownTrigger::Cancelled => write!(f, "cancelled"),
            ShutdownTrigger::TaskFinished(name) => write!(f, "task '{name}' finished"),
            ShutdownTrigger::TaskFailed(msg) => write!(f, "task failed: {msg}"),
        }
    }
}

/// One-shot flag: only the first claimant runs cleanup.
#[derive(Debug, Default)]
pub struct CleanupGuard(AtomicBool);

impl CleanupGuard {
    pub fn try_claim(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }

    pub fn is_claimed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Resources to release at teardown. Any of them may be missing when setup
/// failed part-way.
#[derive(Default)]
pub struct SessionResources {
    pub room: Option<Arc<dyn RoomConnection>>,
    pub track: Option<Arc<OutboundTrack>>,
    pub recognizer: Option<Arc<dyn STTInput>>,
    pub announcements: Option<AnnouncementChannel>,
}

pub struct ShutdownCoordinator {
    phase: Mutex<ShutdownPhase>,
    cancel: CancellationToken,
    cleanup: CleanupGuard,
    resources: Mutex<SessionResources>,
    recognizer_close_timeout: Duration,
    task_shutdown_timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new(recognizer_close_timeout: Duration, task_shutdown_timeout: Duration) -> Self {
        Self {
            phase: Mutex::new(ShutdownPhase::Running),
            cancel: CancellationToken::new(),
            cleanup: CleanupGuard::default(),
            resources: Mutex::new(SessionResources::default()),
            recognizer_close_timeout,
            task_shutdown_timeout,
        }
    }

    /// Token shared by every long-running task of the session.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn phase(&self) -> ShutdownPhase {
        *self.phase.lock()
    }

    pub fn register_room(&self, room: Arc<dyn RoomConnection>) {
        self.resources.lock().room = Some(room);
    }

    pub fn register_track(&self, track: Arc<OutboundTrack>) {
        self.resources.lock().track = Some(track);
    }

    pub fn register_recognizer(&self, input: Arc<dyn STTInput>) {
        self.resources.lock().recognizer = Some(input);
    }

    pub fn register_announcements(&self, channel: AnnouncementChannel) {
        self.resources.lock().announcements = Some(channel);
    }

    /// Move to ShuttingDown and cancel all tasks. Idempotent.
    pub fn trigger(&self, reason: &ShutdownTrigger) {
        let mut phase = self.phase.lock();
        if *phase == ShutdownPhase::Running {
            info!(%reason, "Session shutting down");
            *phase = ShutdownPhase::ShuttingDown;
        }
        drop(phase);
        self.cancel.cancel();
    }

    /// Wait for the first of: external signal, token cancellation, any task
    /// returning. Then cancel everything and wait (bounded) for the rest.
    pub async fn supervise<F>(&self, mut tasks: JoinSet<&'static str>, signal: F) -> ShutdownTrigger
    where
        F: Future<Output = ()>,
    {
        let reason = tokio::select! {
            _ = signal => ShutdownTrigger::Signal,
            _ = self.cancel.cancelled() => ShutdownTrigger::Cancelled,
            joined = tasks.join_next() => match joined {
                Some(Ok(DISCONNECT_WATCH_TASK)) => ShutdownTrigger::RoomDisconnected,
                Some(Ok(name)) => ShutdownTrigger::TaskFinished(name),
                Some(Err(e)) => ShutdownTrigger::TaskFailed(e.to_string()),
                None => ShutdownTrigger::TaskFinished("none"),
            },
        };

        self.trigger(&reason);
        self.join_remaining(&mut tasks).await;
        reason
    }

    async fn join_remaining(&self, tasks: &mut JoinSet<&'static str>) {
        let drained = tokio::time::timeout(self.task_shutdown_timeout, async {
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(name) => debug!(task = name, "Task stopped"),
                    Err(e) if e.is_cancelled() => {}
                    Err(e) => error!("Task failed during shutdown: {e}"),
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                remaining = tasks.len(),
                "Tasks did not stop in time, aborting"
            );
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }
    }

    /// Release every registered resource exactly once. Never fails.
    ///
    /// Returns false if cleanup had already run.
    pub async fn cleanup(&self) -> bool {
        if !self.cleanup.try_claim() {
            debug!("Cleanup already performed");
            return false;
        }
        self.trigger(&ShutdownTrigger::TaskFinished("cleanup"));

        let resources = std::mem::take(&mut *self.resources.lock());

        if let Some(recognizer) = resources.recognizer {
            recognizer.end_input();
            match tokio::time::timeout(self.recognizer_close_timeout, recognizer.close()).await {
                Ok(Ok(())) => debug!("Recognizer closed"),
                Ok(Err(e)) => warn!("Recognizer close failed: {e}"),
                Err(_) => warn!(
                    timeout_ms = self.recognizer_close_timeout.as_millis() as u64,
                    "Recognizer close timed out"
                ),
            }
        }

        if let Some(channel) = resources.announcements {
            let dropped = channel.drain();
            if dropped > 0 {
                debug!(dropped, "Discarded pending announcements");
            }
        }

        if let Some(room) = resources.room {
            if let Some(track) = resources.track
                && track.mark_unpublished()
                && room.connection_state() != RoomConnectionState::Disconnected
                && let Err(e) = room.unpublish_audio_track(track.name()).await
            {
                warn!(track = track.name(), "Failed to unpublish track: {e}");
            }

            if let Err(e) = room.disconnect().await {
                warn!("Failed to leave room: {e}");
            }
        } else if let Some(track) = resources.track {
            track.mark_unpublished();
        }

        *self.phase.lock() = ShutdownPhase::Terminated;
        info!("Session cleanup complete");
        true
    }
}

/// Resolve once the room reports Disconnected, checking every `poll`.
pub async fn watch_disconnect(
    room: Arc<dyn RoomConnection>,
    poll: Duration,
    cancel: CancellationToken,
) -> &'static str {
    loop {
        if room.connection_state() == RoomConnectionState::Disconnected {
            info!("Room disconnected");
            return DISCONNECT_WATCH_TASK;
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return DISCONNECT_WATCH_TASK,
            _ = tokio::time::sleep(poll) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_guard_claims_once() {
        let guard = CleanupGuard::default();
        assert!(!guard.is_claimed());
        assert!(guard.try_claim());
        assert!(!guard.try_claim());
        assert!(guard.is_claimed());
    }

    #[tokio::test]
    async fn test_cleanup_with_nothing_registered() {
        let shutdown = ShutdownCoordinator::new(Duration::from_secs(5), Duration::from_secs(1));
        assert_eq!(shutdown.phase(), ShutdownPhase::Running);
        assert!(shutdown.cleanup().await);
        assert!(!shutdown.cleanup().await);
        assert_eq!(shutdown.phase(), ShutdownPhase::Terminated);
        assert!(shutdown.token().is_cancelled());
    }

    #[tokio::test]
    async fn test_supervise_reports_first_finished_task() {
        let shutdown = ShutdownCoordinator::new(Duration::from_secs(5), Duration::from_secs(1));
        let token = shutdown.token();
        let mut tasks = JoinSet::new();
        tasks.spawn(async { "ingest" });
        tasks.spawn(async move {
            token.cancelled().await;
            "transcription"
        });

        let reason = shutdown.supervise(tasks, std::future::pending()).await;
        assert_eq!(reason, ShutdownTrigger::TaskFinished("ingest"));
        assert_eq!(shutdown.phase(), ShutdownPhase::ShuttingDown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_supervise_aborts_stuck_tasks() {
        let shutdown = ShutdownCoordinator::new(Duration::from_secs(5), Duration::from_secs(1));
        let mut tasks = JoinSet::new();
        tasks.spawn(async {
            std::future::pending::<()>().await;
            "stuck"
        });

        let reason = shutdown.supervise(tasks, async {}).await;
        assert_eq!(reason, ShutdownTrigger::Signal);
    }

    #[tokio::test(start_paused = true)]
    async fn test_supervise_reports_outside_cancellation() {
        let shutdown = ShutdownCoordinator::new(Duration::from_secs(5), Duration::from_secs(1));
        let mut tasks = JoinSet::new();
        tasks.spawn(async {
            std::future::pending::<()>().await;
            "stuck"
        });
        shutdown.token().cancel();

        let reason = shutdown.supervise(tasks, std::future::pending()).await;
        assert_eq!(reason, ShutdownTrigger::Cancelled);
        assert_eq!(reason.to_string(), "cancelled");
        assert_eq!(shutdown.phase(), ShutdownPhase::ShuttingDown);
    }
}
