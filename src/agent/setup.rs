//! Session establishment: wait for the caller, publish the agent's voice
//! track, then locate the caller's audio.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::SessionError;
use super::room::{AGENT_TRACK_NAME, AudioStream, OutboundTrack, RoomConnection};

#[derive(Debug, Clone)]
pub struct SetupConfig {
    /// How long to wait for a remote participant to join.
    pub participant_timeout: Duration,
    /// Total time allowed to find the participant's audio track.
    pub audio_track_timeout: Duration,
    /// Interval between participant and audio-track checks.
    pub poll_interval: Duration,
    /// Format requested for inbound audio.
    pub inbound_sample_rate: u32,
    pub inbound_channels: u32,
    /// Format of the published outbound track.
    pub outbound_sample_rate: u32,
    pub outbound_channels: u32,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            participant_timeout: Duration::from_secs(300),
            audio_track_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(100),
            inbound_sample_rate: 16000,
            inbound_channels: 1,
            outbound_sample_rate: 24000,
            outbound_channels: 1,
        }
    }
}

impl SetupConfig {
    /// Number of audio-track checks, at least one.
    pub fn audio_track_attempts(&self) -> u32 {
        let poll = self.poll_interval.as_millis().max(1);
        ((self.audio_track_timeout.as_millis() / poll) as u32).max(1)
    }
}

/// Result of a successful setup.
pub struct Established {
    pub participant: String,
    pub audio: AudioStream,
}

pub struct ConnectionSetup {
    room: Arc<dyn RoomConnection>,
    config: SetupConfig,
}

impl ConnectionSetup {
    pub fn new(room: Arc<dyn RoomConnection>, config: SetupConfig) -> Self {
        Self { room, config }
    }

    /// Block until a remote participant is present.
    pub async fn wait_for_participant(&self) -> Result<String, SessionError> {
        let deadline = Instant::now() + self.config.participant_timeout;
        loop {
            if let Some(identity) = self.room.remote_participants().into_iter().next() {
                info!(participant = %identity, "Participant joined");
                return Ok(identity);
            }
            if !self.room.is_connected() {
                return Err(SessionError::Room(super::room::RoomError::Disconnected));
            }
            if Instant::now() >= deadline {
                return Err(SessionError::NoParticipant(self.config.participant_timeout));
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Create and publish the agent's outbound voice track.
    pub async fn publish_outbound(&self) -> Result<Arc<OutboundTrack>, SessionError> {
        let sink = self
            .room
            .publish_audio_track(
                AGENT_TRACK_NAME,
                self.config.outbound_sample_rate,
                self.config.outbound_channels,
            )
            .await?;
        info!(track = AGENT_TRACK_NAME, "Published agent audio track");
        Ok(Arc::new(OutboundTrack::new(
            AGENT_TRACK_NAME,
            sink,
            self.config.outbound_sample_rate,
            self.config.outbound_channels,
        )))
    }

    /// Poll for the participant's audio track.
    pub async fn locate_audio(&self, participant: &str) -> Result<AudioStream, SessionError> {
        let attempts = self.config.audio_track_attempts();
        for attempt in 1..=attempts {
            match self
                .room
                .open_audio_stream(
                    participant,
                    self.config.inbound_sample_rate,
                    self.config.inbound_channels,
                )
                .await
            {
                Ok(Some(stream)) => {
                    info!(participant, attempt, "Found participant audio track");
                    return Ok(stream);
                }
                Ok(None) => debug!(participant, attempt, "Audio track not available yet"),
                Err(e) => warn!(participant, attempt, "Failed to open audio track: {e}"),
            }
            if attempt < attempts {
                tokio::time::sleep(self.config.poll_interval).await;
            }
        }
        Err(SessionError::NoAudioTrack {
            participant: participant.to_string(),
            waited: self.config.audio_track_timeout,
        })
    }

    /// Run the full setup sequence.
    ///
    /// `on_published` receives the outbound track as soon as it exists so a
    /// later failure can still unpublish it.
    pub async fn establish(
        &self,
        on_published: impl FnOnce(Arc<OutboundTrack>),
    ) -> Result<(Established, Arc<OutboundTrack>), SessionError> {
        let participant = self.wait_for_participant().await?;
        let track = self.publish_outbound().await?;
        on_published(Arc::clone(&track));
        let audio = self.locate_audio(&participant).await?;
        Ok((Established { participant, audio }, track))
    }
}
