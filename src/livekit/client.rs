use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use livekit::prelude::{
    ConnectionState, DataPacket, LocalAudioTrack, LocalTrack, RemoteTrack, Room, RoomEvent,
    RoomOptions, TrackSid, TrackSource,
};
use livekit::options::TrackPublishOptions;
use livekit::webrtc::audio_frame::AudioFrame as RtcAudioFrame;
use livekit::webrtc::audio_source::native::NativeAudioSource;
use livekit::webrtc::audio_source::{AudioSourceOptions, RtcAudioSource};
use livekit::webrtc::audio_stream::native::NativeAudioStream;
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::agent::{AudioSink, AudioStream, RoomConnection, RoomConnectionState, RoomError};
use crate::core::audio::AudioFrame;

/// Queue depth of the native audio source.
const SOURCE_QUEUE_MS: u32 = 1000;

/// A joined LiveKit room.
pub struct LiveKitRoom {
    room: Room,
    /// Published track name -> server-assigned sid
    tracks: Mutex<HashMap<String, TrackSid>>,
    events: JoinHandle<()>,
}

impl LiveKitRoom {
    /// Connect to `url` with a pre-signed join token.
    pub async fn connect(url: &str, token: &str) -> Result<Self, RoomError> {
        let (room, events) = Room::connect(url, token, RoomOptions::default())
            .await
            .map_err(|e| RoomError::ConnectionFailed(e.to_string()))?;
        info!(room = %room.name(), "Connected to LiveKit room");

        Ok(Self {
            room,
            tracks: Mutex::new(HashMap::new()),
            events: tokio::spawn(log_room_events(events)),
        })
    }

    pub fn name(&self) -> String {
        self.room.name()
    }
}

impl Drop for LiveKitRoom {
    fn drop(&mut self) {
        self.events.abort();
    }
}

async fn log_room_events(mut events: UnboundedReceiver<RoomEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            RoomEvent::ParticipantConnected(participant) => {
                info!(participant = %participant.identity(), "Participant connected");
            }
            RoomEvent::ParticipantDisconnected(participant) => {
                info!(participant = %participant.identity(), "Participant disconnected");
            }
            RoomEvent::TrackSubscribed { participant, .. } => {
                debug!(participant = %participant.identity(), "Track subscribed");
            }
            RoomEvent::Disconnected { reason } => {
                info!(?reason, "Room disconnected");
            }
            _ => {}
        }
    }
}

fn rtc_error(e: impl std::fmt::Debug) -> RoomError {
    RoomError::from_transport_message(format!("{e:?}"))
}

#[async_trait]
impl RoomConnection for LiveKitRoom {
    fn connection_state(&self) -> RoomConnectionState {
        match self.room.connection_state() {
            ConnectionState::Connected => RoomConnectionState::Connected,
            ConnectionState::Reconnecting => RoomConnectionState::Reconnecting,
            ConnectionState::Disconnected => RoomConnectionState::Disconnected,
        }
    }

    fn remote_participants(&self) -> Vec<String> {
        self.room
            .remote_participants()
            .keys()
            .map(|identity| identity.as_str().to_string())
            .collect()
    }

    async fn open_audio_stream(
        &self,
        participant: &str,
        sample_rate: u32,
        num_channels: u32,
    ) -> Result<Option<AudioStream>, RoomError> {
        let participants = self.room.remote_participants();
        let Some(remote) = participants
            .iter()
            .find(|(identity, _)| identity.as_str() == participant)
            .map(|(_, remote)| remote)
        else {
            return Err(RoomError::InvalidState(format!(
                "participant '{participant}' left the room"
            )));
        };

        let audio = remote
            .track_publications()
            .into_values()
            .find_map(|publication| match publication.track() {
                Some(RemoteTrack::Audio(track)) => Some(track),
                _ => None,
            });
        let Some(track) = audio else {
            return Ok(None);
        };

        let stream = NativeAudioStream::new(track.rtc_track(), sample_rate as i32, num_channels as i32)
            .map(|frame| {
                Ok(AudioFrame::new(
                    frame.data.to_vec(),
                    frame.sample_rate,
                    frame.num_channels,
                ))
            });
        Ok(Some(stream.boxed()))
    }

    async fn publish_audio_track(
        &self,
        name: &str,
        sample_rate: u32,
        num_channels: u32,
    ) -> Result<Arc<dyn AudioSink>, RoomError> {
        let source = NativeAudioSource::new(
            AudioSourceOptions::default(),
            sample_rate,
            num_channels,
            SOURCE_QUEUE_MS,
        );
        let track = LocalAudioTrack::create_audio_track(name, RtcAudioSource::Native(source.clone()));

        let publication = self
            .room
            .local_participant()
            .publish_track(
                LocalTrack::Audio(track),
                TrackPublishOptions {
                    source: TrackSource::Microphone,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| RoomError::PublishFailed(e.to_string()))?;

        self.tracks.lock().insert(name.to_string(), publication.sid());
        Ok(Arc::new(LiveKitSink { source }))
    }

    async fn unpublish_audio_track(&self, name: &str) -> Result<(), RoomError> {
        let Some(sid) = self.tracks.lock().remove(name) else {
            debug!(track = name, "Track not published, nothing to unpublish");
            return Ok(());
        };
        self.room
            .local_participant()
            .unpublish_track(&sid)
            .await
            .map(|_| ())
            .map_err(rtc_error)
    }

    async fn publish_data(&self, topic: &str, payload: Vec<u8>) -> Result<(), RoomError> {
        self.room
            .local_participant()
            .publish_data(DataPacket {
                payload,
                topic: Some(topic.to_string()),
                reliable: true,
                ..Default::default()
            })
            .await
            .map_err(rtc_error)
    }

    async fn disconnect(&self) -> Result<(), RoomError> {
        if self.room.connection_state() == ConnectionState::Disconnected {
            return Ok(());
        }
        self.room.close().await.map_err(rtc_error)
    }
}

/// Outbound audio sink backed by a native audio source.
pub struct LiveKitSink {
    source: NativeAudioSource,
}

#[async_trait]
impl AudioSink for LiveKitSink {
    async fn capture_frame(&self, frame: &AudioFrame) -> Result<(), RoomError> {
        let rtc_frame = RtcAudioFrame {
            data: Cow::Borrowed(&frame.data),
            sample_rate: frame.sample_rate,
            num_channels: frame.num_channels,
            samples_per_channel: frame.samples_per_channel(),
        };
        self.source.capture_frame(&rtc_frame).await.map_err(rtc_error)
    }
}
