//! OpenAI Speech-to-Text (Whisper) integration.
//!
//! The transcription endpoint is batch-only. [`OpenAISTT`] turns it into a
//! streaming recognizer by cutting the inbound audio into utterances with RMS
//! silence detection and uploading each utterance as a WAV file.
//!
//! - API Endpoint: `POST {base_url}/audio/transcriptions`
//! - Max file size: 25MB

mod client;
mod config;

pub use client::OpenAISTT;
pub use config::{OpenAISTTConfig, SilenceDetectionConfig};
