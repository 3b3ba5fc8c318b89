pub mod audio;
pub mod openai;
pub mod reasoner;
pub mod stt;
pub mod tts;

// Re-export commonly used types for convenience
pub use audio::{AudioFrame, FRAME_DURATION_MS};

pub use stt::{
    BaseSTT, STTConfig, STTError, STTInput, STTProvider, STTStream, SpeechAlternative,
    SpeechEvent, create_stt_provider, get_supported_stt_providers,
};

pub use tts::{BaseTTS, BoxedTTS, SynthesisStream, TTSConfig, TTSError, TTSResult, create_tts_provider};

pub use reasoner::{
    AnnouncementCallback, BaseReasoner, ReasonerError, ReasonerResult, ReasonerTool, Role,
    Utterance,
};
