//! Speech-to-text: Whisper transcription and context-aware correction.

pub mod correction;
pub mod whisper;

pub use correction::{SttCorrection, SttCorrectionResult, SttCorrectionService};
pub use whisper::{
    AudioUpload, DEFAULT_TRANSCRIPTION_TIMEOUT, TranscribeFuture, Transcriber, Transcription,
    WHISPER_MODELS, WhisperClient, WhisperModel,
};
