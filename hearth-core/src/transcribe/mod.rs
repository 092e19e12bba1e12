//! Speech-to-text capability.
//!
//! The `Transcriber` trait decouples the session from any specific
//! recognizer backend (remote HTTP service, deterministic stub, test
//! scripts). The recognizer is a network round trip — the single
//! highest-latency call in the engine — so the trait is async and is only
//! ever invoked from spawned tasks, never from the thread draining the
//! capture ring.
//!
//! "Heard nothing" is a *result*, not an error: probes over ambient noise
//! resolve to `NoSpeech` all day long.

pub mod remote;
pub mod stub;

pub use remote::HttpTranscriber;
pub use stub::StubTranscriber;

use std::sync::Arc;

use async_trait::async_trait;

use crate::buffering::chunk::CommandAudio;
use crate::error::Result;

/// Outcome of one transcription call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscribeOutcome {
    /// Recognized speech.
    Text(String),
    /// The recognizer found no intelligible speech in the audio.
    NoSpeech,
}

impl TranscribeOutcome {
    /// The recognized text, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            TranscribeOutcome::Text(t) => Some(t),
            TranscribeOutcome::NoSpeech => None,
        }
    }
}

/// Contract for speech recognition backends.
///
/// # Errors
/// Implementations return an error only for transport/service failures;
/// unintelligible audio is `Ok(TranscribeOutcome::NoSpeech)`.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &CommandAudio) -> Result<TranscribeOutcome>;
}

/// Shared handle to any transcriber implementation.
pub type TranscriberHandle = Arc<dyn Transcriber>;
