//! `StubTranscriber` — deterministic recognizer for development and tests.

use async_trait::async_trait;

use super::{Transcriber, TranscribeOutcome};
use crate::buffering::chunk::CommandAudio;
use crate::error::Result;

/// Minimum samples before the stub pretends to have heard anything.
const MIN_AUDIBLE_SAMPLES: usize = 160;

/// Deterministic echo-style transcriber.
///
/// With a fixed phrase it always returns that phrase for audible input —
/// handy for exercising the wake/finalize path end to end without a
/// recognizer account. Without one it echoes the audio's shape.
pub struct StubTranscriber {
    fixed: Option<String>,
}

impl StubTranscriber {
    pub fn new() -> Self {
        Self { fixed: None }
    }

    /// Always answer `phrase` for non-trivial audio.
    pub fn with_text(phrase: impl Into<String>) -> Self {
        Self {
            fixed: Some(phrase.into()),
        }
    }
}

impl Default for StubTranscriber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transcriber for StubTranscriber {
    async fn transcribe(&self, audio: &CommandAudio) -> Result<TranscribeOutcome> {
        if audio.samples.len() < MIN_AUDIBLE_SAMPLES {
            return Ok(TranscribeOutcome::NoSpeech);
        }
        let text = match &self.fixed {
            Some(phrase) => phrase.clone(),
            None => format!(
                "[stub: {} samples @ {} Hz]",
                audio.samples.len(),
                audio.sample_rate
            ),
        };
        Ok(TranscribeOutcome::Text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn short_audio_is_no_speech() {
        let stub = StubTranscriber::new();
        let audio = CommandAudio {
            samples: vec![0; 10],
            sample_rate: 16_000,
        };
        assert_eq!(stub.transcribe(&audio).await.unwrap(), TranscribeOutcome::NoSpeech);
    }

    #[tokio::test]
    async fn same_clip_same_transcript() {
        let stub = StubTranscriber::with_text("computer turn on the kitchen light");
        let audio = CommandAudio {
            samples: vec![1_000; 4_000],
            sample_rate: 16_000,
        };
        let first = stub.transcribe(&audio).await.unwrap();
        let second = stub.transcribe(&audio).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first.text(),
            Some("computer turn on the kitchen light")
        );
    }
}
