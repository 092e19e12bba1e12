//! Command pipeline: finalized audio (or a ready transcript) in, executed
//! device action out.
//!
//! The pipeline never panics the capture path: every per-call failure —
//! recognizer down, intent service confused, unknown device — maps to a
//! structured [`CommandOutcome`], with at most one best-effort spoken
//! notice.

pub mod intent;
pub mod registry;
pub mod speak;

pub use intent::{HttpIntentParser, IntentOutcome, IntentParser};
pub use registry::{ApplyError, DeviceAction, DeviceRegistry, DeviceSpec};
pub use speak::{NullSpeaker, ProcessSpeaker, Speaker};

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::buffering::chunk::CommandAudio;
use crate::transcribe::{TranscribeOutcome, TranscriberHandle};
use crate::wake::WakePhrase;

/// Default intent vocabulary handed to the interpreter.
pub const DEFAULT_INTENTS: &str = "turn_on, turn_off";

/// Terminal result of one command attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum CommandOutcome {
    /// Device action applied.
    Executed {
        device: String,
        intent: String,
        message: String,
    },
    /// Speech understood, command refused (unknown device, bad action).
    Rejected { message: String },
    /// The recognizer heard no intelligible speech.
    NoSpeech,
    /// A backend call failed; capture continues regardless.
    ServiceError { message: String },
}

impl CommandOutcome {
    /// Short user-facing line for speech/log output.
    pub fn notice(&self) -> &str {
        match self {
            CommandOutcome::Executed { message, .. } => message,
            CommandOutcome::Rejected { message } => message,
            CommandOutcome::NoSpeech => "Could not understand the audio. Please try again.",
            CommandOutcome::ServiceError { message } => message,
        }
    }
}

/// Consumer of finalized command audio. The capture session only knows this
/// trait; [`CommandPipeline`] is its production implementation.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle_audio(&self, audio: CommandAudio) -> CommandOutcome;
}

/// Transcription + interpretation + execution, wired together.
pub struct CommandPipeline {
    transcriber: TranscriberHandle,
    intent: Arc<dyn IntentParser>,
    registry: Arc<DeviceRegistry>,
    speaker: Arc<dyn Speaker>,
    wake: WakePhrase,
}

impl CommandPipeline {
    pub fn new(
        transcriber: TranscriberHandle,
        intent: Arc<dyn IntentParser>,
        registry: Arc<DeviceRegistry>,
        speaker: Arc<dyn Speaker>,
        wake: WakePhrase,
    ) -> Self {
        Self {
            transcriber,
            intent,
            registry,
            speaker,
            wake,
        }
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    /// Run a ready transcript through interpretation and execution.
    pub async fn handle_transcript(&self, transcript: &str) -> CommandOutcome {
        info!(transcript, "interpreting command");

        let outcome = match self.intent.interpret(transcript).await {
            Ok(IntentOutcome::Command { device, intent }) => {
                match self.registry.apply(&device, &intent) {
                    Ok(action) => CommandOutcome::Executed {
                        device: action.device_id.clone(),
                        intent,
                        message: action.message(),
                    },
                    Err(e) => CommandOutcome::Rejected {
                        message: format!("Sorry, I couldn't control {device}: {e}"),
                    },
                }
            }
            Ok(IntentOutcome::Unsupported { message }) => CommandOutcome::Rejected { message },
            Err(e) => {
                warn!(error = %e, "intent interpretation failed");
                CommandOutcome::ServiceError {
                    message: "Command interpretation is unavailable right now.".to_string(),
                }
            }
        };

        self.speaker.speak(outcome.notice()).await;
        outcome
    }

    /// Batch entry: transcribe a finished clip, then interpret the whole
    /// transcript (no wake-phrase anchoring — the clip *is* the command).
    pub async fn handle_clip_audio(&self, audio: &CommandAudio) -> CommandOutcome {
        match self.transcriber.transcribe(audio).await {
            Ok(TranscribeOutcome::Text(text)) => self.handle_transcript(&text).await,
            Ok(TranscribeOutcome::NoSpeech) => {
                let outcome = CommandOutcome::NoSpeech;
                self.speaker.speak(outcome.notice()).await;
                outcome
            }
            Err(e) => {
                warn!(error = %e, "clip transcription failed");
                CommandOutcome::ServiceError {
                    message: "Speech recognition is unavailable right now.".to_string(),
                }
            }
        }
    }
}

#[async_trait]
impl CommandHandler for CommandPipeline {
    /// Streaming entry: the ring snapshot still contains pre-roll audio
    /// from before the wake phrase, so the transcript is anchored to the
    /// last wake-phrase occurrence before interpretation.
    async fn handle_audio(&self, audio: CommandAudio) -> CommandOutcome {
        match self.transcriber.transcribe(&audio).await {
            Ok(TranscribeOutcome::Text(text)) => {
                let command = self.wake.command_text(&text);
                info!(full = %text, command = %command, "command captured");
                self.handle_transcript(&command).await
            }
            Ok(TranscribeOutcome::NoSpeech) => {
                let outcome = CommandOutcome::NoSpeech;
                self.speaker.speak(outcome.notice()).await;
                outcome
            }
            Err(e) => {
                warn!(error = %e, "command transcription failed");
                CommandOutcome::ServiceError {
                    message: "Speech recognition is unavailable right now.".to_string(),
                }
            }
        }
    }
}
