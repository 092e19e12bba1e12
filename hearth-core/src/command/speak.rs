//! Spoken feedback. Optional, fire-and-forget: a failed speak call is
//! logged and forgotten, never propagated into the command path.

use async_trait::async_trait;
use tracing::{debug, warn};

/// Speech synthesis capability.
#[async_trait]
pub trait Speaker: Send + Sync {
    /// Say `text` out loud, best effort.
    async fn speak(&self, text: &str);
}

/// Silent speaker for headless deployments and tests.
pub struct NullSpeaker;

#[async_trait]
impl Speaker for NullSpeaker {
    async fn speak(&self, text: &str) {
        debug!(text, "speech output suppressed");
    }
}

/// Speaker that shells out to a platform TTS binary (`say` on macOS,
/// `espeak` on Linux).
pub struct ProcessSpeaker {
    program: String,
}

impl ProcessSpeaker {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Locate a usable TTS binary on this machine, if any.
    pub fn platform_default() -> Option<Self> {
        for candidate in ["say", "espeak", "espeak-ng"] {
            if which::which(candidate).is_ok() {
                return Some(Self::new(candidate));
            }
        }
        None
    }
}

#[async_trait]
impl Speaker for ProcessSpeaker {
    async fn speak(&self, text: &str) {
        // Strip control characters before handing text to a shell-spawned
        // process.
        let sanitized: String = text.chars().filter(|c| !c.is_control()).collect();
        if sanitized.is_empty() {
            return;
        }

        match tokio::process::Command::new(&self.program)
            .arg(&sanitized)
            .output()
            .await
        {
            Ok(output) if output.status.success() => {}
            Ok(output) => warn!(
                program = %self.program,
                status = %output.status,
                "speech synthesis exited non-zero"
            ),
            Err(e) => warn!(program = %self.program, error = %e, "speech synthesis failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_speaker_swallows_everything() {
        NullSpeaker.speak("hello").await;
    }

    #[tokio::test]
    async fn missing_binary_does_not_error() {
        // A program that cannot exist — the failure must be contained.
        ProcessSpeaker::new("hearth-no-such-tts-binary")
            .speak("hello")
            .await;
    }
}
