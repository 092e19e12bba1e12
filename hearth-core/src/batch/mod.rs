//! Batch entry for pre-recorded clips.
//!
//! No wake word, no ring buffer, no state: transcode the clip to the
//! engine's PCM format with ffmpeg, transcribe it once, and run the
//! transcript through the command pipeline. A transcode or decode failure
//! rejects that one clip and nothing else.

use std::path::Path;
use std::process::Stdio;

use tracing::{debug, info};

use crate::audio::wav::read_wav;
use crate::buffering::chunk::CommandAudio;
use crate::command::{CommandOutcome, CommandPipeline};
use crate::error::{HearthError, Result};

/// Target format for transcoded clips (mono, 16 kHz, s16le).
const TRANSCODE_SAMPLE_RATE: &str = "16000";

/// Process one finished audio clip end to end.
///
/// # Errors
/// - `HearthError::Transcode` when ffmpeg is missing or the conversion
///   fails.
/// - `HearthError::Wav` when the converted file cannot be decoded.
///
/// Recognizer/intent failures are *not* errors here — they surface as the
/// structured [`CommandOutcome`] the pipeline produces.
pub async fn process_clip(path: &Path, pipeline: &CommandPipeline) -> Result<CommandOutcome> {
    let audio = load_clip(path).await?;
    info!(
        clip = %path.display(),
        secs = audio.duration_secs(),
        "clip transcoded — transcribing"
    );
    Ok(pipeline.handle_clip_audio(&audio).await)
}

/// Transcode `path` into engine-format PCM and load the samples.
pub async fn load_clip(path: &Path) -> Result<CommandAudio> {
    if !path.exists() {
        return Err(HearthError::Transcode(format!(
            "clip not found: {}",
            path.display()
        )));
    }

    let ffmpeg = which::which("ffmpeg").map_err(|_| {
        HearthError::Transcode("ffmpeg not found — install it to process uploaded clips".into())
    })?;

    let scratch = tempfile::Builder::new()
        .suffix(".wav")
        .tempfile()
        .map_err(|e| HearthError::Transcode(format!("scratch file: {e}")))?;
    let wav_path = scratch.path().to_path_buf();

    let output = tokio::process::Command::new(&ffmpeg)
        .arg("-y")
        .arg("-i")
        .arg(path)
        .args(["-acodec", "pcm_s16le", "-ar", TRANSCODE_SAMPLE_RATE, "-ac", "1"])
        .arg(&wav_path)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| HearthError::Transcode(format!("ffmpeg spawn: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(HearthError::Transcode(format!(
            "ffmpeg exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    debug!(clip = %path.display(), "ffmpeg conversion complete");
    read_wav(&wav_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_clip_is_rejected() {
        let err = load_clip(Path::new("/definitely/not/here.webm"))
            .await
            .unwrap_err();
        assert!(matches!(err, HearthError::Transcode(_)));
    }
}
