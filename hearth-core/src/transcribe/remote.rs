//! HTTP transcriber — multipart WAV upload to a Whisper-style endpoint.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error};

use super::{Transcriber, TranscribeOutcome};
use crate::audio::wav::encode_wav;
use crate::buffering::chunk::CommandAudio;
use crate::error::{HearthError, Result};

/// JSON body returned by the transcription endpoint.
#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Remote speech recognizer client.
pub struct HttpTranscriber {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl HttpTranscriber {
    /// Default OpenAI-compatible transcription endpoint.
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.openai.com/v1/audio/transcriptions";

    /// # Errors
    /// Rejects an empty API key up front rather than failing on first use.
    pub fn new(api_key: String, model: String) -> Result<Self> {
        Self::with_endpoint(Self::DEFAULT_ENDPOINT.to_string(), api_key, model)
    }

    pub fn with_endpoint(endpoint: String, api_key: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(HearthError::Transcription(
                "API key required for the transcription service".to_string(),
            ));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            model,
        })
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, audio: &CommandAudio) -> Result<TranscribeOutcome> {
        if audio.is_empty() {
            return Ok(TranscribeOutcome::NoSpeech);
        }

        let wav = encode_wav(&audio.samples, audio.sample_rate)?;
        debug!(
            wav_bytes = wav.len(),
            duration_secs = audio.duration_secs(),
            "uploading audio for transcription"
        );

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(wav)
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| HearthError::Transcription(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| HearthError::Transcription(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "transcription service error");
            return Err(HearthError::Transcription(format!(
                "service returned {status}: {body}"
            )));
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| HearthError::Transcription(format!("malformed response: {e}")))?;

        // A clean 2xx with nothing recognized is the service saying
        // "no speech here", not a fault.
        let text = parsed.text.trim();
        if text.is_empty() {
            return Ok(TranscribeOutcome::NoSpeech);
        }
        debug!(transcript = text, "transcription complete");
        Ok(TranscribeOutcome::Text(text.to_string()))
    }
}
