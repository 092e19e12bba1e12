//! Intent parsing: transcript → structured `{device, intent}`.
//!
//! The HTTP implementation hands the transcript to a chat-completions
//! endpoint whose system prompt pins the device and intent vocabularies
//! and demands JSON out. Models love to wrap JSON in markdown fences, so
//! the parser unwraps those before deserializing. Unsupported devices and
//! unparseable commands come back as a *structured* refusal from the
//! model (`intent: "error"`), never as an exception.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};

use crate::error::{HearthError, Result};

/// What the interpreter made of a transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IntentOutcome {
    /// A well-formed command against the known vocabulary.
    Command { device: String, intent: String },
    /// The model understood the speech but refused the command.
    Unsupported { message: String },
}

/// Contract for intent interpretation backends.
#[async_trait]
pub trait IntentParser: Send + Sync {
    /// # Errors
    /// Only for transport/service failures; refusals are
    /// `Ok(IntentOutcome::Unsupported { .. })`.
    async fn interpret(&self, command: &str) -> Result<IntentOutcome>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Chat-completions intent parser.
pub struct HttpIntentParser {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    system_prompt: String,
}

impl HttpIntentParser {
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.openai.com/v1/chat/completions";

    /// # Errors
    /// Rejects an empty API key up front.
    pub fn new(
        api_key: String,
        model: String,
        device_vocabulary: &str,
        intent_vocabulary: &str,
    ) -> Result<Self> {
        Self::with_endpoint(
            Self::DEFAULT_ENDPOINT.to_string(),
            api_key,
            model,
            device_vocabulary,
            intent_vocabulary,
        )
    }

    pub fn with_endpoint(
        endpoint: String,
        api_key: String,
        model: String,
        device_vocabulary: &str,
        intent_vocabulary: &str,
    ) -> Result<Self> {
        if api_key.is_empty() {
            return Err(HearthError::Intent(
                "API key required for the intent service".to_string(),
            ));
        }
        let system_prompt = format!(
            "Parse home commands to valid JSON format with double quotes. \
             Only accept commands for these devices: {device_vocabulary}. \
             For unsupported devices or invalid commands, return \
             {{\"intent\": \"error\", \"device\": \"unsupported\", \
             \"message\": \"Device not supported\"}}. \
             Valid intents are: {intent_vocabulary}. \
             Example: {{\"intent\": \"turn_on\", \"device\": \"light\"}}."
        );
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            model,
            system_prompt,
        })
    }
}

#[async_trait]
impl IntentParser for HttpIntentParser {
    async fn interpret(&self, command: &str) -> Result<IntentOutcome> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &self.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: command,
                },
            ],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| HearthError::Intent(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "intent service error");
            return Err(HearthError::Intent(format!(
                "service returned {status}: {body}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| HearthError::Intent(format!("malformed response: {e}")))?;

        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| HearthError::Intent("empty completion".to_string()))?;

        debug!(content, "intent service replied");
        parse_intent_json(content)
    }
}

/// Parse the model's JSON reply, stripping a markdown code fence if present.
pub fn parse_intent_json(raw: &str) -> Result<IntentOutcome> {
    let json = strip_code_fence(raw);
    let value: Value = serde_json::from_str(json)
        .map_err(|e| HearthError::Intent(format!("unparseable intent JSON: {e}")))?;

    let intent = value
        .get("intent")
        .or_else(|| value.get("action"))
        .and_then(Value::as_str)
        .ok_or_else(|| HearthError::Intent("intent field missing".to_string()))?
        .to_string();

    if intent == "error" {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Device not supported")
            .to_string();
        return Ok(IntentOutcome::Unsupported { message });
    }

    let device = value
        .get("device")
        .and_then(Value::as_str)
        .ok_or_else(|| HearthError::Intent("device field missing".to_string()))?
        .to_string();

    Ok(IntentOutcome::Command { device, intent })
}

/// Trim a leading/trailing ``` fence (with or without a `json` tag).
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}
