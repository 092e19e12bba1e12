//! Events broadcast by a capture session.
//!
//! Subscribers (the CLI host, tests, a future UI) receive these over
//! `tokio::sync::broadcast`; slow consumers lag rather than block the
//! control loop.

use serde::{Deserialize, Serialize};

use crate::command::CommandOutcome;

/// Emitted once per processed audio chunk: level metering plus the gate
/// decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    /// Monotonically increasing per-session sequence number.
    pub seq: u64,
    /// Root-mean-square level of the chunk in raw i16 units.
    pub rms: f32,
    /// Gate decision for this chunk.
    pub voiced: bool,
}

/// Emitted when a finalized command has been run through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandEvent {
    /// Monotonically increasing event sequence number.
    pub seq: u64,
    /// Captured command duration in seconds.
    pub audio_secs: f64,
    /// What the pipeline made of it.
    pub outcome: CommandOutcome,
}

/// Emitted on session state changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusEvent {
    pub status: SessionStatus,
    /// Optional human-readable detail (e.g. error message).
    pub detail: Option<String>,
}

/// Observable session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Session created but not started.
    Idle,
    /// Capturing audio, probing for the wake phrase.
    Listening,
    /// Wake phrase heard — capturing the command utterance.
    Capturing,
    /// Capture stopped; the session may be restarted.
    Stopped,
    /// Unrecoverable startup error.
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_event_serializes_lowercase() {
        let event = SessionStatusEvent {
            status: SessionStatus::Capturing,
            detail: Some("wake phrase heard".into()),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["status"], "capturing");
        assert_eq!(json["detail"], "wake phrase heard");

        let back: SessionStatusEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back.status, SessionStatus::Capturing);
    }

    #[test]
    fn activity_event_uses_camel_case() {
        let event = ActivityEvent {
            seq: 3,
            rms: 812.5,
            voiced: false,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["seq"], 3);
        assert_eq!(json["voiced"], false);
        let rms = json["rms"].as_f64().unwrap();
        assert!((rms - 812.5).abs() < 1e-3);
    }
}
