//! # hearth-core
//!
//! Continuous voice-capture and command-segmentation engine.
//!
//! ## Architecture
//!
//! ```text
//! Microphone → AudioCapture → SPSC sample ring → control loop (spawn_blocking)
//!                                                      │
//!                                 EnergyGate ── chunk ──┤── ChunkRing (rolling ~5 s)
//!                                                      │        │
//!                                         wake probe task ◄── snapshot (trailing 2 s)
//!                                                      │
//!                                    phrase end → finalize snapshot
//!                                                      │
//!                                         CommandPipeline (transcribe → intent → device)
//! ```
//!
//! The audio callback is zero-alloc; recognizer round trips run on spawned
//! tasks and report back over channels. All detection state lives in the
//! control loop. Pre-recorded clips skip the whole session machinery and
//! enter through [`batch`].

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod batch;
pub mod buffering;
pub mod command;
pub mod error;
pub mod session;
pub mod transcribe;
pub mod vad;
pub mod wake;

// Convenience re-exports for downstream crates
pub use buffering::{AudioChunk, ChunkRing, CommandAudio};
pub use command::{
    CommandHandler, CommandOutcome, CommandPipeline, DeviceRegistry, DeviceSpec,
};
pub use error::HearthError;
pub use session::events::{ActivityEvent, CommandEvent, SessionStatus, SessionStatusEvent};
pub use session::{CaptureSession, SessionConfig};
pub use transcribe::{HttpTranscriber, StubTranscriber, Transcriber, TranscriberHandle};
pub use wake::WakePhrase;
