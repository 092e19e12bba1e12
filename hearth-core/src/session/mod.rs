//! `CaptureSession` — top-level lifecycle controller.
//!
//! ## Lifecycle
//!
//! ```text
//! CaptureSession::new()
//!     └─► start()        → audio open, control loop spawned, status = Listening
//!         └─► stop()     → running=false, stream dropped, status = Stopped
//! ```
//!
//! `start()`/`stop()` are guarded: calling them in the wrong state returns
//! an error rather than panicking.
//!
//! ## Threading
//!
//! `cpal::Stream` is `!Send` on Windows/macOS, so `AudioCapture` is created
//! *inside* the `spawn_blocking` closure and never crosses a thread
//! boundary. A sync oneshot channel propagates open-device errors back to
//! the `start()` caller; startup failures there are fatal for the session.

pub mod control;
pub mod events;

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::info;

use crate::{
    audio::AudioCapture,
    buffering::{create_sample_ring, ChunkRing},
    command::CommandHandler,
    error::{HearthError, Result},
    session::events::{ActivityEvent, CommandEvent, SessionStatus, SessionStatusEvent},
    transcribe::TranscriberHandle,
    vad::{energy::EnergyGate, SpeechGate},
};

/// Broadcast channel capacity per event stream.
const BROADCAST_CAP: usize = 256;

/// Capture configuration. Plain constants — there is no config file.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Engine sample rate (Hz). Device audio is resampled to this.
    pub sample_rate: u32,
    /// Samples per chunk — the unit the gate classifies and the ring
    /// stores. 1 024 at 16 kHz = 64 ms.
    pub chunk_samples: usize,
    /// Rolling window length in seconds.
    pub ring_seconds: f32,
    /// RMS threshold in raw i16 units; chunks above it are voiced.
    pub energy_threshold: f64,
    /// Consecutive silent chunks that end a command phrase.
    pub silence_run_limit: u32,
    /// The wake phrase. Variants are derived (see `wake::WakePhrase`).
    pub wake_phrase: String,
    /// Appended chunks between wake probes.
    pub probe_interval_chunks: u32,
    /// Trailing window length each probe transcribes, in seconds.
    pub probe_window_seconds: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            chunk_samples: 1_024,
            ring_seconds: 5.0,
            energy_threshold: 1_000.0,
            silence_run_limit: 15,
            wake_phrase: "computer".to_string(),
            probe_interval_chunks: 8,
            probe_window_seconds: 2.0,
        }
    }
}

impl SessionConfig {
    /// Ring capacity in chunks for `ring_seconds` of audio.
    pub fn ring_capacity_chunks(&self) -> usize {
        let chunks =
            (self.ring_seconds as f64 * self.sample_rate as f64 / self.chunk_samples as f64).ceil();
        (chunks as usize).max(1)
    }

    /// Probe window length in chunks.
    pub fn probe_window_chunks(&self) -> usize {
        let chunks = (self.probe_window_seconds as f64 * self.sample_rate as f64
            / self.chunk_samples as f64)
            .ceil();
        (chunks as usize).max(1)
    }
}

/// The top-level session handle.
///
/// `Send + Sync` — all fields use interior mutability. Wrap in `Arc` to
/// share between the host and event-forwarding tasks.
pub struct CaptureSession {
    config: SessionConfig,
    transcriber: TranscriberHandle,
    handler: Arc<dyn CommandHandler>,
    /// `true` while capture + control loop are active.
    running: Arc<AtomicBool>,
    /// Canonical status, written by the control loop and `stop()`.
    status: Arc<Mutex<SessionStatus>>,
    command_tx: broadcast::Sender<CommandEvent>,
    status_tx: broadcast::Sender<SessionStatusEvent>,
    activity_tx: broadcast::Sender<ActivityEvent>,
    /// Monotonically increasing command-event sequence counter.
    seq: Arc<AtomicU64>,
    diagnostics: Arc<control::ControlDiagnostics>,
}

impl CaptureSession {
    /// Create a session. Does not open the microphone — call `start()`.
    pub fn new(
        config: SessionConfig,
        transcriber: TranscriberHandle,
        handler: Arc<dyn CommandHandler>,
    ) -> Self {
        let (command_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (status_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (activity_tx, _) = broadcast::channel(BROADCAST_CAP);

        Self {
            config,
            transcriber,
            handler,
            running: Arc::new(AtomicBool::new(false)),
            status: Arc::new(Mutex::new(SessionStatus::Idle)),
            command_tx,
            status_tx,
            activity_tx,
            seq: Arc::new(AtomicU64::new(0)),
            diagnostics: Arc::new(control::ControlDiagnostics::default()),
        }
    }

    /// Start capture and the control loop on the default input device.
    ///
    /// Blocks until the device is confirmed open (or fails), then returns;
    /// the control loop keeps running on a background blocking thread.
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// - `HearthError::AlreadyRunning` if already started.
    /// - `HearthError::NoDefaultInputDevice` / `HearthError::AudioStream`
    ///   when the device cannot be opened — fatal, the session does not
    ///   start.
    pub fn start(&self) -> Result<()> {
        self.start_with_device(None)
    }

    /// Start with a preferred input device name.
    pub fn start_with_device(&self, preferred_input_device: Option<String>) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            return Err(HearthError::AlreadyRunning);
        }

        self.diagnostics.reset();
        self.running.store(true, Ordering::SeqCst);
        self.set_status(SessionStatus::Listening, None);

        let (producer, consumer) = create_sample_ring();
        let ring = Arc::new(ChunkRing::new(self.config.ring_capacity_chunks()));

        let config = self.config.clone();
        let transcriber = Arc::clone(&self.transcriber);
        let handler = Arc::clone(&self.handler);
        let running = Arc::clone(&self.running);
        let command_tx = self.command_tx.clone();
        let status_tx = self.status_tx.clone();
        let activity_tx = self.activity_tx.clone();
        let status = Arc::clone(&self.status);
        let seq = Arc::clone(&self.seq);
        let diagnostics = Arc::clone(&self.diagnostics);
        let runtime = tokio::runtime::Handle::current();

        // Sync oneshot: the loop thread reports device-open success/failure,
        // carrying the actual capture sample rate on success.
        let (open_tx, open_rx) = std::sync::mpsc::channel::<Result<u32>>();

        tokio::task::spawn_blocking(move || {
            // Open the device on THIS thread — cpal::Stream is !Send.
            let capture = match AudioCapture::open_with_preference(
                producer,
                Arc::clone(&running),
                preferred_input_device.as_deref(),
            ) {
                Ok(c) => {
                    let _ = open_tx.send(Ok(c.sample_rate));
                    c
                }
                Err(e) => {
                    let _ = open_tx.send(Err(e));
                    running.store(false, Ordering::SeqCst);
                    return;
                }
            };

            let capture_sample_rate = capture.sample_rate;
            let gate: Box<dyn SpeechGate> = Box::new(EnergyGate::new(config.energy_threshold));

            control::run(control::ControlContext {
                config,
                transcriber,
                handler,
                gate,
                consumer,
                ring,
                running,
                command_tx,
                status_tx,
                activity_tx,
                status,
                seq,
                capture_sample_rate,
                runtime,
                diagnostics,
            });

            // Stream drops here, releasing the audio device on this thread.
            drop(capture);
        });

        match open_rx.recv() {
            Ok(Ok(_rate)) => {
                info!("session started — listening for the wake phrase");
                Ok(())
            }
            Ok(Err(e)) => {
                self.running.store(false, Ordering::SeqCst);
                self.set_status(SessionStatus::Error, Some(e.to_string()));
                Err(e)
            }
            Err(_) => {
                // Channel closed without a message — the blocking task died.
                self.running.store(false, Ordering::SeqCst);
                self.set_status(SessionStatus::Error, Some("capture failed to start".into()));
                Err(HearthError::Other(anyhow::anyhow!(
                    "control loop died before confirming device open"
                )))
            }
        }
    }

    /// Stop capture and the control loop.
    ///
    /// # Errors
    /// `HearthError::NotRunning` if not currently running.
    pub fn stop(&self) -> Result<()> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(HearthError::NotRunning);
        }

        self.running.store(false, Ordering::SeqCst);
        self.set_status(SessionStatus::Stopped, None);
        info!("session stop requested");
        Ok(())
    }

    /// Current status (snapshot).
    pub fn status(&self) -> SessionStatus {
        *self.status.lock()
    }

    /// Subscribe to command pipeline outcomes.
    pub fn subscribe_commands(&self) -> broadcast::Receiver<CommandEvent> {
        self.command_tx.subscribe()
    }

    /// Subscribe to status change events.
    pub fn subscribe_status(&self) -> broadcast::Receiver<SessionStatusEvent> {
        self.status_tx.subscribe()
    }

    /// Subscribe to per-chunk activity events (RMS + gate decision).
    pub fn subscribe_activity(&self) -> broadcast::Receiver<ActivityEvent> {
        self.activity_tx.subscribe()
    }

    /// Snapshot of control-loop counters.
    pub fn diagnostics_snapshot(&self) -> control::DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    fn set_status(&self, new_status: SessionStatus, detail: Option<String>) {
        *self.status.lock() = new_status;
        let _ = self.status_tx.send(SessionStatusEvent {
            status: new_status,
            detail,
        });
    }
}
