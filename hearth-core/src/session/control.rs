//! Blocking control loop.
//!
//! ## Per-iteration stages
//!
//! ```text
//! 1. Drain resolved probe reports (messages from spawned probe tasks)
//! 2. Drain the SPSC sample ring → resample to 16 kHz → i16
//! 3. Cut fixed-duration AudioChunks; per chunk:
//!    a. Gate classify (RMS) → activity event
//!    b. Append to the rolling ChunkRing
//!    c. Idle: issue a wake probe when one is due and none is in flight
//!    d. WakeDetected: finalize when the silence run reaches the limit
//! 4. Finalize = snapshot ring → clear ring → hand CommandAudio to the
//!    handler on a spawned task → back to Idle
//! ```
//!
//! The loop is the *only* writer of detection state, the silence counter
//! and the probe slot. Probe tasks never mutate anything — they report
//! back over a channel and the loop decides. The whole loop runs under
//! `spawn_blocking`; the recognizer round trips happen on runtime tasks so
//! the drain path never blocks on the network.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::{
    audio::resample::RateConverter,
    buffering::{chunk::CommandAudio, AudioChunk, ChunkRing, Consumer, SampleConsumer},
    command::CommandHandler,
    session::events::{ActivityEvent, CommandEvent, SessionStatus, SessionStatusEvent},
    session::SessionConfig,
    transcribe::{TranscribeOutcome, TranscriberHandle},
    vad::{energy::EnergyGate, SpeechGate},
    wake::{ProbeCadence, ProbeReport, ProbeSlot, WakePhrase},
};

/// Capture-rate samples drained from the SPSC ring per iteration
/// (20 ms at 48 kHz).
const DRAIN_BLOCK: usize = 960;

/// Sleep when the sample ring is empty, to avoid burning a core.
const EMPTY_SLEEP_MS: u64 = 5;

/// Detection state of the capture session. Owned by the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionState {
    /// Passive listening; wake probes run over the trailing window.
    Idle,
    /// Wake phrase heard; accumulating the command until the phrase ends.
    WakeDetected,
    /// Transient: the command snapshot is being handed off. The loop
    /// returns to `Idle` within the same iteration.
    Finalized,
}

/// Shared control-loop counters for observability.
#[derive(Default)]
pub struct ControlDiagnostics {
    pub chunks_in: AtomicUsize,
    pub voiced_chunks: AtomicUsize,
    pub probes_issued: AtomicUsize,
    pub probes_discarded: AtomicUsize,
    pub probe_errors: AtomicUsize,
    pub wake_hits: AtomicUsize,
    pub commands_finalized: AtomicUsize,
}

impl ControlDiagnostics {
    pub fn reset(&self) {
        self.chunks_in.store(0, Ordering::Relaxed);
        self.voiced_chunks.store(0, Ordering::Relaxed);
        self.probes_issued.store(0, Ordering::Relaxed);
        self.probes_discarded.store(0, Ordering::Relaxed);
        self.probe_errors.store(0, Ordering::Relaxed);
        self.wake_hits.store(0, Ordering::Relaxed);
        self.commands_finalized.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            chunks_in: self.chunks_in.load(Ordering::Relaxed),
            voiced_chunks: self.voiced_chunks.load(Ordering::Relaxed),
            probes_issued: self.probes_issued.load(Ordering::Relaxed),
            probes_discarded: self.probes_discarded.load(Ordering::Relaxed),
            probe_errors: self.probe_errors.load(Ordering::Relaxed),
            wake_hits: self.wake_hits.load(Ordering::Relaxed),
            commands_finalized: self.commands_finalized.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DiagnosticsSnapshot {
    pub chunks_in: usize,
    pub voiced_chunks: usize,
    pub probes_issued: usize,
    pub probes_discarded: usize,
    pub probe_errors: usize,
    pub wake_hits: usize,
    pub commands_finalized: usize,
}

/// Everything the control loop needs, passed as one struct.
pub struct ControlContext {
    pub config: SessionConfig,
    pub transcriber: TranscriberHandle,
    pub handler: Arc<dyn CommandHandler>,
    pub gate: Box<dyn SpeechGate>,
    pub consumer: SampleConsumer,
    pub ring: Arc<ChunkRing>,
    pub running: Arc<AtomicBool>,
    pub command_tx: broadcast::Sender<CommandEvent>,
    pub status_tx: broadcast::Sender<SessionStatusEvent>,
    pub activity_tx: broadcast::Sender<ActivityEvent>,
    pub status: Arc<Mutex<SessionStatus>>,
    pub seq: Arc<AtomicU64>,
    pub capture_sample_rate: u32,
    pub runtime: tokio::runtime::Handle,
    pub diagnostics: Arc<ControlDiagnostics>,
}

/// Run the control loop until `ctx.running` goes false.
pub fn run(mut ctx: ControlContext) {
    info!("control loop started");

    let wake = WakePhrase::new(&ctx.config.wake_phrase);

    let mut resampler = match RateConverter::new(
        ctx.capture_sample_rate,
        ctx.config.sample_rate,
        DRAIN_BLOCK,
    ) {
        Ok(r) => r,
        Err(e) => {
            error!("failed to create resampler: {e}");
            set_status(&ctx, SessionStatus::Error, Some(e.to_string()));
            return;
        }
    };

    let (probe_tx, probe_rx): (Sender<ProbeReport>, Receiver<ProbeReport>) =
        crossbeam_channel::unbounded();

    let mut slot = ProbeSlot::new();
    let mut cadence = ProbeCadence::new(ctx.config.probe_interval_chunks);
    let mut state = DetectionState::Idle;
    // A probe that came due while the slot was busy; issued as soon as the
    // outstanding probe resolves, so probing cannot starve when audio goes
    // quiet right after a skipped cadence tick.
    let mut probe_due = false;

    let mut raw = vec![0f32; DRAIN_BLOCK];
    let mut pending: Vec<i16> = Vec::with_capacity(ctx.config.chunk_samples * 2);
    let mut activity_seq = 0u64;

    loop {
        if !ctx.running.load(Ordering::Relaxed) {
            break;
        }

        // Probe reports first: a resolved wake probe should flip state
        // before the chunks that arrived behind it are classified.
        while let Ok(report) = probe_rx.try_recv() {
            apply_probe_report(&mut ctx, &wake, &mut slot, &mut state, report);
        }

        if probe_due && state == DetectionState::Idle && slot.is_free() {
            if issue_probe(&ctx, &probe_tx, &mut slot) {
                probe_due = false;
            }
        } else if state != DetectionState::Idle {
            probe_due = false;
        }

        let n = ctx.consumer.pop_slice(&mut raw);
        if n == 0 {
            std::thread::sleep(Duration::from_millis(EMPTY_SLEEP_MS));
            continue;
        }

        let resampled = resampler.convert(&raw[..n]);
        if resampled.is_empty() {
            // Partial resampler block — more input needed.
            continue;
        }

        pending.extend(
            resampled
                .iter()
                .map(|&s| (s * 32_767.0).clamp(-32_768.0, 32_767.0) as i16),
        );

        while pending.len() >= ctx.config.chunk_samples {
            let samples: Vec<i16> = pending.drain(..ctx.config.chunk_samples).collect();
            let chunk = AudioChunk::new(samples, ctx.config.sample_rate);
            process_chunk(
                &mut ctx,
                &probe_tx,
                &mut slot,
                &mut cadence,
                &mut state,
                &mut probe_due,
                &mut activity_seq,
                chunk,
            );
        }
    }

    // Stop: outstanding probe results are orphaned and the buffered audio
    // is abandoned, not flushed.
    slot.abandon();
    ctx.ring.clear();

    let snap = ctx.diagnostics.snapshot();
    info!(
        chunks_in = snap.chunks_in,
        voiced_chunks = snap.voiced_chunks,
        probes_issued = snap.probes_issued,
        probes_discarded = snap.probes_discarded,
        probe_errors = snap.probe_errors,
        wake_hits = snap.wake_hits,
        commands_finalized = snap.commands_finalized,
        "control loop stopped — diagnostics"
    );
}

fn process_chunk(
    ctx: &mut ControlContext,
    probe_tx: &Sender<ProbeReport>,
    slot: &mut ProbeSlot,
    cadence: &mut ProbeCadence,
    state: &mut DetectionState,
    probe_due: &mut bool,
    activity_seq: &mut u64,
    chunk: AudioChunk,
) {
    ctx.diagnostics.chunks_in.fetch_add(1, Ordering::Relaxed);

    let rms = EnergyGate::rms(&chunk.samples) as f32;
    let decision = ctx.gate.classify(&chunk);
    if decision.is_voiced() {
        ctx.diagnostics.voiced_chunks.fetch_add(1, Ordering::Relaxed);
    }

    let _ = ctx.activity_tx.send(ActivityEvent {
        seq: *activity_seq,
        rms,
        voiced: decision.is_voiced(),
    });
    *activity_seq = activity_seq.saturating_add(1);

    ctx.ring.append(chunk);

    match *state {
        DetectionState::Idle => {
            // Probing only while no wake phrase is pending; once detected
            // it stays off until finalize, so a repeated wake phrase inside
            // the still-buffered pre-roll cannot reset the command boundary.
            if cadence.tick() {
                *probe_due = true;
            }
            if *probe_due && slot.is_free() && issue_probe(ctx, probe_tx, slot) {
                *probe_due = false;
            }
        }
        DetectionState::WakeDetected => {
            if ctx.gate.silence_run() >= ctx.config.silence_run_limit {
                finalize(ctx, cadence, state);
                *probe_due = false;
            }
        }
        DetectionState::Finalized => {
            // Transient within finalize(); nothing to do per-chunk.
        }
    }
}

/// Claim the probe slot and transcribe the trailing window on a runtime
/// task. Returns whether a probe was actually issued.
fn issue_probe(ctx: &ControlContext, probe_tx: &Sender<ProbeReport>, slot: &mut ProbeSlot) -> bool {
    let (chunks, epoch) = ctx.ring.snapshot(ctx.config.probe_window_chunks());
    if chunks.is_empty() {
        return false;
    }
    let Some(generation) = slot.try_begin() else {
        return false;
    };

    let audio = CommandAudio::from_chunks(&chunks, ctx.config.sample_rate);
    ctx.diagnostics.probes_issued.fetch_add(1, Ordering::Relaxed);
    debug!(
        generation,
        epoch,
        window_chunks = chunks.len(),
        "issuing wake probe"
    );

    let transcriber = Arc::clone(&ctx.transcriber);
    let diagnostics = Arc::clone(&ctx.diagnostics);
    let tx = probe_tx.clone();

    ctx.runtime.spawn(async move {
        let outcome = match transcriber.transcribe(&audio).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                // Fail open: a recognizer outage must not take down capture.
                diagnostics.probe_errors.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "wake probe failed — treating as no match");
                None
            }
        };
        let _ = tx.send(ProbeReport {
            generation,
            epoch,
            outcome,
        });
    });
    true
}

/// Apply one resolved probe. Only the newest-generation, current-epoch
/// report may drive a transition, and only out of `Idle`.
fn apply_probe_report(
    ctx: &mut ControlContext,
    wake: &WakePhrase,
    slot: &mut ProbeSlot,
    state: &mut DetectionState,
    report: ProbeReport,
) {
    if !slot.accept(&report, ctx.ring.epoch()) {
        ctx.diagnostics
            .probes_discarded
            .fetch_add(1, Ordering::Relaxed);
        return;
    }

    if *state != DetectionState::Idle {
        return;
    }

    match report.outcome {
        Some(TranscribeOutcome::Text(text)) => {
            if let Some(variant) = wake.find_in(&text) {
                info!(variant, "wake phrase detected");
                ctx.diagnostics.wake_hits.fetch_add(1, Ordering::Relaxed);
                // Fresh silence count for the command; a noise burst before
                // actual speech must not count toward the phrase end.
                ctx.gate.reset();
                *state = DetectionState::WakeDetected;
                set_status(
                    ctx,
                    SessionStatus::Capturing,
                    Some("wake phrase heard".to_string()),
                );
            } else {
                debug!(transcript = %text, "probe transcript without wake phrase");
            }
        }
        // "Heard nothing" and failed probes are both ordinary negatives.
        Some(TranscribeOutcome::NoSpeech) | None => {}
    }
}

/// Snapshot the ring as one command, clear it, and hand off.
fn finalize(ctx: &mut ControlContext, cadence: &mut ProbeCadence, state: &mut DetectionState) {
    // Snapshot strictly before clear: the command must contain everything
    // appended before the phrase-end decision.
    let (chunks, _epoch) = ctx.ring.snapshot_all();
    ctx.ring.clear();
    ctx.gate.reset();
    cadence.reset();
    *state = DetectionState::Finalized;

    let audio = CommandAudio::from_chunks(&chunks, ctx.config.sample_rate);
    ctx.diagnostics
        .commands_finalized
        .fetch_add(1, Ordering::Relaxed);
    info!(
        chunks = chunks.len(),
        secs = audio.duration_secs(),
        "command finalized — handing off"
    );

    let handler = Arc::clone(&ctx.handler);
    let command_tx = ctx.command_tx.clone();
    let seq = Arc::clone(&ctx.seq);
    let audio_secs = audio.duration_secs();

    ctx.runtime.spawn(async move {
        let outcome = handler.handle_audio(audio).await;
        let seq = seq.fetch_add(1, Ordering::Relaxed);
        let _ = command_tx.send(CommandEvent {
            seq,
            audio_secs,
            outcome,
        });
    });

    // Handoff owns the audio now; listening resumes immediately.
    *state = DetectionState::Idle;
    set_status(ctx, SessionStatus::Listening, None);
}

fn set_status(ctx: &ControlContext, status: SessionStatus, detail: Option<String>) {
    *ctx.status.lock() = status;
    let _ = ctx.status_tx.send(SessionStatusEvent { status, detail });
}
