//! End-to-end capture scenarios driven through the control loop with a
//! scripted recognizer and a real command pipeline.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use std::thread;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;

use hearth_core::buffering::{create_sample_ring, ChunkRing, Producer, SampleProducer};
use hearth_core::command::{
    intent::{IntentOutcome, IntentParser},
    CommandOutcome, CommandPipeline, DeviceRegistry, DeviceSpec, NullSpeaker,
};
use hearth_core::error::Result;
use hearth_core::session::control::{self, ControlContext, ControlDiagnostics};
use hearth_core::session::events::{CommandEvent, SessionStatus, SessionStatusEvent};
use hearth_core::transcribe::{StubTranscriber, TranscribeOutcome};
use hearth_core::vad::energy::EnergyGate;
use hearth_core::{CommandAudio, SessionConfig, Transcriber, WakePhrase};

const CHUNK: usize = 1_024;

/// Scripted recognizer with a real recognizer's shape: silent windows come
/// back as `NoSpeech`, audible ones as a fixed transcript.
struct EnergyAwareTranscriber {
    text: &'static str,
}

#[async_trait]
impl Transcriber for EnergyAwareTranscriber {
    async fn transcribe(&self, audio: &CommandAudio) -> Result<TranscribeOutcome> {
        if EnergyGate::rms(&audio.samples) < 500.0 {
            return Ok(TranscribeOutcome::NoSpeech);
        }
        Ok(TranscribeOutcome::Text(self.text.to_string()))
    }
}

/// Intent parser that understands the kitchen-light phrasing and refuses
/// everything else, deterministically.
struct KitchenIntent;

#[async_trait]
impl IntentParser for KitchenIntent {
    async fn interpret(&self, command: &str) -> Result<IntentOutcome> {
        if command.contains("kitchen light") && command.contains("turn on") {
            Ok(IntentOutcome::Command {
                device: "kitchen light".into(),
                intent: "turn_on".into(),
            })
        } else {
            Ok(IntentOutcome::Unsupported {
                message: "Device not supported".into(),
            })
        }
    }
}

fn home_registry() -> Arc<DeviceRegistry> {
    Arc::new(DeviceRegistry::new(vec![
        DeviceSpec {
            id: "kitchen-ceiling-light".into(),
            name: "Ceiling Light".into(),
            room: "Kitchen".into(),
            aliases: vec![
                "kitchen ceiling light".into(),
                "kitchen light".into(),
                "kitchen main light".into(),
            ],
            default_on: false,
        },
        DeviceSpec {
            id: "bedroom-fan".into(),
            name: "Fan".into(),
            room: "Bedroom".into(),
            aliases: vec!["bedroom fan".into(), "fan".into()],
            default_on: false,
        },
    ]))
}

struct Harness {
    producer: SampleProducer,
    ring: Arc<ChunkRing>,
    running: Arc<AtomicBool>,
    command_rx: broadcast::Receiver<CommandEvent>,
    status_rx: broadcast::Receiver<SessionStatusEvent>,
    diagnostics: Arc<ControlDiagnostics>,
    handle: thread::JoinHandle<()>,
}

fn spawn_session(transcriber: Arc<dyn Transcriber>, registry: Arc<DeviceRegistry>) -> Harness {
    let config = SessionConfig::default();
    let pipeline = Arc::new(CommandPipeline::new(
        Arc::clone(&transcriber),
        Arc::new(KitchenIntent),
        registry,
        Arc::new(NullSpeaker),
        WakePhrase::new(&config.wake_phrase),
    ));

    let (producer, consumer) = create_sample_ring();
    let ring = Arc::new(ChunkRing::new(config.ring_capacity_chunks()));
    let running = Arc::new(AtomicBool::new(true));
    let (command_tx, command_rx) = broadcast::channel(16);
    let (status_tx, status_rx) = broadcast::channel(64);
    let (activity_tx, _) = broadcast::channel(4_096);
    let diagnostics = Arc::new(ControlDiagnostics::default());

    let ctx = ControlContext {
        gate: Box::new(EnergyGate::new(config.energy_threshold)),
        config,
        transcriber,
        handler: pipeline,
        consumer,
        ring: Arc::clone(&ring),
        running: Arc::clone(&running),
        command_tx,
        status_tx,
        activity_tx,
        status: Arc::new(Mutex::new(SessionStatus::Listening)),
        seq: Arc::new(AtomicU64::new(0)),
        capture_sample_rate: 16_000,
        runtime: tokio::runtime::Handle::current(),
        diagnostics: Arc::clone(&diagnostics),
    };

    let handle = thread::spawn(move || control::run(ctx));

    Harness {
        producer,
        ring,
        running,
        command_rx,
        status_rx,
        diagnostics,
        handle,
    }
}

impl Harness {
    fn push_seconds(&mut self, secs: f32, amplitude: f32) {
        let chunks = ((secs * 16_000.0) as usize / CHUNK).max(1);
        let samples = vec![amplitude; chunks * CHUNK];
        assert_eq!(
            self.producer.push_slice(&samples),
            samples.len(),
            "sample ring overflowed in test"
        );
    }

    fn wait_for_status(&mut self, wanted: SessionStatus, timeout: Duration) {
        let start = Instant::now();
        loop {
            match self.status_rx.try_recv() {
                Ok(ev) if ev.status == wanted => return,
                Ok(_) => {}
                Err(TryRecvError::Empty) => {
                    if start.elapsed() >= timeout {
                        panic!("timed out waiting for status {wanted:?}");
                    }
                    thread::sleep(Duration::from_millis(5));
                }
                Err(TryRecvError::Lagged(_)) => {}
                Err(TryRecvError::Closed) => panic!("status channel closed"),
            }
        }
    }

    fn recv_command(&mut self, timeout: Duration) -> CommandEvent {
        let start = Instant::now();
        loop {
            match self.command_rx.try_recv() {
                Ok(ev) => return ev,
                Err(TryRecvError::Empty) => {
                    if start.elapsed() >= timeout {
                        panic!("timed out waiting for command event");
                    }
                    thread::sleep(Duration::from_millis(5));
                }
                Err(TryRecvError::Lagged(_)) => {}
                Err(TryRecvError::Closed) => panic!("command channel closed"),
            }
        }
    }

    fn assert_no_command_for(&mut self, timeout: Duration) {
        let start = Instant::now();
        loop {
            match self.command_rx.try_recv() {
                Ok(ev) => panic!("expected no command event, got seq={}", ev.seq),
                Err(TryRecvError::Empty) => {
                    if start.elapsed() >= timeout {
                        return;
                    }
                    thread::sleep(Duration::from_millis(5));
                }
                Err(TryRecvError::Lagged(_)) => {}
                Err(TryRecvError::Closed) => return,
            }
        }
    }

    fn shutdown(self) {
        self.running.store(false, Ordering::SeqCst);
        self.handle.join().expect("control loop panicked");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn spoken_command_turns_on_the_kitchen_light() {
    let registry = home_registry();
    let mut h = spawn_session(
        Arc::new(EnergyAwareTranscriber {
            text: "computer turn on the kitchen light",
        }),
        Arc::clone(&registry),
    );

    // 1 s of leading silence, ~1 s of speech, then the silence that ends
    // the phrase.
    h.push_seconds(1.0, 0.0);
    h.push_seconds(1.0, 0.25);
    h.wait_for_status(SessionStatus::Capturing, Duration::from_secs(2));
    h.push_seconds(2.0, 0.0);

    let event = h.recv_command(Duration::from_secs(2));
    match &event.outcome {
        CommandOutcome::Executed {
            device, intent, ..
        } => {
            assert_eq!(device, "kitchen-ceiling-light");
            assert_eq!(intent, "turn_on");
        }
        other => panic!("expected Executed, got {other:?}"),
    }
    assert!(event.audio_secs > 0.0);
    assert_eq!(registry.state("kitchen-ceiling-light"), Some(true));

    // Exactly one handoff for the utterance.
    h.assert_no_command_for(Duration::from_millis(250));
    assert_eq!(h.diagnostics.snapshot().commands_finalized, 1);

    h.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn half_a_minute_without_wake_hands_off_nothing() {
    let registry = home_registry();
    let mut h = spawn_session(
        Arc::new(EnergyAwareTranscriber {
            text: "just people chatting nearby",
        }),
        Arc::clone(&registry),
    );
    let capacity = SessionConfig::default().ring_capacity_chunks();

    // 30 s of mixed noise and silence, pushed in slices so the loop keeps
    // up and the ring rolls over many times.
    for i in 0..30 {
        let amplitude = if i % 3 == 0 { 0.2 } else { 0.0 };
        h.push_seconds(1.0, amplitude);
        thread::sleep(Duration::from_millis(15));
        assert!(h.ring.len() <= capacity, "ring exceeded capacity");
    }

    h.assert_no_command_for(Duration::from_millis(300));
    let snap = h.diagnostics.snapshot();
    assert_eq!(snap.commands_finalized, 0);
    assert_eq!(snap.wake_hits, 0);
    assert!(snap.probes_issued > 0, "probes should have been running");
    assert!(h.ring.len() <= capacity);
    assert_eq!(registry.state("kitchen-ceiling-light"), Some(false));

    h.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn clip_processing_is_deterministic() {
    let registry = home_registry();
    let pipeline = CommandPipeline::new(
        Arc::new(StubTranscriber::with_text("turn on the kitchen light")),
        Arc::new(KitchenIntent),
        Arc::clone(&registry),
        Arc::new(NullSpeaker),
        WakePhrase::new("computer"),
    );

    let clip = CommandAudio {
        samples: vec![1_500; 32_000],
        sample_rate: 16_000,
    };

    let first = pipeline.handle_clip_audio(&clip).await;
    let second = pipeline.handle_clip_audio(&clip).await;
    assert_eq!(first, second);
    assert!(matches!(first, CommandOutcome::Executed { .. }));
}
