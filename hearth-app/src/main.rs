//! Hearth CLI host.
//!
//! Two entry modes, mirroring how people actually use the engine:
//! continuous listening on a microphone (the default), or one-shot
//! processing of a pre-recorded clip via `--clip`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use hearth_core::command::{
    intent::{IntentOutcome, IntentParser},
    CommandPipeline, DeviceRegistry, DeviceSpec, NullSpeaker, ProcessSpeaker, Speaker,
    DEFAULT_INTENTS,
};
use hearth_core::error::Result as HearthResult;
use hearth_core::transcribe::{HttpTranscriber, StubTranscriber};
use hearth_core::{
    audio, batch, CaptureSession, CommandOutcome, SessionConfig, TranscriberHandle, WakePhrase,
};

#[derive(Parser, Debug)]
#[command(name = "hearth", about = "Voice-controlled home automation", version)]
struct Cli {
    /// Process one pre-recorded clip instead of listening continuously.
    #[arg(long)]
    clip: Option<PathBuf>,

    /// Preferred input device name (see --list-devices).
    #[arg(long)]
    device: Option<String>,

    /// List audio input devices and exit.
    #[arg(long)]
    list_devices: bool,

    /// Wake phrase for continuous listening.
    #[arg(long, default_value = "computer")]
    wake_phrase: String,

    /// Transcription model.
    #[arg(long, default_value = "whisper-1")]
    stt_model: String,

    /// Intent interpretation model.
    #[arg(long, default_value = "gpt-4o")]
    intent_model: String,

    /// API key for the recognizer and intent services.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Replace both remote services with deterministic stubs
    /// (end-to-end wiring check, no API key needed).
    #[arg(long)]
    stub: bool,

    /// Disable spoken feedback.
    #[arg(long)]
    quiet: bool,
}

/// Keyword intent parser backing `--stub` runs.
struct KeywordIntentParser {
    registry: Arc<DeviceRegistry>,
}

#[async_trait::async_trait]
impl IntentParser for KeywordIntentParser {
    async fn interpret(&self, command: &str) -> HearthResult<IntentOutcome> {
        let lowered = command.to_lowercase();
        let (intent, spoken_form) = if lowered.contains("turn on") {
            ("turn_on", "turn on")
        } else if lowered.contains("turn off") {
            ("turn_off", "turn off")
        } else {
            return Ok(IntentOutcome::Unsupported {
                message: "Device not supported".into(),
            });
        };
        let spoken_device = lowered
            .split(spoken_form)
            .nth(1)
            .unwrap_or("")
            .trim()
            .trim_start_matches("the ")
            .to_string();
        match self.registry.resolve(&spoken_device) {
            Some(device) => Ok(IntentOutcome::Command {
                device,
                intent: intent.into(),
            }),
            None => Ok(IntentOutcome::Unsupported {
                message: format!("Device \"{spoken_device}\" not found"),
            }),
        }
    }
}

/// The supported home devices, their rooms and spoken aliases.
fn default_device_specs() -> Vec<DeviceSpec> {
    let spec = |id: &str, name: &str, room: &str, aliases: &[&str], default_on: bool| DeviceSpec {
        id: id.into(),
        name: name.into(),
        room: room.into(),
        aliases: aliases.iter().map(|a| (*a).into()).collect(),
        default_on,
    };

    vec![
        spec(
            "living-main-light",
            "Main Light",
            "Living Room",
            &["living room main light", "living main light", "main light", "living room light"],
            true,
        ),
        spec(
            "living-reading-lamp",
            "Reading Lamp",
            "Living Room",
            &["living room reading lamp", "reading lamp", "living reading lamp"],
            true,
        ),
        spec(
            "living-tv-light",
            "TV Light",
            "Living Room",
            &["living room tv light", "tv light", "living tv light"],
            false,
        ),
        spec(
            "kitchen-ceiling-light",
            "Ceiling Light",
            "Kitchen",
            &["kitchen ceiling light", "kitchen light", "kitchen main light"],
            true,
        ),
        spec(
            "kitchen-cabinet-light",
            "Under Cabinet",
            "Kitchen",
            &["kitchen cabinet light", "cabinet light", "under cabinet light"],
            false,
        ),
        spec(
            "kitchen-dishwasher",
            "Dishwasher",
            "Kitchen",
            &["kitchen dishwasher", "dishwasher"],
            false,
        ),
        spec(
            "bedroom-main-light",
            "Main Light",
            "Bedroom",
            &["bedroom main light", "bedroom light"],
            false,
        ),
        spec(
            "bedroom-bedside-lamps",
            "Bedside Lamps",
            "Bedroom",
            &["bedroom bedside lamps", "bedside lamps", "bedside lamp"],
            false,
        ),
        spec("bedroom-fan", "Fan", "Bedroom", &["bedroom fan", "fan"], false),
        spec(
            "bathroom-main-light",
            "Main Light",
            "Bathroom",
            &["bathroom main light", "bathroom light"],
            true,
        ),
        spec(
            "bathroom-mirror-light",
            "Mirror Light",
            "Bathroom",
            &["bathroom mirror light", "mirror light"],
            false,
        ),
        spec(
            "bathroom-exhaust-fan",
            "Exhaust Fan",
            "Bathroom",
            &["bathroom exhaust fan", "exhaust fan", "bathroom fan"],
            false,
        ),
    ]
}

fn build_transcriber(cli: &Cli) -> anyhow::Result<TranscriberHandle> {
    if cli.stub {
        // Deterministic wiring check: every audible window "recognizes"
        // a canned wake command.
        return Ok(Arc::new(StubTranscriber::with_text(format!(
            "{} turn on the kitchen light",
            cli.wake_phrase
        ))));
    }
    let api_key = cli
        .api_key
        .clone()
        .context("set OPENAI_API_KEY (or pass --api-key / --stub)")?;
    Ok(Arc::new(HttpTranscriber::new(
        api_key,
        cli.stt_model.clone(),
    )?))
}

fn build_pipeline(
    cli: &Cli,
    transcriber: TranscriberHandle,
    registry: Arc<DeviceRegistry>,
) -> anyhow::Result<CommandPipeline> {
    let wake = WakePhrase::new(&cli.wake_phrase);

    let intent: Arc<dyn IntentParser> = if cli.stub {
        Arc::new(KeywordIntentParser {
            registry: Arc::clone(&registry),
        })
    } else {
        let api_key = cli
            .api_key
            .clone()
            .context("set OPENAI_API_KEY (or pass --api-key / --stub)")?;
        Arc::new(hearth_core::command::HttpIntentParser::new(
            api_key,
            cli.intent_model.clone(),
            &registry.vocabulary(),
            DEFAULT_INTENTS,
        )?)
    };

    let speaker: Arc<dyn Speaker> = if cli.quiet {
        Arc::new(NullSpeaker)
    } else {
        match ProcessSpeaker::platform_default() {
            Some(s) => Arc::new(s),
            None => {
                warn!("no TTS binary found — spoken feedback disabled");
                Arc::new(NullSpeaker)
            }
        }
    };

    Ok(CommandPipeline::new(
        transcriber,
        intent,
        registry,
        speaker,
        wake,
    ))
}

async fn run_clip(path: &Path, pipeline: &CommandPipeline) -> anyhow::Result<()> {
    let outcome = batch::process_clip(path, pipeline)
        .await
        .with_context(|| format!("processing {}", path.display()))?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    match outcome {
        CommandOutcome::Executed { .. } => Ok(()),
        other => bail!("clip was not executed: {}", other.notice()),
    }
}

async fn run_continuous(
    cli: &Cli,
    transcriber: TranscriberHandle,
    pipeline: CommandPipeline,
) -> anyhow::Result<()> {
    let registry = Arc::clone(pipeline.registry());
    let config = SessionConfig {
        wake_phrase: cli.wake_phrase.clone(),
        ..SessionConfig::default()
    };

    let session = CaptureSession::new(config, transcriber, Arc::new(pipeline));

    let mut commands = session.subscribe_commands();
    let mut statuses = session.subscribe_status();

    session
        .start_with_device(cli.device.clone())
        .context("starting audio capture")?;
    info!(wake_phrase = %cli.wake_phrase, "listening — say the wake phrase, ctrl-c to exit");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
            event = commands.recv() => {
                match event {
                    Ok(event) => {
                        println!("{}", serde_json::to_string(&event.outcome)?);
                        print_states(&registry);
                    }
                    Err(e) => warn!("command stream ended: {e}"),
                }
            }
            event = statuses.recv() => {
                if let Ok(event) = event {
                    info!(status = ?event.status, detail = ?event.detail, "session status");
                }
            }
        }
    }

    session.stop()?;
    let snap = session.diagnostics_snapshot();
    info!(
        chunks_in = snap.chunks_in,
        probes_issued = snap.probes_issued,
        wake_hits = snap.wake_hits,
        commands_finalized = snap.commands_finalized,
        "session summary"
    );
    Ok(())
}

fn print_states(registry: &DeviceRegistry) {
    let mut states: Vec<_> = registry.states().into_iter().collect();
    states.sort();
    for (id, on) in states {
        info!(device = %id, on, "device state");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if cli.list_devices {
        let devices = audio::device::list_input_devices();
        if devices.is_empty() {
            println!("no input devices found");
        }
        for device in devices {
            let marker = if device.is_default { " (default)" } else { "" };
            println!("{}{marker}", device.name);
        }
        return Ok(());
    }

    let registry = Arc::new(DeviceRegistry::new(default_device_specs()));
    let transcriber = build_transcriber(&cli)?;
    let pipeline = build_pipeline(&cli, Arc::clone(&transcriber), Arc::clone(&registry))?;

    let result = match &cli.clip {
        Some(path) => run_clip(path, &pipeline).await,
        None => run_continuous(&cli, transcriber, pipeline).await,
    };

    if let Err(ref e) = result {
        error!("{e:#}");
    }
    result
}
