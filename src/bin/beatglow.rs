use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use beatglow::aggregate::{FileSink, MemorySink};
use beatglow::clock::{Clock, ManualClock, SystemClock};
use beatglow::config::EngineConfig;
use beatglow::effects::ConsoleStrip;
use beatglow::engine::{Engine, EngineEvent, EngineEventKind, EngineHandle};
use beatglow::sensor::{mic, EnvelopeSensor, MicSensor, SyntheticSensor, WavSensor};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

#[derive(Parser, Debug)]
#[command(
    name = "beatglow",
    about = "Real-time beat detection driving LED light effects"
)]
struct Cli {
    /// Path to a JSON engine configuration (defaults apply when omitted)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Emit engine events as JSON lines instead of readable text
    #[arg(long)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Listen on the default input device until Ctrl-C
    Listen,
    /// Replay a WAV recording offline, faster than real time
    Replay {
        #[arg(long)]
        wav: PathBuf,
    },
    /// Run a deterministic synthetic beat pattern
    Simulate {
        #[arg(long, default_value_t = 120)]
        bpm: u32,
        #[arg(long, default_value_t = 10)]
        seconds: u64,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// List available input devices
    Devices,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::load_from_file(path),
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Listen => run_listen(config, cli.json),
        Commands::Replay { wav } => {
            let sensor = WavSensor::open(&wav, config.sampler.tick_ms)
                .with_context(|| format!("opening {}", wav.display()))?;
            run_offline(config, Box::new(sensor), cli.json, None)
        }
        Commands::Simulate { bpm, seconds, seed } => {
            let sensor = SyntheticSensor::new(
                bpm,
                Duration::from_secs(seconds),
                config.sampler.tick_ms,
                seed,
            );
            run_offline(config, Box::new(sensor), cli.json, Some(seed))
        }
        Commands::Devices => run_devices(),
    }
}

/// Live capture on the system clock, stopped by Ctrl-C.
fn run_listen(config: EngineConfig, json: bool) -> Result<ExitCode> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::default());
    let sensor = MicSensor::open().context("opening input stream")?;
    let sink = FileSink::new(config.aggregate.log_path.clone());

    let engine = Engine::new(
        config,
        Box::new(sensor),
        Box::new(ConsoleStrip::new()),
        Box::new(sink),
        clock,
    )?;
    let events = engine.subscribe();
    let handle = EngineHandle::spawn(engine);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building event-loop runtime")?;

    runtime.block_on(async move {
        let mut stream = BroadcastStream::new(events);
        loop {
            tokio::select! {
                signal = tokio::signal::ctrl_c() => {
                    signal.context("waiting for Ctrl-C")?;
                    break;
                }
                event = stream.next() => match event {
                    Some(Ok(event)) => print_event(&event, json)?,
                    // Lagged receiver: events dropped, keep consuming
                    Some(Err(_)) => continue,
                    None => break,
                },
            }
        }
        anyhow::Ok(())
    })?;

    handle.stop();
    handle.join().context("engine run failed")?;
    Ok(ExitCode::SUCCESS)
}

/// Offline run under a manual clock: simulated time, full speed.
fn run_offline(
    config: EngineConfig,
    sensor: Box<dyn EnvelopeSensor>,
    json: bool,
    seed: Option<u64>,
) -> Result<ExitCode> {
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new());
    let sink = MemorySink::new();

    let mut engine = Engine::new(
        config,
        sensor,
        Box::new(ConsoleStrip::new()),
        Box::new(sink),
        clock,
    )?;
    if let Some(seed) = seed {
        engine = engine.with_effect_seed(seed);
    }

    let mut events = engine.subscribe();
    let handle = EngineHandle::spawn(engine);

    loop {
        match events.blocking_recv() {
            Ok(event) => {
                let stopped = matches!(event.kind, EngineEventKind::Stopped);
                print_event(&event, json)?;
                if stopped {
                    break;
                }
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }

    handle.join().context("engine run failed")?;
    Ok(ExitCode::SUCCESS)
}

fn run_devices() -> Result<ExitCode> {
    let devices = mic::list_input_devices().context("enumerating input devices")?;
    if devices.is_empty() {
        println!("No input devices found");
    } else {
        for name in devices {
            println!("{name}");
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn print_event(event: &EngineEvent, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }

    match &event.kind {
        EngineEventKind::Started => println!("[{:>8} ms] started", event.timestamp_ms),
        EngineEventKind::Onset {
            level,
            effect,
            color,
        } => println!(
            "[{:>8} ms] onset level={:.1} {} {}",
            event.timestamp_ms, level, effect, color
        ),
        EngineEventKind::BpmUpdated { bpm } => {
            println!("[{:>8} ms] tempo {:.1} BPM", event.timestamp_ms, bpm)
        }
        EngineEventKind::MinuteSummary { bpm } => {
            println!("[{:>8} ms] minute mean {:.1} BPM", event.timestamp_ms, bpm)
        }
        EngineEventKind::Stopped => println!("[{:>8} ms] stopped", event.timestamp_ms),
    }
    Ok(())
}
