//! Real-time engine command.
//!
//! Brings the transport up with the configured chain, then loops on the
//! control thread: applies control changes read from standard input, and
//! tears the transport down and brings it back when the device asks for a
//! reset. Control lines look like `pot 0 0.5` or `rotenc 1 -2`.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Args;
use crossbeam_channel::{Receiver, RecvTimeoutError, bounded};
use fxrig_config::EngineConfig;
use fxrig_io::{
    AudioDriver, BufferSizeInfo, ChannelCount, CpalDriver, DriverTransport, MockConfig,
    MockDriver, MockHandle, Transport,
};
use fxrig_platform::{ControlSource, SourceKind};

use crate::rig::Rig;

/// How often the control loop looks at the device status.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Delay between restart attempts of a failed device.
const RETRY_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Args)]
pub struct RunArgs {
    /// Configuration file (defaults to the user configuration, if any)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Device name or part of it
    #[arg(long)]
    driver: Option<String>,

    /// Sample rate
    #[arg(long)]
    sample_rate: Option<f64>,

    /// Block size in frames
    #[arg(long)]
    buffer_size: Option<usize>,

    /// Stop after this many seconds
    #[arg(long)]
    duration: Option<f64>,

    /// Run on a simulated device fed with silence
    #[arg(long)]
    mock: bool,

    /// Ignore standard input
    #[arg(long)]
    no_stdin: bool,
}

/// What happened during a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub blocks: u64,
    pub dropouts: u64,
    pub rejected_events: u64,
    pub restarts: u32,
}

pub fn run(args: RunArgs) -> anyhow::Result<()> {
    let mut config = EngineConfig::load_or_default(args.config.as_deref())?;
    if let Some(driver) = args.driver {
        config.transport.driver = Some(driver);
    }
    if let Some(rate) = args.sample_rate {
        config.transport.sample_rate = rate;
    }
    if let Some(size) = args.buffer_size {
        config.transport.buffer_size = Some(size);
    }
    let mut rig = Rig::new(config)?;

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let controls = (!args.no_stdin).then(spawn_stdin_reader);
    let deadline = args
        .duration
        .map(|secs| Instant::now() + Duration::from_secs_f64(secs.max(0.0)));

    let transport = &rig.config().transport;
    println!(
        "Running {} module(s) on {}",
        rig.config().chain.len(),
        if args.mock {
            "a simulated device"
        } else {
            transport.driver.as_deref().unwrap_or("the default device")
        }
    );
    println!("  {} control mapping(s)", rig.mapper().len());
    if controls.is_some() {
        println!("  Controls: <kind> <index> <value> on stdin");
    }
    println!("\nPress Ctrl+C to stop...\n");

    let stats = if args.mock {
        let (driver, device) = MockDriver::with_config(mock_device(rig.config()));
        let feeding = Arc::new(AtomicBool::new(true));
        let feeder = spawn_feeder(device, rig.config().transport.sample_rate, Arc::clone(&feeding));
        let stats = drive(driver, &mut rig, controls.as_ref(), &running, deadline);
        feeding.store(false, Ordering::Relaxed);
        if feeder.join().is_err() {
            tracing::error!("device simulation thread panicked");
        }
        stats?
    } else {
        drive(CpalDriver::new(), &mut rig, controls.as_ref(), &running, deadline)?
    };

    println!(
        "Done: {} block(s), {} dropout(s), {} restart(s), {} rejected event(s)",
        stats.blocks, stats.dropouts, stats.restarts, stats.rejected_events
    );
    Ok(())
}

/// Runs the control loop until `running` clears or `deadline` passes.
pub fn drive<D: AudioDriver>(
    driver: D,
    rig: &mut Rig,
    controls: Option<&Receiver<(ControlSource, f32)>>,
    running: &AtomicBool,
    deadline: Option<Instant>,
) -> anyhow::Result<RunStats> {
    let mut transport = DriverTransport::new(driver, rig.config().transport.to_transport_config())?;
    start_session(&mut transport, rig).context("starting the audio engine")?;

    let mut stats = RunStats::default();
    let mut retry_at: Option<Instant> = None;
    let mut dropouts = 0;

    while running.load(Ordering::SeqCst) && deadline.is_none_or(|d| Instant::now() < d) {
        match controls.map(|rx| rx.recv_timeout(POLL_INTERVAL)) {
            Some(Ok((source, raw))) => {
                if let Err(err) = rig.apply_control(source, raw) {
                    tracing::warn!(%err, "control change not applied");
                }
            }
            Some(Err(RecvTimeoutError::Timeout)) => {}
            Some(Err(RecvTimeoutError::Disconnected)) | None => std::thread::sleep(POLL_INTERVAL),
        }

        if rig.status().take_exit_request() {
            tracing::warn!("device requested a reset, restarting");
            transport.stop();
            rig.detach();
            stats.restarts += 1;
            retry_at = Some(Instant::now());
        }

        if let Some(at) = retry_at
            && Instant::now() >= at
        {
            match start_session(&mut transport, rig) {
                Ok(()) => retry_at = None,
                Err(err) => {
                    tracing::error!(error = %err, "restart failed");
                    transport.stop();
                    rig.detach();
                    retry_at = Some(Instant::now() + RETRY_INTERVAL);
                }
            }
        }

        let total = rig.status().dropouts();
        if total > dropouts {
            tracing::warn!(lost = total - dropouts, total, "audio dropouts");
            dropouts = total;
        }
    }

    transport.stop();
    let status = rig.status();
    stats.blocks = status.blocks();
    stats.dropouts = status.dropouts();
    stats.rejected_events = status.rejected_events();
    Ok(stats)
}

fn start_session<D: AudioDriver>(
    transport: &mut DriverTransport<D>,
    rig: &mut Rig,
) -> anyhow::Result<()> {
    let dispatcher = rig.build_dispatcher()?;
    let t = &rig.config().transport;
    let (sample_rate, block_size) = transport.init(
        t.driver.as_deref(),
        t.input_channel_base,
        t.output_channel_base,
        dispatcher,
    )?;
    transport.start()?;
    tracing::info!(sample_rate, block_size, "engine running");
    Ok(())
}

/// Parses `<kind> <index> <value>`.
fn parse_control(line: &str) -> Result<(ControlSource, f32), String> {
    let mut parts = line.split_whitespace();
    let (Some(kind), Some(index), Some(value), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(format!("expected '<kind> <index> <value>', got '{line}'"));
    };
    let kind = match kind.to_ascii_lowercase().as_str() {
        "pot" => SourceKind::Pot,
        "pedal" => SourceKind::Pedal,
        "rotenc" => SourceKind::Rotenc,
        "switch" => SourceKind::Switch,
        "midi" => SourceKind::Midi,
        "gui" => SourceKind::Gui,
        other => return Err(format!("unknown control kind '{other}'")),
    };
    let index: u16 = index
        .parse()
        .map_err(|_| format!("invalid control index '{index}'"))?;
    let value: f32 = value
        .parse()
        .map_err(|_| format!("invalid control value '{value}'"))?;
    Ok((ControlSource::new(kind, index), value))
}

fn spawn_stdin_reader() -> Receiver<(ControlSource, f32)> {
    let (tx, rx) = bounded(64);
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else {
                break;
            };
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match parse_control(line) {
                Ok(input) => {
                    if tx.send(input).is_err() {
                        break;
                    }
                }
                Err(err) => eprintln!("{err}"),
            }
        }
    });
    rx
}

/// Simulated device able to run `config`.
fn mock_device(config: &EngineConfig) -> MockConfig {
    let t = &config.transport;
    MockConfig {
        devices: vec![t.driver.clone().unwrap_or_else(|| "Mock Device".to_string())],
        sample_rates: vec![t.sample_rate],
        buffer_size: BufferSizeInfo {
            min: 16,
            max: 4096,
            preferred: 256,
            granularity: 0,
        },
        channels: ChannelCount {
            inputs: t.input_channel_base + t.input_channels,
            outputs: t.output_channel_base + t.output_channels,
        },
    }
}

/// Plays the device thread of a simulated device: silence in, one block
/// per block period.
fn spawn_feeder(device: MockHandle, sample_rate: f64, feeding: Arc<AtomicBool>) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut input = Vec::new();
        while feeding.load(Ordering::Relaxed) {
            let Some(config) = device.buffer_config() else {
                std::thread::sleep(POLL_INTERVAL);
                continue;
            };
            input.resize(config.block_size * config.input_channels, 0);
            if device.run_block(&input).is_none() {
                std::thread::sleep(POLL_INTERVAL);
                continue;
            }
            std::thread::sleep(Duration::from_secs_f64(
                config.block_size as f64 / sample_rate,
            ));
        }
    })
}
