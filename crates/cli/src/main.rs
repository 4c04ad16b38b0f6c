//! headset-power CLI: G733 battery/lighting daemon and one-shot commands.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use headset_power_core::config::EngineConfig;
use headset_power_core::device::HidapiConnector;
use headset_power_core::engine::HeadsetEngine;
use headset_power_core::state::StateEvent;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Ticks `status` waits for the first battery report.
const STATUS_MAX_TICKS: u32 = 12;

#[derive(Parser)]
#[command(
    name = "headset-power",
    version,
    about = "Battery and lighting control for the Logitech G733 headset"
)]
struct Cli {
    /// JSON config file (default: $XDG_CONFIG_HOME/headset-power/config.json).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List connected G733 receivers.
    ListDevices,
    /// Read battery state once and print it as JSON.
    Status,
    /// Switch strip and logo lighting.
    SetLighting {
        /// on or off.
        state: Switch,
    },
    /// Run the daemon: print state changes as JSON lines and accept
    /// `lighting on|off`, `status` and `quit` on stdin.
    Run {
        /// Lighting state to apply at startup.
        #[arg(long)]
        lighting: Option<Switch>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Switch {
    On,
    Off,
}

impl Switch {
    fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

/// A line of daemon input.
#[derive(Debug, PartialEq, Eq)]
enum Control {
    Lighting(bool),
    Status,
    Quit,
}

fn parse_control(line: &str) -> Option<Control> {
    let words: Vec<&str> = line.split_whitespace().collect();
    match words.as_slice() {
        ["lighting", "on"] => Some(Control::Lighting(true)),
        ["lighting", "off"] => Some(Control::Lighting(false)),
        ["status"] => Some(Control::Status),
        ["quit"] => Some(Control::Quit),
        _ => None,
    }
}

fn default_config_path() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
    Some(base.join("headset-power").join("config.json"))
}

fn load_config(explicit: Option<PathBuf>) -> Result<EngineConfig> {
    let config = match explicit {
        Some(path) => EngineConfig::load(&path)?,
        None => match default_config_path() {
            Some(path) => EngineConfig::load_or_default(&path)?,
            None => EngineConfig::default(),
        },
    };
    Ok(config)
}

fn emit(events: &[StateEvent]) -> Result<()> {
    for event in events {
        println!("{}", serde_json::to_string(event)?);
    }
    Ok(())
}

type Engine = HeadsetEngine<HidapiConnector>;

async fn print_status(engine: &mut Engine, config: &EngineConfig) -> Result<()> {
    engine.connect();
    if !engine.is_connected() {
        anyhow::bail!("No G733 headset found");
    }
    engine.poll_voltage();
    for _ in 0..STATUS_MAX_TICKS {
        engine.step();
        if engine.status().soc.is_some() {
            break;
        }
        tokio::time::sleep(config.request_interval()).await;
    }
    println!("{}", serde_json::to_string_pretty(&engine.status())?);
    Ok(())
}

async fn apply_lighting(engine: &mut Engine, config: &EngineConfig, on: bool) -> Result<()> {
    engine.connect();
    if !engine.is_connected() {
        anyhow::bail!("No G733 headset found");
    }
    engine.set_lighting(on);
    while engine.pending_requests() > 0 {
        engine.step();
        if !engine.is_connected() {
            anyhow::bail!("Lost the headset while sending lighting commands");
        }
        tokio::time::sleep(config.request_interval()).await;
    }
    println!("Lighting {}", if on { "on" } else { "off" });
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn run_daemon(
    engine: &mut Engine,
    config: &EngineConfig,
    lighting: Option<bool>,
) -> Result<()> {
    let mut poll = tokio::time::interval(config.poll_interval());
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut tick = tokio::time::interval(config.request_interval());
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    emit(&engine.connect())?;
    if let Some(on) = lighting {
        emit(&engine.set_lighting(on))?;
    }
    info!(
        poll_ms = config.poll_interval_ms,
        tick_ms = config.request_interval_ms,
        "Daemon running"
    );

    loop {
        tokio::select! {
            _ = poll.tick() => engine.poll_voltage(),
            _ = tick.tick() => emit(&engine.step())?,
            line = lines.next_line(), if stdin_open => match line.context("read stdin")? {
                Some(line) => match parse_control(&line) {
                    Some(Control::Lighting(on)) => emit(&engine.set_lighting(on))?,
                    Some(Control::Status) => println!("{}", serde_json::to_string(&engine.status())?),
                    Some(Control::Quit) => break,
                    None => warn!(input = %line.trim(), "Unknown command"),
                },
                None => stdin_open = false,
            },
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    emit(&engine.disconnect())?;
    info!("Daemon stopped");
    Ok(())
}

fn build_engine(config: &EngineConfig) -> Engine {
    HeadsetEngine::new(HidapiConnector::new(), config.load_curves(), config)
}

fn list_devices() -> Result<()> {
    let devices = headset_power_core::device::discover_devices()?;
    if devices.is_empty() {
        println!("No G733 receivers found.");
        println!("Ensure the receiver is plugged in and hidraw permissions are set up.");
    } else {
        for dev in &devices {
            println!(
                "{} (VID: 0x{:04X}, PID: 0x{:04X}, interface: {}, path: {})",
                dev.model.name(),
                dev.vid,
                dev.pid,
                dev.interface,
                dev.path
            );
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::ListDevices => list_devices(),
        Commands::Status => {
            let config = load_config(cli.config)?;
            print_status(&mut build_engine(&config), &config).await
        }
        Commands::SetLighting { state } => {
            let config = load_config(cli.config)?;
            apply_lighting(&mut build_engine(&config), &config, state.is_on()).await
        }
        Commands::Run { lighting } => {
            let config = load_config(cli.config)?;
            run_daemon(
                &mut build_engine(&config),
                &config,
                lighting.map(Switch::is_on),
            )
            .await
        }
    }
}
