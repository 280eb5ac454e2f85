use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use fleet_control::{doctor, ControlConfig, FleetController, MissionStore, StorageConfig};
use fleet_link::mav::MavConnector;
use fleet_link::LinkConfig;
use fleet_mission::{compile_at, inject_home, wpl};
use fleet_proto::{MissionItem, RawWaypoint};

mod console;

#[derive(Debug, Parser)]
#[command(name = "fleet", version, about = "Fleet command & mission control for MAVLink drones")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Doctor,
    /// Read requests from stdin, one per line; answer with one JSON line each.
    Console,
    Mission { #[command(subcommand)] cmd: MissionCmd },
}

#[derive(Debug, Subcommand)]
enum MissionCmd {
    /// Parse a `.waypoints` or JSON mission offline and print the compiled items.
    Check { file: String },
}

#[derive(Debug, serde::Deserialize)]
struct Config {
    #[serde(default)]
    link: LinkConfig,
    #[serde(default)]
    control: ControlConfig,
    storage: StorageConfig,
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).context("read config")?;
    Ok(toml::from_str(&s).context("parse config toml")?)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor => doctor(&cfg)?,
        Command::Console => run_console(&cfg).await?,
        Command::Mission { cmd: MissionCmd::Check { file } } => mission_check(&file)?,
    }
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");
    doctor::check_link(&cfg.link)?;
    doctor::check_control(&cfg.control)?;
    doctor::check_storage(&cfg.storage)?;
    if cfg.control.mode_max_attempts == 0 {
        info!("doctor: mode changes wait indefinitely (control.mode_max_attempts = 0)");
    }
    info!("doctor: OK");
    Ok(())
}

async fn run_console(cfg: &Config) -> Result<()> {
    let ctl = FleetController::new(
        Arc::new(MavConnector::new(cfg.link.clone())),
        cfg.control.poll_policy(),
        MissionStore::new(&cfg.storage.mission_dir),
    );
    info!("console: ready (missions stored in {})", cfg.storage.mission_dir);

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let res = tokio::select! {
        r = console::serve(&ctl, stdin, tokio::io::stdout()) => r,
        _ = tokio::signal::ctrl_c() => {
            info!("console: interrupted");
            Ok(())
        }
    };

    ctl.shutdown().await;
    info!("console: all drones disconnected");
    res
}

fn mission_check(file: &str) -> Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("read {}", file))?;
    let items = compile_file(file, &bytes)?;
    for item in &items {
        println!("{}", serde_json::to_string(item)?);
    }
    info!("mission check: {} items (home at 0,0)", items.len());
    Ok(())
}

/// `.waypoints` files go through the planner parser, anything else is read
/// as a JSON waypoint list.
fn compile_file(file: &str, bytes: &[u8]) -> Result<Vec<MissionItem>> {
    let is_wpl = Path::new(file)
        .extension()
        .map(|e| e.eq_ignore_ascii_case("waypoints"))
        .unwrap_or(false);
    if is_wpl {
        return Ok(inject_home(0.0, 0.0, wpl::parse_bytes(bytes)?)?);
    }
    let wps: Vec<RawWaypoint> = serde_json::from_slice(bytes).context("parse JSON mission")?;
    Ok(compile_at(0.0, 0.0, &wps)?)
}
