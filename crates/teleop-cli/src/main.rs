use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use tracing::info;
use tracing_subscriber::EnvFilter;

use teleop_core::{ControlMode, ControllerConfig, RunSummary, TeleopController};
use teleop_input::{LineSafe, Terminal};
use teleop_link::autodetect::{autodetect_link, default_candidate_bauds, default_candidate_devs};
use teleop_link::doctor::check_link;
use teleop_link::{Endpoints, LinkConfig, MavGateway};

#[derive(Debug, Parser)]
#[command(name = "mavteleop", version, about = "Keyboard teleoperation for MAVLink vehicles")]
#[command(group(
    ArgGroup::new("control")
        .required(true)
        .args(["rc_override", "sp_attitude", "sp_velocity", "sp_position"])
))]
struct Cli {
    /// Namespace prefixed to every vehicle endpoint name.
    #[arg(short = 'n', long, default_value = "/mavros")]
    namespace: String,

    #[arg(short, long)]
    verbose: bool,

    /// TOML config file; built-in defaults are used without one.
    #[arg(long)]
    config: Option<String>,

    /// MAVLink connection string, overrides link.connect.
    #[arg(long)]
    connect: Option<String>,

    /// Use RC override control type.
    #[arg(long, visible_alias = "rc")]
    rc_override: bool,

    /// Use attitude setpoint control type.
    #[arg(long, visible_alias = "att")]
    sp_attitude: bool,

    /// Use velocity setpoint control type.
    #[arg(long, visible_alias = "vel")]
    sp_velocity: bool,

    /// Use position setpoint control type.
    #[arg(long, visible_alias = "pos")]
    sp_position: bool,
}

impl Cli {
    fn control_mode(&self) -> ControlMode {
        if self.sp_attitude {
            ControlMode::AttitudeSetpoint
        } else if self.sp_velocity {
            ControlMode::VelocitySetpoint
        } else if self.sp_position {
            ControlMode::PositionSetpoint
        } else {
            ControlMode::RcOverride
        }
    }
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct Config {
    link: LinkConfig,
    teleop: TeleopCfg,
}

#[derive(Debug, serde::Deserialize)]
#[serde(default)]
struct TeleopCfg {
    poll_timeout_ms: u64,
}

impl Default for TeleopCfg {
    fn default() -> Self {
        Self { poll_timeout_ms: 100 }
    }
}

fn load_config(path: Option<&str>) -> Result<Config> {
    let Some(path) = path else { return Ok(Config::default()); };
    let s = std::fs::read_to_string(path).with_context(|| format!("read config {}", path))?;
    parse_config(&s)
}

fn parse_config(s: &str) -> Result<Config> {
    let cfg: Config = toml::from_str(s).context("parse config toml")?;
    anyhow::ensure!(
        (10..=1000).contains(&cfg.teleop.poll_timeout_ms),
        "teleop.poll_timeout_ms should be 10..1000"
    );
    Ok(cfg)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(|| LineSafe::new(std::io::stdout()))
        .init();

    // Refuse unimplemented modes before touching the terminal or the link.
    let mode = cli.control_mode().ensure_supported()?;

    let mut cfg = load_config(cli.config.as_deref())?;
    if let Some(url) = &cli.connect {
        cfg.link.connect = Some(url.clone());
    }
    check_link(&cfg.link)?;

    info!("mavteleop: {} control", mode);
    rc_override(&cli, &cfg).await
}

async fn rc_override(cli: &Cli, cfg: &Config) -> Result<()> {
    let url = resolve_connect(&cfg.link)?;
    let gateway = MavGateway::open(&url, &cfg.link, Endpoints::new(&cli.namespace)).context("link open")?;
    let ctl_cfg = ControllerConfig { poll_timeout: Duration::from_millis(cfg.teleop.poll_timeout_ms) };

    print_keymap();

    // The loop blocks on terminal polls and command acks.
    let summary = tokio::task::spawn_blocking(move || -> Result<RunSummary> {
        let term = Terminal::open().context("terminal raw mode")?;
        let mut ctl = TeleopController::new(term, gateway, ctl_cfg);
        let summary = ctl.run()?;

        let (term, gateway) = ctl.into_parts();
        drop(term);
        let st = gateway.status();
        info!(
            "link: connected={} armed={} mode={} acks={} last_heartbeat_age={:?}",
            st.connected,
            st.armed,
            st.mode_name().unwrap_or("unknown"),
            st.acks_seen,
            st.hb_age(),
        );
        Ok(summary)
    })
    .await
    .context("control loop task")??;

    info!("mavteleop: done ({} frames sent)", summary.frames_sent);
    Ok(())
}

fn resolve_connect(link: &LinkConfig) -> Result<String> {
    if let Some(url) = link.connect.as_ref().filter(|s| !s.trim().is_empty()) {
        return Ok(url.clone());
    }
    anyhow::ensure!(link.autodetect, "link.connect missing (autodetect=false)");

    let devs = link.candidate_devs.clone().unwrap_or_else(default_candidate_devs);
    let bauds = link.candidate_bauds.clone().unwrap_or_else(default_candidate_bauds);
    let timeout = Duration::from_millis(link.heartbeat_timeout_ms.unwrap_or(1500));

    let res = autodetect_link(devs, bauds, timeout);
    for p in &res.attempts {
        info!("autodetect dev={} baud={} hb={} {}ms note={}", p.dev, p.baud, p.hb_seen, p.elapsed_ms, p.note);
    }
    res.url().context("link autodetect failed: no heartbeat found")
}

fn print_keymap() {
    println!("MAV-Teleop: RC override control");
    println!("  1 arm      2 disarm    3 takeoff   4 land");
    println!("  h STABILIZED           0 OFFBOARD");
    println!("  r throttle up   f throttle reset   v throttle down");
    println!("  j/l roll   i/k pitch   Ctrl-C quit");
}
