use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::{Args, Subcommand};
use tkpattern_device::{DeviceSession, SessionConfig};
use tkpattern_transport::{detect_serial_port, DeviceTarget, TransportConfig, DEFAULT_SPEED};
use tracing::info;

use crate::exit::{device_error, io_error, transport_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod encode;
pub mod info;
pub mod run;
pub mod simulate;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load the app if needed, then upload, play and verify a pattern.
    Run(RunArgs),
    /// Encode a pattern offline and show its steps.
    Encode(EncodeArgs),
    /// Report whether the device is in firmware mode or running the app.
    Info(InfoArgs),
    /// Serve a simulated device on a Unix socket.
    Simulate(SimulateArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Encode(args) => encode::run(args, format),
        Command::Info(args) => info::run(args, format),
        Command::Simulate(args) => simulate::run(args),
        Command::Version(args) => version::run(args),
    }
}

/// How to reach the device.
#[derive(Args, Debug)]
pub struct PortArgs {
    /// Serial port path, or `unix:<path>` for a simulator socket. Detected
    /// automatically when omitted.
    #[arg(long, env = "TKPATTERN_PORT", value_name = "PATH")]
    pub port: Option<String>,
    /// Serial port speed in bits per second.
    #[arg(long, default_value_t = DEFAULT_SPEED, value_name = "BPS")]
    pub speed: u32,
    /// How long an identity probe may wait for an answer (e.g. 2s, 500ms).
    #[arg(long, default_value = "2s")]
    pub probe_timeout: String,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// The pattern, written with `.`, `-`, `/` and spaces.
    #[arg(long, short = 'p', allow_hyphen_values = true)]
    pub pattern: String,
    #[command(flatten)]
    pub port: PortArgs,
    /// App binary to load when the device is in firmware mode.
    #[arg(long, value_name = "FILE")]
    pub app: Option<PathBuf>,
    /// User supplied secret to load the app with.
    #[arg(long, value_name = "FILE", requires = "app")]
    pub uss_file: Option<PathBuf>,
    /// Bound on every device response (e.g. 30s). Playback must fit in it.
    #[arg(long)]
    pub timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// The pattern, written with `.`, `-`, `/` and spaces.
    #[arg(long, short = 'p', allow_hyphen_values = true)]
    pub pattern: String,
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub port: PortArgs,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Start in firmware mode, waiting for an app to be loaded.
    #[arg(long)]
    pub firmware_mode: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// The device to talk to: the given target, or the one TKey found on USB.
pub(crate) fn resolve_target(port: Option<&str>) -> CliResult<DeviceTarget> {
    if let Some(port) = port {
        return DeviceTarget::from_str(port).map_err(|err| transport_error("bad --port", err));
    }
    let path = detect_serial_port().map_err(|err| transport_error("device detection failed", err))?;
    info!(port = %path, "detected TKey");
    Ok(DeviceTarget::Serial(path))
}

/// Open a session on the device named by `port`.
pub(crate) fn open_session(
    port: &PortArgs,
    read_timeout: Option<Duration>,
) -> CliResult<(DeviceTarget, DeviceSession)> {
    let target = resolve_target(port.port.as_deref())?;
    let transport = TransportConfig {
        speed: port.speed,
        read_timeout,
    };
    let config = SessionConfig {
        read_timeout,
        probe_timeout: parse_duration(&port.probe_timeout)?,
        ..SessionConfig::default()
    };
    let session = DeviceSession::open(&target, &transport, config)
        .map_err(|err| device_error(&format!("could not open {target}"), err))?;
    Ok((target, session))
}

pub(crate) fn read_file(path: Option<&PathBuf>) -> CliResult<Option<Vec<u8>>> {
    path.map(|path| {
        std::fs::read(path).map_err(|err| io_error(&format!("failed reading {}", path.display()), err))
    })
    .transpose()
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(match unit {
        "ms" => Duration::from_millis(value),
        _ => Duration::from_secs(value),
    })
}
