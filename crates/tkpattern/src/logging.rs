use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

/// Overrides `--log-level` with full `EnvFilter` directives when set.
pub const LOG_ENV: &str = "TKPATTERN_LOG";

const CRATES: [&str; 5] = [
    "tkpattern",
    "tkpattern_transport",
    "tkpattern_frame",
    "tkpattern_codec",
    "tkpattern_device",
];

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// `level` for our own crates, warnings only from dependencies.
    ///
    /// Frame dumps live at `trace` in `tkpattern_frame`, so
    /// `--log-level trace` shows the wire without `serialport` internals.
    pub fn directives(self) -> String {
        let level = self.as_str();
        std::iter::once("warn".to_string())
            .chain(CRATES.iter().map(|krate| format!("{krate}={level}")))
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn build_filter(env: Option<&str>, level: LogLevel) -> EnvFilter {
    env.and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(level.directives()))
}

/// Logs go to stderr; stdout is reserved for command output.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let env = std::env::var(LOG_ENV).ok();
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(build_filter(env.as_deref(), level))
        .with_ansi(false)
        .with_target(matches!(level, LogLevel::Debug | LogLevel::Trace));

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}
