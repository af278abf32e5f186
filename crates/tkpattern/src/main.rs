mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "tkpattern", version, about = "Blink LED patterns on a TKey")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr). `TKPATTERN_LOG` filter directives override it.
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_subcommand() {
        let cli = Cli::try_parse_from([
            "tkpattern",
            "run",
            "--pattern",
            ".- /-...",
            "--port",
            "unix:/tmp/tk.sock",
            "--timeout",
            "30s",
        ])
        .expect("run args should parse");

        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.pattern, ".- /-...");
        assert_eq!(args.port.port.as_deref(), Some("unix:/tmp/tk.sock"));
        assert_eq!(args.port.speed, 62_500);
    }

    #[test]
    fn patterns_may_start_with_a_dash() {
        let cli = Cli::try_parse_from(["tkpattern", "run", "--pattern", "-.-", "--port", "unix:/tmp/tk.sock"])
            .expect("dash-led pattern should parse");
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.pattern, "-.-");

        let cli = Cli::try_parse_from(["tkpattern", "encode", "-p", "- "])
            .expect("dash-led pattern should parse");
        assert!(matches!(cli.command, Command::Encode(ref a) if a.pattern == "- "));
    }

    #[test]
    fn uss_requires_app() {
        let err = Cli::try_parse_from([
            "tkpattern",
            "run",
            "--pattern",
            ".",
            "--uss-file",
            "/tmp/uss",
        ])
        .expect_err("uss without app should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn run_needs_a_pattern() {
        let err = Cli::try_parse_from(["tkpattern", "run"]).expect_err("pattern is required");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn parses_simulate_with_global_flags() {
        let cli = Cli::try_parse_from([
            "tkpattern",
            "simulate",
            "/tmp/tk.sock",
            "--firmware-mode",
            "--log-level",
            "debug",
        ])
        .expect("simulate args should parse");
        assert!(matches!(cli.command, Command::Simulate(ref a) if a.firmware_mode));
        assert!(matches!(cli.log_level, LogLevel::Debug));
    }
}
