use serde::Serialize;
use tkpattern_codec::{encode, PatternStep, PatternSummary};
use tkpattern_device::{ensure_app_running, upload_and_verify, Bootstrap, RoundTrip};
use tracing::{info, warn};

use crate::cmd::{open_session, parse_duration, read_file, RunArgs};
use crate::exit::{device_error, encoding_error, CliError, CliResult, INTERNAL, INTERRUPTED, SUCCESS};
use crate::output::{print_report, OutputFormat, Report};

#[derive(Serialize)]
struct RunOutput {
    device: String,
    bootstrap: Bootstrap,
    pattern: PatternSummary,
    round_trip: RoundTrip,
    consistent: bool,
}

impl Report for RunOutput {
    fn fields(&self) -> Vec<(&'static str, String)> {
        let app = &self.bootstrap.app;
        vec![
            ("device", self.device.clone()),
            ("app", format!("{}{} v{}", app.name0, app.name1, app.version)),
            (
                "loaded",
                self.bootstrap
                    .loaded_digest
                    .clone()
                    .unwrap_or_else(|| "no (already running)".to_string()),
            ),
            ("pattern", self.pattern.normalized.clone()),
            ("steps", self.pattern.step_count.to_string()),
            ("sent", hex::encode(&self.round_trip.sent)),
            ("consistent", self.consistent.to_string()),
        ]
    }

    fn steps(&self) -> Option<(&str, &[PatternStep])> {
        Some((&self.pattern.normalized, &self.pattern.steps))
    }
}

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    // Reject bad patterns before touching the device.
    let pattern = encode(&args.pattern).map_err(encoding_error)?;
    let app = read_file(args.app.as_ref())?;
    let uss = read_file(args.uss_file.as_ref())?;
    let read_timeout = args.timeout.as_deref().map(parse_duration).transpose()?;

    let (target, mut session) = open_session(&args.port, read_timeout)?;
    install_ctrlc_handler()?;

    let bootstrap = ensure_app_running(&mut session, app.as_deref(), uss.as_deref())
        .map_err(|err| device_error("could not start the pattern app", err))?;
    info!(
        version = bootstrap.app.version,
        loaded = bootstrap.loaded_digest.is_some(),
        "pattern app running"
    );

    let round_trip = upload_and_verify(&mut session, &pattern)
        .map_err(|err| device_error("pattern round trip failed", err))?;
    session.close();

    let out = RunOutput {
        device: target.to_string(),
        bootstrap,
        pattern: PatternSummary::from(&pattern),
        round_trip,
        consistent: true,
    };
    print_report(&out, format);
    Ok(SUCCESS)
}

/// An exchange cannot be abandoned halfway, so an interrupt ends the process;
/// the channel is released with it.
fn install_ctrlc_handler() -> CliResult<()> {
    ctrlc::set_handler(|| {
        warn!("interrupted, closing device channel");
        std::process::exit(INTERRUPTED);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
