use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tkpattern_device::SimulatedDevice;
use tkpattern_transport::{ReadTimeout, UnixDomainSocket};
use tracing::{info, warn};

use crate::cmd::SimulateArgs;
use crate::exit::{transport_error, CliError, CliResult, INTERNAL, INTERRUPTED};

/// How often the accept and read loops look at the stop flag.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub fn run(args: SimulateArgs) -> CliResult<i32> {
    let listener =
        UnixDomainSocket::bind(&args.path).map_err(|err| transport_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut device = if args.firmware_mode {
        SimulatedDevice::firmware_mode()
    } else {
        SimulatedDevice::new()
    };
    info!(
        path = %listener.path().display(),
        firmware_mode = args.firmware_mode,
        "simulated device ready"
    );

    while running.load(Ordering::SeqCst) {
        let mut stream = match listener.try_accept() {
            Ok(Some(stream)) => stream,
            Ok(None) => {
                thread::sleep(POLL_INTERVAL);
                continue;
            }
            Err(err) => return Err(transport_error("accept failed", err)),
        };
        stream
            .set_read_timeout(Some(POLL_INTERVAL))
            .map_err(|err| transport_error("configure connection", err))?;

        info!("host connected");
        if let Err(err) = device.serve(&mut stream, &running) {
            warn!(error = %err, "host connection ended with an error");
        }
        info!(
            executions = device.executions(),
            firmware_mode = device.in_firmware_mode(),
            "host disconnected"
        );
    }

    // Dropping the listener removes the socket file.
    drop(listener);
    info!("simulator stopped");
    Ok(INTERRUPTED)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
