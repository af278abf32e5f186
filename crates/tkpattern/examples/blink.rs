//! Blink SOS on a simulated device, entirely in-process.
//!
//! Run with:
//!   cargo run --example blink
//!
//! The same calls work against real hardware through
//! `DeviceSession::open` with a serial target.

use tkpattern::codec::encode;
use tkpattern::device::{
    ensure_app_running, upload_and_verify, DeviceSession, SessionConfig, SimLink,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let link = SimLink::app();
    let mut session = DeviceSession::from_parts(link.clone(), link.clone(), SessionConfig::default())?;

    let boot = ensure_app_running(&mut session, None, None)?;
    eprintln!(
        "Running {}{} v{}",
        boot.app.name0, boot.app.name1, boot.app.version
    );

    let pattern = encode("... --- ...")?;
    eprintln!(
        "Pattern {:?}: {} steps",
        pattern.normalized(),
        pattern.step_count()
    );

    let report = upload_and_verify(&mut session, &pattern)?;
    eprintln!("Read back {} bytes, consistent", report.received.len());

    for step in link.with_device(|device| device.executed().to_vec()) {
        let led = if step.is_on() { "on " } else { "off" };
        eprintln!("{led} x{}", step.duration);
    }
    Ok(())
}
