//! Pattern app protocol for the TKey.
//!
//! A [`DeviceSession`] owns the channel to one device and turns the app's
//! four operations into frame exchanges:
//! - [`get_identity`](DeviceSession::get_identity): name and version of the running app
//! - [`set_pattern`](DeviceSession::set_pattern): chunked upload of packed steps
//! - [`execute`](DeviceSession::execute): play the uploaded pattern
//! - [`get_pattern`](DeviceSession::get_pattern): chunked read-back
//!
//! Exactly one request is in flight at a time and every call either completes
//! its whole exchange or fails; nothing is retried internally.
//!
//! The [`firmware`] module covers the bootstrap side (detecting firmware mode
//! and loading the app binary) and [`sim`] provides a conformant simulated
//! device for tests and local runs.

pub mod commands;
pub mod error;
pub mod firmware;
pub mod identity;
pub mod roundtrip;
pub mod session;
pub mod sim;
pub mod transfer;

pub use commands::{AppCmd, FwCmd};
pub use error::{DeviceError, ErrorClass, Result};
pub use firmware::{ensure_app_running, Bootstrap, MAX_APP_SIZE};
pub use identity::{NameVersion, APP_NAME0, APP_NAME1, FW_NAME0, FW_NAME1};
pub use roundtrip::{upload_and_verify, verify_consistency, RoundTrip};
pub use session::{DeviceSession, SessionConfig, DEFAULT_TAG};
pub use sim::{SimLink, SimulatedDevice};
pub use transfer::{ChunkReceiver, ChunkSender};
