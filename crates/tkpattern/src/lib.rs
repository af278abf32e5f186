//! Blink LED patterns on a TKey.
//!
//! A pattern is written with dots, dashes, slashes and spaces, encoded into
//! timed LED steps, uploaded to the pattern app on the key, played, and read
//! back for verification.
//!
//! # Crate Structure
//!
//! - [`transport`]: Serial port and Unix socket channels to the device
//! - [`frame`]: One-byte-header framing used by the device
//! - [`codec`]: Pattern text to packed LED steps
//! - [`device`]: Session protocol, app bootstrap and a device simulator

/// Re-export transport types.
pub mod transport {
    pub use tkpattern_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use tkpattern_frame::*;
}

/// Re-export codec types.
pub mod codec {
    pub use tkpattern_codec::*;
}

/// Re-export device types.
pub mod device {
    pub use tkpattern_device::*;
}
