use serde::Serialize;

/// LED color value for "off".
pub const COLOR_OFF: u8 = 0;

/// LED color value for "on": red, green and blue together (white).
pub const COLOR_ON: u8 = 7;

/// Size of one step on the wire.
pub const PACKED_STEP_SIZE: usize = 2;

/// One timed LED event.
///
/// `duration` is in dot units; the device decides how long a dot lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PatternStep {
    pub duration: u8,
    pub color: u8,
}

impl PatternStep {
    pub const fn new(duration: u8, color: u8) -> Self {
        Self { duration, color }
    }

    pub fn is_on(&self) -> bool {
        self.color != COLOR_OFF
    }

    /// Stage this step for packing.
    pub fn padded(self) -> PaddedStep {
        PaddedStep {
            color: self.color,
            duration: self.duration,
        }
    }
}

/// Byte-aligned staging record of a step, laid out like the device's
/// unpacked struct.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaddedStep {
    pub color: u8,
    pub duration: u8,
}

impl PaddedStep {
    /// Canonical wire form: color byte, then duration byte.
    pub fn pack(&self) -> PackedStep {
        PackedStep([self.color, self.duration])
    }
}

/// A step in its canonical wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedStep([u8; PACKED_STEP_SIZE]);

impl PackedStep {
    pub fn from_bytes(bytes: [u8; PACKED_STEP_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PACKED_STEP_SIZE] {
        &self.0
    }

    pub fn pad(&self) -> PaddedStep {
        PaddedStep {
            color: self.0[0],
            duration: self.0[1],
        }
    }
}

impl From<PaddedStep> for PatternStep {
    fn from(padded: PaddedStep) -> Self {
        Self::new(padded.duration, padded.color)
    }
}
