use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;
use tracing::debug;

use crate::error::{EncodingError, Result};
use crate::step::{PackedStep, PatternStep, PACKED_STEP_SIZE};
use crate::symbol::{normalize, Symbol};

/// Most steps one transfer can announce (the count is a single byte).
pub const MAX_STEPS: usize = u8::MAX as usize;

/// A pattern in wire form, ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPattern {
    symbols: Vec<Symbol>,
    bytes: Bytes,
}

impl EncodedPattern {
    /// Packed step bytes, `step_count() * PACKED_STEP_SIZE` long.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn bytes(&self) -> Bytes {
        self.bytes.clone()
    }

    /// Number of steps, as announced to the device.
    pub fn step_count(&self) -> u8 {
        // encode() bounds the count by MAX_STEPS
        self.symbols.len() as u8
    }

    /// The normalized token stream, one token per step.
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// The normalized token stream rendered as text (`|` for separators).
    pub fn normalized(&self) -> String {
        self.symbols.iter().map(|s| s.as_char()).collect()
    }

    /// Logical steps in playback order.
    pub fn steps(&self) -> Vec<PatternStep> {
        self.symbols.iter().map(|s| s.step()).collect()
    }
}

/// Summary of an encoded pattern for reports.
#[derive(Debug, Serialize)]
pub struct PatternSummary {
    pub normalized: String,
    pub step_count: u8,
    pub steps: Vec<PatternStep>,
}

impl From<&EncodedPattern> for PatternSummary {
    fn from(pattern: &EncodedPattern) -> Self {
        Self {
            normalized: pattern.normalized(),
            step_count: pattern.step_count(),
            steps: pattern.steps(),
        }
    }
}

/// Encode a pattern into packed step bytes.
///
/// Deterministic and all-or-nothing: an invalid character anywhere fails the
/// whole pattern and no bytes are produced.
pub fn encode(pattern: &str) -> Result<EncodedPattern> {
    let symbols = normalize(pattern)?;
    if symbols.is_empty() {
        return Err(EncodingError::Empty);
    }
    if symbols.len() > MAX_STEPS {
        return Err(EncodingError::TooManySteps {
            count: symbols.len(),
            max: MAX_STEPS,
        });
    }

    let mut buf = BytesMut::with_capacity(symbols.len() * PACKED_STEP_SIZE);
    for symbol in &symbols {
        let packed = symbol.step().padded().pack();
        buf.put_slice(packed.as_bytes());
    }

    debug!(
        pattern,
        steps = symbols.len(),
        bytes = buf.len(),
        "encoded pattern"
    );
    Ok(EncodedPattern {
        symbols,
        bytes: buf.freeze(),
    })
}

/// Unpack step bytes as read back from the device.
pub fn decode(bytes: &[u8]) -> Result<Vec<PatternStep>> {
    if bytes.len() % PACKED_STEP_SIZE != 0 {
        return Err(EncodingError::TruncatedStep { len: bytes.len() });
    }
    Ok(bytes
        .chunks_exact(PACKED_STEP_SIZE)
        .map(|chunk| {
            let packed = PackedStep::from_bytes([chunk[0], chunk[1]]);
            PatternStep::from(packed.pad())
        })
        .collect())
}
