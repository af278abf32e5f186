/// Errors produced while encoding or decoding patterns.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    /// A character outside `.`, `-`, `/` and space.
    #[error("invalid symbol {symbol:?} at position {position}")]
    InvalidSymbol { symbol: char, position: usize },

    /// Nothing to encode.
    #[error("pattern is empty")]
    Empty,

    /// The step count travels in a single byte.
    #[error("pattern has {count} steps, at most {max} fit in one transfer")]
    TooManySteps { count: usize, max: usize },

    /// Packed bytes that are not a whole number of steps.
    #[error("{len} bytes is not a whole number of packed steps")]
    TruncatedStep { len: usize },
}

pub type Result<T> = std::result::Result<T, EncodingError>;
