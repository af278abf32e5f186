//! Morse-style LED pattern encoding.
//!
//! A pattern is written with dots (`.`), dashes (`-`), letter gaps (`/`) and
//! word gaps (` `). Encoding normalizes the text so that every token maps to
//! exactly one timed LED step, then packs each step into its two-byte wire
//! form:
//!
//! ```
//! let encoded = tkpattern_codec::encode(".-").unwrap();
//! assert_eq!(encoded.step_count(), 3);
//! assert_eq!(encoded.as_bytes(), &[7, 1, 0, 1, 7, 3]);
//! ```

pub mod error;
pub mod pattern;
pub mod step;
pub mod symbol;

pub use error::{EncodingError, Result};
pub use pattern::{decode, encode, EncodedPattern, PatternSummary, MAX_STEPS};
pub use step::{PackedStep, PaddedStep, PatternStep, COLOR_OFF, COLOR_ON, PACKED_STEP_SIZE};
pub use symbol::{normalize, Symbol};
