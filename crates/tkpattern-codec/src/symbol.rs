use std::fmt;

use crate::error::{EncodingError, Result};
use crate::step::{PatternStep, COLOR_OFF, COLOR_ON};

/// One token of a normalized pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    /// `.`: short flash.
    Dot,
    /// `-`: long flash.
    Dash,
    /// `/`: gap between letters.
    LetterGap,
    /// ` `: gap between words.
    WordGap,
    /// Gap between two flashes of the same letter. Never written by users;
    /// inserted by [`normalize`] and rendered as `|`.
    Separator,
}

impl Symbol {
    /// Parse a user-written character. The separator is not accepted here.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '.' => Some(Self::Dot),
            '-' => Some(Self::Dash),
            '/' => Some(Self::LetterGap),
            ' ' => Some(Self::WordGap),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Self::Dot => '.',
            Self::Dash => '-',
            Self::LetterGap => '/',
            Self::WordGap => ' ',
            Self::Separator => '|',
        }
    }

    /// Timing and color of the step this symbol plays as.
    pub fn step(self) -> PatternStep {
        match self {
            Self::Dot => PatternStep::new(1, COLOR_ON),
            Self::Dash => PatternStep::new(3, COLOR_ON),
            Self::LetterGap => PatternStep::new(3, COLOR_OFF),
            Self::WordGap => PatternStep::new(7, COLOR_OFF),
            Self::Separator => PatternStep::new(1, COLOR_OFF),
        }
    }

    fn is_gap(self) -> bool {
        matches!(self, Self::LetterGap | Self::WordGap)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Turn a pattern into a flat token stream, one token per step.
///
/// A separator follows every dot and dash, except where a letter gap, a word
/// gap or the end of the pattern already provides the pause. The whole input
/// is rejected on the first character that is not a pattern symbol.
pub fn normalize(pattern: &str) -> Result<Vec<Symbol>> {
    let mut out = Vec::with_capacity(pattern.len() * 2);
    for (position, c) in pattern.chars().enumerate() {
        let symbol =
            Symbol::from_char(c).ok_or(EncodingError::InvalidSymbol { symbol: c, position })?;
        if symbol.is_gap() && out.last() == Some(&Symbol::Separator) {
            out.pop();
        }
        out.push(symbol);
        if matches!(symbol, Symbol::Dot | Symbol::Dash) {
            out.push(Symbol::Separator);
        }
    }
    if out.last() == Some(&Symbol::Separator) {
        out.pop();
    }
    Ok(out)
}
