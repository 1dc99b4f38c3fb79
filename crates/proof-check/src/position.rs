//! Zero-based document positions and ranges.
//!
//! Positions use checker (LSP) coordinates: `line` counts `\n`-separated lines and
//! `character` counts UTF-16 code units within the line. See [`crate::text`] for conversion
//! to byte offsets.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// A position in a document.
///
/// Ordering is line first, then character, so `Ord::max` returns the later position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    /// Line number (0-based).
    pub line: u32,
    /// Character offset within the line (UTF-16 code units, 0-based).
    pub character: u32,
}

impl Position {
    /// Create a new position.
    pub const fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }

    /// The first position of any document.
    pub const fn origin() -> Self {
        Self::new(0, 0)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.character)
    }
}

/// A range between two positions. `end` is exclusive and never before `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Range {
    /// Range start (inclusive).
    pub start: Position,
    /// Range end (exclusive).
    pub end: Position,
}

impl Range {
    /// Create a new range.
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// The range from the start of the document up to `end`.
    pub const fn up_to(end: Position) -> Self {
        Self::new(Position::origin(), end)
    }

    /// Returns `true` if `other` lies entirely within `self`.
    pub fn subsumes(&self, other: &Range) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Returns `true` if the two ranges overlap.
    ///
    /// Ranges that merely touch (one ends where the other starts) do not intersect.
    pub fn intersect(&self, other: &Range) -> bool {
        if self.end.line < other.start.line || self.start.line > other.end.line {
            return false;
        }
        if self.end.line == other.start.line {
            return self.end.character > other.start.character;
        }
        if self.start.line == other.end.line {
            return self.start.character < other.end.character;
        }
        true
    }

    /// Returns `true` if `self` ends exactly where `other` starts, either on the same line or at
    /// the end of a line whose successor `other` starts at column 0.
    pub fn immediately_before(&self, other: &Range) -> bool {
        if self.end.line == other.start.line {
            return self.end.character == other.start.character;
        }
        if self.end.line + 1 == other.start.line {
            return other.start.character == 0;
        }
        false
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Error returned when parsing a `line:col-line:col` range string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRangeError(String);

impl fmt::Display for ParseRangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid range string: {:?}", self.0)
    }
}

impl std::error::Error for ParseRangeError {}

fn range_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*(\d+):(\d+)-(\d+):(\d+)\s*$").expect("range pattern is valid")
    })
}

impl FromStr for Range {
    type Err = ParseRangeError;

    /// Parse `"line1:col1-line2:col2"` (all zero-based).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseRangeError(s.to_string());
        let caps = range_pattern().captures(s).ok_or_else(err)?;
        let num = |i: usize| caps[i].parse::<u32>().map_err(|_| err());

        let start = Position::new(num(1)?, num(2)?);
        let end = Position::new(num(3)?, num(4)?);
        if end < start {
            return Err(err());
        }
        Ok(Range::new(start, end))
    }
}
