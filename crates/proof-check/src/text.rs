//! Mapping between checker positions and raw document text.
//!
//! Checker positions count UTF-16 code units inside `\n`-separated lines. All helpers here clamp
//! positions that lie past the end of a line (or past the last line) instead of failing, so a
//! slice is always well-formed and always a prefix-consistent view of the text.

use crate::position::{Position, Range};

/// Conversions between UTF-16 columns and UTF-8 offsets inside a single line.
pub struct Utf16Columns;

impl Utf16Columns {
    /// Number of UTF-16 code units in `text`.
    pub fn len(text: &str) -> usize {
        text.encode_utf16().count()
    }

    /// Byte offset of UTF-16 column `column` in `line`, clamped to the line length.
    ///
    /// A column that falls inside a surrogate pair rounds up to the end of that character.
    pub fn byte_offset(line: &str, column: u32) -> usize {
        let column = column as usize;
        let mut units = 0;
        for (byte_idx, ch) in line.char_indices() {
            if units >= column {
                return byte_idx;
            }
            units += ch.len_utf16();
        }
        line.len()
    }
}

/// Byte offset of `pos` in `text`.
///
/// Lines past the end of the text map to `text.len()`.
pub fn byte_offset(text: &str, pos: Position) -> usize {
    let mut line_start = 0;
    for _ in 0..pos.line {
        match text[line_start..].find('\n') {
            Some(nl) => line_start += nl + 1,
            None => return text.len(),
        }
    }
    let line_end = text[line_start..]
        .find('\n')
        .map_or(text.len(), |nl| line_start + nl);
    line_start + Utf16Columns::byte_offset(&text[line_start..line_end], pos.character)
}

/// The substring of `text` covered by `range`.
pub fn range_text(text: &str, range: Range) -> &str {
    let start = byte_offset(text, range.start);
    let end = byte_offset(text, range.end).max(start);
    &text[start..end]
}

/// The substring of `text` from the document start through `end`.
pub fn text_through(text: &str, end: Position) -> &str {
    &text[..byte_offset(text, end)]
}

/// The position one past the last character of `text`.
pub fn end_position(text: &str) -> Position {
    let line = text.matches('\n').count() as u32;
    let last = text.rsplit('\n').next().unwrap_or("");
    Position::new(line, Utf16Columns::len(last) as u32)
}

/// The lines of `text` strictly before `line`, joined with `\n` (no trailing newline).
pub fn lines_before(text: &str, line: u32) -> String {
    text.lines()
        .take(line as usize)
        .collect::<Vec<_>>()
        .join("\n")
}

/// The leading `/-- ... -/` docstring of `text`, with the whitespace around it.
///
/// Nested `/- ... -/` comments inside the docstring are balanced. Returns `None` when `text`
/// does not open with a docstring after leading whitespace, or the docstring never closes.
pub fn parse_lean_docstring(text: &str) -> Option<&str> {
    let rest = text.trim_start().strip_prefix("/--")?;
    let body_start = text.len() - rest.len();
    let mut depth = 0usize;
    for (i, pair) in rest.as_bytes().windows(2).enumerate() {
        match pair {
            b"/-" => depth += 1,
            b"-/" if depth == 0 => {
                let close = body_start + i + 2;
                let after = &text[close..];
                let trailing = after.len() - after.trim_start().len();
                return Some(&text[..close + trailing]);
            }
            b"-/" => depth -= 1,
            _ => {}
        }
    }
    None
}
