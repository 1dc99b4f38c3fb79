#![warn(missing_docs)]
//! `proof-check` - data model shared by the proof-checking client and harness.
//!
//! This crate has no I/O. It provides:
//! - [`Position`] / [`Range`] in checker coordinates, with the range predicates used to relate
//!   diagnostics to declarations
//! - [`Diagnostic`] and [`DiagnosticsSnapshot`], the per-version diagnostics model
//! - [`TheoremInfo`], the declaration layout reported by the theorem-location tool
//! - [`text`], which maps positions and ranges onto raw document text

pub mod diagnostics;
pub mod position;
pub mod text;
pub mod theorem;

pub use diagnostics::{
    Diagnostic, DiagnosticSeverity, DiagnosticsSnapshot, diagnostics_in_range, errors_in_range,
};
pub use position::{ParseRangeError, Position, Range};
pub use text::{
    Utf16Columns, byte_offset, end_position, lines_before, parse_lean_docstring, range_text,
    text_through,
};
pub use theorem::TheoremInfo;
