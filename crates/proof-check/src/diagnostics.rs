//! Checker diagnostics and per-version snapshots.

use crate::position::Range;
use serde::{Deserialize, Serialize};

/// Diagnostic severity levels, as numbered by the checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    /// Severity 1.
    Error,
    /// Severity 2.
    Warning,
    /// Severity 3.
    Information,
    /// Severity 4.
    Hint,
}

impl DiagnosticSeverity {
    /// Convert the numeric severity into an enum.
    pub fn from_u64(value: u64) -> Option<Self> {
        match value {
            1 => Some(Self::Error),
            2 => Some(Self::Warning),
            3 => Some(Self::Information),
            4 => Some(Self::Hint),
            _ => None,
        }
    }

    /// The numeric severity used on the wire.
    pub fn as_u64(self) -> u64 {
        match self {
            Self::Error => 1,
            Self::Warning => 2,
            Self::Information => 3,
            Self::Hint => 4,
        }
    }
}

/// A single diagnostic reported for one document version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Producer tag (e.g. `"Lean 4"`).
    pub source: String,
    /// Severity, if the checker sent a known one.
    pub severity: Option<DiagnosticSeverity>,
    /// Range the message is attached to.
    pub range: Range,
    /// Message text.
    pub message: String,
    /// Extended range (e.g. the whole declaration). Equal to `range` when the checker omits it.
    #[serde(rename = "fullRange")]
    pub full_range: Range,
}

impl Diagnostic {
    /// Returns `true` for severity-1 diagnostics.
    pub fn is_error(&self) -> bool {
        self.severity == Some(DiagnosticSeverity::Error)
    }

    /// Returns `true` for severity-2 diagnostics.
    pub fn is_warning(&self) -> bool {
        self.severity == Some(DiagnosticSeverity::Warning)
    }
}

/// The complete diagnostics set published for one version of one document.
///
/// Snapshots replace each other wholesale; they are never merged across versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticsSnapshot {
    /// Document URI.
    pub uri: String,
    /// Document version the diagnostics were computed for.
    pub version: i32,
    /// Diagnostics in the order the checker sent them.
    pub diagnostics: Vec<Diagnostic>,
}

impl DiagnosticsSnapshot {
    /// Returns `true` if this snapshot was computed for `version`.
    pub fn is_for_version(&self, version: i32) -> bool {
        self.version == version
    }

    /// Iterate over severity-1 diagnostics.
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }
}

/// Diagnostics that overlap `range` or start immediately after it.
pub fn diagnostics_in_range<'a>(range: &Range, diagnostics: &'a [Diagnostic]) -> Vec<&'a Diagnostic> {
    diagnostics
        .iter()
        .filter(|d| range.intersect(&d.range) || range.immediately_before(&d.range))
        .collect()
}

/// Severity-1 diagnostics selected by [`diagnostics_in_range`].
pub fn errors_in_range<'a>(range: &Range, diagnostics: &'a [Diagnostic]) -> Vec<&'a Diagnostic> {
    diagnostics_in_range(range, diagnostics)
        .into_iter()
        .filter(|d| d.is_error())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diag(range: &str, severity: DiagnosticSeverity, message: &str) -> Diagnostic {
        let range: Range = range.parse().unwrap();
        Diagnostic {
            source: "test".to_string(),
            severity: Some(severity),
            range,
            message: message.to_string(),
            full_range: range,
        }
    }

    #[test]
    fn test_severity_numbers() {
        for n in 1..=4 {
            assert_eq!(DiagnosticSeverity::from_u64(n).map(|s| s.as_u64()), Some(n));
        }
        assert_eq!(DiagnosticSeverity::from_u64(0), None);
        assert_eq!(DiagnosticSeverity::from_u64(7), None);
    }

    #[test]
    fn test_in_range_filters() {
        let diags = vec![
            diag("0:0-0:4", DiagnosticSeverity::Error, "before"),
            diag("2:0-2:3", DiagnosticSeverity::Error, "inside"),
            diag("3:0-3:1", DiagnosticSeverity::Warning, "right after"),
            diag("5:0-5:1", DiagnosticSeverity::Error, "far after"),
        ];
        let theorem: Range = "1:0-2:9".parse().unwrap();

        let selected: Vec<_> = diagnostics_in_range(&theorem, &diags)
            .into_iter()
            .map(|d| d.message.as_str())
            .collect();
        assert_eq!(selected, vec!["inside", "right after"]);

        let errors: Vec<_> = errors_in_range(&theorem, &diags)
            .into_iter()
            .map(|d| d.message.as_str())
            .collect();
        assert_eq!(errors, vec!["inside"]);
    }
}
