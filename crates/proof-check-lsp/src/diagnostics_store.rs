//! Per-document diagnostics bookkeeping.

use proof_check::DiagnosticsSnapshot;
use std::collections::HashMap;

/// Latest diagnostics snapshot per document URI.
///
/// A newer publication for a URI replaces the older one wholesale, regardless of version.
#[derive(Debug, Default, Clone)]
pub struct DiagnosticsStore {
    by_uri: HashMap<String, DiagnosticsSnapshot>,
}

impl DiagnosticsStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a snapshot, replacing whatever was stored for its URI.
    pub fn update(&mut self, snapshot: DiagnosticsSnapshot) {
        self.by_uri.insert(snapshot.uri.clone(), snapshot);
    }

    /// The latest snapshot for `uri`, whatever its version.
    pub fn get(&self, uri: &str) -> Option<&DiagnosticsSnapshot> {
        self.by_uri.get(uri)
    }

    /// The stored snapshot for `uri`, only if it was computed for `version`.
    pub fn current(&self, uri: &str, version: i32) -> Option<&DiagnosticsSnapshot> {
        self.get(uri).filter(|s| s.is_for_version(version))
    }

    /// Forget `uri`.
    pub fn remove(&mut self, uri: &str) -> Option<DiagnosticsSnapshot> {
        self.by_uri.remove(uri)
    }
}
