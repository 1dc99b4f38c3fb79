//! Declaration locations reported by the theorem-location tool.

use crate::position::{Position, Range};
use serde::{Deserialize, Serialize};

/// Location data for one declaration in a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TheoremInfo {
    /// Fully-qualified declaration name (e.g. `Cat.bat`).
    pub name: String,
    /// The whole declaration, from its first keyword through the end of its body.
    pub range: Range,
    /// The type signature (binders and statement), without the declaration keyword and name.
    #[serde(rename = "sigRange")]
    pub sig_range: Range,
    /// The value (proof body), starting at `:=`.
    #[serde(rename = "valRange")]
    pub val_range: Range,
}

impl TheoremInfo {
    /// Where the declaration starts.
    pub fn start(&self) -> Position {
        self.range.start
    }

    /// The range from the declaration keyword through the end of the signature.
    pub fn full_signature_range(&self) -> Range {
        Range::new(self.range.start, self.sig_range.end)
    }

    /// The range from the document start through the end of the signature.
    pub fn static_prefix_range(&self) -> Range {
        Range::up_to(self.sig_range.end)
    }
}
