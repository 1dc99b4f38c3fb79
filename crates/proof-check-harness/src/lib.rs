#![warn(missing_docs)]
//! `proof-check-harness` - turn checker diagnostics into proof verdicts.
//!
//! [`ProofHarness`] drives one [`proof_check_lsp::ProtocolClient`] for one theorem: it looks
//! the theorem up with the `llm-instruments` tool, opens the file cut off after the signature,
//! and then checks candidate proofs one document version at a time. Failed checks may carry an
//! [`InvalidPrefix`], the shortest leading part of the candidate that already contains an error.

pub mod harness;
pub mod instruments;
pub mod limiter;

pub use harness::{
    HarnessError, HarnessOptions, HarnessState, InvalidPrefix, PLACEHOLDER_BODY, ProofHarness,
    Verdict, classify, is_placeholder_warning, learn_prefix,
};
pub use instruments::{CommandError, InstrumentsCommand, TheoremLocator};
pub use limiter::{DEFAULT_STARTUP_PERMITS, StartupLimiter, StartupPermit};
