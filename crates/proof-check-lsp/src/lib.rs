#![warn(missing_docs)]
//! `proof-check-lsp` - client for a long-lived proof checker speaking JSON-RPC over stdio.
//!
//! Layers, bottom up:
//! - [`transport`]: `Content-Length` framing and a readiness check on the inbound stream
//! - [`protocol`]: closed sum types for every request, response and notification in use
//! - [`diagnostics_store`]: latest diagnostics snapshot per document
//! - [`process`]: spawning the checker in its own process group and escalating shutdown
//! - [`client`]: [`ProtocolClient`], which ties the above together without background threads
//!
//! Process supervision relies on POSIX process groups, so this crate targets unix.

pub mod client;
pub mod diagnostics_store;
pub mod error;
pub mod process;
pub mod protocol;
pub mod transport;
pub mod uri;

pub use client::{ClientOptions, ClientState, LAKE_ENV, LEAN_ENV, ManagedDocument, ProtocolClient};
pub use diagnostics_store::DiagnosticsStore;
pub use error::{ClientError, ProtocolError, TransportError};
pub use process::{
    ProcessControl, ProcessHandle, ServerCommand, ShutdownOutcome, ShutdownTimings, StopSignal,
    escalate_shutdown, has_build_manifest,
};
pub use protocol::{
    ClientNotification, DocumentSymbol, FileProgress, Inbound, InitializeResult, PlainGoal,
    Request, Response, ServerInfo, ServerNotification,
};
pub use transport::{FrameReader, FrameWriter, PollRead, read_message, write_message};
pub use uri::{file_uri, file_uri_to_path};
