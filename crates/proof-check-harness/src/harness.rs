//! Per-theorem proof checking session.
//!
//! A [`ProofHarness`] owns one checker connection and one document: the target file cut off
//! after the theorem's signature (the static prefix) followed by a candidate proof. Every
//! [`ProofHarness::check_proof`] call replaces the candidate, waits for the diagnostics of the
//! new document version and classifies them into a [`Verdict`].

use crate::instruments::{CommandError, InstrumentsCommand, TheoremLocator};
use crate::limiter::StartupLimiter;
use proof_check::{
    Diagnostic, DiagnosticsSnapshot, TheoremInfo, lines_before, range_text, text_through,
};
use proof_check_lsp::{ClientError, ClientOptions, ProtocolClient, Request, file_uri};
use regex::{Regex, RegexSet};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Body appended to the static prefix to form the initial document.
pub const PLACEHOLDER_BODY: &str = " := by sorry\n";

#[derive(Debug, Error)]
/// Harness setup and checking failures.
pub enum HarnessError {
    #[error("workspace does not exist: {}", .0.display())]
    /// The workspace directory is missing.
    MissingWorkspace(PathBuf),

    #[error("file does not exist: {}", .0.display())]
    /// The target file is missing.
    MissingFile(PathBuf),

    #[error("workspace {} does not support theorem lookup: {source}", workspace.display())]
    /// The lookup tool's heartbeat failed.
    UnsupportedWorkspace {
        /// Workspace root.
        workspace: PathBuf,
        /// Heartbeat failure.
        source: CommandError,
    },

    #[error("theorem lookup failed: {0}")]
    /// The lookup tool failed for the target file.
    Lookup(#[source] CommandError),

    #[error("expected exactly one theorem named `{name}`, found {found}")]
    /// Zero or several declarations carry the requested name.
    AmbiguousOrMissingTheorem {
        /// Requested fully-qualified name.
        name: String,
        /// Number of matches.
        found: usize,
    },

    #[error("harness is closed")]
    /// The harness was closed.
    Closed,

    #[error(transparent)]
    /// Checker communication failed.
    Client(#[from] ClientError),

    #[error("I/O error: {0}")]
    /// Reading the target file failed.
    Io(#[from] io::Error),
}

impl HarnessError {
    /// Returns `true` for the recoverable timeout kind.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Client(err) if err.is_timeout())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Lifecycle of a [`ProofHarness`].
pub enum HarnessState {
    /// Looking up the theorem and starting the checker.
    ///
    /// This phase runs inside [`ProofHarness::start`] and [`ProofHarness::from_parts`] before the
    /// harness value exists, so it is never observed through [`ProofHarness::state`]: a harness
    /// is returned `Ready`, or initialization fails with an error and no harness.
    Initializing,
    /// Idle, accepting proofs.
    Ready,
    /// A proof is being checked.
    Checking,
    /// The checker has been shut down.
    Closed,
}

#[derive(Debug, Clone)]
/// Harness configuration.
pub struct HarnessOptions {
    /// Bound on the initial diagnostics wait.
    pub initial_timeout: Duration,
    /// Default bound for [`ProofHarness::check_proof`].
    pub check_timeout: Duration,
    /// Retry interval while the cached snapshot lags the submitted version.
    pub diagnostics_poll_interval: Duration,
    /// Options for the checker connection.
    pub client: ClientOptions,
    /// Admission control for concurrent initialization.
    pub limiter: Arc<StartupLimiter>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            initial_timeout: Duration::from_secs(120),
            check_timeout: Duration::from_secs(10),
            diagnostics_poll_interval: Duration::from_millis(100),
            client: ClientOptions::default(),
            limiter: StartupLimiter::global(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// The shortest candidate prefix that already contains an error.
pub struct InvalidPrefix {
    /// The full candidate the prefix was cut from.
    pub attempted_proof: String,
    /// A literal prefix of `attempted_proof`, ending where the error ends.
    pub prefix: String,
    /// The diagnostic the prefix was derived from.
    pub source_error: Diagnostic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
/// Outcome of one proof check.
pub enum Verdict {
    /// No errors and no placeholder warning at or after the theorem.
    Succeeded,
    /// Errors, or an incomplete proof.
    Failed {
        /// Set only when an error could be pinned to a prefix of the candidate.
        learned_prefix: Option<InvalidPrefix>,
        /// Every diagnostic at or after the theorem start.
        diagnostics: Vec<Diagnostic>,
    },
}

impl Verdict {
    /// Returns `true` for [`Verdict::Succeeded`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// The learned prefix of a failure, if any.
    pub fn learned_prefix(&self) -> Option<&InvalidPrefix> {
        match self {
            Self::Succeeded => None,
            Self::Failed { learned_prefix, .. } => learned_prefix.as_ref(),
        }
    }
}

/// A checking session for one theorem.
pub struct ProofHarness {
    options: HarnessOptions,
    state: HarnessState,
    theorem: TheoremInfo,
    file_uri: String,
    file_prefix: String,
    initial_text: String,
    client: ProtocolClient,
}

impl ProofHarness {
    /// Locate `theorem_name` in `workspace/rel_file`, start a checker and open the document.
    ///
    /// Runs the lookup tool (`lake exe llm-instruments`) and the checker while holding a
    /// permit from [`HarnessOptions::limiter`].
    pub fn start(
        workspace: &Path,
        rel_file: &Path,
        theorem_name: &str,
        options: HarnessOptions,
    ) -> Result<Self, HarnessError> {
        if !workspace.is_dir() {
            return Err(HarnessError::MissingWorkspace(workspace.to_path_buf()));
        }
        let workspace = fs::canonicalize(workspace)?;
        let locator = InstrumentsCommand::with_lake(&workspace, &options.client.lake_binary);
        Self::start_with_locator(&workspace, rel_file, theorem_name, &locator, options)
    }

    /// [`ProofHarness::start`] with a custom theorem locator.
    pub fn start_with_locator(
        workspace: &Path,
        rel_file: &Path,
        theorem_name: &str,
        locator: &dyn TheoremLocator,
        options: HarnessOptions,
    ) -> Result<Self, HarnessError> {
        let file = workspace.join(rel_file);
        if !file.is_file() {
            return Err(HarnessError::MissingFile(file));
        }

        let limiter = Arc::clone(&options.limiter);
        let _permit = limiter.acquire();

        log::info!("checking that {} supports theorem lookup", workspace.display());
        locator
            .heartbeat()
            .map_err(|source| HarnessError::UnsupportedWorkspace {
                workspace: workspace.to_path_buf(),
                source,
            })?;

        log::info!("looking up `{theorem_name}` in {}", rel_file.display());
        let infos = locator
            .theorem_infos(rel_file)
            .map_err(HarnessError::Lookup)?;
        let theorem = select_theorem(infos, theorem_name)?;

        let source = fs::read_to_string(&file)?;
        let uri = file_uri(&file)?;
        let client = ProtocolClient::start(workspace, options.client.clone())?;
        Self::from_parts(theorem, uri, &source, client, options)
    }

    /// Open the initial document on a ready `client` and wait for its first diagnostics.
    ///
    /// `source` is the original file text the theorem's ranges refer to.
    pub fn from_parts(
        theorem: TheoremInfo,
        file_uri: String,
        source: &str,
        mut client: ProtocolClient,
        options: HarnessOptions,
    ) -> Result<Self, HarnessError> {
        let file_prefix = text_through(source, theorem.static_prefix_range().end).to_string();
        let initial_text = format!("{file_prefix}{PLACEHOLDER_BODY}");

        client.open_file(&file_uri, &initial_text)?;
        let request = Request::WaitForDiagnostics {
            uri: file_uri.clone(),
            version: 1,
        };
        client.send_request(&request, options.initial_timeout)?;
        log::info!("harness ready for `{}`", theorem.name);

        Ok(Self {
            options,
            state: HarnessState::Ready,
            theorem,
            file_uri,
            file_prefix,
            initial_text,
            client,
        })
    }

    /// Check `candidate` within [`HarnessOptions::check_timeout`].
    pub fn check_proof(&mut self, candidate: &str) -> Result<Verdict, HarnessError> {
        self.check_proof_within(candidate, self.options.check_timeout)
    }

    /// Check `candidate` (everything after the signature) within `timeout`.
    pub fn check_proof_within(
        &mut self,
        candidate: &str,
        timeout: Duration,
    ) -> Result<Verdict, HarnessError> {
        if self.state != HarnessState::Ready {
            return Err(HarnessError::Closed);
        }
        self.state = HarnessState::Checking;
        let verdict = self.run_check(candidate, timeout);
        self.state = HarnessState::Ready;
        verdict
    }

    fn run_check(&mut self, candidate: &str, timeout: Duration) -> Result<Verdict, HarnessError> {
        let started = Instant::now();
        let full_text = format!("{}{candidate}", self.file_prefix);
        log::debug!("checking candidate for `{}`:\n{candidate}", self.theorem.name);

        let version = self.client.change_file(&self.file_uri, &full_text)?;
        let request = Request::WaitForDiagnostics {
            uri: self.file_uri.clone(),
            version,
        };
        self.client.send_request(&request, timeout)?;

        let snapshot = self.await_snapshot(version, started, timeout)?;
        let selected = self.select(snapshot.diagnostics);
        Ok(classify(&self.file_prefix, &full_text, candidate, selected))
    }

    /// Re-read the cache until it holds `version`; the response can overtake the notification.
    fn await_snapshot(
        &mut self,
        version: i32,
        started: Instant,
        timeout: Duration,
    ) -> Result<DiagnosticsSnapshot, HarnessError> {
        loop {
            if let Some(snapshot) = self.client.diagnostics(&self.file_uri)?
                && snapshot.is_for_version(version)
            {
                return Ok(snapshot.clone());
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Err(ClientError::Timeout {
                    waiting_for: format!("diagnostics for version {version}"),
                    elapsed,
                }
                .into());
            }
            thread::sleep(self.options.diagnostics_poll_interval.min(timeout - elapsed));
        }
    }

    fn select(&self, diagnostics: Vec<Diagnostic>) -> Vec<Diagnostic> {
        let start = self.theorem.start();
        diagnostics
            .into_iter()
            .filter(|d| start <= d.range.end)
            .collect()
    }

    /// Current error diagnostics at or after the theorem start.
    pub fn error_diagnostics(&mut self) -> Result<Vec<Diagnostic>, HarnessError> {
        let diagnostics = self
            .client
            .diagnostics(&self.file_uri)?
            .map(|snapshot| snapshot.diagnostics.clone())
            .unwrap_or_default();
        Ok(self
            .select(diagnostics)
            .into_iter()
            .filter(Diagnostic::is_error)
            .collect())
    }

    /// Lifecycle state.
    pub fn state(&self) -> HarnessState {
        self.state
    }

    /// The target theorem.
    pub fn theorem(&self) -> &TheoremInfo {
        &self.theorem
    }

    /// URI of the managed document.
    pub fn file_uri(&self) -> &str {
        &self.file_uri
    }

    /// File text from the start through the end of the theorem's signature.
    pub fn file_prefix(&self) -> &str {
        &self.file_prefix
    }

    /// The document first opened: the static prefix plus [`PLACEHOLDER_BODY`].
    pub fn initial_text(&self) -> &str {
        &self.initial_text
    }

    /// Every line before the theorem's declaration.
    pub fn theorem_context(&self) -> String {
        lines_before(&self.initial_text, self.theorem.start().line)
    }

    /// From the declaration keyword through the end of the signature.
    pub fn full_theorem_signature(&self) -> &str {
        range_text(&self.initial_text, self.theorem.full_signature_range())
    }

    /// Binders and statement only.
    pub fn type_signature(&self) -> &str {
        range_text(&self.initial_text, self.theorem.sig_range)
    }

    /// The underlying checker connection.
    pub fn client(&mut self) -> &mut ProtocolClient {
        &mut self.client
    }

    /// Shut the checker down. Later checks fail with [`HarnessError::Closed`].
    pub fn shutdown(&mut self) {
        self.client.shutdown();
        self.state = HarnessState::Closed;
    }

    /// Shut the checker down and drop the harness.
    pub fn close(mut self) {
        self.shutdown();
    }
}

fn select_theorem(infos: Vec<TheoremInfo>, name: &str) -> Result<TheoremInfo, HarnessError> {
    let mut matching: Vec<TheoremInfo> = infos.into_iter().filter(|ti| ti.name == name).collect();
    if matching.len() != 1 {
        return Err(HarnessError::AmbiguousOrMissingTheorem {
            name: name.to_string(),
            found: matching.len(),
        });
    }
    Ok(matching.remove(0))
}

/// Classify the diagnostics `selected` for `full_text = static_prefix + candidate`.
pub fn classify(
    static_prefix: &str,
    full_text: &str,
    candidate: &str,
    selected: Vec<Diagnostic>,
) -> Verdict {
    let errors: Vec<&Diagnostic> = selected.iter().filter(|d| d.is_error()).collect();
    if !errors.is_empty() {
        let learned_prefix = learn_prefix(static_prefix, full_text, candidate, errors);
        return Verdict::Failed {
            learned_prefix,
            diagnostics: selected,
        };
    }

    if selected
        .iter()
        .any(|d| d.is_warning() && is_placeholder_warning(&d.message))
    {
        return Verdict::Failed {
            learned_prefix: None,
            diagnostics: selected,
        };
    }

    Verdict::Succeeded
}

/// The shortest invalid prefix of `candidate` implied by `errors`.
///
/// Each error that does not merely signal incompleteness yields the candidate text up to the
/// error's end. Errors landing inside the static prefix yield nothing.
pub fn learn_prefix<'a>(
    static_prefix: &str,
    full_text: &str,
    candidate: &str,
    errors: impl IntoIterator<Item = &'a Diagnostic>,
) -> Option<InvalidPrefix> {
    errors
        .into_iter()
        .filter_map(|error| prefix_for_error(static_prefix, full_text, candidate, error))
        .min_by_key(|invalid| invalid.prefix.len())
}

fn prefix_for_error(
    static_prefix: &str,
    full_text: &str,
    candidate: &str,
    error: &Diagnostic,
) -> Option<InvalidPrefix> {
    if incompleteness_patterns().is_match(&error.message) {
        return None;
    }

    let through_error = text_through(full_text, error.range.end);
    let Some(prefix) = through_error.strip_prefix(static_prefix) else {
        log::warn!(
            "error at {} ends inside the static prefix: {}",
            error.range,
            error.message
        );
        return None;
    };
    debug_assert!(candidate.starts_with(prefix));

    Some(InvalidPrefix {
        attempted_proof: candidate.to_string(),
        prefix: prefix.to_string(),
        source_error: error.clone(),
    })
}

/// Error messages that mean "incomplete" rather than "wrong so far".
fn incompleteness_patterns() -> &'static RegexSet {
    static PATTERNS: OnceLock<RegexSet> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        RegexSet::new([r"Alternative .*? has not been provided", r"unsolved goals"])
            .expect("incompleteness patterns are valid")
    })
}

/// Returns `true` for the warning emitted when a proof still contains `sorry`.
pub fn is_placeholder_warning(message: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"uses '?sorry'?").expect("sorry pattern is valid"))
        .is_match(message)
}
