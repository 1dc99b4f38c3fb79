//! Synchronous protocol client for one checker process.
//!
//! There is no background reader thread. Whichever call currently needs input pumps the
//! transport itself: a blocking [`ProtocolClient::send_request`] reads frames until its response
//! arrives, and [`ProtocolClient::drain_available`] opportunistically reads whatever is already
//! buffered. Notifications seen along the way are routed into the diagnostics cache and the
//! file-progress table; checker-to-client requests are answered with `null` immediately.
//!
//! Waits are cooperative: every iteration re-checks wall-clock time against the caller's
//! timeout, and readiness is polled in slices of at most [`ClientOptions::poll_interval`].
//! A timed-out wait leaves unread frames buffered, so a later call may still observe a late
//! response (which is then skipped because its id no longer matches).

use crate::diagnostics_store::DiagnosticsStore;
use crate::error::{ClientError, ProtocolError};
use crate::process::{ProcessHandle, ServerCommand, ShutdownTimings, escalate_shutdown};
use crate::protocol::{
    ClientNotification, DocumentSymbol, FileProgress, InitializeResult, Inbound, PlainGoal,
    REGISTER_CAPABILITY, Request, Response, ServerInfo, ServerNotification, json_rpc_response,
};
use crate::transport::{FrameReader, FrameWriter, PollRead};
use crate::uri::file_uri;
use proof_check::{DiagnosticsSnapshot, Position};
use serde_json::Value;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Environment variable overriding the `lake` binary.
pub const LAKE_ENV: &str = "PROOF_CHECK_LAKE";
/// Environment variable overriding the `lean` binary.
pub const LEAN_ENV: &str = "PROOF_CHECK_LEAN";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Lifecycle of a [`ProtocolClient`].
pub enum ClientState {
    /// Streams connected, no handshake yet.
    Unstarted,
    /// `initialize` sent, waiting for its response.
    Handshaking,
    /// Handshake complete; requests and notifications are accepted.
    Ready,
    /// `shutdown` in progress.
    ShuttingDown,
    /// The checker is gone; the client only answers accessors.
    Terminated,
}

#[derive(Debug, Clone)]
/// Client configuration.
pub struct ClientOptions {
    /// Explicit checker command. When `None`, one is chosen from the workspace manifest.
    pub server: Option<ServerCommand>,
    /// `lake` binary used for `lake serve`.
    pub lake_binary: PathBuf,
    /// `lean` binary used for `lean --server`.
    pub lean_binary: PathBuf,
    /// `languageId` sent with `textDocument/didOpen`.
    pub language_id: String,
    /// Bound on the `initialize` round trip.
    pub initialize_timeout: Duration,
    /// Bound on the `shutdown` round trip.
    pub shutdown_timeout: Duration,
    /// Time allowed for the process to exit on its own after `exit`.
    pub exit_grace: Duration,
    /// Time allowed after `SIGTERM` before `SIGKILL`.
    pub terminate_grace: Duration,
    /// Longest single readiness wait inside cooperative loops.
    pub poll_interval: Duration,
    /// Time allowed to finish a frame once its first byte has arrived, outside of a request.
    pub frame_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            server: None,
            lake_binary: PathBuf::from("lake"),
            lean_binary: PathBuf::from("lean"),
            language_id: "lean4".to_string(),
            initialize_timeout: Duration::from_secs(60),
            shutdown_timeout: Duration::from_secs(60),
            exit_grace: Duration::from_secs(2),
            terminate_grace: Duration::from_millis(500),
            poll_interval: Duration::from_millis(100),
            frame_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientOptions {
    /// Apply `PROOF_CHECK_LAKE` / `PROOF_CHECK_LEAN` if set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(lake) = env::var_os(LAKE_ENV) {
            self.lake_binary = PathBuf::from(lake);
        }
        if let Some(lean) = env::var_os(LEAN_ENV) {
            self.lean_binary = PathBuf::from(lean);
        }
        self
    }

    /// The command that [`ProtocolClient::start`] would run for `workspace`.
    pub fn server_command(&self, workspace: &Path) -> ServerCommand {
        self.server.clone().unwrap_or_else(|| {
            ServerCommand::for_workspace(workspace, &self.lake_binary, &self.lean_binary)
        })
    }

    fn shutdown_timings(&self) -> ShutdownTimings {
        ShutdownTimings {
            exit_grace: self.exit_grace,
            terminate_grace: self.terminate_grace,
            poll_interval: self.poll_interval,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A document the client has opened on the checker.
pub struct ManagedDocument {
    /// Document URI.
    pub uri: String,
    /// Last version sent; starts at 1 and grows by exactly 1 per change.
    pub version: i32,
    /// Full text as of `version`.
    pub text: String,
}

/// A connection to one checker process.
pub struct ProtocolClient {
    options: ClientOptions,
    state: ClientState,
    process: Option<ProcessHandle>,
    reader: FrameReader,
    writer: FrameWriter,
    next_id: u64,
    documents: HashMap<String, ManagedDocument>,
    diagnostics: DiagnosticsStore,
    progress: HashMap<String, FileProgress>,
    server_info: Option<ServerInfo>,
    registered: bool,
    poisoned: bool,
}

impl ProtocolClient {
    /// Spawn a checker for `workspace` and complete the handshake.
    ///
    /// The checker runs with `workspace` as its working directory, the inherited environment,
    /// and its own process group.
    pub fn start(workspace: &Path, options: ClientOptions) -> Result<Self, ClientError> {
        let workspace = fs::canonicalize(workspace)
            .map_err(|err| ClientError::Startup(format!("{}: {err}", workspace.display())))?;
        let root_uri = file_uri(&workspace)?;
        let command = options.server_command(&workspace);

        let spawned = ProcessHandle::spawn(&command, &workspace).map_err(|err| {
            ClientError::Startup(format!("cannot run `{}`: {err}", command.program.display()))
        })?;

        let mut client = Self::from_streams(spawned.stdout, spawned.stdin, options);
        client.process = Some(spawned.process);

        match client.initialize(&root_uri) {
            Ok(_) => Ok(client),
            Err(err) => {
                client.shutdown();
                Err(ClientError::Startup(format!("handshake failed: {err}")))
            }
        }
    }

    /// Wrap an already-connected stream pair. Call [`ProtocolClient::initialize`] next.
    pub fn from_streams(
        reader: impl PollRead + Send + 'static,
        writer: impl Write + Send + 'static,
        options: ClientOptions,
    ) -> Self {
        Self {
            options,
            state: ClientState::Unstarted,
            process: None,
            reader: FrameReader::new(reader),
            writer: FrameWriter::new(writer),
            next_id: 1,
            documents: HashMap::new(),
            diagnostics: DiagnosticsStore::new(),
            progress: HashMap::new(),
            server_info: None,
            registered: false,
            poisoned: false,
        }
    }

    /// Send `initialize`, wait for its response, then send `initialized`.
    pub fn initialize(&mut self, root_uri: &str) -> Result<InitializeResult, ClientError> {
        self.require_state(ClientState::Unstarted, "initialize")?;
        self.state = ClientState::Handshaking;

        let request = Request::Initialize {
            root_uri: root_uri.to_string(),
        };
        let result = match self.exchange(&request, self.options.initialize_timeout)? {
            Response::Initialized(result) => result,
            other => return Err(self.unexpected(&request, &other)),
        };

        self.notify(&ClientNotification::Initialized)?;
        self.server_info = result.server_info.clone();
        self.state = ClientState::Ready;
        log::info!(
            "checker ready: {}",
            result
                .server_info
                .as_ref()
                .map(|info| info.name.as_str())
                .unwrap_or("unknown server")
        );
        Ok(result)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ClientState {
        self.state
    }

    /// The options this client was created with.
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Server name/version from the handshake, if reported.
    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    /// OS process id of the spawned checker, if this client owns one.
    pub fn process_id(&self) -> Option<u32> {
        self.process.as_ref().map(ProcessHandle::id)
    }

    /// Returns `true` if `uri` has been opened.
    pub fn is_open(&self, uri: &str) -> bool {
        self.documents.contains_key(uri)
    }

    /// The last version sent for `uri`.
    pub fn file_version(&self, uri: &str) -> Option<i32> {
        self.documents.get(uri).map(|doc| doc.version)
    }

    /// The full text last sent for `uri`.
    pub fn document_text(&self, uri: &str) -> Option<&str> {
        self.documents.get(uri).map(|doc| doc.text.as_str())
    }

    /// The managed document for `uri`.
    pub fn document(&self, uri: &str) -> Option<&ManagedDocument> {
        self.documents.get(uri)
    }

    /// Open `uri` at version 1 with `text`.
    pub fn open_file(&mut self, uri: &str, text: &str) -> Result<(), ClientError> {
        self.require_ready("open a document")?;
        if self.documents.contains_key(uri) {
            return Err(ClientError::AlreadyOpen(uri.to_string()));
        }

        let document = ManagedDocument {
            uri: uri.to_string(),
            version: 1,
            text: text.to_string(),
        };
        let note = ClientNotification::DidOpen {
            uri: document.uri.clone(),
            language_id: self.options.language_id.clone(),
            version: document.version,
            text: document.text.clone(),
        };
        self.documents.insert(uri.to_string(), document);
        self.notify(&note)
    }

    /// Replace the whole text of `uri`, returning the new version.
    pub fn change_file(&mut self, uri: &str, text: &str) -> Result<i32, ClientError> {
        self.require_ready("change a document")?;
        let document = self
            .documents
            .get_mut(uri)
            .ok_or_else(|| ClientError::NotOpen(uri.to_string()))?;

        document.version += 1;
        document.text = text.to_string();
        let note = ClientNotification::DidChange {
            uri: document.uri.clone(),
            version: document.version,
            text: document.text.clone(),
        };
        let version = document.version;

        self.notify(&note)?;
        Ok(version)
    }

    /// Send `request` and block until its response arrives or `timeout` elapses.
    ///
    /// Notifications and checker requests that arrive first are handled in order.
    pub fn send_request(
        &mut self,
        request: &Request,
        timeout: Duration,
    ) -> Result<Response, ClientError> {
        self.require_ready("send a request")?;
        self.exchange(request, timeout)
    }

    /// Fire-and-forget notification.
    pub fn send_notification(&mut self, note: &ClientNotification) -> Result<(), ClientError> {
        self.require_ready("send a notification")?;
        self.notify(note)
    }

    /// Route every frame that is already readable, without blocking.
    ///
    /// Stops early after one diagnostics publication so callers can inspect it. Returns the
    /// number of frames handled.
    pub fn drain_available(&mut self) -> Result<usize, ClientError> {
        self.ensure_usable()?;
        let mut handled = 0;
        while self.poll(Duration::ZERO)? {
            handled += 1;
            let deadline = Instant::now() + self.options.frame_timeout;
            match self.next_inbound(deadline)? {
                Inbound::Notification(note) => {
                    let is_diagnostics = matches!(note, ServerNotification::PublishDiagnostics(_));
                    self.handle_notification(note);
                    if is_diagnostics {
                        break;
                    }
                }
                Inbound::ServerRequest { id, method } => self.answer_server_request(id, &method)?,
                Inbound::Response(raw) => log::debug!("discarding late response {:?}", raw.id),
            }
        }
        Ok(handled)
    }

    /// Drain pending frames, then return the cached snapshot for `uri`.
    ///
    /// Once the client is terminated there is nothing left to drain and the cache is returned
    /// as it stood at shutdown.
    pub fn diagnostics(&mut self, uri: &str) -> Result<Option<&DiagnosticsSnapshot>, ClientError> {
        if self.state != ClientState::Terminated {
            self.drain_available()?;
        }
        Ok(self.diagnostics.get(uri))
    }

    /// The cached snapshot for `uri` without reading from the checker.
    pub fn cached_diagnostics(&self, uri: &str) -> Option<&DiagnosticsSnapshot> {
        self.diagnostics.get(uri)
    }

    /// Wait until the cached snapshot for `uri` matches its latest submitted version.
    pub fn wait_for_current_diagnostics(
        &mut self,
        uri: &str,
        timeout: Duration,
    ) -> Result<DiagnosticsSnapshot, ClientError> {
        let version = self
            .file_version(uri)
            .ok_or_else(|| ClientError::NotOpen(uri.to_string()))?;
        let started = Instant::now();

        loop {
            self.drain_available()?;
            if let Some(snapshot) = self.diagnostics.current(uri, version) {
                return Ok(snapshot.clone());
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Err(ClientError::Timeout {
                    waiting_for: format!("diagnostics for {uri} at version {version}"),
                    elapsed,
                });
            }
            self.poll((timeout - elapsed).min(self.options.poll_interval))?;
        }
    }

    /// Wait until the checker has sent `client/registerCapability`.
    pub fn wait_for_register(&mut self, timeout: Duration) -> Result<(), ClientError> {
        let started = Instant::now();
        loop {
            self.drain_available()?;
            if self.registered {
                return Ok(());
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Err(ClientError::Timeout {
                    waiting_for: REGISTER_CAPABILITY.to_string(),
                    elapsed,
                });
            }
            self.poll((timeout - elapsed).min(self.options.poll_interval))?;
        }
    }

    /// The latest `$/lean/fileProgress` report for `uri`.
    pub fn file_progress(&self, uri: &str) -> Option<&FileProgress> {
        self.progress.get(uri)
    }

    /// `textDocument/documentSymbol`
    pub fn document_symbols(
        &mut self,
        uri: &str,
        timeout: Duration,
    ) -> Result<Vec<DocumentSymbol>, ClientError> {
        let request = Request::DocumentSymbols {
            uri: uri.to_string(),
        };
        match self.send_request(&request, timeout)? {
            Response::DocumentSymbols(symbols) => Ok(symbols),
            other => Err(self.unexpected(&request, &other)),
        }
    }

    /// `$/lean/plainGoal`; `None` when there is no goal at `position`.
    pub fn plain_goal(
        &mut self,
        uri: &str,
        position: Position,
        timeout: Duration,
    ) -> Result<Option<PlainGoal>, ClientError> {
        let request = Request::PlainGoal {
            uri: uri.to_string(),
            position,
        };
        match self.send_request(&request, timeout)? {
            Response::PlainGoal(goal) => Ok(goal),
            other => Err(self.unexpected(&request, &other)),
        }
    }

    /// Stop the checker. Idempotent and never fails.
    ///
    /// Sends `shutdown` (bounded by [`ClientOptions::shutdown_timeout`]) and `exit` when the
    /// connection is still healthy, closes the write side, then escalates from waiting to
    /// `SIGTERM` to `SIGKILL` until the process is reaped.
    pub fn shutdown(&mut self) {
        if matches!(
            self.state,
            ClientState::ShuttingDown | ClientState::Terminated
        ) {
            return;
        }
        let handshaken = matches!(self.state, ClientState::Handshaking | ClientState::Ready);
        self.state = ClientState::ShuttingDown;

        if handshaken && !self.poisoned {
            if let Err(err) = self.exchange(&Request::Shutdown, self.options.shutdown_timeout) {
                log::debug!("shutdown request failed: {err}");
            }
            if let Err(err) = self.notify(&ClientNotification::Exit) {
                log::debug!("exit notification failed: {err}");
            }
        }
        self.writer.close();

        if let Some(mut process) = self.process.take() {
            let pid = process.id();
            match escalate_shutdown(&mut process, self.options.shutdown_timings()) {
                Ok(outcome) => log::debug!("checker {pid} stopped: {outcome:?}"),
                Err(err) => log::warn!("checker {pid} shutdown error: {err}"),
            }
        }
        self.state = ClientState::Terminated;
    }

    fn exchange(&mut self, request: &Request, timeout: Duration) -> Result<Response, ClientError> {
        self.ensure_usable()?;
        let id = self.next_id;
        self.next_id += 1;

        log::debug!("request {id}: {}", request.method());
        self.send_frame(&request.to_message(id))?;

        let started = Instant::now();
        loop {
            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Err(ClientError::Timeout {
                    waiting_for: format!("`{}` response (id {id})", request.method()),
                    elapsed,
                });
            }
            if !self.poll((timeout - elapsed).min(self.options.poll_interval))? {
                continue;
            }

            match self.next_inbound(started + timeout)? {
                Inbound::Response(raw) if raw.id == Some(id) => {
                    if let Some(error) = raw.error {
                        return Err(ClientError::ServerError {
                            method: request.method(),
                            code: error.code,
                            message: error.message,
                        });
                    }
                    return request
                        .parse_response(raw.result)
                        .map_err(|err| self.fatal(err.into()));
                }
                Inbound::Response(raw) => log::debug!("skipping response {:?}", raw.id),
                Inbound::Notification(note) => self.handle_notification(note),
                Inbound::ServerRequest {
                    id: request_id,
                    method,
                } => self.answer_server_request(request_id, &method)?,
            }
        }
    }

    fn handle_notification(&mut self, note: ServerNotification) {
        match note {
            ServerNotification::PublishDiagnostics(snapshot) => {
                log::debug!(
                    "diagnostics for {} v{}: {} item(s)",
                    snapshot.uri,
                    snapshot.version,
                    snapshot.diagnostics.len()
                );
                self.diagnostics.update(snapshot);
            }
            ServerNotification::FileProgress(progress) => {
                self.progress.insert(progress.uri.clone(), progress);
            }
            ServerNotification::Other { method } => log::trace!("ignoring `{method}`"),
        }
    }

    fn answer_server_request(&mut self, id: Value, method: &str) -> Result<(), ClientError> {
        log::debug!("answering checker request `{method}` with null");
        if method == REGISTER_CAPABILITY {
            self.registered = true;
        }
        self.send_frame(&json_rpc_response(id, Value::Null))
    }

    fn notify(&mut self, note: &ClientNotification) -> Result<(), ClientError> {
        self.ensure_usable()?;
        log::debug!("notification: {}", note.method());
        self.send_frame(&note.to_message())
    }

    fn send_frame(&mut self, message: &Value) -> Result<(), ClientError> {
        self.writer
            .send(message)
            .map_err(|err| self.fatal(err.into()))
    }

    fn poll(&mut self, timeout: Duration) -> Result<bool, ClientError> {
        self.reader
            .poll_ready(timeout)
            .map_err(|err| self.fatal(err.into()))
    }

    fn next_inbound(&mut self, deadline: Instant) -> Result<Inbound, ClientError> {
        let message = match self.reader.read_until(deadline) {
            Ok(Some(message)) => message,
            Ok(None) => return Err(self.fatal(ClientError::Disconnected)),
            Err(err) => return Err(self.fatal(err.into())),
        };
        Inbound::classify(message).map_err(|err| self.fatal(err.into()))
    }

    fn fatal(&mut self, err: ClientError) -> ClientError {
        log::warn!("checker connection failed: {err}");
        self.poisoned = true;
        err
    }

    fn unexpected(&mut self, request: &Request, response: &Response) -> ClientError {
        self.fatal(
            ProtocolError::MalformedResponse {
                method: request.method(),
                reason: format!("unexpected response {response:?}"),
            }
            .into(),
        )
    }

    fn ensure_usable(&self) -> Result<(), ClientError> {
        if self.poisoned {
            Err(ClientError::Unusable)
        } else {
            Ok(())
        }
    }

    fn require_state(
        &self,
        expected: ClientState,
        operation: &'static str,
    ) -> Result<(), ClientError> {
        self.ensure_usable()?;
        if self.state == expected {
            Ok(())
        } else {
            Err(ClientError::InvalidState {
                state: self.state,
                operation,
            })
        }
    }

    fn require_ready(&self, operation: &'static str) -> Result<(), ClientError> {
        self.require_state(ClientState::Ready, operation)
    }
}

impl Drop for ProtocolClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}
