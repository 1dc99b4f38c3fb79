//! Typed checker protocol messages.
//!
//! Outbound traffic is a closed set of [`Request`] and [`ClientNotification`] values. Inbound
//! frames are classified once into an [`Inbound`] value (notification, server request or
//! response) and matched exhaustively by the client.

use crate::error::ProtocolError;
use proof_check::{Diagnostic, DiagnosticSeverity, DiagnosticsSnapshot, Position, Range};
use serde_json::{Map, Value, json};

/// JSON-RPC protocol version tag sent on every message.
pub const JSONRPC_VERSION: &str = "2.0";

/// Method name of diagnostics notifications.
pub const PUBLISH_DIAGNOSTICS: &str = "textDocument/publishDiagnostics";

/// Method name of checker file-progress notifications.
pub const FILE_PROGRESS: &str = "$/lean/fileProgress";

/// Method name of the checker's capability registration request.
pub const REGISTER_CAPABILITY: &str = "client/registerCapability";

/// Client-to-checker requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// `initialize`
    Initialize {
        /// `file://` URI of the workspace root.
        root_uri: String,
    },
    /// `shutdown`
    Shutdown,
    /// `textDocument/waitForDiagnostics`: answered once every diagnostic for `version` is out.
    WaitForDiagnostics {
        /// Document URI.
        uri: String,
        /// Document version to wait for.
        version: i32,
    },
    /// `textDocument/documentSymbol`
    DocumentSymbols {
        /// Document URI.
        uri: String,
    },
    /// `$/lean/plainGoal`
    PlainGoal {
        /// Document URI.
        uri: String,
        /// Position to query.
        position: Position,
    },
}

impl Request {
    /// JSON-RPC method name.
    pub fn method(&self) -> &'static str {
        match self {
            Self::Initialize { .. } => "initialize",
            Self::Shutdown => "shutdown",
            Self::WaitForDiagnostics { .. } => "textDocument/waitForDiagnostics",
            Self::DocumentSymbols { .. } => "textDocument/documentSymbol",
            Self::PlainGoal { .. } => "$/lean/plainGoal",
        }
    }

    /// JSON `params` payload.
    pub fn params(&self) -> Value {
        match self {
            Self::Initialize { root_uri } => json!({
                "rootUri": root_uri,
                "capabilities": {},
            }),
            Self::Shutdown => Value::Null,
            Self::WaitForDiagnostics { uri, version } => json!({
                "uri": uri,
                "version": version,
            }),
            Self::DocumentSymbols { uri } => json!({
                "textDocument": { "uri": uri },
            }),
            Self::PlainGoal { uri, position } => json!({
                "textDocument": { "uri": uri },
                "position": position_to_json(*position),
            }),
        }
    }

    /// The full JSON-RPC request object for `id`.
    pub fn to_message(&self, id: u64) -> Value {
        json_rpc_request(id, self.method(), self.params())
    }

    /// Interpret the `result` of a response to this request as the expected response type.
    pub fn parse_response(&self, result: Value) -> Result<Response, ProtocolError> {
        let method = self.method();
        let malformed = |reason: &str| ProtocolError::MalformedResponse {
            method,
            reason: reason.to_string(),
        };

        match self {
            Self::Initialize { .. } => {
                if !result.is_object() {
                    return Err(malformed("expected an object"));
                }
                let server_info = result.get("serverInfo").and_then(|info| {
                    Some(ServerInfo {
                        name: info.get("name")?.as_str()?.to_string(),
                        version: info
                            .get("version")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                    })
                });
                let capabilities = result.get("capabilities").cloned().unwrap_or(Value::Null);
                Ok(Response::Initialized(InitializeResult {
                    server_info,
                    capabilities,
                }))
            }
            Self::Shutdown => Ok(Response::Shutdown),
            Self::WaitForDiagnostics { .. } => Ok(Response::DiagnosticsReady),
            Self::DocumentSymbols { .. } => match result {
                Value::Null => Ok(Response::DocumentSymbols(Vec::new())),
                Value::Array(items) => items
                    .iter()
                    .map(document_symbol_from_value)
                    .collect::<Option<Vec<_>>>()
                    .map(Response::DocumentSymbols)
                    .ok_or_else(|| malformed("invalid DocumentSymbol entry")),
                _ => Err(malformed("expected an array or null")),
            },
            Self::PlainGoal { .. } => {
                if result.is_null() {
                    return Ok(Response::PlainGoal(None));
                }
                let rendered = result
                    .get("rendered")
                    .and_then(Value::as_str)
                    .ok_or_else(|| malformed("missing `rendered`"))?
                    .to_string();
                let goals = result
                    .get("goals")
                    .and_then(Value::as_array)
                    .map(|goals| {
                        goals
                            .iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                Ok(Response::PlainGoal(Some(PlainGoal { rendered, goals })))
            }
        }
    }
}

/// Typed responses, one variant per [`Request`] variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Answer to [`Request::Initialize`].
    Initialized(InitializeResult),
    /// Answer to [`Request::Shutdown`].
    Shutdown,
    /// Answer to [`Request::WaitForDiagnostics`].
    DiagnosticsReady,
    /// Answer to [`Request::DocumentSymbols`].
    DocumentSymbols(Vec<DocumentSymbol>),
    /// Answer to [`Request::PlainGoal`]; `None` when there is no goal at the position.
    PlainGoal(Option<PlainGoal>),
}

#[derive(Debug, Clone, PartialEq)]
/// Parsed `initialize` result.
pub struct InitializeResult {
    /// Server name and version, if reported.
    pub server_info: Option<ServerInfo>,
    /// Raw `capabilities` JSON.
    pub capabilities: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Information about the connected checker.
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Optional server version string.
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A node of the `textDocument/documentSymbol` tree.
pub struct DocumentSymbol {
    /// Symbol name.
    pub name: String,
    /// LSP `SymbolKind` number.
    pub kind: u32,
    /// Full extent of the symbol.
    pub range: Range,
    /// Extent of the symbol's name.
    pub selection_range: Range,
    /// Optional detail text (e.g. the signature).
    pub detail: Option<String>,
    /// Nested symbols.
    pub children: Vec<DocumentSymbol>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Goal state reported by `$/lean/plainGoal`.
pub struct PlainGoal {
    /// Goals rendered as one Markdown string.
    pub rendered: String,
    /// One entry per open goal.
    pub goals: Vec<String>,
}

/// Client-to-checker notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientNotification {
    /// `initialized`
    Initialized,
    /// `exit`
    Exit,
    /// `textDocument/didOpen`
    DidOpen {
        /// Document URI.
        uri: String,
        /// Language id (e.g. `"lean4"`).
        language_id: String,
        /// Initial version.
        version: i32,
        /// Initial full text.
        text: String,
    },
    /// `textDocument/didChange` with a single whole-document replacement.
    DidChange {
        /// Document URI.
        uri: String,
        /// New version.
        version: i32,
        /// New full text.
        text: String,
    },
}

impl ClientNotification {
    /// JSON-RPC method name.
    pub fn method(&self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::Exit => "exit",
            Self::DidOpen { .. } => "textDocument/didOpen",
            Self::DidChange { .. } => "textDocument/didChange",
        }
    }

    /// JSON `params` payload.
    pub fn params(&self) -> Value {
        match self {
            Self::Initialized => json!({}),
            Self::Exit => Value::Null,
            Self::DidOpen {
                uri,
                language_id,
                version,
                text,
            } => json!({
                "textDocument": {
                    "uri": uri,
                    "languageId": language_id,
                    "version": version,
                    "text": text,
                }
            }),
            Self::DidChange { uri, version, text } => json!({
                "textDocument": { "uri": uri, "version": version },
                "contentChanges": [{ "text": text }],
            }),
        }
    }

    /// The full JSON-RPC notification object.
    pub fn to_message(&self) -> Value {
        json_rpc_notification(self.method(), self.params())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Parameters of `$/lean/fileProgress`.
pub struct FileProgress {
    /// Document URI.
    pub uri: String,
    /// Document version being processed.
    pub version: i32,
    /// Ranges still being elaborated; empty once the document is done.
    pub processing: Vec<Range>,
}

impl FileProgress {
    /// Returns `true` once nothing is left to process.
    pub fn is_done(&self) -> bool {
        self.processing.is_empty()
    }
}

/// Checker-to-client notifications this client routes.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerNotification {
    /// `textDocument/publishDiagnostics`
    PublishDiagnostics(DiagnosticsSnapshot),
    /// `$/lean/fileProgress`
    FileProgress(FileProgress),
    /// Anything else; logged and discarded.
    Other {
        /// Notification method.
        method: String,
    },
}

impl ServerNotification {
    /// Parse a notification by method name and `params` payload.
    pub fn from_method_and_params(method: &str, params: &Value) -> Result<Self, ProtocolError> {
        let malformed = |reason: &str| ProtocolError::MalformedNotification {
            method: method.to_string(),
            reason: reason.to_string(),
        };

        match method {
            PUBLISH_DIAGNOSTICS => {
                let uri = params
                    .get("uri")
                    .and_then(Value::as_str)
                    .ok_or_else(|| malformed("missing `uri`"))?
                    .to_string();
                let Some(version) = params.get("version").and_then(Value::as_i64) else {
                    log::warn!("discarding unversioned diagnostics for {uri}");
                    return Ok(Self::Other {
                        method: method.to_string(),
                    });
                };
                let version =
                    i32::try_from(version).map_err(|_| malformed("`version` out of range"))?;
                let diagnostics = params
                    .get("diagnostics")
                    .and_then(Value::as_array)
                    .ok_or_else(|| malformed("missing `diagnostics`"))?
                    .iter()
                    .map(diagnostic_from_value)
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| malformed("diagnostic without a valid range"))?;

                Ok(Self::PublishDiagnostics(DiagnosticsSnapshot {
                    uri,
                    version,
                    diagnostics,
                }))
            }
            FILE_PROGRESS => {
                let document = params
                    .get("textDocument")
                    .ok_or_else(|| malformed("missing `textDocument`"))?;
                let uri = document
                    .get("uri")
                    .and_then(Value::as_str)
                    .ok_or_else(|| malformed("missing `textDocument.uri`"))?
                    .to_string();
                let version = document
                    .get("version")
                    .and_then(Value::as_i64)
                    .ok_or_else(|| malformed("missing `textDocument.version`"))?;
                let version = i32::try_from(version)
                    .map_err(|_| malformed("`textDocument.version` out of range"))?;
                let processing = params
                    .get("processing")
                    .and_then(Value::as_array)
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(|item| range_from_value(item.get("range")?))
                            .collect()
                    })
                    .unwrap_or_default();

                Ok(Self::FileProgress(FileProgress {
                    uri,
                    version,
                    processing,
                }))
            }
            _ => Ok(Self::Other {
                method: method.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
/// A JSON-RPC response error object.
pub struct ResponseError {
    /// Error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Optional structured error data.
    pub data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
/// A response frame before it is matched to a request.
pub struct RawResponse {
    /// Response id; `None` if the checker sent `null` or a non-integer id.
    pub id: Option<u64>,
    /// `result` payload (`Null` if absent).
    pub result: Value,
    /// `error` payload, if the request failed.
    pub error: Option<ResponseError>,
}

/// One classified inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Has `method`, no `id`.
    Notification(ServerNotification),
    /// Has `method` and `id`: the checker expects an answer.
    ServerRequest {
        /// Request id, echoed verbatim in the reply.
        id: Value,
        /// Request method.
        method: String,
    },
    /// Has `id`, no `method`.
    Response(RawResponse),
}

impl Inbound {
    /// Classify a raw frame by the presence of `method` and `id`.
    pub fn classify(message: Value) -> Result<Self, ProtocolError> {
        let method = message.get("method").and_then(Value::as_str);
        let id = message.get("id");

        match (method, id) {
            (Some(method), Some(id)) => Ok(Self::ServerRequest {
                id: id.clone(),
                method: method.to_string(),
            }),
            (Some(method), None) => {
                let params = message.get("params").unwrap_or(&Value::Null);
                ServerNotification::from_method_and_params(method, params).map(Self::Notification)
            }
            (None, Some(id)) => {
                let error = message.get("error").map(|e| ResponseError {
                    code: e.get("code").and_then(Value::as_i64).unwrap_or(0),
                    message: e
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("")
                        .to_string(),
                    data: e.get("data").cloned(),
                });
                Ok(Self::Response(RawResponse {
                    id: id.as_u64(),
                    result: message.get("result").cloned().unwrap_or(Value::Null),
                    error,
                }))
            }
            (None, None) => Err(ProtocolError::Unclassifiable(message.to_string())),
        }
    }
}

pub(crate) fn json_rpc_request(id: u64, method: &str, params: Value) -> Value {
    let mut obj = Map::new();
    obj.insert("jsonrpc".to_string(), Value::String(JSONRPC_VERSION.to_string()));
    obj.insert("id".to_string(), Value::Number(id.into()));
    obj.insert("method".to_string(), Value::String(method.to_string()));
    obj.insert("params".to_string(), params);
    Value::Object(obj)
}

pub(crate) fn json_rpc_notification(method: &str, params: Value) -> Value {
    let mut obj = Map::new();
    obj.insert("jsonrpc".to_string(), Value::String(JSONRPC_VERSION.to_string()));
    obj.insert("method".to_string(), Value::String(method.to_string()));
    obj.insert("params".to_string(), params);
    Value::Object(obj)
}

pub(crate) fn json_rpc_response(id: Value, result: Value) -> Value {
    let mut obj = Map::new();
    obj.insert("jsonrpc".to_string(), Value::String(JSONRPC_VERSION.to_string()));
    obj.insert("id".to_string(), id);
    obj.insert("result".to_string(), result);
    Value::Object(obj)
}

fn position_to_json(pos: Position) -> Value {
    json!({ "line": pos.line, "character": pos.character })
}

fn position_from_value(value: &Value) -> Option<Position> {
    let line = u32::try_from(value.get("line")?.as_u64()?).ok()?;
    let character = u32::try_from(value.get("character")?.as_u64()?).ok()?;
    Some(Position { line, character })
}

fn range_from_value(value: &Value) -> Option<Range> {
    let start = position_from_value(value.get("start")?)?;
    let end = position_from_value(value.get("end")?)?;
    Some(Range { start, end })
}

fn diagnostic_from_value(value: &Value) -> Option<Diagnostic> {
    let range = range_from_value(value.get("range")?)?;
    let full_range = value
        .get("fullRange")
        .and_then(range_from_value)
        .unwrap_or(range);
    let severity = value
        .get("severity")
        .and_then(Value::as_u64)
        .and_then(DiagnosticSeverity::from_u64);
    let source = value
        .get("source")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    Some(Diagnostic {
        source,
        severity,
        range,
        message,
        full_range,
    })
}

fn document_symbol_from_value(value: &Value) -> Option<DocumentSymbol> {
    let children = match value.get("children") {
        Some(Value::Array(items)) => items
            .iter()
            .map(document_symbol_from_value)
            .collect::<Option<Vec<_>>>()?,
        _ => Vec::new(),
    };

    Some(DocumentSymbol {
        name: value.get("name")?.as_str()?.to_string(),
        kind: u32::try_from(value.get("kind")?.as_u64()?).ok()?,
        range: range_from_value(value.get("range")?)?,
        selection_range: range_from_value(value.get("selectionRange")?)?,
        detail: value
            .get("detail")
            .and_then(Value::as_str)
            .map(str::to_string),
        children,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_classify_by_id_and_method() {
        let note = json!({ "jsonrpc": "2.0", "method": "window/logMessage", "params": {} });
        assert_eq!(
            Inbound::classify(note).unwrap(),
            Inbound::Notification(ServerNotification::Other {
                method: "window/logMessage".to_string()
            })
        );

        let request = json!({ "jsonrpc": "2.0", "id": "r1", "method": REGISTER_CAPABILITY });
        assert_eq!(
            Inbound::classify(request).unwrap(),
            Inbound::ServerRequest {
                id: json!("r1"),
                method: REGISTER_CAPABILITY.to_string()
            }
        );

        let response = json!({ "jsonrpc": "2.0", "id": 4, "result": null });
        assert_eq!(
            Inbound::classify(response).unwrap(),
            Inbound::Response(RawResponse {
                id: Some(4),
                result: Value::Null,
                error: None
            })
        );

        assert!(matches!(
            Inbound::classify(json!({ "jsonrpc": "2.0" })),
            Err(ProtocolError::Unclassifiable(_))
        ));
    }

    #[test]
    fn test_classify_error_response() {
        let response = json!({
            "jsonrpc": "2.0",
            "id": 9,
            "error": { "code": -32601, "message": "no such method" }
        });
        let Inbound::Response(raw) = Inbound::classify(response).unwrap() else {
            panic!("expected a response");
        };
        assert_eq!(raw.id, Some(9));
        let error = raw.error.unwrap();
        assert_eq!(error.code, -32601);
        assert_eq!(error.message, "no such method");
    }

    #[test]
    fn test_publish_diagnostics_parsing() {
        let params = json!({
            "uri": "file:///w/A.lean",
            "version": 3,
            "diagnostics": [
                {
                    "source": "Lean 4",
                    "severity": 1,
                    "range": { "start": { "line": 2, "character": 4 }, "end": { "line": 2, "character": 9 } },
                    "fullRange": { "start": { "line": 2, "character": 0 }, "end": { "line": 5, "character": 0 } },
                    "message": "unknown tactic"
                },
                {
                    "severity": 2,
                    "range": { "start": { "line": 0, "character": 8 }, "end": { "line": 0, "character": 11 } },
                    "message": "declaration uses 'sorry'"
                }
            ]
        });

        let ServerNotification::PublishDiagnostics(snapshot) =
            ServerNotification::from_method_and_params(PUBLISH_DIAGNOSTICS, &params).unwrap()
        else {
            panic!("expected diagnostics");
        };
        assert_eq!(snapshot.uri, "file:///w/A.lean");
        assert_eq!(snapshot.version, 3);
        assert_eq!(snapshot.diagnostics.len(), 2);

        let first = &snapshot.diagnostics[0];
        assert!(first.is_error());
        assert_eq!(first.source, "Lean 4");
        assert_eq!(first.full_range, "2:0-5:0".parse::<Range>().unwrap());

        let second = &snapshot.diagnostics[1];
        assert!(second.is_warning());
        assert_eq!(second.full_range, second.range);
        assert_eq!(second.source, "");
    }

    #[test]
    fn test_malformed_diagnostics_are_rejected() {
        let params = json!({
            "uri": "file:///w/A.lean",
            "version": 1,
            "diagnostics": [{ "severity": 1, "message": "no range" }]
        });
        assert!(matches!(
            ServerNotification::from_method_and_params(PUBLISH_DIAGNOSTICS, &params),
            Err(ProtocolError::MalformedNotification { .. })
        ));

        let unversioned = json!({ "uri": "file:///w/A.lean", "diagnostics": [] });
        assert!(matches!(
            ServerNotification::from_method_and_params(PUBLISH_DIAGNOSTICS, &unversioned),
            Ok(ServerNotification::Other { .. })
        ));
    }

    #[test]
    fn test_out_of_range_numbers_are_rejected() {
        let huge_line = json!({
            "uri": "file:///w/A.lean",
            "version": 1,
            "diagnostics": [{
                "range": {
                    "start": { "line": 4_294_967_296u64, "character": 0 },
                    "end": { "line": 4_294_967_296u64, "character": 1 }
                },
                "message": "wrapped"
            }]
        });
        assert!(matches!(
            ServerNotification::from_method_and_params(PUBLISH_DIAGNOSTICS, &huge_line),
            Err(ProtocolError::MalformedNotification { .. })
        ));

        let huge_version = json!({ "uri": "file:///w/A.lean", "version": 4_294_967_297i64, "diagnostics": [] });
        assert!(matches!(
            ServerNotification::from_method_and_params(PUBLISH_DIAGNOSTICS, &huge_version),
            Err(ProtocolError::MalformedNotification { .. })
        ));

        let progress = json!({ "textDocument": { "uri": "file:///w/A.lean", "version": -4_294_967_295i64 } });
        assert!(matches!(
            ServerNotification::from_method_and_params(FILE_PROGRESS, &progress),
            Err(ProtocolError::MalformedNotification { .. })
        ));

        let symbols = Request::DocumentSymbols {
            uri: "file:///w/A.lean".to_string(),
        };
        let range = json!({ "start": { "line": 0, "character": 0 }, "end": { "line": 1, "character": 0 } });
        assert!(matches!(
            symbols.parse_response(json!([{
                "name": "Cat",
                "kind": 4_294_967_299u64,
                "range": range,
                "selectionRange": range
            }])),
            Err(ProtocolError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_file_progress_parsing() {
        let params = json!({
            "textDocument": { "uri": "file:///w/A.lean", "version": 2 },
            "processing": [
                { "range": { "start": { "line": 1, "character": 0 }, "end": { "line": 9, "character": 0 } }, "kind": 1 }
            ]
        });
        let ServerNotification::FileProgress(progress) =
            ServerNotification::from_method_and_params(FILE_PROGRESS, &params).unwrap()
        else {
            panic!("expected file progress");
        };
        assert_eq!(progress.version, 2);
        assert_eq!(progress.processing, vec!["1:0-9:0".parse::<Range>().unwrap()]);
        assert!(!progress.is_done());
    }

    #[test]
    fn test_request_messages() {
        let request = Request::WaitForDiagnostics {
            uri: "file:///w/A.lean".to_string(),
            version: 7,
        };
        assert_eq!(
            request.to_message(12),
            json!({
                "jsonrpc": "2.0",
                "id": 12,
                "method": "textDocument/waitForDiagnostics",
                "params": { "uri": "file:///w/A.lean", "version": 7 }
            })
        );
        assert_eq!(
            request.parse_response(json!({})).unwrap(),
            Response::DiagnosticsReady
        );
    }

    #[test]
    fn test_did_change_is_whole_document() {
        let note = ClientNotification::DidChange {
            uri: "file:///w/A.lean".to_string(),
            version: 2,
            text: "theorem t : True := by trivial".to_string(),
        };
        assert_eq!(
            note.to_message(),
            json!({
                "jsonrpc": "2.0",
                "method": "textDocument/didChange",
                "params": {
                    "textDocument": { "uri": "file:///w/A.lean", "version": 2 },
                    "contentChanges": [{ "text": "theorem t : True := by trivial" }]
                }
            })
        );
    }

    #[test]
    fn test_typed_responses() {
        let goal = Request::PlainGoal {
            uri: "file:///w/A.lean".to_string(),
            position: Position::new(3, 2),
        };
        assert_eq!(
            goal.parse_response(Value::Null).unwrap(),
            Response::PlainGoal(None)
        );
        assert_eq!(
            goal.parse_response(json!({ "rendered": "⊢ True", "goals": ["⊢ True"] }))
                .unwrap(),
            Response::PlainGoal(Some(PlainGoal {
                rendered: "⊢ True".to_string(),
                goals: vec!["⊢ True".to_string()],
            }))
        );
        assert!(goal.parse_response(json!({ "goals": [] })).is_err());

        let symbols = Request::DocumentSymbols {
            uri: "file:///w/A.lean".to_string(),
        };
        let range = json!({ "start": { "line": 0, "character": 0 }, "end": { "line": 1, "character": 0 } });
        let parsed = symbols
            .parse_response(json!([{
                "name": "Cat",
                "kind": 3,
                "range": range,
                "selectionRange": range,
                "children": [{ "name": "bat", "kind": 12, "range": range, "selectionRange": range }]
            }]))
            .unwrap();
        let Response::DocumentSymbols(parsed) = parsed else {
            panic!("expected symbols");
        };
        assert_eq!(parsed[0].name, "Cat");
        assert_eq!(parsed[0].children[0].name, "bat");
        assert!(symbols.parse_response(json!("nope")).is_err());

        let init = Request::Initialize {
            root_uri: "file:///w".to_string(),
        };
        let Response::Initialized(result) = init
            .parse_response(json!({ "capabilities": { "hoverProvider": true }, "serverInfo": { "name": "Lean 4 Server", "version": "0.3.0" } }))
            .unwrap()
        else {
            panic!("expected initialize result");
        };
        assert_eq!(result.server_info.unwrap().name, "Lean 4 Server");
        assert_eq!(result.capabilities["hoverProvider"], json!(true));
    }
}
