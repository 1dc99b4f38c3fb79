//! A scripted in-process checker on the far end of a `UnixStream` pair.

#![allow(dead_code)]

use proof_check_lsp::{ClientOptions, ProtocolClient, read_message, write_message};
use serde_json::{Value, json};
use std::io::{BufReader, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const ROOT_URI: &str = "file:///workspace";
pub const DOC_URI: &str = "file:///workspace/Demo.lean";

pub struct Peer {
    reader: BufReader<UnixStream>,
    writer: UnixStream,
}

impl Peer {
    fn new(stream: UnixStream) -> Self {
        let writer = stream.try_clone().unwrap();
        Self {
            reader: BufReader::new(stream),
            writer,
        }
    }

    pub fn recv(&mut self) -> Option<Value> {
        read_message(&mut self.reader).unwrap()
    }

    /// Read the next frame and assert its method.
    pub fn expect(&mut self, method: &str) -> Value {
        let message = self
            .recv()
            .unwrap_or_else(|| panic!("client hung up while `{method}` was expected"));
        assert_eq!(message["method"], json!(method), "unexpected frame: {message}");
        message
    }

    pub fn send(&mut self, value: Value) {
        write_message(&mut self.writer, &value).unwrap();
    }

    /// Write bytes as-is, bypassing framing.
    pub fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).unwrap();
    }

    pub fn respond(&mut self, request: &Value, result: Value) {
        self.send(json!({ "jsonrpc": "2.0", "id": request["id"].clone(), "result": result }));
    }

    pub fn notify(&mut self, method: &str, params: Value) {
        self.send(json!({ "jsonrpc": "2.0", "method": method, "params": params }));
    }

    pub fn publish(&mut self, uri: &str, version: i32, diagnostics: Value) {
        self.notify(
            "textDocument/publishDiagnostics",
            json!({ "uri": uri, "version": version, "diagnostics": diagnostics }),
        );
    }

    /// Answer the handshake.
    pub fn handshake(&mut self) {
        let init = self.expect("initialize");
        assert_eq!(init["params"]["rootUri"], json!(ROOT_URI));
        self.respond(
            &init,
            json!({ "capabilities": {}, "serverInfo": { "name": "fake checker", "version": "0" } }),
        );
        self.expect("initialized");
    }

    /// Close the connection in both directions.
    pub fn hang_up(&mut self) {
        let _ = self.writer.shutdown(Shutdown::Both);
    }

    /// Serve `shutdown` until the client hangs up.
    pub fn finish(&mut self) {
        while let Some(message) = self.recv() {
            if message["method"] == json!("shutdown") {
                self.respond(&message, Value::Null);
            }
        }
    }
}

pub fn options() -> ClientOptions {
    ClientOptions {
        shutdown_timeout: Duration::from_secs(2),
        poll_interval: Duration::from_millis(10),
        ..ClientOptions::default()
    }
}

/// A client connected to a peer thread that has not handshaken yet.
pub fn connect(
    script: impl FnOnce(&mut Peer) + Send + 'static,
) -> (ProtocolClient, JoinHandle<()>) {
    let (near, far) = UnixStream::pair().unwrap();
    let peer = thread::spawn(move || {
        let mut peer = Peer::new(far);
        script(&mut peer);
        peer.finish();
    });
    let reader = near.try_clone().unwrap();
    (ProtocolClient::from_streams(reader, near, options()), peer)
}

/// A client that has completed the handshake; `script` runs after it.
pub fn connect_ready(
    script: impl FnOnce(&mut Peer) + Send + 'static,
) -> (ProtocolClient, JoinHandle<()>) {
    let (mut client, peer) = connect(move |peer| {
        peer.handshake();
        script(peer);
    });
    client.initialize(ROOT_URI).unwrap();
    (client, peer)
}

pub fn diagnostic(range: &str, severity: u64, message: &str) -> Value {
    let range: proof_check::Range = range.parse().unwrap();
    json!({
        "range": {
            "start": { "line": range.start.line, "character": range.start.character },
            "end": { "line": range.end.line, "character": range.end.character }
        },
        "severity": severity,
        "message": message,
        "source": "Lean 4"
    })
}
