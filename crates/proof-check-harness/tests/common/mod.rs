//! An in-process checker that derives diagnostics from the submitted text.

#![allow(dead_code)]

use proof_check::{Position, Range, TheoremInfo, end_position};
use proof_check_harness::{HarnessOptions, ProofHarness, StartupLimiter};
use proof_check_lsp::{ClientOptions, ProtocolClient, read_message, write_message};
use serde_json::{Value, json};
use std::io::BufReader;
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const ROOT_URI: &str = "file:///workspace";
pub const DOC_URI: &str = "file:///workspace/Demo.lean";

pub const SOURCE: &str = "import Std\n\ntheorem foo : True := by\n  sorry\n";

/// Candidates containing this word get no diagnostics response at all.
pub const HANG: &str = "hang";

pub fn foo() -> TheoremInfo {
    TheoremInfo {
        name: "foo".to_string(),
        range: "2:0-3:7".parse().unwrap(),
        sig_range: "2:14-2:18".parse().unwrap(),
        val_range: "2:19-3:7".parse().unwrap(),
    }
}

#[derive(Clone, Copy, Default)]
pub struct Behavior {
    /// Answer `waitForDiagnostics` before publishing the diagnostics it waited for.
    pub respond_first: bool,
}

pub fn diagnostic(range: Range, severity: u64, message: &str) -> Value {
    let position = |p: Position| json!({ "line": p.line, "character": p.character });
    json!({
        "range": { "start": position(range.start), "end": position(range.end) },
        "severity": severity,
        "message": message,
        "source": "Lean 4"
    })
}

/// A crude stand-in for the real checker.
pub fn diagnostics_for(text: &str) -> Vec<Value> {
    let mut out = vec![diagnostic(
        "0:0-0:10".parse().unwrap(),
        1,
        "unknown package 'Std'",
    )];
    if let Some(start) = text.find("bogus") {
        let range = Range::new(
            end_position(&text[..start]),
            end_position(&text[..start + "bogus".len()]),
        );
        out.push(diagnostic(range, 1, "unknown identifier 'bogus'"));
    }
    if text.contains("sorry") {
        out.push(diagnostic(
            "2:8-2:11".parse().unwrap(),
            2,
            "declaration uses 'sorry'",
        ));
    }
    out
}

fn respond(writer: &mut UnixStream, request: &Value, result: Value) {
    let reply = json!({ "jsonrpc": "2.0", "id": request["id"].clone(), "result": result });
    write_message(writer, &reply).unwrap();
}

fn publish(writer: &mut UnixStream, version: &Value, text: &str) {
    let note = json!({
        "jsonrpc": "2.0",
        "method": "textDocument/publishDiagnostics",
        "params": { "uri": DOC_URI, "version": version, "diagnostics": diagnostics_for(text) }
    });
    write_message(writer, &note).unwrap();
}

fn serve(stream: UnixStream, behavior: Behavior) {
    let mut writer = stream.try_clone().unwrap();
    let mut reader = BufReader::new(stream);
    let mut text = String::new();

    while let Some(message) = read_message(&mut reader).unwrap() {
        let method = message["method"].as_str().unwrap_or_default();
        match method {
            "initialize" => respond(&mut writer, &message, json!({ "capabilities": {} })),
            "textDocument/didOpen" | "textDocument/didChange" => {
                let params = &message["params"];
                text = params["textDocument"]["text"]
                    .as_str()
                    .or_else(|| params["contentChanges"][0]["text"].as_str())
                    .unwrap()
                    .to_string();
            }
            "textDocument/waitForDiagnostics" => {
                if text.contains(HANG) {
                    continue;
                }
                let version = &message["params"]["version"];
                if behavior.respond_first {
                    respond(&mut writer, &message, json!({}));
                    thread::sleep(Duration::from_millis(30));
                    publish(&mut writer, version, &text);
                } else {
                    publish(&mut writer, version, &text);
                    respond(&mut writer, &message, json!({}));
                }
            }
            "shutdown" => respond(&mut writer, &message, Value::Null),
            _ => {}
        }
    }
}

pub fn options() -> HarnessOptions {
    HarnessOptions {
        initial_timeout: Duration::from_secs(5),
        check_timeout: Duration::from_secs(5),
        diagnostics_poll_interval: Duration::from_millis(5),
        client: ClientOptions {
            shutdown_timeout: Duration::from_secs(2),
            poll_interval: Duration::from_millis(10),
            ..ClientOptions::default()
        },
        limiter: Arc::new(StartupLimiter::new(1)),
    }
}

/// A ready harness for `foo` backed by the fake checker.
pub fn harness(behavior: Behavior) -> (ProofHarness, JoinHandle<()>) {
    let (near, far) = UnixStream::pair().unwrap();
    let checker = thread::spawn(move || serve(far, behavior));

    let options = options();
    let reader = near.try_clone().unwrap();
    let mut client = ProtocolClient::from_streams(reader, near, options.client.clone());
    client.initialize(ROOT_URI).unwrap();

    let harness =
        ProofHarness::from_parts(foo(), DOC_URI.to_string(), SOURCE, client, options).unwrap();
    (harness, checker)
}
