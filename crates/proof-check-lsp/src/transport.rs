//! JSON-RPC stdio framing.
//!
//! Messages are JSON values framed by HTTP-like headers:
//!
//! ```text
//! Content-Length: <n>\r\n
//! \r\n
//! <n bytes of UTF-8 JSON>
//! ```
//!
//! Only `Content-Length` is interpreted; other header lines are ignored.

use crate::error::TransportError;
use serde_json::Value;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Write a single framed message to `writer` with one `write_all` call.
///
/// The declared length is the UTF-8 byte length of the payload.
pub fn write_message<W: Write>(writer: &mut W, value: &Value) -> Result<(), TransportError> {
    let body = serde_json::to_vec(value)?;

    let mut frame = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
    frame.extend_from_slice(&body);

    writer.write_all(&frame)?;
    writer.flush()?;
    Ok(())
}

/// Read a single framed message from `reader`.
///
/// Returns:
/// - `Ok(Some(value))` when a message is successfully read.
/// - `Ok(None)` on clean EOF before any header byte.
/// - `Err(TransportError::Truncated { .. })` if the stream ends inside the payload.
pub fn read_message<R: BufRead>(reader: &mut R) -> Result<Option<Value>, TransportError> {
    let mut content_length: Option<usize> = None;
    let mut line = String::new();
    let mut in_header = false;

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return if in_header {
                Err(TransportError::TruncatedHeader)
            } else {
                Ok(None)
            };
        }
        in_header = true;

        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }

        if let Some((name, rest)) = trimmed.split_once(':')
            && name.trim().eq_ignore_ascii_case("Content-Length")
        {
            let raw = rest.trim();
            let len = raw
                .parse::<usize>()
                .map_err(|_| TransportError::InvalidContentLength(raw.to_string()))?;
            content_length = Some(len);
        }
    }

    let expected = content_length.ok_or(TransportError::MissingContentLength)?;
    let body = read_payload(reader, expected)?;
    Ok(Some(serde_json::from_slice(&body)?))
}

fn read_payload<R: Read>(reader: &mut R, expected: usize) -> Result<Vec<u8>, TransportError> {
    let mut body = vec![0u8; expected];
    let mut received = 0;
    while received < expected {
        match reader.read(&mut body[received..]) {
            Ok(0) => return Err(TransportError::Truncated { expected, received }),
            Ok(n) => received += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        }
    }
    Ok(body)
}

/// A readable stream that can report whether input is available without consuming it.
pub trait PollRead: Read {
    /// Wait up to `timeout` for the stream to become readable (data or EOF).
    ///
    /// A zero timeout makes this a non-blocking check.
    fn poll_readable(&self, timeout: Duration) -> io::Result<bool>;
}

#[cfg(unix)]
impl<T: Read + std::os::fd::AsRawFd> PollRead for T {
    fn poll_readable(&self, timeout: Duration) -> io::Result<bool> {
        let millis = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;
        let mut fds = libc::pollfd {
            fd: self.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };

        loop {
            // SAFETY: `fds` is one valid, exclusively borrowed pollfd for the whole call.
            let rc = unsafe { libc::poll(&mut fds, 1, millis) };
            if rc >= 0 {
                return Ok(rc > 0);
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }
}

/// A stream that can refuse to wait past a deadline.
///
/// With a deadline set, every underlying read first waits for readiness and fails with
/// [`io::ErrorKind::TimedOut`] once the deadline has passed.
struct DeadlineRead {
    stream: Box<dyn PollRead + Send>,
    deadline: Option<Instant>,
}

impl DeadlineRead {
    fn poll_readable(&self, timeout: Duration) -> io::Result<bool> {
        (*self.stream).poll_readable(timeout)
    }
}

impl Read for DeadlineRead {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(deadline) = self.deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if !self.poll_readable(remaining)? {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "no input before the read deadline",
                ));
            }
        }
        (*self.stream).read(buf)
    }
}

/// The inbound half of a connection: buffered frame reads plus a readiness check.
pub struct FrameReader {
    inner: BufReader<DeadlineRead>,
}

impl FrameReader {
    /// Wrap a readable stream.
    pub fn new(reader: impl PollRead + Send + 'static) -> Self {
        Self {
            inner: BufReader::new(DeadlineRead {
                stream: Box::new(reader),
                deadline: None,
            }),
        }
    }

    /// Returns `true` if a read would make progress without waiting longer than `timeout`.
    ///
    /// Bytes already sitting in the read buffer count as ready.
    pub fn poll_ready(&self, timeout: Duration) -> io::Result<bool> {
        if !self.inner.buffer().is_empty() {
            return Ok(true);
        }
        self.inner.get_ref().poll_readable(timeout)
    }

    /// Read one frame, blocking until it is complete.
    pub fn read(&mut self) -> Result<Option<Value>, TransportError> {
        self.read_frame()
    }

    /// Read one frame, giving up with [`TransportError::Stalled`] if it is still incomplete at
    /// `deadline`.
    ///
    /// A stalled read may leave part of a frame consumed, so the stream is unusable afterwards.
    pub fn read_until(&mut self, deadline: Instant) -> Result<Option<Value>, TransportError> {
        self.inner.get_mut().deadline = Some(deadline);
        let message = self.read_frame();
        self.inner.get_mut().deadline = None;
        match message {
            Err(TransportError::Io(err)) if err.kind() == io::ErrorKind::TimedOut => {
                Err(TransportError::Stalled)
            }
            other => other,
        }
    }

    fn read_frame(&mut self) -> Result<Option<Value>, TransportError> {
        let message = read_message(&mut self.inner)?;
        if let Some(value) = &message {
            log::trace!("<- {value}");
        }
        Ok(message)
    }
}

/// The outbound half of a connection.
///
/// Every frame is written under one exclusive lock, so concurrent senders never interleave bytes.
pub struct FrameWriter {
    inner: Mutex<Option<Box<dyn Write + Send>>>,
}

impl FrameWriter {
    /// Wrap a writable stream.
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            inner: Mutex::new(Some(Box::new(writer))),
        }
    }

    /// Frame and write `value`.
    pub fn send(&self, value: &Value) -> Result<(), TransportError> {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let writer = guard.as_mut().ok_or(TransportError::Closed)?;
        log::trace!("-> {value}");
        write_message(writer, value)
    }

    /// Drop the underlying stream, signalling end-of-input to the peer. Idempotent.
    pub fn close(&self) {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(mut writer) = guard.take() {
            let _ = writer.flush();
        }
    }

    /// Returns `true` once [`FrameWriter::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;
    use std::os::unix::net::UnixStream;
    use std::sync::Arc;
    use std::thread;

    /// Hands out at most one byte per `read` call.
    struct Trickle<R>(R);

    impl<R: Read> Read for Trickle<R> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let len = buf.len().min(1);
            self.0.read(&mut buf[..len])
        }
    }

    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            // Deliberately split every write so interleaving would be visible.
            let n = buf.len().min(7);
            self.0.lock().unwrap().extend_from_slice(&buf[..n]);
            thread::yield_now();
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn frame(value: &Value) -> Vec<u8> {
        let mut out = Vec::new();
        write_message(&mut out, value).unwrap();
        out
    }

    #[test]
    fn test_multibyte_payload_uses_byte_length() {
        let value = json!({ "text": "∀ n : ℕ, n + 0 = n 👋" });
        let bytes = frame(&value);
        let body = serde_json::to_vec(&value).unwrap();
        let body_chars = String::from_utf8(body.clone()).unwrap().chars().count();
        assert_ne!(body.len(), body_chars);

        let header = format!("Content-Length: {}\r\n\r\n", body.len());
        assert!(bytes.starts_with(header.as_bytes()));

        let mut reader = Cursor::new(bytes);
        assert_eq!(read_message(&mut reader).unwrap(), Some(value));
        assert_eq!(read_message(&mut reader).unwrap(), None);
    }

    #[test]
    fn test_reads_across_partial_reads() {
        let first = json!({ "jsonrpc": "2.0", "method": "a", "params": { "s": "λ" } });
        let second = json!({ "jsonrpc": "2.0", "id": 3, "result": null });
        let mut bytes = frame(&first);
        bytes.extend(frame(&second));

        let mut reader = BufReader::with_capacity(1, Trickle(Cursor::new(bytes)));
        assert_eq!(read_message(&mut reader).unwrap(), Some(first));
        assert_eq!(read_message(&mut reader).unwrap(), Some(second));
        assert_eq!(read_message(&mut reader).unwrap(), None);
    }

    #[test]
    fn test_extra_headers_are_ignored() {
        let raw = b"Content-Type: application/vscode-jsonrpc; charset=utf-8\r\ncontent-length: 2\r\n\r\n{}";
        let mut reader = Cursor::new(raw.to_vec());
        assert_eq!(read_message(&mut reader).unwrap(), Some(json!({})));
    }

    #[test]
    fn test_truncated_payload_is_an_error() {
        let raw = b"Content-Length: 10\r\n\r\n{\"a\":";
        let mut reader = Cursor::new(raw.to_vec());
        match read_message(&mut reader) {
            Err(TransportError::Truncated { expected, received }) => {
                assert_eq!(expected, 10);
                assert_eq!(received, 5);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_missing_and_invalid_length() {
        let mut reader = Cursor::new(b"X-Other: 1\r\n\r\n{}".to_vec());
        assert!(matches!(
            read_message(&mut reader),
            Err(TransportError::MissingContentLength)
        ));

        let mut reader = Cursor::new(b"Content-Length: ten\r\n\r\n{}".to_vec());
        assert!(matches!(
            read_message(&mut reader),
            Err(TransportError::InvalidContentLength(_))
        ));

        let mut reader = Cursor::new(b"Content-Length: 2\r\n".to_vec());
        assert!(matches!(
            read_message(&mut reader),
            Err(TransportError::TruncatedHeader)
        ));
    }

    #[test]
    fn test_invalid_json_payload() {
        let mut reader = Cursor::new(b"Content-Length: 3\r\n\r\n{x}".to_vec());
        assert!(matches!(
            read_message(&mut reader),
            Err(TransportError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_concurrent_senders_do_not_interleave() {
        let sink = SharedSink::default();
        let writer = Arc::new(FrameWriter::new(sink.clone()));

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let writer = Arc::clone(&writer);
                thread::spawn(move || {
                    for i in 0..25 {
                        let value = json!({ "thread": t, "seq": i, "pad": "αβγδε".repeat(i) });
                        writer.send(&value).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let bytes = sink.0.lock().unwrap().clone();
        let mut reader = Cursor::new(bytes);
        let mut count = 0;
        while let Some(value) = read_message(&mut reader).unwrap() {
            assert!(value["thread"].is_u64());
            count += 1;
        }
        assert_eq!(count, 100);
    }

    #[test]
    fn test_poll_ready_sees_pending_input() {
        let (near, mut far) = UnixStream::pair().unwrap();
        let mut reader = FrameReader::new(near);
        assert!(!reader.poll_ready(Duration::ZERO).unwrap());

        write_message(&mut far, &json!({ "id": 1 })).unwrap();
        assert!(reader.poll_ready(Duration::from_secs(5)).unwrap());
        assert_eq!(reader.read().unwrap(), Some(json!({ "id": 1 })));
    }

    #[test]
    fn test_read_until_gives_up_on_a_stalled_frame() {
        let (near, mut far) = UnixStream::pair().unwrap();
        let mut reader = FrameReader::new(near);

        write_message(&mut far, &json!({ "id": 1 })).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        assert_eq!(reader.read_until(deadline).unwrap(), Some(json!({ "id": 1 })));

        far.write_all(b"Content-Length: 100\r\n\r\n{").unwrap();
        let started = Instant::now();
        let result = reader.read_until(Instant::now() + Duration::from_millis(100));
        assert!(matches!(result, Err(TransportError::Stalled)), "{result:?}");
        assert!(started.elapsed() < Duration::from_secs(3));

        far.write_all(b"Content-Length: 2\r\n").unwrap();
        assert!(matches!(
            reader.read_until(Instant::now()),
            Err(TransportError::Stalled)
        ));
    }

    #[test]
    fn test_closed_writer_rejects_frames() {
        let writer = FrameWriter::new(Vec::new());
        assert!(!writer.is_closed());
        writer.close();
        writer.close();
        assert!(writer.is_closed());
        assert!(matches!(
            writer.send(&json!({})),
            Err(TransportError::Closed)
        ));
    }
}
