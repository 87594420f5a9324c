// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Byte sources for the decoder.
//
// `StdinReader` runs a dedicated thread that reads stdin and sends byte
// chunks through a channel. `ChunkSource` turns the receiving end back into
// a `Read` whose reads time out, which is what lets `Decoder` settle a lone
// ESC as the Escape key instead of waiting forever. `RecordingSource` tees
// every byte read into the terminal's session recorder.
//
// Shutdown: the reader thread polls stdin's fd with a short timeout and
// checks an `AtomicBool` between polls, so `stop` never leaves it stuck in a
// blocking `read()`. When the thread exits the channel disconnects and the
// `ChunkSource` reports end of input.

use std::io::{self, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::debug;

use crate::terminal::Terminal;

/// A keypress is 1-6 bytes, a paste can be kilobytes.
const READ_BUF_SIZE: usize = 4096;

/// Shutdown latency of the reader thread (milliseconds).
const POLL_TIMEOUT_MS: i32 = 50;

/// How long a `ChunkSource` read waits before reporting a timeout.
pub const DEFAULT_ESCAPE_TIMEOUT: Duration = Duration::from_millis(25);

// ─── StdinReader ────────────────────────────────────────────────────────────

/// Background stdin reader thread. Stops on [`stop`](Self::stop) or drop.
///
/// ```no_run
/// use tessera_term::reader::{ChunkSource, StdinReader};
/// use tessera_term::Decoder;
///
/// let (_reader, rx) = StdinReader::spawn()?;
/// let mut decoder = Decoder::new(ChunkSource::new(rx));
/// let event = decoder.read_event()?;
/// # Ok::<(), tessera_term::Error>(())
/// ```
pub struct StdinReader {
    handle: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
}

impl StdinReader {
    /// Spawn the reader thread. Each received `Vec<u8>` is a non-empty
    /// chunk; the channel closes when the reader stops or stdin hits EOF.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be spawned.
    pub fn spawn() -> io::Result<(Self, Receiver<Vec<u8>>)> {
        let (tx, rx) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("tessera-stdin".into())
            .spawn(move || reader_loop(&tx, &stop_flag))?;
        debug!("stdin reader started");

        Ok((
            Self {
                handle: Some(handle),
                stop,
            },
            rx,
        ))
    }

    /// Signal the thread and wait for it. Idempotent.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            debug!("stdin reader stopped");
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for StdinReader {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(unix)]
fn reader_loop(tx: &mpsc::Sender<Vec<u8>>, stop: &AtomicBool) {
    let fd = libc::STDIN_FILENO;
    let mut buf = [0u8; READ_BUF_SIZE];

    while !stop.load(Ordering::Relaxed) {
        let ready = unsafe {
            let mut pfd = libc::pollfd {
                fd,
                events: libc::POLLIN,
                revents: 0,
            };
            libc::poll(&raw mut pfd, 1, POLL_TIMEOUT_MS)
        };
        if ready <= 0 {
            continue;
        }

        let n = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
        if n <= 0 {
            break;
        }
        #[allow(clippy::cast_sign_loss)] // n > 0
        let chunk = buf[..n as usize].to_vec();
        if tx.send(chunk).is_err() {
            break;
        }
    }
}

// Without poll the thread can only notice `stop` between reads.
#[cfg(not(unix))]
fn reader_loop(tx: &mpsc::Sender<Vec<u8>>, stop: &AtomicBool) {
    let stdin = io::stdin();
    let mut buf = [0u8; READ_BUF_SIZE];

    while !stop.load(Ordering::Relaxed) {
        match stdin.lock().read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
        }
    }
}

// ─── ChunkSource ────────────────────────────────────────────────────────────

/// `Read` over a channel of byte chunks.
///
/// A read that finds nothing within the timeout fails with
/// [`io::ErrorKind::TimedOut`]; a disconnected channel reads as EOF.
#[derive(Debug)]
pub struct ChunkSource {
    rx: Receiver<Vec<u8>>,
    timeout: Duration,
    leftover: Vec<u8>,
    pos: usize,
}

impl ChunkSource {
    #[must_use]
    pub const fn new(rx: Receiver<Vec<u8>>) -> Self {
        Self::with_timeout(rx, DEFAULT_ESCAPE_TIMEOUT)
    }

    #[must_use]
    pub const fn with_timeout(rx: Receiver<Vec<u8>>, timeout: Duration) -> Self {
        Self {
            rx,
            timeout,
            leftover: Vec::new(),
            pos: 0,
        }
    }

    fn drain_leftover(&mut self, buf: &mut [u8]) -> usize {
        let rest = &self.leftover[self.pos..];
        let n = rest.len().min(buf.len());
        buf[..n].copy_from_slice(&rest[..n]);
        self.pos += n;
        if self.pos == self.leftover.len() {
            self.leftover.clear();
            self.pos = 0;
        }
        n
    }
}

impl Read for ChunkSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if !self.leftover.is_empty() {
            return Ok(self.drain_leftover(buf));
        }
        loop {
            match self.rx.recv_timeout(self.timeout) {
                Ok(chunk) if chunk.is_empty() => {}
                Ok(chunk) => {
                    self.leftover = chunk;
                    return Ok(self.drain_leftover(buf));
                }
                Err(RecvTimeoutError::Timeout) => {
                    return Err(io::Error::new(io::ErrorKind::TimedOut, "no input"));
                }
                Err(RecvTimeoutError::Disconnected) => return Ok(0),
            }
        }
    }
}

// ─── RecordingSource ────────────────────────────────────────────────────────

/// Wraps a byte source and hands every byte read to
/// [`Terminal::record_input`]. A no-op when nothing is recording.
pub struct RecordingSource<R> {
    inner: R,
    terminal: Arc<Terminal>,
}

impl<R: Read> RecordingSource<R> {
    #[must_use]
    pub const fn new(inner: R, terminal: Arc<Terminal>) -> Self {
        Self { inner, terminal }
    }

    #[must_use]
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for RecordingSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.terminal.record_input(&buf[..n]);
        }
        Ok(n)
    }
}

impl<R> std::fmt::Debug for RecordingSource<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingSource")
            .field("terminal", &self.terminal.id())
            .finish_non_exhaustive()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{Decoder, Event, KeyCode};
    use crate::recorder::{RecorderConfig, read_recording};
    use crate::terminal::{HeadlessBackend, SharedWriter, TerminalConfig};
    use pretty_assertions::assert_eq;

    fn key_code(event: Event) -> KeyCode {
        match event {
            Event::Key(k) => k.code,
            other => panic!("expected key, got {other:?}"),
        }
    }

    // ── StdinReader ─────────────────────────────────────────────────────

    #[test]
    fn spawn_and_stop_are_idempotent() {
        let (mut reader, _rx) = StdinReader::spawn().unwrap();
        reader.stop();
        reader.stop();
        assert!(!reader.is_running());
    }

    #[test]
    fn channel_closes_after_stop() {
        let (mut reader, rx) = StdinReader::spawn().unwrap();
        reader.stop();
        while rx.try_recv().is_ok() {}
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    // ── ChunkSource ─────────────────────────────────────────────────────

    #[test]
    fn chunks_larger_than_the_read_buffer_are_split() {
        let (tx, rx) = mpsc::channel();
        tx.send(b"hello".to_vec()).unwrap();
        drop(tx);
        let mut source = ChunkSource::new(rx);
        let mut buf = [0u8; 3];
        assert_eq!(source.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"hel");
        assert_eq!(source.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"lo");
        assert_eq!(source.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn empty_channel_times_out() {
        let (_tx, rx) = mpsc::channel::<Vec<u8>>();
        let mut source = ChunkSource::with_timeout(rx, Duration::from_millis(5));
        let err = source.read(&mut [0u8; 8]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn lone_escape_resolves_after_timeout() {
        let (tx, rx) = mpsc::channel();
        tx.send(vec![0x1B]).unwrap();
        let mut decoder = Decoder::new(ChunkSource::with_timeout(rx, Duration::from_millis(5)));
        assert_eq!(key_code(decoder.read_event().unwrap()), KeyCode::Escape);
        tx.send(b"a".to_vec()).unwrap();
        assert_eq!(key_code(decoder.read_event().unwrap()), KeyCode::Char('a'));
    }

    #[test]
    fn split_sequence_joins_across_chunks() {
        let (tx, rx) = mpsc::channel();
        tx.send(b"\x1b[".to_vec()).unwrap();
        tx.send(b"A".to_vec()).unwrap();
        drop(tx);
        let mut decoder = Decoder::new(ChunkSource::with_timeout(rx, Duration::from_millis(200)));
        assert_eq!(key_code(decoder.read_event().unwrap()), KeyCode::Up);
        assert!(matches!(decoder.read_event(), Err(crate::Error::EndOfInput)));
    }

    // ── RecordingSource ─────────────────────────────────────────────────

    #[test]
    fn input_is_teed_into_the_recording() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.cast");
        let terminal = Arc::new(
            Terminal::new(
                Arc::new(HeadlessBackend::new(20, 5)),
                SharedWriter::new(),
                TerminalConfig::default(),
            )
            .unwrap(),
        );
        terminal.start_recording(RecorderConfig::new(&path)).unwrap();

        let mut decoder = Decoder::new(RecordingSource::new(&b"hi"[..], Arc::clone(&terminal)));
        assert_eq!(key_code(decoder.read_event().unwrap()), KeyCode::Char('h'));
        assert_eq!(key_code(decoder.read_event().unwrap()), KeyCode::Char('i'));

        terminal.stop_recording().unwrap();
        let (_, events) = read_recording(&path).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "hi");
    }
}
