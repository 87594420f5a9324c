// SPDX-License-Identifier: MIT
//
// Session recorder in asciicast v2 format.
//
// Line 1 is a JSON header (`{"version":2,"width":..,"height":..,...}`);
// every following line is one event `[elapsed_seconds, "o"|"i", data]`.
// Files are created owner-only (0600 on Unix) and may be gzip-compressed.
//
// Timing: each event's elapsed time advances by the real gap since the
// previous event, clamped to the idle limit, so long pauses do not stretch
// the replay. Time spent paused is not counted, and events recorded while
// paused are dropped.
//
// Every method takes `&self`; the state lives behind one mutex so the
// paused check, the timestamp and the write happen together. A write
// failure is logged, stops further writes, and is returned by `stop`.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::redact::Redactor;

// ─── Format ─────────────────────────────────────────────────────────────────

/// The header line of a recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingHeader {
    pub version: u8,
    pub width: u16,
    pub height: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_time_limit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "o")]
    Output,
    #[serde(rename = "i")]
    Input,
}

/// One recorded event, serialized as a 3-element array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, EventKind, String)", into = "(f64, EventKind, String)")]
pub struct RecordedEvent {
    /// Seconds since the recording started.
    pub time: f64,
    pub kind: EventKind,
    pub data: String,
}

impl From<(f64, EventKind, String)> for RecordedEvent {
    fn from((time, kind, data): (f64, EventKind, String)) -> Self {
        Self { time, kind, data }
    }
}

impl From<RecordedEvent> for (f64, EventKind, String) {
    fn from(e: RecordedEvent) -> Self {
        (e.time, e.kind, e.data)
    }
}

// ─── Configuration ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RecorderConfig {
    pub path: PathBuf,
    /// Terminal size for the header. Zero means "fill in from the terminal".
    pub width: u16,
    pub height: u16,
    pub title: Option<String>,
    pub env: BTreeMap<String, String>,
    /// Gzip the file.
    pub compress: bool,
    /// Longest gap kept between two events; `None` keeps real gaps.
    pub idle_time_limit: Option<Duration>,
    /// Redact secrets in output and input before writing.
    pub redact: bool,
    /// Extra regex patterns, each replacing matches with `[REDACTED]`.
    pub extra_patterns: Vec<String>,
}

impl RecorderConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            width: 0,
            height: 0,
            title: None,
            env: BTreeMap::new(),
            compress: false,
            idle_time_limit: Some(Duration::from_secs(2)),
            redact: true,
            extra_patterns: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_size(mut self, width: u16, height: u16) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn compressed(mut self, on: bool) -> Self {
        self.compress = on;
        self
    }

    #[must_use]
    pub const fn with_idle_time_limit(mut self, limit: Option<Duration>) -> Self {
        self.idle_time_limit = limit;
        self
    }

    #[must_use]
    pub const fn with_redaction(mut self, on: bool) -> Self {
        self.redact = on;
        self
    }

    #[must_use]
    pub fn with_extra_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.extra_patterns.push(pattern.into());
        self
    }

    fn redactor(&self) -> Result<Option<Redactor>> {
        if !self.redact {
            return Ok(None);
        }
        let mut redactor = Redactor::default();
        for pattern in &self.extra_patterns {
            redactor = redactor.with_simple_pattern(pattern)?;
        }
        Ok(Some(redactor))
    }
}

// ─── Sink ───────────────────────────────────────────────────────────────────

enum Sink {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl Sink {
    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Plain(w) => w,
            Self::Gzip(w) => w,
        }
    }

    fn finish(self) -> io::Result<()> {
        match self {
            Self::Plain(mut w) => w.flush(),
            Self::Gzip(w) => w.finish()?.flush(),
        }
    }
}

fn create_file(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

// ─── Recorder ───────────────────────────────────────────────────────────────

struct State {
    sink: Option<Sink>,
    /// Timeline position of the last event, in seconds.
    elapsed: f64,
    /// Wall-clock moment the timeline position corresponds to.
    last_real: Instant,
    paused_at: Option<Instant>,
    error: Option<io::Error>,
    events: u64,
}

/// What a finished recording produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSummary {
    pub path: PathBuf,
    pub events: u64,
    /// Length of the replay timeline.
    pub duration: Duration,
}

/// An active recording.
pub struct Recorder {
    path: PathBuf,
    idle_limit: Option<f64>,
    redactor: Option<Redactor>,
    state: Mutex<State>,
}

impl Recorder {
    /// Create the file and write the header.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the file cannot be created or the header
    /// cannot be written (the partial file is removed), or
    /// [`Error::Pattern`] for an invalid extra redaction pattern.
    pub fn start(config: RecorderConfig) -> Result<Self> {
        let redactor = config.redactor()?;
        let header = RecordingHeader {
            version: 2,
            width: config.width,
            height: config.height,
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .ok()
                .map(|d| d.as_secs()),
            idle_time_limit: config.idle_time_limit.map(|d| d.as_secs_f64()),
            title: config.title.clone(),
            env: config.env.clone(),
        };

        let file = BufWriter::new(create_file(&config.path)?);
        let mut sink = if config.compress {
            Sink::Gzip(GzEncoder::new(file, Compression::default()))
        } else {
            Sink::Plain(file)
        };
        let written = serde_json::to_writer(sink.writer(), &header)
            .map_err(Error::from)
            .and_then(|()| Ok(sink.writer().write_all(b"\n")?))
            .and_then(|()| Ok(sink.writer().flush()?));
        if let Err(err) = written {
            let _ = std::fs::remove_file(&config.path);
            return Err(err);
        }

        debug!(path = %config.path.display(), compress = config.compress, "recording started");
        Ok(Self {
            path: config.path,
            idle_limit: config.idle_time_limit.map(|d| d.as_secs_f64()),
            redactor,
            state: Mutex::new(State {
                sink: Some(sink),
                elapsed: 0.0,
                last_real: Instant::now(),
                paused_at: None,
                error: None,
                events: 0,
            }),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record_output(&self, data: &str) {
        self.record(EventKind::Output, data);
    }

    pub fn record_input(&self, data: &str) {
        self.record(EventKind::Input, data);
    }

    /// Drop events until [`resume`](Self::resume). Idempotent.
    pub fn pause(&self) {
        let mut state = self.state.lock();
        if state.paused_at.is_none() {
            state.paused_at = Some(Instant::now());
            debug!("recording paused");
        }
    }

    /// Idempotent.
    pub fn resume(&self) {
        let mut state = self.state.lock();
        if let Some(at) = state.paused_at.take() {
            // Shift the reference point so the paused span never shows up.
            state.last_real += at.elapsed();
            debug!("recording resumed");
        }
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.state.lock().paused_at.is_some()
    }

    #[must_use]
    pub fn events(&self) -> u64 {
        self.state.lock().events
    }

    fn record(&self, kind: EventKind, data: &str) {
        if data.is_empty() {
            return;
        }
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if state.paused_at.is_some() || state.error.is_some() {
            return;
        }
        let Some(sink) = state.sink.as_mut() else {
            return;
        };

        let now = Instant::now();
        let mut gap = now.saturating_duration_since(state.last_real).as_secs_f64();
        if let Some(limit) = self.idle_limit {
            gap = gap.min(limit);
        }
        let time = ((state.elapsed + gap) * 1_000_000.0).round() / 1_000_000.0;

        let data = match &self.redactor {
            Some(r) => r.redact(data),
            None => data.into(),
        };
        let event = RecordedEvent {
            time,
            kind,
            data: data.into_owned(),
        };

        let written = serde_json::to_writer(sink.writer(), &event)
            .map_err(io::Error::from)
            .and_then(|()| sink.writer().write_all(b"\n"));
        match written {
            Ok(()) => {
                state.elapsed = time;
                state.last_real = now;
                state.events += 1;
                trace!(?kind, time, "recorded event");
            }
            Err(err) => {
                warn!(%err, path = %self.path.display(), "recording write failed");
                state.error = Some(err);
            }
        }
    }

    /// Finish the file.
    ///
    /// # Errors
    ///
    /// Returns the first write error seen during the recording, or the
    /// error from flushing the file.
    pub fn stop(self) -> Result<RecordingSummary> {
        let mut state = self.state.into_inner();
        let finished = state.sink.take().map_or(Ok(()), Sink::finish);
        debug!(path = %self.path.display(), events = state.events, "recording stopped");
        if let Some(err) = state.error {
            return Err(err.into());
        }
        finished?;
        Ok(RecordingSummary {
            path: self.path,
            events: state.events,
            duration: Duration::from_secs_f64(state.elapsed),
        })
    }
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("path", &self.path)
            .field("idle_limit", &self.idle_limit)
            .field("redact", &self.redactor.is_some())
            .finish_non_exhaustive()
    }
}

// ─── Reading ────────────────────────────────────────────────────────────────

/// Load a recording, plain or gzip (detected by its magic bytes).
///
/// # Errors
///
/// Returns the I/O error, or [`Error::Format`] for a malformed line.
pub fn read_recording(path: impl AsRef<Path>) -> Result<(RecordingHeader, Vec<RecordedEvent>)> {
    let mut file = BufReader::new(File::open(path)?);
    let gzip = file.fill_buf()?.starts_with(&[0x1F, 0x8B]);
    let reader: Box<dyn BufRead> = if gzip {
        Box::new(BufReader::new(GzDecoder::new(file)))
    } else {
        Box::new(file)
    };
    parse_recording(reader)
}

/// Parse a recording from any reader.
///
/// # Errors
///
/// As [`read_recording`].
pub fn parse_recording(reader: impl BufRead) -> Result<(RecordingHeader, Vec<RecordedEvent>)> {
    let mut lines = reader.lines();
    let header_line = lines
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "empty recording"))??;
    let header: RecordingHeader = serde_json::from_str(&header_line)?;
    let mut events = Vec::new();
    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        events.push(serde_json::from_str(&line)?);
    }
    Ok((header, events))
}

/// Read a whole stream into memory and parse it; for callers that hold a
/// recording as bytes.
///
/// # Errors
///
/// As [`read_recording`].
pub fn parse_recording_bytes(bytes: &[u8]) -> Result<(RecordingHeader, Vec<RecordedEvent>)> {
    if bytes.starts_with(&[0x1F, 0x8B]) {
        let mut text = Vec::new();
        GzDecoder::new(bytes).read_to_end(&mut text)?;
        return parse_recording(text.as_slice());
    }
    parse_recording(bytes)
}

// ─── Tests ──────────────────────────────────────────────────────────────────
