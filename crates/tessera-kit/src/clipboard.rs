// SPDX-License-Identifier: MIT
//
// System clipboard through OS utilities.
//
// `Clipboard::detect` picks the first usable tool pair: pbcopy/pbpaste on
// macOS, wl-copy/wl-paste under Wayland, xclip or xsel under X11. A tool is
// usable when its display variable is set and its programs are on PATH.
// Without one, every call fails with `ClipboardError::Unavailable`.
//
// Each call runs the tool as a child process and waits for it with a
// deadline. A cancellation flag is checked while waiting; on timeout or
// cancel the child is killed.

use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

/// How often a waiting call checks the child and the cancel flag.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum ClipboardError {
    /// No clipboard tool was found.
    #[error("no system clipboard tool available")]
    Unavailable,

    #[error("clipboard tool did not finish within {0:?}")]
    Timeout(Duration),

    #[error("clipboard operation cancelled")]
    Cancelled,

    /// The tool ran and reported failure.
    #[error("clipboard command failed: {0}")]
    Command(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ClipboardError>;

// ─── Backends ───────────────────────────────────────────────────────────────

/// A program plus its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tool {
    pub program: String,
    pub args: Vec<String>,
}

impl Tool {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|&a| a.to_owned()).collect(),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

/// The copy and paste tools of one clipboard flavour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardBackend {
    pub name: String,
    pub copy: Tool,
    pub paste: Tool,
}

impl ClipboardBackend {
    pub fn new(name: impl Into<String>, copy: Tool, paste: Tool) -> Self {
        Self {
            name: name.into(),
            copy,
            paste,
        }
    }
}

/// Candidates in detection order, each with the variable it needs set.
fn candidates() -> Vec<(Option<&'static str>, ClipboardBackend)> {
    let mut list = Vec::new();
    if cfg!(target_os = "macos") {
        list.push((
            None,
            ClipboardBackend::new("macos", Tool::new("pbcopy", &[]), Tool::new("pbpaste", &[])),
        ));
    }
    list.push((
        Some("WAYLAND_DISPLAY"),
        ClipboardBackend::new(
            "wayland",
            Tool::new("wl-copy", &[]),
            Tool::new("wl-paste", &["--no-newline"]),
        ),
    ));
    list.push((
        Some("DISPLAY"),
        ClipboardBackend::new(
            "xclip",
            Tool::new("xclip", &["-selection", "clipboard"]),
            Tool::new("xclip", &["-selection", "clipboard", "-o"]),
        ),
    ));
    list.push((
        Some("DISPLAY"),
        ClipboardBackend::new(
            "xsel",
            Tool::new("xsel", &["--clipboard", "--input"]),
            Tool::new("xsel", &["--clipboard", "--output"]),
        ),
    ));
    list
}

fn command_exists(command: &str, path: Option<&OsString>) -> bool {
    if command.contains(std::path::MAIN_SEPARATOR) {
        return Path::new(command).is_file();
    }
    let Some(path) = path else {
        return false;
    };
    std::env::split_paths(path).any(|dir| dir.join(command).is_file())
}

// ─── Clipboard ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Clipboard {
    backend: Option<ClipboardBackend>,
    timeout: Duration,
}

impl Clipboard {
    /// Detect a tool from the process environment.
    #[must_use]
    pub fn detect() -> Self {
        Self::detect_from(std::env::var_os("PATH"), |var| std::env::var_os(var).is_some())
    }

    /// Detect against an explicit `PATH` and variable lookup.
    pub fn detect_from(path: Option<OsString>, has_var: impl Fn(&str) -> bool) -> Self {
        let backend = candidates()
            .into_iter()
            .find(|(var, backend)| {
                var.is_none_or(&has_var)
                    && command_exists(&backend.copy.program, path.as_ref())
                    && command_exists(&backend.paste.program, path.as_ref())
            })
            .map(|(_, backend)| backend);
        match &backend {
            Some(b) => debug!(backend = %b.name, "clipboard detected"),
            None => warn!("no clipboard tool found"),
        }
        Self {
            backend,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn unavailable() -> Self {
        Self {
            backend: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_backend(backend: ClipboardBackend) -> Self {
        Self {
            backend: Some(backend),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn backend(&self) -> Option<&ClipboardBackend> {
        self.backend.as_ref()
    }

    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    /// # Errors
    ///
    /// See [`read_cancellable`](Self::read_cancellable).
    pub fn read(&self) -> Result<String> {
        self.read_cancellable(&AtomicBool::new(false))
    }

    /// # Errors
    ///
    /// See [`write_cancellable`](Self::write_cancellable).
    pub fn write(&self, text: &str) -> Result<()> {
        self.write_cancellable(text, &AtomicBool::new(false))
    }

    /// Read the clipboard, giving up when `cancel` is set.
    ///
    /// # Errors
    ///
    /// `Unavailable`, `Timeout`, `Cancelled`, `Command` when the tool exits
    /// unsuccessfully or prints invalid UTF-8, or `Io` if it cannot start.
    pub fn read_cancellable(&self, cancel: &AtomicBool) -> Result<String> {
        let backend = self.backend.as_ref().ok_or(ClipboardError::Unavailable)?;
        let mut child = backend
            .paste
            .command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let mut stdout = child.stdout.take();
        let reader = thread::spawn(move || {
            let mut out = Vec::new();
            if let Some(stdout) = stdout.as_mut() {
                stdout.read_to_end(&mut out)?;
            }
            Ok::<_, io::Error>(out)
        });

        self.wait(&mut child, &backend.paste, cancel)?;
        let bytes = reader
            .join()
            .map_err(|_| ClipboardError::Command("clipboard reader panicked".into()))??;
        String::from_utf8(bytes).map_err(|err| ClipboardError::Command(err.to_string()))
    }

    /// Replace the clipboard contents, giving up when `cancel` is set.
    ///
    /// # Errors
    ///
    /// As [`read_cancellable`](Self::read_cancellable).
    pub fn write_cancellable(&self, text: &str, cancel: &AtomicBool) -> Result<()> {
        let backend = self.backend.as_ref().ok_or(ClipboardError::Unavailable)?;
        let mut child = backend
            .copy
            .command()
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        // Feed stdin from a thread so a tool that stops reading cannot
        // block us past the deadline.
        let stdin = child.stdin.take();
        let payload = text.as_bytes().to_vec();
        let writer = thread::spawn(move || {
            if let Some(mut stdin) = stdin {
                // A tool that exits early closes the pipe; its status says why.
                let _ = stdin.write_all(&payload);
            }
        });

        let waited = self.wait(&mut child, &backend.copy, cancel);
        let _ = writer.join();
        waited?;
        debug!(bytes = text.len(), backend = %backend.name, "clipboard written");
        Ok(())
    }

    fn wait(&self, child: &mut Child, tool: &Tool, cancel: &AtomicBool) -> Result<()> {
        let deadline = Instant::now() + self.timeout;
        loop {
            if let Some(status) = child.try_wait()? {
                if status.success() {
                    return Ok(());
                }
                return Err(ClipboardError::Command(format!("{} exited with {status}", tool.program)));
            }
            if cancel.load(Ordering::Relaxed) {
                kill(child);
                return Err(ClipboardError::Cancelled);
            }
            if Instant::now() >= deadline {
                kill(child);
                warn!(program = %tool.program, "clipboard tool timed out");
                return Err(ClipboardError::Timeout(self.timeout));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Default for Clipboard {
    fn default() -> Self {
        Self::detect()
    }
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

// ─── Tests ──────────────────────────────────────────────────────────────────
