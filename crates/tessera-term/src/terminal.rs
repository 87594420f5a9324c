// SPDX-License-Identifier: MIT
//
// Terminal: the façade tying the engine together.
//
// One `Terminal` owns:
//
//   - the render state (front/back buffers, dirty region, cursor, diff
//     renderer, output writer, mode flags) behind a single mutex. Holding
//     that mutex *is* having a frame open: `begin_frame` returns a `Frame`
//     that owns the guard, so at most one frame exists at a time and other
//     callers block until it is ended.
//   - the platform `Backend` (raw mode, size, resize notification).
//   - render metrics, off by default.
//   - an optional session recorder, attached and detached explicitly.
//   - resize subscribers, called outside every lock.
//
// Mode toggles (alternate screen, mouse, paste, focus, Kitty keyboard,
// cursor visibility and shape) are guarded by flags in the render state, so
// each escape is written once per actual transition.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::ansi::{self, CursorShape, MouseMode};
use crate::buffer::Buffer;
use crate::diff::{DiffRenderer, RenderStats};
use crate::dirty::DirtyRegion;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::metrics::{FrameSample, RenderMetrics};
use crate::recorder::{Recorder, RecorderConfig, RecordingSummary};

// ─── Size ───────────────────────────────────────────────────────────────────

/// Terminal dimensions in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Size {
    pub cols: u16,
    pub rows: u16,
}

impl Size {
    #[inline]
    #[must_use]
    pub const fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }

    #[inline]
    #[must_use]
    pub const fn area(self) -> u32 {
        self.cols as u32 * self.rows as u32
    }
}

// ─── Backend ────────────────────────────────────────────────────────────────

/// The platform capabilities the engine needs and nothing more.
pub trait Backend: Send + Sync {
    /// # Errors
    /// Returns the OS error when the terminal cannot be switched.
    fn enable_raw_mode(&self) -> io::Result<()>;

    /// # Errors
    /// Returns the OS error when the original mode cannot be restored.
    fn disable_raw_mode(&self) -> io::Result<()>;

    /// # Errors
    /// Returns the OS error when the size cannot be queried.
    fn size(&self) -> io::Result<Size>;

    /// Whether a resize happened since the last call. Consumes the signal.
    fn take_resize(&self) -> bool;
}

/// A `Backend` with no real terminal behind it, for tests and offscreen use.
///
/// The size is whatever `set_size` last stored; `set_size` also raises the
/// resize signal.
#[derive(Debug)]
pub struct HeadlessBackend {
    size: Mutex<Size>,
    raw: AtomicBool,
    resized: AtomicBool,
    fail_raw_mode: AtomicBool,
}

impl HeadlessBackend {
    #[must_use]
    pub const fn new(cols: u16, rows: u16) -> Self {
        Self {
            size: parking_lot::const_mutex(Size::new(cols, rows)),
            raw: AtomicBool::new(false),
            resized: AtomicBool::new(false),
            fail_raw_mode: AtomicBool::new(false),
        }
    }

    pub fn set_size(&self, cols: u16, rows: u16) {
        *self.size.lock() = Size::new(cols, rows);
        self.resized.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_raw(&self) -> bool {
        self.raw.load(Ordering::Acquire)
    }

    /// Make the next `enable_raw_mode` calls fail, to exercise error paths.
    pub fn fail_raw_mode(&self, fail: bool) {
        self.fail_raw_mode.store(fail, Ordering::Release);
    }
}

impl Backend for HeadlessBackend {
    fn enable_raw_mode(&self) -> io::Result<()> {
        if self.fail_raw_mode.load(Ordering::Acquire) {
            return Err(io::Error::new(io::ErrorKind::Unsupported, "raw mode unavailable"));
        }
        self.raw.store(true, Ordering::Release);
        Ok(())
    }

    fn disable_raw_mode(&self) -> io::Result<()> {
        self.raw.store(false, Ordering::Release);
        Ok(())
    }

    fn size(&self) -> io::Result<Size> {
        Ok(*self.size.lock())
    }

    fn take_resize(&self) -> bool {
        self.resized.swap(false, Ordering::AcqRel)
    }
}

impl<B: Backend + ?Sized> Backend for Arc<B> {
    fn enable_raw_mode(&self) -> io::Result<()> {
        (**self).enable_raw_mode()
    }
    fn disable_raw_mode(&self) -> io::Result<()> {
        (**self).disable_raw_mode()
    }
    fn size(&self) -> io::Result<Size> {
        (**self).size()
    }
    fn take_resize(&self) -> bool {
        (**self).take_resize()
    }
}

// ─── SharedWriter ───────────────────────────────────────────────────────────

/// A cloneable in-memory sink. Hand one clone to the terminal and keep the
/// other to inspect what was written.
#[derive(Debug, Clone, Default)]
pub struct SharedWriter {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far.
    #[must_use]
    pub fn contents(&self) -> Vec<u8> {
        self.inner.lock().clone()
    }

    /// Everything written so far, lossily decoded.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.inner.lock()).into_owned()
    }

    /// Drain the sink.
    pub fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.inner.lock())
    }
}

impl Write for SharedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ─── Configuration ──────────────────────────────────────────────────────────

/// What `Terminal::enter` switches on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalConfig {
    pub alt_screen: bool,
    pub hide_cursor: bool,
    pub mouse: Option<MouseMode>,
    pub bracketed_paste: bool,
    pub focus_reporting: bool,
    /// Kitty keyboard enhancement flags; `None` leaves the protocol off.
    pub kitty_keyboard: Option<u8>,
    /// Record render metrics from the start.
    pub metrics: bool,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            alt_screen: true,
            hide_cursor: true,
            mouse: Some(MouseMode::Drag),
            bracketed_paste: true,
            focus_reporting: true,
            kitty_keyboard: Some(1),
            metrics: false,
        }
    }
}

// ─── Render State ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Modes {
    alt_screen: bool,
    mouse: Option<MouseMode>,
    bracketed_paste: bool,
    focus_reporting: bool,
    kitty_keyboard: Option<u8>,
    cursor_visible: bool,
    cursor_shape: CursorShape,
}

impl Modes {
    const INITIAL: Self = Self {
        alt_screen: false,
        mouse: None,
        bracketed_paste: false,
        focus_reporting: false,
        kitty_keyboard: None,
        cursor_visible: true,
        cursor_shape: CursorShape::Default,
    };
}

/// Everything guarded by the frame lock.
pub(crate) struct RenderState {
    pub(crate) front: Buffer,
    pub(crate) back: Buffer,
    pub(crate) dirty: DirtyRegion,
    /// Where the cursor should sit after the frame; `None` leaves it alone.
    pub(crate) cursor: Option<(u16, u16)>,
    /// Cursor position last written to the terminal.
    flushed_cursor: Option<(u16, u16)>,
    renderer: DiffRenderer,
    out: Box<dyn Write + Send>,
    modes: Modes,
    closed: bool,
}

impl RenderState {
    fn write_raw(&mut self, f: impl FnOnce(&mut dyn Write) -> io::Result<()>) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        let mut buf = Vec::new();
        f(&mut buf)?;
        self.out.write_all(&buf)?;
        self.out.flush()?;
        // The terminal may have moved its cursor or dropped SGR state.
        self.renderer.reset_writer_state();
        Ok(())
    }
}

// ─── Terminal ───────────────────────────────────────────────────────────────

static NEXT_TERMINAL_ID: AtomicU64 = AtomicU64::new(1);

type ResizeCallback = Arc<dyn Fn(Size) + Send + Sync>;

/// Identifies a resize subscription for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Terminal handle. Share it across threads behind an `Arc`.
///
/// ```
/// use tessera_term::style::Style;
/// use tessera_term::terminal::{HeadlessBackend, SharedWriter, Terminal, TerminalConfig};
///
/// let out = SharedWriter::new();
/// let term = Terminal::new(HeadlessBackend::new(20, 4), out.clone(), TerminalConfig::default())?;
/// let mut frame = term.begin_frame()?;
/// frame.print(0, 0, "hello", &Style::new());
/// term.end_frame(frame)?;
/// assert!(out.text().contains("hello"));
/// # Ok::<(), tessera_term::Error>(())
/// ```
pub struct Terminal {
    id: u64,
    state: Mutex<RenderState>,
    backend: Box<dyn Backend>,
    config: TerminalConfig,
    active: AtomicBool,
    metrics: RenderMetrics,
    metrics_enabled: AtomicBool,
    recorder: Mutex<Option<Recorder>>,
    subscribers: Mutex<Vec<(SubscriptionId, ResizeCallback)>>,
    next_subscription: AtomicU64,
}

impl Terminal {
    /// Create a terminal over `backend`, writing to `out`.
    ///
    /// Nothing is written until [`enter`](Self::enter) or the first frame.
    ///
    /// # Errors
    ///
    /// Returns the backend's error if the size cannot be queried.
    pub fn new(
        backend: impl Backend + 'static,
        out: impl Write + Send + 'static,
        config: TerminalConfig,
    ) -> Result<Self> {
        let size = backend.size()?;
        Ok(Self {
            id: NEXT_TERMINAL_ID.fetch_add(1, Ordering::Relaxed),
            state: Mutex::new(RenderState {
                front: Buffer::new(size.cols, size.rows),
                back: Buffer::new(size.cols, size.rows),
                dirty: DirtyRegion::new(),
                cursor: None,
                flushed_cursor: None,
                renderer: DiffRenderer::new(),
                out: Box::new(out),
                modes: Modes::INITIAL,
                closed: false,
            }),
            backend: Box::new(backend),
            metrics_enabled: AtomicBool::new(config.metrics),
            config,
            active: AtomicBool::new(false),
            metrics: RenderMetrics::new(),
            recorder: Mutex::new(None),
            subscribers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
        })
    }

    /// A terminal on the process's stdin/stdout.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal size cannot be queried.
    #[cfg(unix)]
    pub fn stdio(config: TerminalConfig) -> Result<Self> {
        Self::new(crate::tty::TtyBackend::new(), io::stdout(), config)
    }

    #[inline]
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn size(&self) -> Size {
        let state = self.state.lock();
        Size::new(state.back.width(), state.back.height())
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────

    /// Switch to raw mode and turn on the configured terminal modes.
    ///
    /// If raw mode cannot be enabled nothing is written. Calling `enter`
    /// while active does nothing.
    ///
    /// # Errors
    ///
    /// Returns `Closed` after [`close`](Self::close), or the backend/output error.
    pub fn enter(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        if self.active.load(Ordering::Acquire) {
            return Ok(());
        }
        self.backend.enable_raw_mode()?;
        let config = self.config.clone();
        let applied = (|| {
            if config.alt_screen {
                self.set_alt_screen(true)?;
            }
            if config.hide_cursor {
                self.set_cursor_visible(false)?;
            }
            self.set_mouse(config.mouse)?;
            self.set_bracketed_paste(config.bracketed_paste)?;
            self.set_focus_reporting(config.focus_reporting)?;
            self.set_kitty_keyboard(config.kitty_keyboard)
        })();
        if let Err(err) = applied {
            let _ = self.backend.disable_raw_mode();
            return Err(err);
        }
        self.state.lock().renderer.invalidate();
        self.active.store(true, Ordering::Release);
        debug!(terminal = self.id, "entered terminal mode");
        Ok(())
    }

    /// Turn every mode off again and leave raw mode.
    ///
    /// # Errors
    ///
    /// Returns the output or backend error.
    pub fn leave(&self) -> Result<()> {
        if !self.active.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        let restored = self.restore_modes();
        self.backend.disable_raw_mode()?;
        debug!(terminal = self.id, "left terminal mode");
        restored
    }

    fn restore_modes(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Ok(());
        }
        let modes = state.modes;
        state.write_raw(|w| {
            ansi::end_sync(w)?;
            if modes.focus_reporting {
                ansi::disable_focus_reporting(w)?;
            }
            if modes.bracketed_paste {
                ansi::disable_bracketed_paste(w)?;
            }
            if modes.kitty_keyboard.is_some() {
                ansi::disable_kitty_keyboard(w)?;
            }
            if modes.mouse.is_some() {
                ansi::disable_mouse(w)?;
            }
            ansi::reset(w)?;
            if modes.cursor_shape != CursorShape::Default {
                ansi::set_cursor_shape(w, CursorShape::Default)?;
            }
            if !modes.cursor_visible {
                ansi::cursor_show(w)?;
            }
            if modes.alt_screen {
                ansi::exit_alt_screen(w)?;
            }
            Ok(())
        })?;
        state.modes = Modes::INITIAL;
        Ok(())
    }

    /// Restore the terminal and refuse all further output.
    ///
    /// Later frames and toggles fail with [`Error::Closed`]. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns the error from restoring the terminal, if any.
    pub fn close(&self) -> Result<()> {
        let left = self.leave();
        let mut state = self.state.lock();
        if !state.closed {
            let _ = state.out.flush();
            state.closed = true;
            debug!(terminal = self.id, "terminal output closed");
        }
        left
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    // ─── Frames ──────────────────────────────────────────────────────────

    /// Open a frame on the back buffer. Blocks while another frame is open.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if output is closed.
    pub fn begin_frame(&self) -> Result<Frame<'_>> {
        let guard = self.state.lock();
        if guard.closed {
            return Err(Error::Closed);
        }
        Ok(Frame::new(guard, self.id))
    }

    /// Diff, write and release a frame.
    ///
    /// A frame that drew nothing writes nothing and counts as skipped.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidFrame`] for a frame from another terminal,
    /// [`Error::Closed`] if output was closed, or the output error.
    pub fn end_frame(&self, frame: Frame<'_>) -> Result<RenderStats> {
        if frame.owner() != self.id {
            return Err(Error::InvalidFrame);
        }
        let started = frame.started();
        let mut state = frame.into_guard();
        if state.closed {
            return Err(Error::Closed);
        }

        let RenderState {
            front,
            back,
            dirty,
            renderer,
            ..
        } = &mut *state;
        let mut stats = renderer.render(front, back, dirty);
        dirty.clear();

        let cursor = state.cursor;
        if cursor != state.flushed_cursor || !stats.skipped {
            if let Some((x, y)) = cursor {
                ansi::cursor_to(state.renderer.output_mut(), x, y)?;
                stats.escape_codes += 1;
            }
            state.flushed_cursor = cursor;
        }
        stats.bytes = state.renderer.output_bytes().len() as u64;

        let output = (!state.renderer.output_bytes().is_empty())
            .then(|| String::from_utf8_lossy(state.renderer.output_bytes()).into_owned());
        let RenderState { renderer, out, .. } = &mut *state;
        if let Err(err) = renderer.flush_to(out.as_mut()) {
            // The front buffer already holds this frame; repaint it all next time.
            renderer.invalidate();
            state.flushed_cursor = None;
            return Err(err.into());
        }

        // Recorded under the state lock so output events keep write order.
        if let Some(output) = output {
            if let Some(recorder) = self.recorder.lock().as_ref() {
                recorder.record_output(&output);
            }
        }
        drop(state);

        if self.metrics_enabled.load(Ordering::Relaxed) {
            if stats.skipped {
                self.metrics.record_skipped();
            } else {
                self.metrics.record_frame(FrameSample {
                    duration: started.elapsed(),
                    cells: stats.cells,
                    escape_codes: stats.escape_codes,
                    bytes: stats.bytes,
                    dirty_area: stats.dirty_area,
                });
            }
        }
        trace!(
            cells = stats.cells,
            codes = stats.escape_codes,
            bytes = stats.bytes,
            skipped = stats.skipped,
            "frame"
        );
        Ok(stats)
    }

    /// Where the next frame will leave the cursor.
    #[must_use]
    pub fn cursor(&self) -> Option<(u16, u16)> {
        self.state.lock().cursor
    }

    /// Repaint every cell on the next frame.
    pub fn invalidate(&self) {
        self.state.lock().renderer.invalidate();
    }

    // ─── Mode Toggles ────────────────────────────────────────────────────

    fn toggle<T: PartialEq + Copy>(
        &self,
        want: T,
        get: impl Fn(&Modes) -> T,
        set: impl Fn(&mut Modes, T),
        emit: impl FnOnce(&mut dyn Write, T, T) -> io::Result<()>,
    ) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(Error::Closed);
        }
        let current = get(&state.modes);
        if current == want {
            return Ok(());
        }
        state.write_raw(|w| emit(w, current, want))?;
        set(&mut state.modes, want);
        Ok(())
    }

    /// # Errors
    /// [`Error::Closed`] or the output error.
    pub fn set_alt_screen(&self, on: bool) -> Result<()> {
        self.toggle(on, |m| m.alt_screen, |m, v| m.alt_screen = v, |w, _, on| {
            if on {
                ansi::enter_alt_screen(w)
            } else {
                ansi::exit_alt_screen(w)
            }
        })?;
        self.invalidate();
        Ok(())
    }

    /// Set mouse tracking; `None` turns it off.
    ///
    /// # Errors
    /// [`Error::Closed`] or the output error.
    pub fn set_mouse(&self, mode: Option<MouseMode>) -> Result<()> {
        self.toggle(mode, |m| m.mouse, |m, v| m.mouse = v, |w, old, new| {
            if old.is_some() {
                ansi::disable_mouse(w)?;
            }
            match new {
                Some(mode) => ansi::enable_mouse(w, mode),
                None => Ok(()),
            }
        })
    }

    /// # Errors
    /// [`Error::Closed`] or the output error.
    pub fn set_bracketed_paste(&self, on: bool) -> Result<()> {
        self.toggle(on, |m| m.bracketed_paste, |m, v| m.bracketed_paste = v, |w, _, on| {
            if on {
                ansi::enable_bracketed_paste(w)
            } else {
                ansi::disable_bracketed_paste(w)
            }
        })
    }

    /// # Errors
    /// [`Error::Closed`] or the output error.
    pub fn set_focus_reporting(&self, on: bool) -> Result<()> {
        self.toggle(on, |m| m.focus_reporting, |m, v| m.focus_reporting = v, |w, _, on| {
            if on {
                ansi::enable_focus_reporting(w)
            } else {
                ansi::disable_focus_reporting(w)
            }
        })
    }

    /// Push Kitty keyboard flags, or pop them with `None`.
    ///
    /// # Errors
    /// [`Error::Closed`] or the output error.
    pub fn set_kitty_keyboard(&self, flags: Option<u8>) -> Result<()> {
        self.toggle(flags, |m| m.kitty_keyboard, |m, v| m.kitty_keyboard = v, |w, old, new| {
            if old.is_some() {
                ansi::disable_kitty_keyboard(w)?;
            }
            match new {
                Some(flags) => ansi::enable_kitty_keyboard(w, flags),
                None => Ok(()),
            }
        })
    }

    /// # Errors
    /// [`Error::Closed`] or the output error.
    pub fn set_cursor_visible(&self, visible: bool) -> Result<()> {
        self.toggle(visible, |m| m.cursor_visible, |m, v| m.cursor_visible = v, |w, _, on| {
            if on {
                ansi::cursor_show(w)
            } else {
                ansi::cursor_hide(w)
            }
        })
    }

    /// # Errors
    /// [`Error::Closed`] or the output error.
    pub fn set_cursor_shape(&self, shape: CursorShape) -> Result<()> {
        self.toggle(shape, |m| m.cursor_shape, |m, v| m.cursor_shape = v, |w, _, shape| {
            ansi::set_cursor_shape(w, shape)
        })
    }

    /// Set the pointer shape (OSC 22). Not deduplicated; callers such as
    /// the mouse engine only call this on hint changes.
    ///
    /// # Errors
    /// [`Error::Closed`] or the output error.
    pub fn set_pointer_shape(&self, name: &str) -> Result<()> {
        self.state.lock().write_raw(|w| ansi::set_pointer_shape(w, name))
    }

    /// Copy `text` to the clipboard through the terminal (OSC 52).
    ///
    /// # Errors
    /// [`Error::ClipboardTooLarge`] past [`ansi::MAX_OSC52_PAYLOAD`],
    /// [`Error::Closed`], or the output error.
    pub fn copy_to_clipboard(&self, text: &str) -> Result<()> {
        let len = ansi::osc52_payload_len(text);
        if len > ansi::MAX_OSC52_PAYLOAD {
            return Err(Error::ClipboardTooLarge {
                len,
                max: ansi::MAX_OSC52_PAYLOAD,
            });
        }
        self.state.lock().write_raw(|w| ansi::set_clipboard(w, text))
    }

    /// Ask the terminal for its cursor position; the answer arrives as
    /// `Event::CursorPosition` on the input side.
    ///
    /// # Errors
    /// [`Error::Closed`] or the output error.
    pub fn request_cursor_position(&self) -> Result<()> {
        self.state.lock().write_raw(|w| ansi::request_cursor_position(w))
    }

    // ─── Resize ──────────────────────────────────────────────────────────

    /// Resize both buffers, keeping the overlapping region, and notify
    /// subscribers. Same size is a no-op.
    pub fn resize(&self, size: Size) {
        {
            let mut state = self.state.lock();
            if state.back.width() == size.cols && state.back.height() == size.rows {
                return;
            }
            state.back.resize(size.cols, size.rows);
            state.front.resize(size.cols, size.rows);
            state.dirty.clear();
            state.renderer.invalidate();
            if state
                .cursor
                .is_some_and(|(x, y)| x >= size.cols || y >= size.rows)
            {
                state.cursor = None;
            }
        }
        debug!(cols = size.cols, rows = size.rows, "terminal resized");

        let callbacks: Vec<ResizeCallback> = self
            .subscribers
            .lock()
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for cb in callbacks {
            cb(size);
        }
    }

    /// Apply a pending backend resize, if any.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the new size cannot be queried.
    pub fn poll_resize(&self) -> Result<Option<Size>> {
        if !self.backend.take_resize() {
            return Ok(None);
        }
        let size = self.backend.size()?;
        self.resize(size);
        Ok(Some(size))
    }

    /// Call `callback` with the new size after every resize.
    pub fn on_resize(&self, callback: impl Fn(Size) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.subscribers.lock().push((id, Arc::new(callback)));
        id
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub fn remove_resize_subscription(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscribers.lock();
        let before = subs.len();
        subs.retain(|(sid, _)| *sid != id);
        if subs.len() == before {
            warn!(?id, "resize subscription not found");
            false
        } else {
            true
        }
    }

    #[must_use]
    pub fn resize_subscriptions(&self) -> usize {
        self.subscribers.lock().len()
    }

    // ─── Metrics ─────────────────────────────────────────────────────────

    pub fn enable_metrics(&self, on: bool) {
        self.metrics_enabled.store(on, Ordering::Relaxed);
    }

    #[must_use]
    pub fn metrics_enabled(&self) -> bool {
        self.metrics_enabled.load(Ordering::Relaxed)
    }

    #[must_use]
    pub const fn metrics(&self) -> &RenderMetrics {
        &self.metrics
    }

    // ─── Recording ───────────────────────────────────────────────────────

    /// Start recording the session. A zero width or height in `config`
    /// takes the current terminal size.
    ///
    /// On error nothing is attached.
    ///
    /// # Errors
    ///
    /// [`Error::RecordingActive`] if already recording, or the file error.
    ///
    /// The next frame repaints the whole screen so the recording starts
    /// from a complete picture.
    pub fn start_recording(&self, mut config: RecorderConfig) -> Result<()> {
        // Lock order: state, then recorder (as in `end_frame`).
        let mut state = self.state.lock();
        let mut slot = self.recorder.lock();
        if slot.is_some() {
            return Err(Error::RecordingActive);
        }
        if config.width == 0 {
            config.width = state.back.width();
        }
        if config.height == 0 {
            config.height = state.back.height();
        }
        let recorder = Recorder::start(config)?;
        *slot = Some(recorder);
        state.renderer.invalidate();
        state.flushed_cursor = None;
        Ok(())
    }

    /// # Errors
    /// [`Error::NotRecording`] when no recording is attached.
    pub fn pause_recording(&self) -> Result<()> {
        self.recorder
            .lock()
            .as_ref()
            .map(Recorder::pause)
            .ok_or(Error::NotRecording)
    }

    /// # Errors
    /// [`Error::NotRecording`] when no recording is attached.
    pub fn resume_recording(&self) -> Result<()> {
        self.recorder
            .lock()
            .as_ref()
            .map(Recorder::resume)
            .ok_or(Error::NotRecording)
    }

    /// Detach and finish the recording.
    ///
    /// # Errors
    ///
    /// [`Error::NotRecording`], or the first write error seen while recording.
    pub fn stop_recording(&self) -> Result<RecordingSummary> {
        let recorder = self.recorder.lock().take().ok_or(Error::NotRecording)?;
        recorder.stop()
    }

    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.recorder.lock().is_some()
    }

    /// Record input bytes if a recording is attached.
    pub fn record_input(&self, data: &[u8]) {
        if let Some(recorder) = self.recorder.lock().as_ref() {
            recorder.record_input(&String::from_utf8_lossy(data));
        }
    }

    /// Environment variables worth putting in a recording header.
    #[must_use]
    pub fn recording_env() -> BTreeMap<String, String> {
        ["SHELL", "TERM"]
            .into_iter()
            .filter_map(|k| std::env::var(k).ok().map(|v| (k.to_owned(), v)))
            .collect()
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        if self.active.load(Ordering::Acquire) {
            let _ = self.leave();
        }
        if let Some(recorder) = self.recorder.get_mut().take() {
            if let Err(err) = recorder.stop() {
                warn!(%err, "recording failed while closing terminal");
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::Style;
    use std::sync::atomic::AtomicUsize;

    fn headless(cols: u16, rows: u16) -> (Terminal, SharedWriter, Arc<HeadlessBackend>) {
        let out = SharedWriter::new();
        let backend = Arc::new(HeadlessBackend::new(cols, rows));
        let term = Terminal::new(Arc::clone(&backend), out.clone(), TerminalConfig::default()).unwrap();
        (term, out, backend)
    }

    // ── Size ────────────────────────────────────────────────────────────

    #[test]
    fn size_area() {
        assert_eq!(Size::new(80, 24).area(), 1920);
        assert_eq!(Size::new(0, 24).area(), 0);
    }

    #[test]
    fn size_comes_from_backend() {
        let (term, _, _) = headless(100, 30);
        assert_eq!(term.size(), Size::new(100, 30));
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    #[test]
    fn enter_enables_raw_mode_and_modes_once() {
        let (term, out, backend) = headless(10, 3);
        term.enter().unwrap();
        term.enter().unwrap();
        assert!(backend.is_raw());
        let s = out.text();
        assert_eq!(s.matches("\x1b[?1049h").count(), 1);
        assert!(s.contains("\x1b[?25l"));
        assert!(s.contains("\x1b[?2004h"));
        assert!(s.contains("\x1b[>1u"));
    }

    #[test]
    fn enter_failure_writes_nothing() {
        let (term, out, backend) = headless(10, 3);
        backend.fail_raw_mode(true);
        assert!(matches!(term.enter(), Err(Error::Io(_))));
        assert!(out.contents().is_empty());
        assert!(!term.is_active());
    }

    #[test]
    fn leave_restores_everything() {
        let (term, out, backend) = headless(10, 3);
        term.enter().unwrap();
        out.take();
        term.leave().unwrap();
        assert!(!backend.is_raw());
        let s = out.text();
        assert!(s.contains("\x1b[?2004l"));
        assert!(s.contains("\x1b[?25h"));
        assert!(s.ends_with("\x1b[?1049l"));
        term.leave().unwrap();
    }

    #[test]
    fn closed_terminal_refuses_output() {
        let (term, _, _) = headless(10, 3);
        term.close().unwrap();
        term.close().unwrap();
        assert!(matches!(term.begin_frame(), Err(Error::Closed)));
        assert!(matches!(term.set_bracketed_paste(true), Err(Error::Closed)));
        assert!(matches!(term.enter(), Err(Error::Closed)));
    }

    // ── Toggles ─────────────────────────────────────────────────────────

    #[test]
    fn toggles_write_only_on_transition() {
        let (term, out, _) = headless(10, 3);
        term.set_bracketed_paste(true).unwrap();
        term.set_bracketed_paste(true).unwrap();
        term.set_bracketed_paste(false).unwrap();
        term.set_bracketed_paste(false).unwrap();
        assert_eq!(out.text(), "\x1b[?2004h\x1b[?2004l");
    }

    #[test]
    fn mouse_mode_change_disables_first() {
        let (term, out, _) = headless(10, 3);
        term.set_mouse(Some(MouseMode::Click)).unwrap();
        out.take();
        term.set_mouse(Some(MouseMode::Motion)).unwrap();
        let s = out.text();
        assert!(s.starts_with("\x1b[?1006l"));
        assert!(s.contains("\x1b[?1003h"));
    }

    #[test]
    fn cursor_shape_is_deduplicated() {
        let (term, out, _) = headless(10, 3);
        term.set_cursor_shape(CursorShape::SteadyBar).unwrap();
        term.set_cursor_shape(CursorShape::SteadyBar).unwrap();
        assert_eq!(out.text(), "\x1b[6 q");
    }

    #[test]
    fn clipboard_copy_goes_out_as_osc52() {
        let (term, out, _) = headless(10, 2);
        term.copy_to_clipboard("hi").unwrap();
        assert_eq!(out.text(), "\x1b]52;c;aGk=\x07");

        let huge = "x".repeat(ansi::MAX_OSC52_PAYLOAD);
        assert!(matches!(
            term.copy_to_clipboard(&huge),
            Err(Error::ClipboardTooLarge { .. })
        ));
        term.close().unwrap();
        assert!(matches!(term.copy_to_clipboard("hi"), Err(Error::Closed)));
    }

    // ── Frames ──────────────────────────────────────────────────────────

    #[test]
    fn frame_output_reaches_writer() {
        let (term, out, _) = headless(20, 2);
        let mut frame = term.begin_frame().unwrap();
        frame.print(0, 0, "hello", &Style::new());
        let stats = term.end_frame(frame).unwrap();
        assert!(!stats.skipped);
        assert!(out.text().contains("hello"));
    }

    #[test]
    fn second_empty_frame_is_skipped_and_silent() {
        let (term, out, _) = headless(20, 2);
        let frame = term.begin_frame().unwrap();
        term.end_frame(frame).unwrap();
        out.take();
        let frame = term.begin_frame().unwrap();
        let stats = term.end_frame(frame).unwrap();
        assert!(stats.skipped);
        assert!(out.contents().is_empty());
    }

    #[test]
    fn foreign_frame_is_rejected() {
        let (a, _, _) = headless(5, 1);
        let (b, _, _) = headless(5, 1);
        let frame = b.begin_frame().unwrap();
        assert!(matches!(a.end_frame(frame), Err(Error::InvalidFrame)));
        // The foreign frame's lock was released with it.
        let frame = b.begin_frame().unwrap();
        b.end_frame(frame).unwrap();
    }

    #[test]
    fn frames_serialize_across_threads() {
        let (term, _, _) = headless(10, 1);
        let term = Arc::new(term);
        let handles: Vec<_> = (0..4u16)
            .map(|i| {
                let term = Arc::clone(&term);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        let mut frame = term.begin_frame().unwrap();
                        frame.print(i, 0, "x", &Style::new());
                        term.end_frame(frame).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn cursor_placement_written_after_frame() {
        let (term, out, _) = headless(10, 3);
        let mut frame = term.begin_frame().unwrap();
        frame.set_cursor(4, 2);
        term.end_frame(frame).unwrap();
        assert!(out.text().ends_with("\x1b[3;5H"));
        assert_eq!(term.cursor(), Some((4, 2)));
    }

    #[test]
    fn frame_bytes_include_cursor_placement() {
        let (term, out, _) = headless(10, 3);
        let mut frame = term.begin_frame().unwrap();
        frame.print(0, 0, "hi", &Style::new());
        frame.set_cursor(4, 2);
        let stats = term.end_frame(frame).unwrap();
        assert_eq!(stats.bytes, out.contents().len() as u64);
    }

    /// A writer that fails while `fail` is set.
    struct Flaky {
        inner: SharedWriter,
        fail: Arc<AtomicBool>,
    }

    impl Write for Flaky {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(io::Error::other("disk full"));
            }
            self.inner.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_flush_repaints_on_the_next_frame() {
        let out = SharedWriter::new();
        let fail = Arc::new(AtomicBool::new(false));
        let writer = Flaky {
            inner: out.clone(),
            fail: Arc::clone(&fail),
        };
        let term = Terminal::new(HeadlessBackend::new(10, 2), writer, TerminalConfig::default()).unwrap();

        let mut frame = term.begin_frame().unwrap();
        frame.print(0, 0, "abc", &Style::new());
        term.end_frame(frame).unwrap();

        fail.store(true, Ordering::SeqCst);
        let mut frame = term.begin_frame().unwrap();
        frame.print(0, 0, "X", &Style::new());
        assert!(matches!(term.end_frame(frame), Err(Error::Io(_))));

        fail.store(false, Ordering::SeqCst);
        out.take();
        let frame = term.begin_frame().unwrap();
        let stats = term.end_frame(frame).unwrap();
        assert!(!stats.skipped);
        assert!(out.text().contains("Xbc"));
    }

    // ── Resize ──────────────────────────────────────────────────────────

    #[test]
    fn resize_notifies_subscribers_and_preserves_content() {
        let (term, _, backend) = headless(10, 3);
        let mut frame = term.begin_frame().unwrap();
        frame.print(0, 0, "abc", &Style::new());
        term.end_frame(frame).unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let id = term.on_resize(move |size| {
            assert_eq!(size, Size::new(5, 2));
            seen.fetch_add(1, Ordering::SeqCst);
        });
        backend.set_size(5, 2);
        assert_eq!(term.poll_resize().unwrap(), Some(Size::new(5, 2)));
        assert_eq!(term.poll_resize().unwrap(), None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(term.size(), Size::new(5, 2));

        let frame = term.begin_frame().unwrap();
        assert_eq!(frame.back().row_text(0), "abc  ");
        term.end_frame(frame).unwrap();

        assert!(term.remove_resize_subscription(id));
        assert!(!term.remove_resize_subscription(id));
    }

    #[test]
    fn resize_subscriber_may_use_the_terminal() {
        let (term, _, _) = headless(10, 3);
        let term = Arc::new(term);
        let weak = Arc::downgrade(&term);
        term.on_resize(move |_| {
            if let Some(t) = weak.upgrade() {
                let frame = t.begin_frame().unwrap();
                t.end_frame(frame).unwrap();
            }
        });
        term.resize(Size::new(4, 4));
        assert_eq!(term.size(), Size::new(4, 4));
    }

    #[test]
    fn resize_drops_out_of_range_cursor() {
        let (term, _, _) = headless(10, 3);
        let mut frame = term.begin_frame().unwrap();
        frame.set_cursor(9, 2);
        term.end_frame(frame).unwrap();
        term.resize(Size::new(5, 5));
        assert_eq!(term.cursor(), None);
        let mut frame = term.begin_frame().unwrap();
        frame.print(9, 2, "clipped", &Style::new());
        term.end_frame(frame).unwrap();
    }

    // ── Metrics ─────────────────────────────────────────────────────────

    #[test]
    fn metrics_off_by_default() {
        let (term, _, _) = headless(5, 1);
        let frame = term.begin_frame().unwrap();
        term.end_frame(frame).unwrap();
        assert_eq!(term.metrics().snapshot().total_frames(), 0);
    }

    #[test]
    fn metrics_count_rendered_and_skipped() {
        let (term, _, _) = headless(5, 1);
        term.enable_metrics(true);
        let mut frame = term.begin_frame().unwrap();
        frame.print(0, 0, "a", &Style::new());
        term.end_frame(frame).unwrap();
        for _ in 0..2 {
            let frame = term.begin_frame().unwrap();
            term.end_frame(frame).unwrap();
        }
        let snap = term.metrics().snapshot();
        assert_eq!(snap.frames, 1);
        assert_eq!(snap.skipped_frames, 2);
        assert!((snap.efficiency() - 66.67).abs() < 0.01);
    }

    // ── Recording ───────────────────────────────────────────────────────

    #[test]
    fn recording_lifecycle_errors() {
        let (term, _, _) = headless(5, 1);
        assert!(matches!(term.pause_recording(), Err(Error::NotRecording)));
        assert!(matches!(term.stop_recording(), Err(Error::NotRecording)));
        term.record_input(b"ignored");
    }

    #[test]
    fn failed_recording_start_attaches_nothing() {
        let (term, _, _) = headless(5, 1);
        let config = RecorderConfig::new("/nonexistent-dir/for/sure/rec.cast");
        assert!(matches!(term.start_recording(config), Err(Error::Io(_))));
        assert!(!term.is_recording());
    }

    #[test]
    fn recording_captures_frames_and_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.cast");
        let (term, _, _) = headless(12, 2);
        term.start_recording(RecorderConfig::new(&path)).unwrap();
        assert!(matches!(
            term.start_recording(RecorderConfig::new(&path)),
            Err(Error::RecordingActive)
        ));
        let mut frame = term.begin_frame().unwrap();
        frame.print(0, 0, "recorded", &Style::new());
        term.end_frame(frame).unwrap();
        term.record_input(b"q");
        let summary = term.stop_recording().unwrap();
        assert_eq!(summary.events, 2);

        let (header, events) = crate::recorder::read_recording(&path).unwrap();
        assert_eq!((header.width, header.height), (12, 2));
        assert!(events[0].data.contains("recorded"));
        assert_eq!(events[1].data, "q");
    }

    #[test]
    fn recording_started_mid_session_begins_with_the_whole_screen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("late.cast");
        let (term, _, _) = headless(20, 2);
        let mut frame = term.begin_frame().unwrap();
        frame.print(0, 0, "hello world", &Style::new());
        term.end_frame(frame).unwrap();

        term.start_recording(RecorderConfig::new(&path)).unwrap();
        let mut frame = term.begin_frame().unwrap();
        frame.print(0, 1, "x", &Style::new());
        term.end_frame(frame).unwrap();
        term.stop_recording().unwrap();

        let (_, events) = crate::recorder::read_recording(&path).unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].data.contains("hello world"));
        assert!(events[0].data.contains('x'));
    }

    #[test]
    fn recorded_output_follows_write_order_across_threads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("order.cast");
        let (term, out, _) = headless(40, 2);
        term.start_recording(RecorderConfig::new(&path).with_redaction(false))
            .unwrap();
        let term = Arc::new(term);

        let handles: Vec<_> = (0..2u16)
            .map(|row| {
                let term = Arc::clone(&term);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let mut frame = term.begin_frame().unwrap();
                        frame.print(0, row, &format!("thread {row} frame {i:02}"), &Style::new());
                        term.end_frame(frame).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        term.stop_recording().unwrap();

        let (_, events) = crate::recorder::read_recording(&path).unwrap();
        let recorded: String = events.iter().map(|e| e.data.as_str()).collect();
        assert_eq!(recorded, out.text());
    }
}
