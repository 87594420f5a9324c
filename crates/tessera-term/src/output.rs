// SPDX-License-Identifier: MIT
//
// Output buffering and stateful cell rendering.
//
//   OutputBuffer: collects a whole frame in memory so it reaches the
//   terminal as one write.
//
//   CellWriter: remembers what the terminal's cursor, SGR state and open
//   hyperlink currently are, and emits only the escapes needed to move from
//   there to the next cell. It also counts escape sequences so frame metrics
//   can report them.

use std::io::{self, Write};
use std::sync::Arc;

use crate::ansi;
use crate::cell::Cell;
use crate::style::Style;

// ─── OutputBuffer ────────────────────────────────────────────────────────────

const DEFAULT_CAPACITY: usize = 16_384;

/// Frame-sized byte buffer. `flush` on the `Write` impl is a no-op; the
/// terminal drains it with [`OutputBuffer::flush_to`].
pub struct OutputBuffer {
    buf: Vec<u8>,
}

impl OutputBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(DEFAULT_CAPACITY),
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Append a character as UTF-8.
    #[inline]
    pub fn write_char(&mut self, ch: char) {
        let mut enc = [0u8; 4];
        self.buf.extend_from_slice(ch.encode_utf8(&mut enc).as_bytes());
    }

    #[inline]
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Write everything to `w` in one call and clear.
    ///
    /// # Errors
    ///
    /// Returns the writer's error. The buffer is cleared either way so a
    /// failed frame is not replayed into the next one.
    pub fn flush_to(&mut self, w: &mut (impl Write + ?Sized)) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let result = w.write_all(&self.buf).and_then(|()| w.flush());
        self.buf.clear();
        result
    }
}

impl Write for OutputBuffer {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// ─── CellWriter ──────────────────────────────────────────────────────────────

/// Tracks terminal state to skip redundant escapes.
///
/// - **Cursor**: no move when the next cell is where the terminal's cursor
///   already is. A wide character advances the cursor by two.
/// - **Style**: when attributes are unchanged only the differing color is
///   sent; otherwise one combined `SGR 0;…` re-establishes the whole style.
/// - **Hyperlink**: a link stays open across consecutive cells with the same
///   target and is closed on change and at frame end.
/// - **Continuations** are never written; the owner already covered them.
#[allow(clippy::struct_field_names)]
pub struct CellWriter {
    last_x: i32,
    last_y: i32,
    last_style: Option<Style>,
    open_link: Option<Arc<str>>,
    escape_codes: u64,
}

impl CellWriter {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_x: -1,
            last_y: -1,
            last_style: None,
            open_link: None,
            escape_codes: 0,
        }
    }

    /// Forget tracked terminal state (after a clear or external output).
    ///
    /// The escape-code counter is kept.
    pub fn reset_state(&mut self) {
        self.last_x = -1;
        self.last_y = -1;
        self.last_style = None;
        self.open_link = None;
    }

    /// Escape sequences emitted since the last [`take_escape_codes`](Self::take_escape_codes).
    #[inline]
    #[must_use]
    pub const fn escape_codes(&self) -> u64 {
        self.escape_codes
    }

    /// Read and zero the escape-code counter.
    pub const fn take_escape_codes(&mut self) -> u64 {
        let n = self.escape_codes;
        self.escape_codes = 0;
        n
    }

    /// Count escapes written by a caller directly through `ansi`.
    pub const fn count_escapes(&mut self, n: u64) {
        self.escape_codes += n;
    }

    /// Emit one cell at `(x, y)`.
    pub fn render_cell(&mut self, out: &mut OutputBuffer, x: u16, y: u16, cell: &Cell) {
        let xi = i32::from(x);
        let yi = i32::from(y);

        if cell.continuation {
            return;
        }

        if yi != self.last_y || xi != self.last_x + 1 {
            ansi::cursor_to(out, x, y).ok();
            self.escape_codes += 1;
        }

        self.apply_link(out, cell.style.link.as_ref());
        self.apply_style(out, &cell.style);

        out.write_char(cell.ch);

        self.last_x = xi + i32::from(cell.width.max(1)) - 1;
        self.last_y = yi;
    }

    fn apply_link(&mut self, out: &mut OutputBuffer, link: Option<&Arc<str>>) {
        if self.open_link.as_ref() == link {
            return;
        }
        if self.open_link.take().is_some() {
            ansi::hyperlink_close(out).ok();
            self.escape_codes += 1;
        }
        if let Some(url) = link {
            ansi::hyperlink_open(out, url).ok();
            self.escape_codes += 1;
            self.open_link = Some(Arc::clone(url));
        }
    }

    fn apply_style(&mut self, out: &mut OutputBuffer, style: &Style) {
        match &self.last_style {
            Some(last) if last.same_sgr(style) => {}
            Some(last) if last.attrs == style.attrs => {
                if last.foreground() != style.foreground() {
                    ansi::fg(out, style.foreground()).ok();
                    self.escape_codes += 1;
                }
                if last.background() != style.background() {
                    ansi::bg(out, style.background()).ok();
                    self.escape_codes += 1;
                }
            }
            _ => {
                ansi::sgr(out, style).ok();
                self.escape_codes += 1;
            }
        }
        self.last_style = Some(style.without_link());
    }

    /// Close any open link and return SGR to the default.
    pub fn finish(&mut self, out: &mut OutputBuffer) {
        self.apply_link(out, None);
        if self.last_style.as_ref().is_none_or(|s| !s.is_empty()) {
            ansi::reset(out).ok();
            self.escape_codes += 1;
        }
        self.last_style = Some(Style::new());
    }
}

impl Default for CellWriter {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
