// SPDX-License-Identifier: MIT
//
// ANSI escape sequence generation.
//
// Pure functions that write escape sequences to any `impl Write`. No state,
// no decisions about when to emit. `CellWriter` decides what changed, and
// `Terminal` guards mode toggles so each transition is written once. This
// module only knows the byte-level encoding.
//
// Cursor positions are 0-indexed in our API and converted to the 1-indexed
// form the terminal expects.

use std::io::{self, Write};

use base64::{Engine as _, engine::general_purpose::STANDARD};

use crate::color::Color;
use crate::style::{Attr, Style};

// ─── Cursor ──────────────────────────────────────────────────────────────────

/// Move the cursor to `(x, y)` (CUP).
#[inline]
pub fn cursor_to(w: &mut (impl Write + ?Sized), x: u16, y: u16) -> io::Result<()> {
    write!(w, "\x1b[{};{}H", u32::from(y) + 1, u32::from(x) + 1)
}

/// Hide the cursor (DECTCEM reset).
#[inline]
pub fn cursor_hide(w: &mut (impl Write + ?Sized)) -> io::Result<()> {
    w.write_all(b"\x1b[?25l")
}

/// Show the cursor (DECTCEM set).
#[inline]
pub fn cursor_show(w: &mut (impl Write + ?Sized)) -> io::Result<()> {
    w.write_all(b"\x1b[?25h")
}

/// Save cursor position and attributes (DECSC).
#[inline]
pub fn cursor_save(w: &mut (impl Write + ?Sized)) -> io::Result<()> {
    w.write_all(b"\x1b7")
}

/// Restore what [`cursor_save`] stored (DECRC).
#[inline]
pub fn cursor_restore(w: &mut (impl Write + ?Sized)) -> io::Result<()> {
    w.write_all(b"\x1b8")
}

/// Ask the terminal to report the cursor position (DSR 6).
///
/// The reply arrives on input as `ESC [ row ; col R`.
#[inline]
pub fn request_cursor_position(w: &mut (impl Write + ?Sized)) -> io::Result<()> {
    w.write_all(b"\x1b[6n")
}

// ─── Screen ──────────────────────────────────────────────────────────────────

/// Clear the entire screen (ED 2).
#[inline]
pub fn clear_screen(w: &mut (impl Write + ?Sized)) -> io::Result<()> {
    w.write_all(b"\x1b[2J")
}

/// Reset all SGR attributes (SGR 0).
#[inline]
pub fn reset(w: &mut (impl Write + ?Sized)) -> io::Result<()> {
    w.write_all(b"\x1b[0m")
}

// ─── Colors ──────────────────────────────────────────────────────────────────

/// Write the SGR parameters for a foreground color, without the CSI framing.
fn fg_params(w: &mut (impl Write + ?Sized), color: Color) -> io::Result<()> {
    match color {
        Color::Default => w.write_all(b"39"),
        Color::Ansi(c) => write!(w, "{}", c.fg_code()),
        Color::Rgb(c) => write!(w, "38;2;{};{};{}", c.r, c.g, c.b),
    }
}

/// Write the SGR parameters for a background color, without the CSI framing.
fn bg_params(w: &mut (impl Write + ?Sized), color: Color) -> io::Result<()> {
    match color {
        Color::Default => w.write_all(b"49"),
        Color::Ansi(c) => write!(w, "{}", c.bg_code()),
        Color::Rgb(c) => write!(w, "48;2;{};{};{}", c.r, c.g, c.b),
    }
}

/// Set the foreground color.
pub fn fg(w: &mut (impl Write + ?Sized), color: Color) -> io::Result<()> {
    w.write_all(b"\x1b[")?;
    fg_params(w, color)?;
    w.write_all(b"m")
}

/// Set the background color.
pub fn bg(w: &mut (impl Write + ?Sized), color: Color) -> io::Result<()> {
    w.write_all(b"\x1b[")?;
    bg_params(w, color)?;
    w.write_all(b"m")
}

// ─── Text Attributes ─────────────────────────────────────────────────────────

/// Turn on attributes as a single CSI sequence, e.g. `\x1b[1;3;9m`.
///
/// Writes nothing for an empty set.
pub fn attrs(w: &mut (impl Write + ?Sized), attr: Attr) -> io::Result<()> {
    if attr.is_empty() {
        return Ok(());
    }
    w.write_all(b"\x1b[")?;
    for (i, code) in attr.sgr_codes().enumerate() {
        if i > 0 {
            w.write_all(b";")?;
        }
        write!(w, "{code}")?;
    }
    w.write_all(b"m")
}

/// Establish `style` from scratch in one sequence: reset, attributes, colors.
///
/// ```
/// use tessera_term::ansi::sgr;
/// use tessera_term::color::AnsiColor;
/// use tessera_term::style::Style;
///
/// let mut out = Vec::new();
/// sgr(&mut out, &Style::new().bold().fg(AnsiColor::Red)).unwrap();
/// assert_eq!(out, b"\x1b[0;1;31m");
/// ```
pub fn sgr(w: &mut (impl Write + ?Sized), style: &Style) -> io::Result<()> {
    w.write_all(b"\x1b[0")?;
    for code in style.attrs.sgr_codes() {
        write!(w, ";{code}")?;
    }
    let fg = style.foreground();
    if !fg.is_default() {
        w.write_all(b";")?;
        fg_params(w, fg)?;
    }
    let bg = style.background();
    if !bg.is_default() {
        w.write_all(b";")?;
        bg_params(w, bg)?;
    }
    w.write_all(b"m")
}

// ─── Hyperlinks ──────────────────────────────────────────────────────────────

/// Open an OSC 8 hyperlink. Text written until [`hyperlink_close`] links to `url`.
#[inline]
pub fn hyperlink_open(w: &mut (impl Write + ?Sized), url: &str) -> io::Result<()> {
    write!(w, "\x1b]8;;{url}\x1b\\")
}

/// Close the current OSC 8 hyperlink.
#[inline]
pub fn hyperlink_close(w: &mut (impl Write + ?Sized)) -> io::Result<()> {
    w.write_all(b"\x1b]8;;\x1b\\")
}

// ─── Synchronized Output ─────────────────────────────────────────────────────

/// Begin synchronized output (DEC 2026). The terminal holds the frame until
/// [`end_sync`].
#[inline]
pub fn begin_sync(w: &mut (impl Write + ?Sized)) -> io::Result<()> {
    w.write_all(b"\x1b[?2026h")
}

#[inline]
pub fn end_sync(w: &mut (impl Write + ?Sized)) -> io::Result<()> {
    w.write_all(b"\x1b[?2026l")
}

// ─── Alternate Screen ───────────────────────────────────────────────────────

/// Enter the alternate screen buffer (DEC 1049).
#[inline]
pub fn enter_alt_screen(w: &mut (impl Write + ?Sized)) -> io::Result<()> {
    w.write_all(b"\x1b[?1049h")
}

#[inline]
pub fn exit_alt_screen(w: &mut (impl Write + ?Sized)) -> io::Result<()> {
    w.write_all(b"\x1b[?1049l")
}

// ─── Mouse Protocol ─────────────────────────────────────────────────────────

/// Mouse tracking granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseMode {
    /// Press and release (DEC 1000).
    Click,
    /// Plus motion while a button is held (DEC 1002).
    Drag,
    /// Plus all motion (DEC 1003).
    Motion,
}

/// Enable SGR mouse tracking (DEC 1006) at the given granularity.
pub fn enable_mouse(w: &mut (impl Write + ?Sized), mode: MouseMode) -> io::Result<()> {
    w.write_all(b"\x1b[?1000h")?;
    if matches!(mode, MouseMode::Drag | MouseMode::Motion) {
        w.write_all(b"\x1b[?1002h")?;
    }
    if mode == MouseMode::Motion {
        w.write_all(b"\x1b[?1003h")?;
    }
    w.write_all(b"\x1b[?1006h")
}

/// Disable all mouse tracking.
pub fn disable_mouse(w: &mut (impl Write + ?Sized)) -> io::Result<()> {
    w.write_all(b"\x1b[?1006l\x1b[?1003l\x1b[?1002l\x1b[?1000l")
}

// ─── Keyboard ───────────────────────────────────────────────────────────────

/// Push Kitty keyboard enhancement flags (`1` disambiguate, `2` event types,
/// `4` alternate keys, `8` all keys as escapes, `16` associated text).
#[inline]
pub fn enable_kitty_keyboard(w: &mut (impl Write + ?Sized), flags: u8) -> io::Result<()> {
    write!(w, "\x1b[>{flags}u")
}

/// Pop the Kitty keyboard enhancement.
#[inline]
pub fn disable_kitty_keyboard(w: &mut (impl Write + ?Sized)) -> io::Result<()> {
    w.write_all(b"\x1b[<u")
}

/// Enable bracketed paste (DEC 2004).
#[inline]
pub fn enable_bracketed_paste(w: &mut (impl Write + ?Sized)) -> io::Result<()> {
    w.write_all(b"\x1b[?2004h")
}

#[inline]
pub fn disable_bracketed_paste(w: &mut (impl Write + ?Sized)) -> io::Result<()> {
    w.write_all(b"\x1b[?2004l")
}

/// Enable focus reporting (DEC 1004): `\x1b[I` on gain, `\x1b[O` on loss.
#[inline]
pub fn enable_focus_reporting(w: &mut (impl Write + ?Sized)) -> io::Result<()> {
    w.write_all(b"\x1b[?1004h")
}

#[inline]
pub fn disable_focus_reporting(w: &mut (impl Write + ?Sized)) -> io::Result<()> {
    w.write_all(b"\x1b[?1004l")
}

// ─── Cursor & Pointer Shape ─────────────────────────────────────────────────

/// Text cursor shape (DECSCUSR).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorShape {
    #[default]
    Default,
    BlinkBlock,
    SteadyBlock,
    BlinkUnderline,
    SteadyUnderline,
    BlinkBar,
    SteadyBar,
}

#[inline]
pub fn set_cursor_shape(w: &mut (impl Write + ?Sized), shape: CursorShape) -> io::Result<()> {
    let n: u8 = match shape {
        CursorShape::Default => 0,
        CursorShape::BlinkBlock => 1,
        CursorShape::SteadyBlock => 2,
        CursorShape::BlinkUnderline => 3,
        CursorShape::SteadyUnderline => 4,
        CursorShape::BlinkBar => 5,
        CursorShape::SteadyBar => 6,
    };
    write!(w, "\x1b[{n} q")
}

/// Set the mouse pointer shape by CSS cursor name (OSC 22), e.g. `pointer`.
#[inline]
pub fn set_pointer_shape(w: &mut (impl Write + ?Sized), name: &str) -> io::Result<()> {
    write!(w, "\x1b]22;{name}\x1b\\")
}

// ─── Clipboard ───────────────────────────────────────────────────────────────

/// Base64 payload most terminals accept in one OSC 52 write.
pub const MAX_OSC52_PAYLOAD: usize = 74_994;

/// Length of the OSC 52 payload for `text`.
#[must_use]
pub const fn osc52_payload_len(text: &str) -> usize {
    text.len().div_ceil(3) * 4
}

/// Put `text` on the system clipboard through the terminal (OSC 52, `c`
/// selection). Works over SSH where no local clipboard tool can reach.
#[inline]
pub fn set_clipboard(w: &mut (impl Write + ?Sized), text: &str) -> io::Result<()> {
    write!(w, "\x1b]52;c;{}\x07", STANDARD.encode(text))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
