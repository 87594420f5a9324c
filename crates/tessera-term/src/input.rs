// SPDX-License-Identifier: MIT
//
// Terminal input decoder.
//
// Turns raw input bytes into structured events: keys, mouse actions,
// pastes, focus changes and cursor-position reports. Understands:
//
// - Legacy CSI sequences (arrows, editing keys, `~` function keys)
// - SS3 sequences (F1-F4, Home/End alternate encoding)
// - SGR mouse protocol (decoded by `mouse::decode_sgr`)
// - Kitty keyboard protocol (codepoint, modifiers, event kind)
// - Bracketed paste (aggregated into one event, newlines and tabs normalized)
// - Focus reporting and DSR cursor-position replies
// - Alt+key (ESC followed by a printable character)
// - UTF-8 multi-byte characters
//
// # Design
//
// The decoder is pull based: `read_event` returns exactly one event and
// reads from the underlying `Read` only when the bytes it holds cannot
// settle the next event. Parsing itself is a set of pure functions over
// `&[u8]` that report what they found and how many bytes it took, so an
// incomplete sequence never consumes anything.
//
// A lone ESC is ambiguous. The decoder resolves pending bytes when the
// source reports end of input, or when a read times out (`TimedOut` /
// `WouldBlock`): a lone ESC becomes Escape, anything else becomes
// `KeyCode::Unknown`. Sources that never time out simply block.

use std::io::{self, Read};
use std::time::Instant;

use bitflags::bitflags;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::mouse::{self, MouseEvent};

// ─── Event Types ────────────────────────────────────────────────────────────

/// One decoded input event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Key(KeyEvent),
    Mouse(MouseEvent),
    /// Reply to a cursor-position request (`CSI row ; col R`), 0-based.
    CursorPosition {
        row: u16,
        col: u16,
        timestamp: Instant,
    },
    /// Focus gained (`CSI I`) or lost (`CSI O`).
    Focus { gained: bool, timestamp: Instant },
}

impl Event {
    #[must_use]
    pub const fn timestamp(&self) -> Instant {
        match self {
            Self::Key(k) => k.timestamp,
            Self::Mouse(m) => m.timestamp,
            Self::CursorPosition { timestamp, .. } | Self::Focus { timestamp, .. } => *timestamp,
        }
    }
}

/// A keyboard event. A paste arrives as `KeyCode::Paste` with the pasted
/// text in `paste_text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub modifiers: Modifiers,
    pub kind: KeyEventKind,
    pub paste_text: String,
    pub timestamp: Instant,
}

impl KeyEvent {
    #[must_use]
    pub fn new(code: KeyCode, modifiers: Modifiers) -> Self {
        Self {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            paste_text: String::new(),
            timestamp: Instant::now(),
        }
    }

    #[must_use]
    pub fn paste(text: String) -> Self {
        Self {
            paste_text: text,
            ..Self::new(KeyCode::Paste, Modifiers::empty())
        }
    }

    #[inline]
    #[must_use]
    pub fn is_paste(&self) -> bool {
        self.code == KeyCode::Paste
    }

    /// The typed character, for plain character keys.
    #[inline]
    #[must_use]
    pub const fn char(&self) -> Option<char> {
        match self.code {
            KeyCode::Char(c) => Some(c),
            _ => None,
        }
    }
}

/// Press, repeat or release. Only the Kitty protocol reports anything but
/// `Press`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyEventKind {
    #[default]
    Press,
    Repeat,
    Release,
}

/// Identity of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// A printable character.
    Char(char),
    Enter,
    Tab,
    BackTab,
    Backspace,
    Escape,
    Delete,
    Insert,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    /// F1 through F35.
    F(u8),
    CapsLock,
    ScrollLock,
    NumLock,
    PrintScreen,
    Pause,
    Menu,
    /// A bracketed paste; the text is in `KeyEvent::paste_text`.
    Paste,
    /// A sequence the decoder does not recognize, or a non-key event read
    /// through `read_key`.
    Unknown,
}

bitflags! {
    /// Keyboard modifier flags.
    ///
    /// Matches the xterm/Kitty encoding where the wire parameter is
    /// `1 + bitmask`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0000_0001;
        const ALT   = 0b0000_0010;
        const CTRL  = 0b0000_0100;
        const SUPER = 0b0000_1000;
        const HYPER = 0b0001_0000;
        const META  = 0b0010_0000;
    }
}

// ─── Configuration ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Spaces substituted for each tab inside a bracketed paste.
    pub paste_tab_width: usize,
    /// Consecutive source timeouts an open paste may sit through before
    /// what arrived is delivered. With the 25 ms reader timeout the default
    /// is about one second.
    pub paste_idle_timeouts: u32,
    /// Largest body an open paste holds while waiting for its end marker.
    /// Past it, the paste is delivered as several paste events of at most
    /// this size.
    pub max_paste_bytes: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            paste_tab_width: 4,
            paste_idle_timeouts: 40,
            max_paste_bytes: 1 << 20,
        }
    }
}

// ─── Decoder ────────────────────────────────────────────────────────────────

const PASTE_START: &[u8] = b"\x1b[200~";
const PASTE_END: &[u8] = b"\x1b[201~";

/// Pull-based decoder over any byte source.
///
/// ```
/// use tessera_term::input::{Decoder, Event, KeyCode, Modifiers};
///
/// let mut decoder = Decoder::new(&b"\x1b[1;5A"[..]);
/// let Event::Key(key) = decoder.read_event()? else { unreachable!() };
/// assert_eq!(key.code, KeyCode::Up);
/// assert_eq!(key.modifiers, Modifiers::CTRL);
/// # Ok::<(), tessera_term::Error>(())
/// ```
pub struct Decoder<R> {
    source: R,
    config: DecoderConfig,
    /// Bytes read but not yet decoded.
    buf: Vec<u8>,
    eof: bool,
    /// Timeouts seen since the open paste last grew.
    paste_idle: u32,
}

impl<R: Read> Decoder<R> {
    pub fn new(source: R) -> Self {
        Self::with_config(source, DecoderConfig::default())
    }

    pub fn with_config(source: R, config: DecoderConfig) -> Self {
        Self {
            source,
            config,
            buf: Vec::with_capacity(64),
            eof: false,
            paste_idle: 0,
        }
    }

    /// Whether bytes are held that did not yet form an event.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.buf.is_empty()
    }

    pub fn get_ref(&self) -> &R {
        &self.source
    }

    pub fn into_inner(self) -> R {
        self.source
    }

    /// Decode the next event.
    ///
    /// # Errors
    ///
    /// [`Error::EndOfInput`] once the source is exhausted and every byte has
    /// been decoded, or the source's I/O error.
    pub fn read_event(&mut self) -> Result<Event> {
        loop {
            if !self.buf.is_empty() {
                match parse(&self.buf, &self.config) {
                    Parsed::Event(event, consumed) => {
                        self.buf.drain(..consumed);
                        trace!(?event, consumed, "decoded input event");
                        return Ok(event);
                    }
                    Parsed::Incomplete if self.eof => return Ok(self.resolve_pending()),
                    Parsed::Incomplete => {
                        if let Some(event) = self.split_paste() {
                            return Ok(event);
                        }
                    }
                }
            } else if self.eof {
                return Err(Error::EndOfInput);
            }

            match self.fill() {
                Ok(()) => {}
                Err(err)
                    if matches!(err.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) =>
                {
                    if self.buf.is_empty() {
                        continue;
                    }
                    if !in_paste(&self.buf) {
                        return Ok(self.resolve_pending());
                    }
                    self.paste_idle += 1;
                    if self.paste_idle >= self.config.paste_idle_timeouts {
                        debug!(bytes = self.buf.len(), "paste end marker overdue");
                        return Ok(self.resolve_pending());
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Decode the next event, reducing anything but a key to
    /// `KeyCode::Unknown`.
    ///
    /// # Errors
    ///
    /// As [`read_event`](Self::read_event).
    pub fn read_key(&mut self) -> Result<KeyEvent> {
        Ok(match self.read_event()? {
            Event::Key(key) => key,
            other => KeyEvent {
                timestamp: other.timestamp(),
                ..KeyEvent::new(KeyCode::Unknown, Modifiers::empty())
            },
        })
    }

    fn fill(&mut self) -> io::Result<()> {
        let mut chunk = [0u8; 1024];
        let n = self.source.read(&mut chunk)?;
        if n == 0 {
            self.eof = true;
        } else {
            self.buf.extend_from_slice(&chunk[..n]);
            self.paste_idle = 0;
        }
        Ok(())
    }

    /// Hand out the front of an open paste that outgrew `max_paste_bytes`,
    /// keeping the decoder inside the paste for the rest. The cut never
    /// lands inside a UTF-8 character, a CR LF pair or a partial end marker.
    fn split_paste(&mut self) -> Option<Event> {
        if !in_paste(&self.buf) || self.buf.len() - PASTE_START.len() <= self.config.max_paste_bytes {
            return None;
        }
        let body = &self.buf[PASTE_START.len()..];
        let mut split = body
            .len()
            .saturating_sub(PASTE_END.len() - 1)
            .min(self.config.max_paste_bytes);
        while split > 0 && (body[split] & 0xC0 == 0x80 || body[split - 1] == b'\r') {
            split -= 1;
        }
        if split == 0 {
            return None;
        }
        let text = normalize_paste(&body[..split], &self.config);
        let rest = self.buf.split_off(PASTE_START.len() + split);
        self.buf.truncate(PASTE_START.len());
        self.buf.extend_from_slice(&rest);
        trace!(delivered = split, held = rest.len(), "oversized paste split");
        Some(Event::Key(KeyEvent::paste(text)))
    }

    /// Settle bytes that will not complete: a lone ESC is Escape, an open
    /// paste is delivered with what arrived, anything else is Unknown.
    fn resolve_pending(&mut self) -> Event {
        let pending = std::mem::take(&mut self.buf);
        self.paste_idle = 0;
        if pending == [0x1B] {
            return press(KeyCode::Escape);
        }
        if let Some(body) = pending.strip_prefix(PASTE_START) {
            return Event::Key(KeyEvent::paste(normalize_paste(body, &self.config)));
        }
        trace!(bytes = pending.len(), "unterminated input sequence");
        press(KeyCode::Unknown)
    }
}

impl<R> std::fmt::Debug for Decoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder")
            .field("config", &self.config)
            .field("pending", &self.buf.len())
            .field("eof", &self.eof)
            .finish_non_exhaustive()
    }
}

// ─── Stateless Parsing Functions ────────────────────────────────────────────
//
// All parse functions are pure: they read from the start of `buf` and
// return what they found plus how many bytes it took.

enum Parsed {
    Event(Event, usize),
    /// More bytes are needed.
    Incomplete,
}

fn in_paste(buf: &[u8]) -> bool {
    buf.starts_with(PASTE_START)
}

fn parse(buf: &[u8], config: &DecoderConfig) -> Parsed {
    if buf.starts_with(PASTE_START) {
        let body = &buf[PASTE_START.len()..];
        return find_subsequence(body, PASTE_END).map_or(Parsed::Incomplete, |end| {
            let text = normalize_paste(&body[..end], config);
            Parsed::Event(
                Event::Key(KeyEvent::paste(text)),
                PASTE_START.len() + end + PASTE_END.len(),
            )
        });
    }
    // A strict prefix of the paste marker must wait for the rest.
    if buf.len() < PASTE_START.len() && buf.len() > 2 && PASTE_START.starts_with(buf) {
        return Parsed::Incomplete;
    }

    match buf[0] {
        0x1B => parse_escape(buf),
        0x00 => Parsed::Event(ctrl_key(KeyCode::Char(' ')), 1),
        0x08 | 0x7F => Parsed::Event(press(KeyCode::Backspace), 1),
        0x09 => Parsed::Event(press(KeyCode::Tab), 1),
        0x0A | 0x0D => Parsed::Event(press(KeyCode::Enter), 1),
        b @ 0x01..=0x1A => Parsed::Event(ctrl_key(KeyCode::Char(char::from(b + b'a' - 1))), 1),
        b @ 0x1C..=0x1F => Parsed::Event(ctrl_key(KeyCode::Char(char::from(b + b'@'))), 1),
        b @ 0x20..=0x7E => Parsed::Event(press(KeyCode::Char(char::from(b))), 1),
        _ => parse_utf8(buf).map_or(Parsed::Incomplete, |(ch, len)| {
            Parsed::Event(ch.map_or_else(|| press(KeyCode::Unknown), |c| press(KeyCode::Char(c))), len)
        }),
    }
}

/// Expand tabs and fold CR/LF variants into `\n`.
fn normalize_paste(raw: &[u8], config: &DecoderConfig) -> String {
    let text = String::from_utf8_lossy(raw);
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push('\n');
            }
            '\t' => out.extend(std::iter::repeat_n(' ', config.paste_tab_width)),
            c => out.push(c),
        }
    }
    out
}

// ── Escape sequences ────────────────────────────────────────────────────────

fn parse_escape(buf: &[u8]) -> Parsed {
    let Some(&next) = buf.get(1) else {
        return Parsed::Incomplete;
    };

    match next {
        b'[' => parse_csi(buf),
        b'O' => parse_ss3(buf),
        b']' if buf.get(2).is_some_and(u8::is_ascii_digit) => parse_osc(buf),
        b']' if buf.len() == 2 => Parsed::Incomplete,
        0x1B => Parsed::Event(key_with(KeyCode::Escape, Modifiers::ALT), 2),
        b @ 0x20..=0x7E => Parsed::Event(key_with(KeyCode::Char(char::from(b)), Modifiers::ALT), 2),
        0x7F => Parsed::Event(key_with(KeyCode::Backspace, Modifiers::ALT), 2),
        0x0D => Parsed::Event(key_with(KeyCode::Enter, Modifiers::ALT), 2),
        b @ 0x01..=0x1A => Parsed::Event(
            key_with(
                KeyCode::Char(char::from(b + b'a' - 1)),
                Modifiers::ALT | Modifiers::CTRL,
            ),
            2,
        ),
        0x80..=0xFF => match parse_utf8(&buf[1..]) {
            None => Parsed::Incomplete,
            Some((Some(ch), len)) => Parsed::Event(key_with(KeyCode::Char(ch), Modifiers::ALT), 1 + len),
            Some((None, _)) => Parsed::Event(press(KeyCode::Escape), 1),
        },
        // ESC before something that cannot follow it: a real Escape.
        _ => Parsed::Event(press(KeyCode::Escape), 1),
    }
}

// ── OSC (Operating System Command) ──────────────────────────────────────────

/// Consume an OSC reply (`ESC ] ... BEL` or `ESC ] ... ESC \`) as Unknown.
fn parse_osc(buf: &[u8]) -> Parsed {
    let mut i = 2;
    while i < buf.len() {
        match buf[i] {
            0x07 => return Parsed::Event(press(KeyCode::Unknown), i + 1),
            0x1B => {
                return match buf.get(i + 1) {
                    Some(b'\\') => Parsed::Event(press(KeyCode::Unknown), i + 2),
                    Some(_) => Parsed::Event(press(KeyCode::Unknown), i),
                    None => Parsed::Incomplete,
                };
            }
            _ => i += 1,
        }
    }
    Parsed::Incomplete
}

// ── CSI (Control Sequence Introducer) ───────────────────────────────────────

fn parse_csi(buf: &[u8]) -> Parsed {
    let Some(&first) = buf.get(2) else {
        return Parsed::Incomplete;
    };

    if first == b'<' {
        return parse_sgr_mouse(buf);
    }
    if first == b'I' || first == b'O' {
        return Parsed::Event(
            Event::Focus {
                gained: first == b'I',
                timestamp: Instant::now(),
            },
            3,
        );
    }

    // Parameter bytes are 0x30..=0x3F, intermediates 0x20..=0x2F, and the
    // final byte 0x40..=0x7E.
    let mut end = 2;
    while end < buf.len() {
        let b = buf[end];
        if (0x40..=0x7E).contains(&b) {
            break;
        }
        if !(0x20..=0x3F).contains(&b) {
            // Malformed; report what came before and leave this byte, it
            // may start the next event.
            return Parsed::Event(press(KeyCode::Unknown), end);
        }
        end += 1;
    }
    if end >= buf.len() {
        return Parsed::Incomplete;
    }

    let final_byte = buf[end];
    let params_raw = &buf[2..end];
    let consumed = end + 1;
    let params = parse_csi_params(params_raw);
    let param = |i: usize| params.get(i).map_or(0, |p| p.0);
    let modifiers = params
        .get(1)
        .map_or(Modifiers::empty(), |p| decode_modifiers(p.0));

    let event = match final_byte {
        b'~' => tilde_key(param(0)).map_or_else(|| press(KeyCode::Unknown), |code| key_with(code, modifiers)),
        b'u' => parse_kitty_key(&params),
        b'R' if params.len() >= 2 => Event::CursorPosition {
            row: clamp_u16(param(0)).saturating_sub(1),
            col: clamp_u16(param(1)).saturating_sub(1),
            timestamp: Instant::now(),
        },
        b'A' => key_with(KeyCode::Up, modifiers),
        b'B' => key_with(KeyCode::Down, modifiers),
        b'C' => key_with(KeyCode::Right, modifiers),
        b'D' => key_with(KeyCode::Left, modifiers),
        b'H' => key_with(KeyCode::Home, modifiers),
        b'F' => key_with(KeyCode::End, modifiers),
        b'P' => key_with(KeyCode::F(1), modifiers),
        b'Q' => key_with(KeyCode::F(2), modifiers),
        b'R' => key_with(KeyCode::F(3), modifiers),
        b'S' => key_with(KeyCode::F(4), modifiers),
        b'Z' => key_with(KeyCode::BackTab, Modifiers::SHIFT),
        _ => press(KeyCode::Unknown),
    };
    Parsed::Event(event, consumed)
}

/// Keys terminated by `~`. 16 and 22 are unassigned.
const fn tilde_key(code: u32) -> Option<KeyCode> {
    Some(match code {
        1 | 7 => KeyCode::Home,
        2 => KeyCode::Insert,
        3 => KeyCode::Delete,
        4 | 8 => KeyCode::End,
        5 => KeyCode::PageUp,
        6 => KeyCode::PageDown,
        11 => KeyCode::F(1),
        12 => KeyCode::F(2),
        13 => KeyCode::F(3),
        14 => KeyCode::F(4),
        15 => KeyCode::F(5),
        17 => KeyCode::F(6),
        18 => KeyCode::F(7),
        19 => KeyCode::F(8),
        20 => KeyCode::F(9),
        21 => KeyCode::F(10),
        23 => KeyCode::F(11),
        24 => KeyCode::F(12),
        25 => KeyCode::F(13),
        26 => KeyCode::F(14),
        28 => KeyCode::F(15),
        29 => KeyCode::F(16),
        31 => KeyCode::F(17),
        32 => KeyCode::F(18),
        33 => KeyCode::F(19),
        34 => KeyCode::F(20),
        _ => return None,
    })
}

// ── SS3 (Single Shift 3) ───────────────────────────────────────────────────

fn parse_ss3(buf: &[u8]) -> Parsed {
    let Some(&b) = buf.get(2) else {
        return Parsed::Incomplete;
    };
    let code = match b {
        b'A' => KeyCode::Up,
        b'B' => KeyCode::Down,
        b'C' => KeyCode::Right,
        b'D' => KeyCode::Left,
        b'H' => KeyCode::Home,
        b'F' => KeyCode::End,
        b'P' => KeyCode::F(1),
        b'Q' => KeyCode::F(2),
        b'R' => KeyCode::F(3),
        b'S' => KeyCode::F(4),
        _ => KeyCode::Unknown,
    };
    Parsed::Event(press(code), 3)
}

// ── SGR Mouse Protocol ─────────────────────────────────────────────────────

fn parse_sgr_mouse(buf: &[u8]) -> Parsed {
    // ESC [ < Pb ; Px ; Py (M | m)
    let start = 3;
    let mut end = start;
    while end < buf.len() {
        match buf[end] {
            b'M' | b'm' => break,
            b if b.is_ascii_digit() || b == b';' => end += 1,
            _ => return Parsed::Event(press(KeyCode::Unknown), end),
        }
    }
    if end >= buf.len() {
        return Parsed::Incomplete;
    }
    let consumed = end + 1;
    let release = buf[end] == b'm';
    mouse::decode_sgr(&buf[start..end], release).map_or_else(
        || Parsed::Event(press(KeyCode::Unknown), consumed),
        |event| Parsed::Event(Event::Mouse(event), consumed),
    )
}

// ── Kitty Keyboard Protocol ────────────────────────────────────────────────

fn parse_kitty_key(params: &[CsiParam]) -> Event {
    // CSI codepoint[:shifted[:base]] [; modifiers[:event_type]] [; text] u
    let codepoint = params.first().map_or(0, |p| p.0);
    let (modifier_val, event_type) = params.get(1).map_or((0, 0), |p| (p.0, p.1));

    let kind = match event_type {
        2 => KeyEventKind::Repeat,
        3 => KeyEventKind::Release,
        _ => KeyEventKind::Press,
    };
    Event::Key(KeyEvent {
        kind,
        ..KeyEvent::new(kitty_codepoint_to_keycode(codepoint), decode_modifiers(modifier_val))
    })
}

/// Map a Kitty protocol codepoint to a key. Functional keys live in the
/// private-use range starting at 57344.
fn kitty_codepoint_to_keycode(cp: u32) -> KeyCode {
    match cp {
        27 | 57344 => KeyCode::Escape,
        13 | 57345 => KeyCode::Enter,
        9 | 57346 => KeyCode::Tab,
        127 | 8 | 57347 => KeyCode::Backspace,
        57348 => KeyCode::Insert,
        57349 => KeyCode::Delete,
        57350 => KeyCode::Left,
        57351 => KeyCode::Right,
        57352 => KeyCode::Up,
        57353 => KeyCode::Down,
        57354 => KeyCode::PageUp,
        57355 => KeyCode::PageDown,
        57356 => KeyCode::Home,
        57357 => KeyCode::End,
        57358 => KeyCode::CapsLock,
        57359 => KeyCode::ScrollLock,
        57360 => KeyCode::NumLock,
        57361 => KeyCode::PrintScreen,
        57362 => KeyCode::Pause,
        57363 => KeyCode::Menu,
        // Range guarantees the result fits in u8.
        #[allow(clippy::cast_possible_truncation)]
        cp @ 57364..=57398 => KeyCode::F((cp - 57364 + 1) as u8),
        cp => char::from_u32(cp)
            .filter(|c| !c.is_control())
            .map_or(KeyCode::Unknown, KeyCode::Char),
    }
}

// ── UTF-8 ──────────────────────────────────────────────────────────────────

/// Decode one UTF-8 character from the start of `buf`.
///
/// `None` when more bytes are needed; `Some((None, n))` for `n` invalid
/// bytes to skip.
fn parse_utf8(buf: &[u8]) -> Option<(Option<char>, usize)> {
    let expected = utf8_char_len(buf[0]);
    if expected == 0 {
        return Some((None, 1));
    }
    // Stop at the first byte that cannot continue the sequence.
    let available = buf.len().min(expected);
    if let Some(bad) = buf[1..available].iter().position(|&b| b & 0xC0 != 0x80) {
        return Some((None, bad + 1));
    }
    if buf.len() < expected {
        return None;
    }
    Some(
        std::str::from_utf8(&buf[..expected])
            .ok()
            .and_then(|s| s.chars().next())
            .map_or((None, expected), |ch| (Some(ch), expected)),
    )
}

const fn utf8_char_len(lead: u8) -> usize {
    match lead {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => 0,
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn press(code: KeyCode) -> Event {
    Event::Key(KeyEvent::new(code, Modifiers::empty()))
}

fn ctrl_key(code: KeyCode) -> Event {
    Event::Key(KeyEvent::new(code, Modifiers::CTRL))
}

fn key_with(code: KeyCode, modifiers: Modifiers) -> Event {
    Event::Key(KeyEvent::new(code, modifiers))
}

/// CSI parameter: `(main_value, colon_sub_parameter)`.
///
/// The Kitty protocol puts the event type in a colon sub-parameter of the
/// modifier parameter: `modifier:event_type`.
#[derive(Debug, PartialEq, Eq)]
struct CsiParam(u32, u32);

/// Parse `;`-separated CSI parameters with optional `:` sub-parameters.
///
/// - `1;2` → `[(1,0), (2,0)]`
/// - `97;5:2` → `[(97,0), (5,2)]`
/// - (empty) → `[]`
fn parse_csi_params(raw: &[u8]) -> Vec<CsiParam> {
    if raw.is_empty() {
        return Vec::new();
    }
    let mut params = Vec::with_capacity(4);
    let mut pos = 0;
    loop {
        let (main_val, next) = parse_u32_at(raw, pos);
        pos = next;
        let mut sub_val = 0;
        // Only the first sub-parameter matters; skip the rest.
        let mut first_sub = true;
        while raw.get(pos) == Some(&b':') {
            let (v, n) = parse_u32_at(raw, pos + 1);
            if first_sub {
                sub_val = v;
                first_sub = false;
            }
            pos = n;
        }
        params.push(CsiParam(main_val, sub_val));
        if raw.get(pos) == Some(&b';') {
            pos += 1;
        } else {
            break;
        }
    }
    params
}

/// Parse a decimal number at `start`, stopping at the first non-digit.
/// Returns `(value, next_position)`; saturates instead of overflowing.
pub(crate) fn parse_u32_at(buf: &[u8], start: usize) -> (u32, usize) {
    let mut val: u32 = 0;
    let mut pos = start;
    while let Some(&b) = buf.get(pos) {
        if !b.is_ascii_digit() {
            break;
        }
        val = val.saturating_mul(10).saturating_add(u32::from(b - b'0'));
        pos += 1;
    }
    (val, pos)
}

fn clamp_u16(v: u32) -> u16 {
    u16::try_from(v).unwrap_or(u16::MAX)
}

/// Decode the `1 + bitmask` modifier parameter. 0 and 1 mean none.
pub(crate) fn decode_modifiers(param: u32) -> Modifiers {
    let bits = param.saturating_sub(1);
    Modifiers::from_bits_truncate(u8::try_from(bits & 0xFF).unwrap_or(0))
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

// ─── Tests ──────────────────────────────────────────────────────────────────
