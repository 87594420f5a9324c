// SPDX-License-Identifier: MIT
//
// Colors as the terminal understands them.
//
// A style carries a foreground and a background, each of which may be set
// as one of the 16 named ANSI colors, as an explicit 24-bit triple, or both.
// When both are present the RGB triple wins. `Color` is the resolved result
// that the output stage turns into SGR parameters.

use std::fmt;

// ─── AnsiColor ───────────────────────────────────────────────────────────────

/// The 16 named ANSI colors (SGR 30–37 / 90–97 for foreground).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AnsiColor {
    Black = 0,
    Red = 1,
    Green = 2,
    Yellow = 3,
    Blue = 4,
    Magenta = 5,
    Cyan = 6,
    White = 7,
    BrightBlack = 8,
    BrightRed = 9,
    BrightGreen = 10,
    BrightYellow = 11,
    BrightBlue = 12,
    BrightMagenta = 13,
    BrightCyan = 14,
    BrightWhite = 15,
}

impl AnsiColor {
    /// Palette index, 0–15.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Look a color up by palette index. Indices above 15 return `None`.
    #[must_use]
    pub const fn from_index(idx: u8) -> Option<Self> {
        Some(match idx {
            0 => Self::Black,
            1 => Self::Red,
            2 => Self::Green,
            3 => Self::Yellow,
            4 => Self::Blue,
            5 => Self::Magenta,
            6 => Self::Cyan,
            7 => Self::White,
            8 => Self::BrightBlack,
            9 => Self::BrightRed,
            10 => Self::BrightGreen,
            11 => Self::BrightYellow,
            12 => Self::BrightBlue,
            13 => Self::BrightMagenta,
            14 => Self::BrightCyan,
            15 => Self::BrightWhite,
            _ => return None,
        })
    }

    /// Whether this is one of the bright (90-range) variants.
    #[inline]
    #[must_use]
    pub const fn is_bright(self) -> bool {
        self.index() >= 8
    }

    /// SGR parameter selecting this color as foreground.
    #[inline]
    #[must_use]
    pub const fn fg_code(self) -> u8 {
        if self.is_bright() {
            90 + self.index() - 8
        } else {
            30 + self.index()
        }
    }

    /// SGR parameter selecting this color as background.
    #[inline]
    #[must_use]
    pub const fn bg_code(self) -> u8 {
        self.fg_code() + 10
    }
}

// ─── Rgb ─────────────────────────────────────────────────────────────────────

/// A 24-bit `TrueColor` triple.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    #[inline]
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb`, `rrggbb`, or the short `#rgb` form.
    ///
    /// ```
    /// use tessera_term::color::Rgb;
    ///
    /// assert_eq!(Rgb::from_hex("#ff8000"), Some(Rgb::new(255, 128, 0)));
    /// assert_eq!(Rgb::from_hex("0f0"), Some(Rgb::new(0, 255, 0)));
    /// assert_eq!(Rgb::from_hex("#12345"), None);
    /// ```
    #[must_use]
    pub fn from_hex(s: &str) -> Option<Self> {
        let s = s.strip_prefix('#').unwrap_or(s);
        let bytes = s.as_bytes();
        match bytes.len() {
            3 => {
                let r = hex_digit(bytes[0])?;
                let g = hex_digit(bytes[1])?;
                let b = hex_digit(bytes[2])?;
                Some(Self::new(r << 4 | r, g << 4 | g, b << 4 | b))
            }
            6 => Some(Self::new(
                hex_byte(&bytes[0..2])?,
                hex_byte(&bytes[2..4])?,
                hex_byte(&bytes[4..6])?,
            )),
            _ => None,
        }
    }
}

impl fmt::Debug for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

#[inline]
const fn hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

#[inline]
fn hex_byte(bytes: &[u8]) -> Option<u8> {
    Some(hex_digit(bytes[0])? << 4 | hex_digit(bytes[1])?)
}

// ─── Color ───────────────────────────────────────────────────────────────────

/// A resolved color, ready for SGR encoding.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Color {
    /// Terminal default (SGR 39 / 49).
    #[default]
    Default,
    /// One of the 16 named colors.
    Ansi(AnsiColor),
    /// 24-bit color.
    Rgb(Rgb),
}

impl Color {
    /// Resolve a named color and an optional RGB override.
    ///
    /// RGB, when present, always wins.
    #[inline]
    #[must_use]
    pub const fn resolve(named: Option<AnsiColor>, rgb: Option<Rgb>) -> Self {
        match (rgb, named) {
            (Some(rgb), _) => Self::Rgb(rgb),
            (None, Some(named)) => Self::Ansi(named),
            (None, None) => Self::Default,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_default(self) -> bool {
        matches!(self, Self::Default)
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::Ansi(c) => write!(f, "{c:?}"),
            Self::Rgb(rgb) => write!(f, "{rgb:?}"),
        }
    }
}

impl From<AnsiColor> for Color {
    fn from(c: AnsiColor) -> Self {
        Self::Ansi(c)
    }
}

impl From<Rgb> for Color {
    fn from(c: Rgb) -> Self {
        Self::Rgb(c)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
