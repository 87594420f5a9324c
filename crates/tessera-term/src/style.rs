// SPDX-License-Identifier: MIT
//
// Style: everything about a cell except the character itself.
//
// Foreground and background are each a named ANSI color, an RGB override,
// or both (RGB wins at resolution time). Boolean attributes live in a
// bitfield. An optional hyperlink target rides along so the output stage
// can wrap runs of linked cells in OSC 8.
//
// Equality is structural. `Style::default()` is the empty style: no colors,
// no attributes, no link.

use std::sync::Arc;

use crate::color::{AnsiColor, Color, Rgb};

// ─── Attributes ──────────────────────────────────────────────────────────────

bitflags::bitflags! {
    /// Text attributes, one bit per SGR switch.
    ///
    /// ```
    /// use tessera_term::style::Attr;
    ///
    /// let a = Attr::BOLD | Attr::UNDERLINE;
    /// assert!(a.contains(Attr::BOLD));
    /// assert!(!a.contains(Attr::ITALIC));
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Attr: u8 {
        /// SGR 1.
        const BOLD          = 1 << 0;
        /// SGR 2.
        const DIM           = 1 << 1;
        /// SGR 3.
        const ITALIC        = 1 << 2;
        /// SGR 4.
        const UNDERLINE     = 1 << 3;
        /// SGR 5.
        const BLINK         = 1 << 4;
        /// SGR 7: swap foreground and background.
        const REVERSE       = 1 << 5;
        /// SGR 8.
        const HIDDEN        = 1 << 6;
        /// SGR 9.
        const STRIKETHROUGH = 1 << 7;
    }
}

impl Attr {
    /// SGR parameters for every set flag, in ascending code order.
    pub fn sgr_codes(self) -> impl Iterator<Item = u8> {
        const TABLE: [(Attr, u8); 8] = [
            (Attr::BOLD, 1),
            (Attr::DIM, 2),
            (Attr::ITALIC, 3),
            (Attr::UNDERLINE, 4),
            (Attr::BLINK, 5),
            (Attr::REVERSE, 7),
            (Attr::HIDDEN, 8),
            (Attr::STRIKETHROUGH, 9),
        ];
        TABLE
            .into_iter()
            .filter(move |(flag, _)| self.contains(*flag))
            .map(|(_, code)| code)
    }
}

// ─── Style ───────────────────────────────────────────────────────────────────

/// Visual attributes of a cell.
///
/// ```
/// use tessera_term::color::{AnsiColor, Color, Rgb};
/// use tessera_term::style::Style;
///
/// let s = Style::new().fg(AnsiColor::Red).fg_rgb(Rgb::new(9, 9, 9)).bold();
/// assert_eq!(s.foreground(), Color::Rgb(Rgb::new(9, 9, 9)));
/// assert!(Style::default().is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Style {
    /// Named foreground color.
    pub fg: Option<AnsiColor>,
    /// RGB foreground; overrides `fg` when set.
    pub fg_rgb: Option<Rgb>,
    /// Named background color.
    pub bg: Option<AnsiColor>,
    /// RGB background; overrides `bg` when set.
    pub bg_rgb: Option<Rgb>,
    pub attrs: Attr,
    /// Hyperlink target. Shared so that long linked runs don't clone the URL.
    pub link: Option<Arc<str>>,
}

impl Style {
    /// The empty style.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fg: None,
            fg_rgb: None,
            bg: None,
            bg_rgb: None,
            attrs: Attr::empty(),
            link: None,
        }
    }

    // ─── Builders ─────────────────────────────────────────────────────────

    #[must_use]
    pub fn fg(mut self, color: AnsiColor) -> Self {
        self.fg = Some(color);
        self
    }

    #[must_use]
    pub fn fg_rgb(mut self, color: Rgb) -> Self {
        self.fg_rgb = Some(color);
        self
    }

    #[must_use]
    pub fn bg(mut self, color: AnsiColor) -> Self {
        self.bg = Some(color);
        self
    }

    #[must_use]
    pub fn bg_rgb(mut self, color: Rgb) -> Self {
        self.bg_rgb = Some(color);
        self
    }

    /// Add attribute flags.
    #[must_use]
    pub fn attr(mut self, attrs: Attr) -> Self {
        self.attrs |= attrs;
        self
    }

    #[must_use]
    pub fn bold(self) -> Self {
        self.attr(Attr::BOLD)
    }

    #[must_use]
    pub fn dim(self) -> Self {
        self.attr(Attr::DIM)
    }

    #[must_use]
    pub fn italic(self) -> Self {
        self.attr(Attr::ITALIC)
    }

    #[must_use]
    pub fn underline(self) -> Self {
        self.attr(Attr::UNDERLINE)
    }

    #[must_use]
    pub fn blink(self) -> Self {
        self.attr(Attr::BLINK)
    }

    #[must_use]
    pub fn reverse(self) -> Self {
        self.attr(Attr::REVERSE)
    }

    #[must_use]
    pub fn hidden(self) -> Self {
        self.attr(Attr::HIDDEN)
    }

    #[must_use]
    pub fn strikethrough(self) -> Self {
        self.attr(Attr::STRIKETHROUGH)
    }

    /// Attach a hyperlink target.
    #[must_use]
    pub fn link(mut self, url: impl Into<Arc<str>>) -> Self {
        self.link = Some(url.into());
        self
    }

    /// The same style with no hyperlink.
    #[must_use]
    pub fn without_link(&self) -> Self {
        Self {
            link: None,
            ..self.clone()
        }
    }

    // ─── Resolution ───────────────────────────────────────────────────────

    /// Effective foreground color.
    #[inline]
    #[must_use]
    pub const fn foreground(&self) -> Color {
        Color::resolve(self.fg, self.fg_rgb)
    }

    /// Effective background color.
    #[inline]
    #[must_use]
    pub const fn background(&self) -> Color {
        Color::resolve(self.bg, self.bg_rgb)
    }

    /// Whether this is the empty style.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::new()
    }

    /// Whether two styles render the same SGR state, ignoring the link.
    ///
    /// A named color shadowed by an RGB override does not count.
    #[must_use]
    pub fn same_sgr(&self, other: &Self) -> bool {
        self.foreground() == other.foreground()
            && self.background() == other.background()
            && self.attrs == other.attrs
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
