// SPDX-License-Identifier: MIT
//
// Cell: the atomic unit of the grid.
//
// A cell holds one character, the style it is drawn with, and its display
// width. Double-width characters (CJK, most emoji) occupy two columns: the
// first cell holds the character with `width == 2`, the second is a
// continuation placeholder that carries the same style but is never written
// to the terminal on its own.
//
// Invariant: a continuation cell is always immediately preceded by a cell of
// width 2. `Buffer` maintains this on every write.

use std::fmt;

use unicode_width::UnicodeWidthChar;

use crate::style::Style;

// ─── Cell ────────────────────────────────────────────────────────────────────

/// One character position in the grid.
#[derive(Clone, PartialEq, Eq)]
pub struct Cell {
    /// Character to display. A space for blank and continuation cells.
    pub ch: char,
    /// Style the character is drawn with.
    pub style: Style,
    /// Display width: 1, or 2 for the leading half of a wide character.
    pub width: u8,
    /// Placeholder for the trailing half of a wide character.
    pub continuation: bool,
}

impl Cell {
    /// A blank cell: space, empty style.
    pub const BLANK: Self = Self {
        ch: ' ',
        style: Style::new(),
        width: 1,
        continuation: false,
    };

    /// A cell with a character and the empty style.
    #[inline]
    #[must_use]
    pub fn new(ch: char) -> Self {
        Self::styled(ch, Style::new())
    }

    /// A cell with a character and style. Width comes from the character.
    ///
    /// ```
    /// use tessera_term::cell::Cell;
    ///
    /// assert_eq!(Cell::new('a').width, 1);
    /// assert_eq!(Cell::new('中').width, 2);
    /// ```
    #[inline]
    #[must_use]
    pub fn styled(ch: char, style: Style) -> Self {
        let width = if char_width(ch) == 2 { 2 } else { 1 };
        Self {
            ch,
            style,
            width,
            continuation: false,
        }
    }

    /// The trailing half of a wide character drawn with `style`.
    #[inline]
    #[must_use]
    pub const fn continuation(style: Style) -> Self {
        Self {
            ch: ' ',
            style,
            width: 0,
            continuation: true,
        }
    }

    // ─── Queries ──────────────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub const fn is_continuation(&self) -> bool {
        self.continuation
    }

    #[inline]
    #[must_use]
    pub const fn is_wide(&self) -> bool {
        self.width == 2
    }

    /// Space with the empty style.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        *self == Self::BLANK
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::BLANK
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.continuation {
            return write!(f, "Cell(<cont>)");
        }
        if self.style.is_empty() {
            write!(f, "Cell({:?})", self.ch)
        } else {
            write!(f, "Cell({:?}, {:?})", self.ch, self.style)
        }
    }
}

// ─── Width ───────────────────────────────────────────────────────────────────

/// Display width of a character in terminal columns (0, 1 or 2).
///
/// ```
/// use tessera_term::cell::char_width;
///
/// assert_eq!(char_width('a'), 1);
/// assert_eq!(char_width('中'), 2);
/// assert_eq!(char_width('\u{301}'), 0);
/// ```
#[inline]
#[must_use]
pub fn char_width(ch: char) -> usize {
    ch.width().unwrap_or(0)
}

/// Display width of a string in terminal columns.
#[must_use]
pub fn string_width(s: &str) -> usize {
    s.chars().map(char_width).sum()
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::AnsiColor;

    #[test]
    fn blank_is_space_with_empty_style() {
        let c = Cell::BLANK;
        assert_eq!(c.ch, ' ');
        assert!(c.style.is_empty());
        assert_eq!(c.width, 1);
        assert!(!c.continuation);
        assert!(c.is_blank());
        assert_eq!(Cell::default(), Cell::BLANK);
    }

    #[test]
    fn styled_cell_is_not_blank() {
        let c = Cell::styled(' ', Style::new().bg(AnsiColor::Blue));
        assert!(!c.is_blank());
    }

    #[test]
    fn wide_character_has_width_two() {
        let c = Cell::new('日');
        assert!(c.is_wide());
        assert!(!c.is_continuation());
    }

    #[test]
    fn continuation_carries_style() {
        let style = Style::new().fg(AnsiColor::Green);
        let c = Cell::continuation(style.clone());
        assert!(c.is_continuation());
        assert_eq!(c.style, style);
        assert_eq!(c.width, 0);
    }

    #[test]
    fn string_width_mixes_narrow_and_wide() {
        assert_eq!(string_width("hello"), 5);
        assert_eq!(string_width("a中b"), 4);
        assert_eq!(string_width(""), 0);
    }

    #[test]
    fn debug_is_compact() {
        assert_eq!(format!("{:?}", Cell::new('x')), "Cell('x')");
        assert_eq!(format!("{:?}", Cell::continuation(Style::new())), "Cell(<cont>)");
    }
}
