// SPDX-License-Identifier: MIT
//
// Buffer: the 2D cell grid.
//
// The terminal keeps two of these: the front buffer mirrors what the
// terminal is showing, the back buffer is what the current frame draws into.
// The diff renderer compares them and copies emitted cells back to front.
//
// Design:
//
//   - Flat `Vec<Cell>` with row-major indexing, so the renderer's
//     left-to-right scan is a linear walk.
//
//   - Every write takes an optional clip `Rect`. Writes outside the buffer
//     or the clip are dropped without error.
//
//   - Wide characters occupy two cells: the owner (width 2) and a
//     continuation. Writing over either half breaks the pair, leaving a
//     styled space behind so no continuation is ever orphaned.
//
//   - `resize` keeps the overlapping top-left region exactly as it was.

use crate::cell::{Cell, char_width};
use crate::style::Style;

// ─── Rect ────────────────────────────────────────────────────────────────────

/// An axis-aligned rectangle in cell coordinates.
///
/// ```
/// use tessera_term::buffer::Rect;
///
/// let r = Rect::new(10, 5, 80, 24);
/// assert!(r.contains(10, 5));
/// assert!(r.contains(89, 28));
/// assert!(!r.contains(90, 5));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Rect {
    #[inline]
    #[must_use]
    pub const fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self { x, y, width, height }
    }

    /// Right edge, exclusive.
    #[inline]
    #[must_use]
    pub const fn right(self) -> u32 {
        self.x as u32 + self.width as u32
    }

    /// Bottom edge, exclusive.
    #[inline]
    #[must_use]
    pub const fn bottom(self) -> u32 {
        self.y as u32 + self.height as u32
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[inline]
    #[must_use]
    pub const fn area(self) -> u32 {
        self.width as u32 * self.height as u32
    }

    #[inline]
    #[must_use]
    pub const fn contains(self, x: u16, y: u16) -> bool {
        x >= self.x && (x as u32) < self.right() && y >= self.y && (y as u32) < self.bottom()
    }

    /// Overlap of two rectangles, or `None` when they don't touch.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn intersect(self, other: Self) -> Option<Self> {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());
        // Differences are bounded by the narrower input, so they fit in u16.
        if x2 > u32::from(x1) && y2 > u32::from(y1) {
            Some(Self {
                x: x1,
                y: y1,
                width: (x2 - u32::from(x1)) as u16,
                height: (y2 - u32::from(y1)) as u16,
            })
        } else {
            None
        }
    }

    /// Shrink to fit inside `width × height`, keeping the origin.
    #[must_use]
    pub fn clamp_to(self, width: u16, height: u16) -> Self {
        Self {
            x: self.x,
            y: self.y,
            width: self.width.min(width.saturating_sub(self.x)),
            height: self.height.min(height.saturating_sub(self.y)),
        }
    }
}

// ─── Buffer ──────────────────────────────────────────────────────────────────

/// A grid of cells, `index = y * width + x`.
///
/// ```
/// use tessera_term::buffer::Buffer;
/// use tessera_term::style::Style;
///
/// let mut buf = Buffer::new(20, 4);
/// buf.print(0, 0, "hi", &Style::new(), None);
/// assert_eq!(buf.get(1, 0).unwrap().ch, 'i');
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Buffer {
    width: u16,
    height: u16,
    cells: Vec<Cell>,
}

impl Buffer {
    // ─── Construction ────────────────────────────────────────────────────

    /// A buffer of blank cells.
    #[must_use]
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::BLANK; usize::from(width) * usize::from(height)],
        }
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub const fn width(&self) -> u16 {
        self.width
    }

    #[inline]
    #[must_use]
    pub const fn height(&self) -> u16 {
        self.height
    }

    /// The whole buffer as a rectangle at the origin.
    #[inline]
    #[must_use]
    pub const fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    #[inline]
    #[must_use]
    pub const fn in_bounds(&self, x: u16, y: u16) -> bool {
        x < self.width && y < self.height
    }

    #[inline]
    const fn index(&self, x: u16, y: u16) -> usize {
        y as usize * self.width as usize + x as usize
    }

    #[inline]
    #[must_use]
    pub fn get(&self, x: u16, y: u16) -> Option<&Cell> {
        if self.in_bounds(x, y) {
            Some(&self.cells[self.index(x, y)])
        } else {
            None
        }
    }

    /// One row as a slice, or `None` past the bottom.
    #[must_use]
    pub fn row(&self, y: u16) -> Option<&[Cell]> {
        if y < self.height {
            let start = self.index(0, y);
            Some(&self.cells[start..start + usize::from(self.width)])
        } else {
            None
        }
    }

    /// Cells with their coordinates, row by row.
    #[allow(clippy::cast_possible_truncation)]
    pub fn iter(&self) -> impl Iterator<Item = (u16, u16, &Cell)> {
        let w = usize::from(self.width).max(1);
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, cell)| ((i % w) as u16, (i / w) as u16, cell))
    }

    /// The characters of a row as a string, continuations skipped.
    #[must_use]
    pub fn row_text(&self, y: u16) -> String {
        self.row(y)
            .map(|cells| {
                cells
                    .iter()
                    .filter(|c| !c.continuation)
                    .map(|c| c.ch)
                    .collect()
            })
            .unwrap_or_default()
    }

    // ─── Clear & Resize ──────────────────────────────────────────────────

    pub fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    /// Resize, keeping the overlapping top-left region cell for cell.
    ///
    /// Cells that only exist in the new bounds are blank.
    pub fn resize(&mut self, width: u16, height: u16) {
        if width == self.width && height == self.height {
            return;
        }
        let mut cells = vec![Cell::BLANK; usize::from(width) * usize::from(height)];
        let keep_w = usize::from(self.width.min(width));
        for y in 0..self.height.min(height) {
            let src = self.index(0, y);
            let dst = usize::from(y) * usize::from(width);
            cells[dst..dst + keep_w].clone_from_slice(&self.cells[src..src + keep_w]);
        }
        self.width = width;
        self.height = height;
        self.cells = cells;
    }

    // ─── Direct Cell Access ──────────────────────────────────────────────

    /// Store a cell verbatim. No clipping, no wide-char bookkeeping.
    ///
    /// Returns `false` when out of bounds.
    #[inline]
    pub fn set(&mut self, x: u16, y: u16, cell: Cell) -> bool {
        if !self.in_bounds(x, y) {
            return false;
        }
        let idx = self.index(x, y);
        self.cells[idx] = cell;
        true
    }

    // ─── Wide Character Cleanup ──────────────────────────────────────────

    /// Break any wide character overlapping `(x, y)`.
    ///
    /// A continuation at `(x, y)` turns its owner into a styled space. An
    /// owner at `(x, y)` loses its continuation.
    fn break_wide_char_at(&mut self, x: u16, y: u16) {
        let idx = self.index(x, y);

        if self.cells[idx].continuation && x > 0 {
            let prev = idx - 1;
            let style = std::mem::take(&mut self.cells[prev].style);
            self.cells[prev] = Cell::styled(' ', style);
        }

        if self.cells[idx].width == 2 && x + 1 < self.width {
            let next = idx + 1;
            if self.cells[next].continuation {
                let style = std::mem::take(&mut self.cells[next].style);
                self.cells[next] = Cell::styled(' ', style);
            }
        }
    }

    // ─── Drawing ─────────────────────────────────────────────────────────

    /// Draw one character at `(x, y)`, honoring `clip`.
    ///
    /// Returns the number of columns advanced: 0 when the write was dropped
    /// (out of bounds, clipped, or zero-width), otherwise the character's
    /// width. A wide character whose second column is unavailable is drawn
    /// as a single space.
    pub fn put_char(&mut self, x: u16, y: u16, ch: char, style: &Style, clip: Option<Rect>) -> u16 {
        let drawable = |bx: u16| -> bool {
            self.in_bounds(bx, y) && clip.is_none_or(|c| c.contains(bx, y))
        };
        if !drawable(x) {
            return 0;
        }
        let w = char_width(ch);
        if w == 0 {
            return 0;
        }
        if w == 2 && (x == u16::MAX || !drawable(x + 1)) {
            self.break_wide_char_at(x, y);
            let idx = self.index(x, y);
            self.cells[idx] = Cell::styled(' ', style.clone());
            return 1;
        }

        self.break_wide_char_at(x, y);
        let idx = self.index(x, y);
        self.cells[idx] = Cell::styled(ch, style.clone());
        if w == 2 {
            self.break_wide_char_at(x + 1, y);
            self.cells[idx + 1] = Cell::continuation(style.clone());
            return 2;
        }
        1
    }

    /// Draw a string left to right from `(x, y)`, returning columns consumed.
    ///
    /// Zero-width characters are skipped. Drawing stops at the right edge
    /// of the buffer.
    pub fn print(&mut self, x: u16, y: u16, text: &str, style: &Style, clip: Option<Rect>) -> u16 {
        if y >= self.height {
            return 0;
        }
        let mut col = x;
        for ch in text.chars() {
            if col >= self.width {
                break;
            }
            let w = char_width(ch);
            if w == 0 {
                continue;
            }
            let advanced = self.put_char(col, y, ch, style, clip);
            // Clipped cells still consume their columns so text stays aligned.
            #[allow(clippy::cast_possible_truncation)]
            let step = if advanced == 0 { w as u16 } else { advanced };
            col = col.saturating_add(step);
            if advanced == 1 && w == 2 {
                break;
            }
        }
        col.saturating_sub(x).min(self.width.saturating_sub(x))
    }

    /// Fill `rect` with `ch` drawn in `style`, honoring `clip`.
    pub fn fill(&mut self, rect: Rect, ch: char, style: &Style, clip: Option<Rect>) {
        let Some(mut area) = rect.intersect(self.bounds()) else {
            return;
        };
        if let Some(clip) = clip {
            let Some(clipped) = area.intersect(clip) else {
                return;
            };
            area = clipped;
        }
        let step = if char_width(ch) == 2 { 2 } else { 1 };
        for y in area.y..area.y + area.height {
            let mut x = area.x;
            while u32::from(x) < area.right() {
                let advanced = self.put_char(x, y, ch, style, Some(area));
                x = x.saturating_add(if advanced == 0 { step } else { advanced });
            }
        }
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Buffer({}x{})", self.width, self.height)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
