// SPDX-License-Identifier: MIT
//
// DirtyRegion: bounding box of everything drawn since the last flush.
//
// The diff renderer scans only this rectangle, so a frame that draws nothing
// costs nothing. Bounds only ever grow until `clear`.

use crate::buffer::Rect;

/// Inclusive bounding box of marked cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyRegion {
    min_x: u16,
    min_y: u16,
    max_x: u16,
    max_y: u16,
    empty: bool,
}

impl Default for DirtyRegion {
    fn default() -> Self {
        Self::new()
    }
}

impl DirtyRegion {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            min_x: 0,
            min_y: 0,
            max_x: 0,
            max_y: 0,
            empty: true,
        }
    }

    /// Grow to include `(x, y)`.
    pub fn mark(&mut self, x: u16, y: u16) {
        if self.empty {
            *self = Self {
                min_x: x,
                min_y: y,
                max_x: x,
                max_y: y,
                empty: false,
            };
            return;
        }
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    /// Grow to include the `w × h` rectangle at `(x, y)`. Zero-area is a no-op.
    pub fn mark_rect(&mut self, x: u16, y: u16, w: u16, h: u16) {
        if w == 0 || h == 0 {
            return;
        }
        self.mark(x, y);
        self.mark(
            x.saturating_add(w - 1),
            y.saturating_add(h - 1),
        );
    }

    /// Grow to include another region.
    pub fn merge(&mut self, other: &Self) {
        if other.empty {
            return;
        }
        self.mark(other.min_x, other.min_y);
        self.mark(other.max_x, other.max_y);
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.empty
    }

    /// Inclusive `(min_x, min_y, max_x, max_y)`, or `None` when empty.
    #[must_use]
    pub const fn bounds(&self) -> Option<(u16, u16, u16, u16)> {
        if self.empty {
            None
        } else {
            Some((self.min_x, self.min_y, self.max_x, self.max_y))
        }
    }

    /// The region as a rectangle clipped to `width × height`.
    #[must_use]
    pub fn clipped_rect(&self, width: u16, height: u16) -> Option<Rect> {
        let (x0, y0, x1, y1) = self.bounds()?;
        if x0 >= width || y0 >= height {
            return None;
        }
        let x1 = x1.min(width - 1);
        let y1 = y1.min(height - 1);
        Some(Rect::new(x0, y0, x1 - x0 + 1, y1 - y0 + 1))
    }

    /// Number of cells covered by the bounding box.
    #[must_use]
    pub fn area(&self) -> u64 {
        self.bounds().map_or(0, |(x0, y0, x1, y1)| {
            u64::from(x1 - x0 + 1) * u64::from(y1 - y0 + 1)
        })
    }
}
