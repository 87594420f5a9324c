// SPDX-License-Identifier: MIT
//
// Differential renderer.
//
// The front buffer mirrors what the terminal shows; the back buffer holds
// the frame just drawn; the dirty region bounds everything drawn since the
// last flush. `render` walks only the dirty rectangle, emits the cells that
// differ from the front buffer, and copies each emitted cell to the front.
// Afterwards front == back everywhere.
//
// An empty dirty region produces no output at all. That is what keeps a
// static screen at O(1) cost regardless of its size.
//
// Wide characters: a continuation is never written on its own. When one
// differs, its owner one column to the left is written instead, which
// repaints both columns.

use std::io::{self, Write};

use crate::ansi;
use crate::buffer::{Buffer, Rect};
use crate::cell::Cell;
use crate::dirty::DirtyRegion;
use crate::output::{CellWriter, OutputBuffer};

// ─── RenderStats ─────────────────────────────────────────────────────────────

/// What one render pass cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderStats {
    /// Cells written to the terminal.
    pub cells: u64,
    /// Escape sequences written (cursor moves, SGR, links, sync markers).
    pub escape_codes: u64,
    /// Bytes of output produced.
    pub bytes: u64,
    /// Cells covered by the scanned region.
    pub dirty_area: u64,
    /// Nothing was dirty; nothing was produced.
    pub skipped: bool,
}

// ─── DiffRenderer ────────────────────────────────────────────────────────────

/// Emits the difference between two buffers as ANSI output.
pub struct DiffRenderer {
    output: OutputBuffer,
    writer: CellWriter,
    full_redraw: bool,
}

impl DiffRenderer {
    /// A renderer whose first pass repaints the whole screen.
    #[must_use]
    pub fn new() -> Self {
        Self {
            output: OutputBuffer::new(),
            writer: CellWriter::new(),
            full_redraw: true,
        }
    }

    /// Make the next pass clear the screen and repaint every cell.
    pub const fn invalidate(&mut self) {
        self.full_redraw = true;
    }

    /// Whether the next pass is a full repaint.
    #[must_use]
    pub const fn needs_full_redraw(&self) -> bool {
        self.full_redraw
    }

    /// Diff `back` against `front` inside `dirty` and buffer the output.
    ///
    /// `front` and `back` must have the same dimensions. Output accumulates
    /// until [`flush_to`](Self::flush_to).
    pub fn render(&mut self, front: &mut Buffer, back: &Buffer, dirty: &DirtyRegion) -> RenderStats {
        let width = back.width();
        let height = back.height();
        debug_assert_eq!((front.width(), front.height()), (width, height));

        let full = self.full_redraw;
        let area = if full {
            Some(back.bounds()).filter(|r| !r.is_empty())
        } else {
            dirty.clipped_rect(width, height)
        };
        let Some(area) = area else {
            return RenderStats {
                skipped: true,
                ..RenderStats::default()
            };
        };

        let start_len = self.output.len();
        self.writer.reset_state();
        self.writer.take_escape_codes();

        ansi::begin_sync(&mut self.output).ok();
        self.writer.count_escapes(1);
        if full {
            ansi::clear_screen(&mut self.output).ok();
            self.writer.count_escapes(1);
        }

        let mut cells = 0;
        for y in area.y..area.y + area.height {
            cells += self.render_row(front, back, area, y, full);
        }

        self.writer.finish(&mut self.output);
        ansi::end_sync(&mut self.output).ok();
        self.writer.count_escapes(1);
        self.full_redraw = false;

        RenderStats {
            cells,
            escape_codes: self.writer.take_escape_codes(),
            bytes: (self.output.len() - start_len) as u64,
            dirty_area: u64::from(area.area()),
            skipped: false,
        }
    }

    fn render_row(&mut self, front: &mut Buffer, back: &Buffer, area: Rect, y: u16, full: bool) -> u64 {
        let width = back.width();
        let Some(row) = back.row(y) else {
            return 0;
        };
        let mut emitted = 0;
        let mut x = area.x;
        while u32::from(x) < area.right() {
            let cell = &row[usize::from(x)];
            if !full && front.get(x, y) == Some(cell) {
                x += 1;
                continue;
            }

            // A changed continuation is repainted through its owner.
            if cell.continuation && x == 0 {
                front.set(x, y, cell.clone());
                x += 1;
                continue;
            }
            let owner_x = if cell.continuation { x - 1 } else { x };

            let owner = &row[usize::from(owner_x)];
            if owner.width == 2 && owner_x + 1 >= width {
                // No room for the second column at the right edge.
                let substitute = Cell::styled(' ', owner.style.clone());
                self.writer.render_cell(&mut self.output, owner_x, y, &substitute);
            } else {
                self.writer.render_cell(&mut self.output, owner_x, y, owner);
            }
            emitted += 1;
            front.set(owner_x, y, owner.clone());
            if owner.width == 2 && owner_x + 1 < width {
                front.set(owner_x + 1, y, row[usize::from(owner_x) + 1].clone());
                x = owner_x + 2;
            } else {
                x = owner_x + 1;
            }
        }
        emitted
    }

    /// Buffered bytes not yet flushed.
    #[must_use]
    pub fn output_bytes(&self) -> &[u8] {
        self.output.as_bytes()
    }

    /// Append raw escapes (cursor placement after a frame, mode toggles).
    pub fn output_mut(&mut self) -> &mut OutputBuffer {
        &mut self.output
    }

    /// Write all buffered output to `w` in one call.
    ///
    /// # Errors
    ///
    /// Returns the writer's error.
    pub fn flush_to(&mut self, w: &mut (impl Write + ?Sized)) -> io::Result<()> {
        self.output.flush_to(w)
    }

    /// Forget the tracked terminal state (after output the renderer did not
    /// produce, e.g. a mode toggle that moved the cursor).
    pub fn reset_writer_state(&mut self) {
        self.writer.reset_state();
    }
}

impl Default for DiffRenderer {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
