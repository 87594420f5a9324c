// SPDX-License-Identifier: MIT
//
// Frame: the single mutation entry point into the back buffer.
//
// A `Frame` owns the terminal's render-state guard, so holding one *is*
// holding the frame lock. Every drawing call writes into the back buffer and
// widens the dirty region; `Terminal::end_frame` consumes the frame, diffs
// and flushes. Dropping a frame without ending it releases the lock and
// discards nothing: the drawn cells stay in the back buffer and go out with
// the next frame that is ended.
//
// `SubFrame` is a clipped, translated view borrowed from a frame (or from
// another sub-frame). Everything outside its rectangle is a silent no-op.

use std::time::Instant;

use parking_lot::MutexGuard;

use crate::buffer::{Buffer, Rect};
use crate::cell::string_width;
use crate::error::{Error, Result};
use crate::hyperlink;
use crate::style::Style;
use crate::terminal::{RenderState, Size};

// ─── Frame ──────────────────────────────────────────────────────────────────

/// Drawing handle returned by `Terminal::begin_frame`.
#[must_use = "a frame must be passed to Terminal::end_frame to be shown"]
pub struct Frame<'t> {
    state: MutexGuard<'t, RenderState>,
    owner: u64,
    started: Instant,
}

impl<'t> Frame<'t> {
    pub(crate) fn new(state: MutexGuard<'t, RenderState>, owner: u64) -> Self {
        Self {
            state,
            owner,
            started: Instant::now(),
        }
    }

    pub(crate) const fn owner(&self) -> u64 {
        self.owner
    }

    pub(crate) const fn started(&self) -> Instant {
        self.started
    }

    pub(crate) fn into_guard(self) -> MutexGuard<'t, RenderState> {
        self.state
    }

    #[must_use]
    pub fn size(&self) -> Size {
        Size::new(self.state.back.width(), self.state.back.height())
    }

    #[must_use]
    pub fn area(&self) -> Rect {
        self.state.back.bounds()
    }

    /// The back buffer as drawn so far.
    #[must_use]
    pub fn back(&self) -> &Buffer {
        &self.state.back
    }

    /// Write one character.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfBounds`] when `(x, y)` is outside the terminal. Unlike
    /// every other drawing call this is reported, so clipping bugs surface.
    pub fn set_cell(&mut self, x: u16, y: u16, ch: char, style: &Style) -> Result<()> {
        if !self.state.back.in_bounds(x, y) {
            return Err(Error::OutOfBounds {
                x: i32::from(x),
                y: i32::from(y),
            });
        }
        self.view().set_cell(x, y, ch, style);
        Ok(())
    }

    /// Print `text` starting at `(x, y)`; returns the columns advanced.
    pub fn print(&mut self, x: u16, y: u16, text: &str, style: &Style) -> u16 {
        self.view().print(x, y, text, style)
    }

    /// Print `text` as an OSC 8 hyperlink to `url`.
    pub fn print_hyperlink(&mut self, x: u16, y: u16, url: &str, text: &str, style: &Style) -> u16 {
        self.view().print_hyperlink(x, y, url, text, style)
    }

    pub fn fill(&mut self, rect: Rect, ch: char, style: &Style) {
        self.view().fill(rect, ch, style);
    }

    /// Blank the whole back buffer.
    pub fn clear(&mut self) {
        self.view().clear();
    }

    /// Leave the cursor at `(x, y)` after this frame. Ignored outside the
    /// terminal.
    pub fn set_cursor(&mut self, x: u16, y: u16) {
        if self.state.back.in_bounds(x, y) {
            self.state.cursor = Some((x, y));
        }
    }

    /// Stop placing the cursor after frames.
    pub fn clear_cursor(&mut self) {
        self.state.cursor = None;
    }

    /// A clipped view on `rect`, with coordinates relative to its corner.
    pub fn sub_frame(&mut self, rect: Rect) -> SubFrame<'_> {
        self.view().into_sub(rect)
    }

    fn view(&mut self) -> SubFrame<'_> {
        let clip = self.state.back.bounds();
        SubFrame {
            state: &mut self.state,
            origin: (0, 0),
            clip: Some(clip),
        }
    }
}

impl std::fmt::Debug for Frame<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("owner", &self.owner)
            .field("size", &self.size())
            .finish_non_exhaustive()
    }
}

// ─── SubFrame ───────────────────────────────────────────────────────────────

/// A clipped view on part of a frame.
///
/// Coordinates are relative to the view's top-left corner. Nothing drawn
/// through a sub-frame lands outside its rectangle.
pub struct SubFrame<'f> {
    state: &'f mut RenderState,
    origin: (u16, u16),
    /// Absolute clip; `None` when the view lies entirely off-screen.
    clip: Option<Rect>,
}

impl SubFrame<'_> {
    /// The view's rectangle in absolute coordinates, if any of it is visible.
    #[must_use]
    pub const fn clip(&self) -> Option<Rect> {
        self.clip
    }

    #[must_use]
    pub fn width(&self) -> u16 {
        self.clip.map_or(0, |c| {
            u16::try_from(c.right().saturating_sub(u32::from(self.origin.0))).unwrap_or(u16::MAX)
        })
    }

    #[must_use]
    pub fn height(&self) -> u16 {
        self.clip.map_or(0, |c| {
            u16::try_from(c.bottom().saturating_sub(u32::from(self.origin.1))).unwrap_or(u16::MAX)
        })
    }

    fn absolute(&self, x: u16, y: u16) -> Option<(u16, u16)> {
        Some((self.origin.0.checked_add(x)?, self.origin.1.checked_add(y)?))
    }

    /// Write one character; a no-op outside the view.
    pub fn set_cell(&mut self, x: u16, y: u16, ch: char, style: &Style) {
        let (Some(clip), Some((ax, ay))) = (self.clip, self.absolute(x, y)) else {
            return;
        };
        if !clip.contains(ax, ay) {
            return;
        }
        let advanced = self.state.back.put_char(ax, ay, ch, style, Some(clip));
        self.mark_span(ax, ay, advanced);
    }

    /// Print `text` starting at `(x, y)`; returns the columns advanced,
    /// counting clipped columns.
    pub fn print(&mut self, x: u16, y: u16, text: &str, style: &Style) -> u16 {
        let Some((ax, ay)) = self.absolute(x, y) else {
            return 0;
        };
        let Some(clip) = self.clip else {
            return u16::try_from(string_width(text)).unwrap_or(u16::MAX);
        };
        let advanced = self.state.back.print(ax, ay, text, style, Some(clip));
        self.mark_span(ax, ay, advanced);
        advanced
    }

    pub fn print_hyperlink(&mut self, x: u16, y: u16, url: &str, text: &str, style: &Style) -> u16 {
        // Strip any links already embedded in the text; the cell style carries ours.
        let text = hyperlink::strip_osc8(text);
        self.print(x, y, &text, &style.clone().link(url))
    }

    pub fn fill(&mut self, rect: Rect, ch: char, style: &Style) {
        let (Some(clip), Some((ax, ay))) = (self.clip, self.absolute(rect.x, rect.y)) else {
            return;
        };
        let target = Rect::new(ax, ay, rect.width, rect.height);
        let Some(visible) = target.intersect(clip) else {
            return;
        };
        self.state.back.fill(visible, ch, style, Some(clip));
        // A fill edge may split wide characters on either side.
        self.state.dirty.mark_rect(
            visible.x.saturating_sub(1),
            visible.y,
            visible.width.saturating_add(2),
            visible.height,
        );
    }

    /// Blank the view.
    pub fn clear(&mut self) {
        if let Some(clip) = self.clip {
            let (ox, oy) = self.origin;
            let local = Rect::new(
                clip.x - ox,
                clip.y - oy,
                clip.width,
                clip.height,
            );
            self.fill(local, ' ', &Style::new());
        }
    }

    /// A nested view on `rect`, relative to this one.
    pub fn sub_frame(&mut self, rect: Rect) -> SubFrame<'_> {
        SubFrame {
            state: &mut *self.state,
            origin: self.origin,
            clip: self.clip,
        }
        .into_sub(rect)
    }

    fn into_sub(self, rect: Rect) -> Self {
        let origin = self
            .absolute(rect.x, rect.y)
            .unwrap_or((u16::MAX, u16::MAX));
        let target = Rect::new(origin.0, origin.1, rect.width, rect.height);
        let clip = self.clip.and_then(|c| c.intersect(target));
        Self {
            state: self.state,
            origin,
            clip,
        }
    }

    fn mark_span(&mut self, x: u16, y: u16, advanced: u16) {
        // One column of slack on both sides: overwriting half of a wide
        // character rewrites its other half.
        self.state
            .dirty
            .mark_rect(x.saturating_sub(1), y, advanced.saturating_add(2), 1);
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::{HeadlessBackend, SharedWriter, Terminal, TerminalConfig};
    use pretty_assertions::assert_eq;

    fn term(cols: u16, rows: u16) -> (Terminal, SharedWriter) {
        let out = SharedWriter::new();
        let t = Terminal::new(HeadlessBackend::new(cols, rows), out.clone(), TerminalConfig::default())
            .unwrap();
        (t, out)
    }

    // ── set_cell ────────────────────────────────────────────────────────

    #[test]
    fn set_cell_reports_out_of_bounds() {
        let (t, _) = term(4, 2);
        let mut f = t.begin_frame().unwrap();
        assert!(f.set_cell(3, 1, 'x', &Style::new()).is_ok());
        let err = f.set_cell(4, 0, 'x', &Style::new()).unwrap_err();
        assert!(matches!(err, Error::OutOfBounds { x: 4, y: 0 }));
        assert_eq!(f.back().row_text(1), "   x");
        t.end_frame(f).unwrap();
    }

    #[test]
    fn out_of_bounds_drawing_is_silent() {
        let (t, _) = term(4, 2);
        let mut f = t.begin_frame().unwrap();
        f.print(10, 10, "nowhere", &Style::new());
        f.fill(Rect::new(50, 50, 3, 3), '#', &Style::new());
        f.print(u16::MAX, 0, "edge", &Style::new());
        assert_eq!(f.back().row_text(0), "    ");
        t.end_frame(f).unwrap();
    }

    // ── print ───────────────────────────────────────────────────────────

    #[test]
    fn print_clips_at_the_right_edge() {
        let (t, _) = term(5, 1);
        let mut f = t.begin_frame().unwrap();
        assert_eq!(f.print(2, 0, "abcdef", &Style::new()), 3);
        assert_eq!(f.back().row_text(0), "  abc");
        t.end_frame(f).unwrap();
    }

    #[test]
    fn print_hyperlink_sets_link_on_cells() {
        let (t, out) = term(10, 1);
        let mut f = t.begin_frame().unwrap();
        f.print_hyperlink(0, 0, "https://example.com", "site", &Style::new());
        assert_eq!(
            f.back().get(1, 0).unwrap().style.link.as_deref(),
            Some("https://example.com")
        );
        t.end_frame(f).unwrap();
        let s = out.text();
        assert!(s.contains("\x1b]8;;https://example.com\x1b\\"));
        assert!(s.contains("site\x1b]8;;\x1b\\"));
    }

    #[test]
    fn fill_and_clear() {
        let (t, _) = term(4, 3);
        let mut f = t.begin_frame().unwrap();
        f.fill(Rect::new(1, 1, 2, 5), '#', &Style::new());
        assert_eq!(f.back().row_text(1), " ## ");
        assert_eq!(f.back().row_text(2), " ## ");
        f.clear();
        assert_eq!(f.back().row_text(1), "    ");
        t.end_frame(f).unwrap();
    }

    // ── SubFrame ────────────────────────────────────────────────────────

    #[test]
    fn sub_frame_translates_and_clips() {
        let (t, _) = term(10, 3);
        let mut f = t.begin_frame().unwrap();
        {
            let mut sub = f.sub_frame(Rect::new(2, 1, 4, 1));
            assert_eq!((sub.width(), sub.height()), (4, 1));
            sub.print(0, 0, "abcdefgh", &Style::new());
            sub.print(0, 1, "below", &Style::new());
            sub.set_cell(9, 0, 'z', &Style::new());
        }
        assert_eq!(f.back().row_text(0), "          ");
        assert_eq!(f.back().row_text(1), "  abcd    ");
        assert_eq!(f.back().row_text(2), "          ");
        t.end_frame(f).unwrap();
    }

    #[test]
    fn nested_sub_frames_intersect() {
        let (t, _) = term(10, 2);
        let mut f = t.begin_frame().unwrap();
        {
            let mut outer = f.sub_frame(Rect::new(2, 0, 5, 2));
            let mut inner = outer.sub_frame(Rect::new(3, 0, 10, 1));
            assert_eq!(inner.clip(), Some(Rect::new(5, 0, 2, 1)));
            inner.print(0, 0, "xyz", &Style::new());
        }
        assert_eq!(f.back().row_text(0), "     xy   ");
        t.end_frame(f).unwrap();
    }

    #[test]
    fn off_screen_sub_frame_is_inert() {
        let (t, _) = term(4, 1);
        let mut f = t.begin_frame().unwrap();
        {
            let mut sub = f.sub_frame(Rect::new(8, 8, 2, 2));
            assert_eq!(sub.clip(), None);
            assert_eq!(sub.print(0, 0, "ab", &Style::new()), 2);
            sub.fill(Rect::new(0, 0, 2, 2), '#', &Style::new());
            sub.clear();
        }
        assert_eq!(f.back().row_text(0), "    ");
        t.end_frame(f).unwrap();
    }

    #[test]
    fn sub_frame_clear_only_touches_view() {
        let (t, _) = term(6, 1);
        let mut f = t.begin_frame().unwrap();
        f.print(0, 0, "abcdef", &Style::new());
        f.sub_frame(Rect::new(2, 0, 2, 1)).clear();
        assert_eq!(f.back().row_text(0), "ab  ef");
        t.end_frame(f).unwrap();
    }

    #[test]
    fn wide_char_clipped_by_sub_frame_edge() {
        let (t, _) = term(6, 1);
        let mut f = t.begin_frame().unwrap();
        f.sub_frame(Rect::new(0, 0, 3, 1)).print(0, 0, "a世界", &Style::new());
        // "世" fits in columns 1-2; "界" would straddle the clip edge.
        assert_eq!(f.back().row_text(0), "a世   ");
        t.end_frame(f).unwrap();
    }

    // ── Cursor ──────────────────────────────────────────────────────────

    #[test]
    fn cursor_outside_is_ignored() {
        let (t, _) = term(4, 2);
        let mut f = t.begin_frame().unwrap();
        f.set_cursor(9, 9);
        t.end_frame(f).unwrap();
        assert_eq!(t.cursor(), None);
    }

    #[test]
    fn dropped_frame_keeps_drawing_for_next_flush() {
        let (t, out) = term(6, 1);
        {
            let mut f = t.begin_frame().unwrap();
            f.print(0, 0, "kept", &Style::new());
        }
        assert!(out.contents().is_empty());
        let f = t.begin_frame().unwrap();
        t.end_frame(f).unwrap();
        assert!(out.text().contains("kept"));
    }
}
