// SPDX-License-Identifier: MIT
//
// Mouse interaction engine.
//
// Two layers:
//
// - `decode_sgr` turns the parameters of an SGR mouse report
//   (`ESC [ < b ; x ; y M|m`) into a raw `MouseEvent`: press, release,
//   move, drag or scroll, with 0-based coordinates.
// - `MouseEngine` turns raw events into interactions over application
//   regions: hit testing by z-index, enter/leave, press capture, click
//   synthesis with double/triple escalation, and drag start/stream/end.
//
// Regions are owned by the application (`Arc<MouseRegion>`); the engine
// keeps `Weak` references, so a dropped region simply stops receiving
// events. The engine is driven from one event loop and is not `Sync`
// by intent: `handle_event` takes `&mut self`.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::trace;

use crate::buffer::Rect;
use crate::input::{Modifiers, parse_u32_at};

// ─── Event Types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MouseButton {
    /// No button: releases, plain motion, synthesized enter/leave.
    #[default]
    None,
    Left,
    Middle,
    Right,
    WheelUp,
    WheelDown,
    WheelLeft,
    WheelRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseEventType {
    // Raw, from the wire.
    Press,
    Release,
    Move,
    Drag,
    Scroll,
    // Synthesized by the engine (or by a caller ahead of it).
    Click,
    DoubleClick,
    TripleClick,
    DragStart,
    DragEnd,
    Enter,
    Leave,
}

impl MouseEventType {
    #[must_use]
    pub const fn is_click(self) -> bool {
        matches!(self, Self::Click | Self::DoubleClick | Self::TripleClick)
    }
}

/// One mouse event in 0-based cell coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MouseEvent {
    pub x: u16,
    pub y: u16,
    pub button: MouseButton,
    pub event_type: MouseEventType,
    pub modifiers: Modifiers,
    /// Horizontal wheel step: -1 left, 1 right.
    pub delta_x: i8,
    /// Vertical wheel step: -1 up, 1 down.
    pub delta_y: i8,
    /// 1, 2 or 3 on synthesized clicks; 0 otherwise.
    pub click_count: u8,
    pub timestamp: Instant,
}

impl MouseEvent {
    #[must_use]
    pub fn new(event_type: MouseEventType, button: MouseButton, x: u16, y: u16) -> Self {
        Self {
            x,
            y,
            button,
            event_type,
            modifiers: Modifiers::empty(),
            delta_x: 0,
            delta_y: 0,
            click_count: 0,
            timestamp: Instant::now(),
        }
    }

    /// A copy of this event with another type, keeping position, button,
    /// modifiers and timestamp.
    #[must_use]
    pub fn derive(&self, event_type: MouseEventType) -> Self {
        Self {
            event_type,
            delta_x: 0,
            delta_y: 0,
            click_count: 0,
            ..self.clone()
        }
    }

    /// Position relative to `rect`'s top-left corner (saturating).
    #[must_use]
    pub const fn local(&self, rect: Rect) -> (u16, u16) {
        (self.x.saturating_sub(rect.x), self.y.saturating_sub(rect.y))
    }
}

// ─── SGR Decoding ───────────────────────────────────────────────────────────

/// Decode the parameter bytes of an SGR mouse report (between `<` and the
/// terminator). `release` is true for the `m` terminator.
///
/// Returns `None` unless there are exactly three numeric parameters.
///
/// ```
/// use tessera_term::mouse::{decode_sgr, MouseButton, MouseEventType};
///
/// let ev = decode_sgr(b"0;11;6", false).unwrap();
/// assert_eq!((ev.button, ev.event_type, ev.x, ev.y), (MouseButton::Left, MouseEventType::Press, 10, 5));
/// ```
#[must_use]
pub fn decode_sgr(params: &[u8], release: bool) -> Option<MouseEvent> {
    let mut values = [0u32; 3];
    let mut pos = 0;
    for (i, slot) in values.iter_mut().enumerate() {
        let (value, next) = parse_u32_at(params, pos);
        if next == pos {
            return None;
        }
        *slot = value;
        pos = next;
        if i < 2 {
            if params.get(pos) != Some(&b';') {
                return None;
            }
            pos += 1;
        }
    }
    if pos != params.len() {
        return None;
    }
    let [cb, raw_x, raw_y] = values;

    let mut modifiers = Modifiers::empty();
    if cb & 4 != 0 {
        modifiers |= Modifiers::SHIFT;
    }
    if cb & 8 != 0 {
        modifiers |= Modifiers::ALT;
    }
    if cb & 16 != 0 {
        modifiers |= Modifiers::CTRL;
    }

    let base = cb & 3;
    let held = match base {
        0 => MouseButton::Left,
        1 => MouseButton::Middle,
        2 => MouseButton::Right,
        _ => MouseButton::None,
    };

    let (event_type, button, delta_x, delta_y) = if cb & 64 != 0 {
        match base {
            0 => (MouseEventType::Scroll, MouseButton::WheelUp, 0, -1),
            1 => (MouseEventType::Scroll, MouseButton::WheelDown, 0, 1),
            2 => (MouseEventType::Scroll, MouseButton::WheelLeft, -1, 0),
            _ => (MouseEventType::Scroll, MouseButton::WheelRight, 1, 0),
        }
    } else if cb & 32 != 0 {
        if held == MouseButton::None {
            (MouseEventType::Move, MouseButton::None, 0, 0)
        } else {
            (MouseEventType::Drag, held, 0, 0)
        }
    } else if release {
        // Release reports do not reliably say which button went up.
        (MouseEventType::Release, MouseButton::None, 0, 0)
    } else {
        (MouseEventType::Press, held, 0, 0)
    };

    let coord = |v: u32| u16::try_from(v.saturating_sub(1)).unwrap_or(u16::MAX);
    Some(MouseEvent {
        modifiers,
        delta_x,
        delta_y,
        ..MouseEvent::new(event_type, button, coord(raw_x), coord(raw_y))
    })
}

// ─── Regions ────────────────────────────────────────────────────────────────

/// Pointer shape a region asks for while hovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CursorHint {
    #[default]
    Default,
    Pointer,
    Text,
    Crosshair,
    Move,
    Grab,
    Grabbing,
    NotAllowed,
    ColResize,
    RowResize,
}

impl CursorHint {
    /// CSS cursor name, as OSC 22 expects.
    #[must_use]
    pub const fn css_name(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Pointer => "pointer",
            Self::Text => "text",
            Self::Crosshair => "crosshair",
            Self::Move => "move",
            Self::Grab => "grab",
            Self::Grabbing => "grabbing",
            Self::NotAllowed => "not-allowed",
            Self::ColResize => "col-resize",
            Self::RowResize => "row-resize",
        }
    }
}

pub type MouseHandler = Arc<dyn Fn(&MouseEvent) + Send + Sync>;

/// A rectangle that receives mouse events.
///
/// Bounds, z-index and handlers can change while the region is registered.
pub struct MouseRegion {
    bounds: Mutex<Rect>,
    z_index: Mutex<i32>,
    cursor_hint: Mutex<CursorHint>,
    handlers: RwLock<HashMap<MouseEventType, MouseHandler>>,
}

impl MouseRegion {
    #[must_use]
    pub fn new(bounds: Rect, z_index: i32) -> Self {
        Self {
            bounds: Mutex::new(bounds),
            z_index: Mutex::new(z_index),
            cursor_hint: Mutex::new(CursorHint::Default),
            handlers: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_cursor_hint(self, hint: CursorHint) -> Self {
        *self.cursor_hint.lock() = hint;
        self
    }

    /// Builder form of [`set_handler`](Self::set_handler).
    #[must_use]
    pub fn on(self, event_type: MouseEventType, handler: impl Fn(&MouseEvent) + Send + Sync + 'static) -> Self {
        self.set_handler(event_type, handler);
        self
    }

    /// Replace the handler for one event type.
    pub fn set_handler(&self, event_type: MouseEventType, handler: impl Fn(&MouseEvent) + Send + Sync + 'static) {
        self.handlers.write().insert(event_type, Arc::new(handler));
    }

    pub fn remove_handler(&self, event_type: MouseEventType) {
        self.handlers.write().remove(&event_type);
    }

    #[must_use]
    pub fn bounds(&self) -> Rect {
        *self.bounds.lock()
    }

    pub fn set_bounds(&self, bounds: Rect) {
        *self.bounds.lock() = bounds;
    }

    #[must_use]
    pub fn z_index(&self) -> i32 {
        *self.z_index.lock()
    }

    pub fn set_z_index(&self, z: i32) {
        *self.z_index.lock() = z;
    }

    #[must_use]
    pub fn cursor_hint(&self) -> CursorHint {
        *self.cursor_hint.lock()
    }

    pub fn set_cursor_hint(&self, hint: CursorHint) {
        *self.cursor_hint.lock() = hint;
    }

    #[must_use]
    pub fn contains(&self, x: u16, y: u16) -> bool {
        self.bounds().contains(x, y)
    }

    fn dispatch(&self, event: &MouseEvent) {
        let handler = self.handlers.read().get(&event.event_type).cloned();
        if let Some(handler) = handler {
            handler(event);
        }
    }
}

impl std::fmt::Debug for MouseRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MouseRegion")
            .field("bounds", &self.bounds())
            .field("z_index", &self.z_index())
            .field("cursor_hint", &self.cursor_hint())
            .field("handlers", &self.handlers.read().len())
            .finish()
    }
}

/// Handle returned by [`MouseEngine::add_region`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionId(u64);

// ─── Engine ─────────────────────────────────────────────────────────────────

/// Interaction thresholds. Distances are in cells, measured as the larger
/// of the horizontal and vertical offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MouseConfig {
    /// A release at most this far from its press is a click.
    pub click_move_threshold: u16,
    /// Movement at least this far from the press starts a drag.
    pub drag_start_threshold: u16,
    /// Longest gap between the first and second click of a double click.
    pub double_click: Duration,
    /// Longest time from the first click to the third of a triple click.
    pub triple_click: Duration,
}

impl Default for MouseConfig {
    fn default() -> Self {
        Self {
            click_move_threshold: 1,
            drag_start_threshold: 2,
            double_click: Duration::from_millis(400),
            triple_click: Duration::from_millis(600),
        }
    }
}

/// The press/release cycle in progress.
#[derive(Debug)]
struct Press {
    region: Option<RegionId>,
    button: MouseButton,
    x: u16,
    y: u16,
    dragging: bool,
    /// Click kinds the caller already delivered for this cycle.
    caller_clicks: Vec<MouseEventType>,
    last_pos: (u16, u16),
}

#[derive(Debug, Clone, Copy)]
struct LastClick {
    region: Option<RegionId>,
    button: MouseButton,
    at: Instant,
    first_at: Instant,
    count: u8,
}

/// Routes raw mouse events to regions and synthesizes interactions.
pub struct MouseEngine {
    config: MouseConfig,
    regions: Vec<(RegionId, Weak<MouseRegion>)>,
    next_id: u64,
    hover: Option<RegionId>,
    press: Option<Press>,
    last_click: Option<LastClick>,
    /// Click kinds the engine synthesized for the cycle that just ended and
    /// that a late caller copy has not matched yet.
    synthesized: Vec<MouseEventType>,
}

impl MouseEngine {
    #[must_use]
    pub fn new(config: MouseConfig) -> Self {
        Self {
            config,
            regions: Vec::new(),
            next_id: 1,
            hover: None,
            press: None,
            last_click: None,
            synthesized: Vec::new(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &MouseConfig {
        &self.config
    }

    /// Start routing events to `region`. The engine does not keep it alive.
    pub fn add_region(&mut self, region: &Arc<MouseRegion>) -> RegionId {
        self.regions.retain(|(_, weak)| weak.strong_count() > 0);
        let id = RegionId(self.next_id);
        self.next_id += 1;
        self.regions.push((id, Arc::downgrade(region)));
        id
    }

    /// Stop routing events to a region. Returns `false` if it was unknown.
    pub fn remove_region(&mut self, id: RegionId) -> bool {
        let before = self.regions.len();
        self.regions.retain(|(rid, _)| *rid != id);
        if self.hover == Some(id) {
            self.hover = None;
        }
        if let Some(press) = &mut self.press {
            if press.region == Some(id) {
                press.region = None;
            }
        }
        self.regions.len() != before
    }

    #[must_use]
    pub fn region_count(&self) -> usize {
        self.regions.iter().filter(|(_, w)| w.strong_count() > 0).count()
    }

    #[must_use]
    pub const fn hovered(&self) -> Option<RegionId> {
        self.hover
    }

    #[must_use]
    pub fn is_dragging(&self) -> bool {
        self.press.as_ref().is_some_and(|p| p.dragging)
    }

    /// Pointer shape for the current state: the captured region's while a
    /// button is held, otherwise the hovered region's.
    #[must_use]
    pub fn cursor_hint(&self) -> CursorHint {
        let id = self.press.as_ref().and_then(|p| p.region).or(self.hover);
        id.and_then(|id| self.region(id))
            .map_or(CursorHint::Default, |r| r.cursor_hint())
    }

    /// Topmost live region under `(x, y)`. Later registrations win ties.
    #[must_use]
    pub fn hit_test(&self, x: u16, y: u16) -> Option<RegionId> {
        self.regions
            .iter()
            .filter_map(|(id, weak)| weak.upgrade().map(|r| (*id, r)))
            .filter(|(_, r)| r.contains(x, y))
            .fold(None, |best: Option<(RegionId, i32)>, (id, r)| {
                let z = r.z_index();
                match best {
                    Some((_, bz)) if bz > z => best,
                    _ => Some((id, z)),
                }
            })
            .map(|(id, _)| id)
    }

    fn region(&self, id: RegionId) -> Option<Arc<MouseRegion>> {
        self.regions
            .iter()
            .find(|(rid, _)| *rid == id)
            .and_then(|(_, weak)| weak.upgrade())
    }

    fn send(&self, target: Option<RegionId>, event: &MouseEvent) {
        if let Some(region) = target.and_then(|id| self.region(id)) {
            region.dispatch(event);
        }
    }

    /// Route one event and return the events synthesized from it, in the
    /// order they were dispatched.
    ///
    /// The input event itself is dispatched too but not returned. While a
    /// press holds capture, hover changes wait until the release.
    pub fn handle_event(&mut self, event: &MouseEvent) -> Vec<MouseEvent> {
        let mut out = Vec::new();
        let hit = self.hit_test(event.x, event.y);
        let captured = self.press.is_some() && event.event_type != MouseEventType::Press;
        if !captured {
            self.update_hover(hit, event, &mut out);
        }

        match event.event_type {
            MouseEventType::Press => self.on_press(hit, event),
            MouseEventType::Drag | MouseEventType::Move => self.on_motion(hit, event, &mut out),
            MouseEventType::Release => self.on_release(hit, event, &mut out),
            MouseEventType::Scroll => {
                let target = self.press.as_ref().map_or(hit, |p| p.region);
                self.send(target, event);
            }
            t if t.is_click() => self.on_external_click(hit, event),
            // Enter/leave and drag phases from outside are passed through.
            _ => self.send(hit, event),
        }
        if captured && self.press.is_none() {
            self.update_hover(hit, event, &mut out);
        }
        out
    }

    /// Force-end an active drag without a release, e.g. on Escape.
    ///
    /// Returns the `DragEnd` sent, if a drag was active. The following
    /// release does not produce a click.
    pub fn cancel_drag(&mut self) -> Option<MouseEvent> {
        if !self.is_dragging() {
            return None;
        }
        let press = self.press.take()?;
        let end = MouseEvent::new(MouseEventType::DragEnd, press.button, press.last_pos.0, press.last_pos.1);
        self.send(press.region, &end);
        trace!("drag cancelled");
        Some(end)
    }

    fn update_hover(&mut self, hit: Option<RegionId>, event: &MouseEvent, out: &mut Vec<MouseEvent>) {
        if hit == self.hover {
            return;
        }
        if let Some(old) = self.hover {
            let leave = event.derive(MouseEventType::Leave);
            self.send(Some(old), &leave);
            out.push(leave);
        }
        if hit.is_some() {
            let enter = event.derive(MouseEventType::Enter);
            self.send(hit, &enter);
            out.push(enter);
        }
        self.hover = hit;
    }

    fn on_press(&mut self, hit: Option<RegionId>, event: &MouseEvent) {
        self.synthesized.clear();
        self.press = Some(Press {
            region: hit,
            button: event.button,
            x: event.x,
            y: event.y,
            dragging: false,
            caller_clicks: Vec::new(),
            last_pos: (event.x, event.y),
        });
        self.send(hit, event);
    }

    fn on_motion(&mut self, hit: Option<RegionId>, event: &MouseEvent, out: &mut Vec<MouseEvent>) {
        let threshold = self.config.drag_start_threshold;
        let Some(press) = &mut self.press else {
            self.send(hit, event);
            return;
        };
        press.last_pos = (event.x, event.y);
        let target = press.region;
        if !press.dragging {
            if distance((press.x, press.y), (event.x, event.y)) < threshold {
                return;
            }
            press.dragging = true;
            let mut start = event.derive(MouseEventType::DragStart);
            start.button = press.button;
            self.send(target, &start);
            out.push(start);
        }
        self.send(target, event);
    }

    fn on_release(&mut self, hit: Option<RegionId>, event: &MouseEvent, out: &mut Vec<MouseEvent>) {
        let Some(press) = self.press.take() else {
            self.send(hit, event);
            return;
        };
        self.send(press.region, event);

        if press.dragging {
            let mut end = event.derive(MouseEventType::DragEnd);
            end.button = press.button;
            self.send(press.region, &end);
            out.push(end);
            return;
        }
        if !press.caller_clicks.is_empty()
            || distance((press.x, press.y), (event.x, event.y)) > self.config.click_move_threshold
        {
            return;
        }

        let count = self.next_click_count(press.region, press.button, event.timestamp);
        let mut click = event.derive(MouseEventType::Click);
        click.button = press.button;
        click.click_count = count;
        self.send(press.region, &click);
        out.push(click.clone());
        self.synthesized.push(MouseEventType::Click);

        let escalated = match count {
            2 => Some(MouseEventType::DoubleClick),
            3 => Some(MouseEventType::TripleClick),
            _ => None,
        };
        if let Some(kind) = escalated {
            let mut multi = click.derive(kind);
            multi.click_count = count;
            self.send(press.region, &multi);
            out.push(multi);
            self.synthesized.push(kind);
        }
    }

    /// A click computed by the caller. Within one press/release cycle each
    /// click kind is delivered once: a caller click arriving during the press
    /// takes the cycle from the engine, and a caller click arriving after the
    /// release is dropped only if the engine already sent that kind.
    fn on_external_click(&mut self, hit: Option<RegionId>, event: &MouseEvent) {
        let kind = event.event_type;
        let target = if let Some(press) = &mut self.press {
            if press.caller_clicks.contains(&kind) {
                trace!(event_type = ?kind, "repeated caller click dropped");
                return;
            }
            press.caller_clicks.push(kind);
            press.region
        } else if let Some(i) = self.synthesized.iter().position(|k| *k == kind) {
            self.synthesized.swap_remove(i);
            trace!(event_type = ?kind, "duplicate click suppressed");
            return;
        } else {
            hit
        };
        let count = event.click_count.clamp(1, 3);
        let now = event.timestamp;
        self.last_click = (count < 3).then_some(LastClick {
            region: target,
            button: event.button,
            at: now,
            first_at: self.last_click.filter(|_| count > 1).map_or(now, |l| l.first_at),
            count,
        });
        self.send(target, event);
    }

    fn next_click_count(&mut self, region: Option<RegionId>, button: MouseButton, now: Instant) -> u8 {
        let count = match self.last_click {
            Some(last) if last.region == region && last.button == button => {
                let since_last = now.saturating_duration_since(last.at);
                let since_first = now.saturating_duration_since(last.first_at);
                match last.count {
                    1 if since_last <= self.config.double_click => 2,
                    2 if since_last <= self.config.double_click
                        && since_first <= self.config.triple_click =>
                    {
                        3
                    }
                    _ => 1,
                }
            }
            _ => 1,
        };
        self.last_click = if count == 3 {
            None
        } else {
            Some(LastClick {
                region,
                button,
                at: now,
                first_at: if count == 1 {
                    now
                } else {
                    self.last_click.map_or(now, |l| l.first_at)
                },
                count,
            })
        };
        count
    }
}

impl Default for MouseEngine {
    fn default() -> Self {
        Self::new(MouseConfig::default())
    }
}

impl std::fmt::Debug for MouseEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MouseEngine")
            .field("regions", &self.region_count())
            .field("hover", &self.hover)
            .field("press", &self.press)
            .finish_non_exhaustive()
    }
}

/// Chebyshev distance in cells.
fn distance(a: (u16, u16), b: (u16, u16)) -> u16 {
    a.0.abs_diff(b.0).max(a.1.abs_diff(b.1))
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ev(event_type: MouseEventType, button: MouseButton, x: u16, y: u16) -> MouseEvent {
        MouseEvent::new(event_type, button, x, y)
    }

    fn at(event: MouseEvent, t: Instant) -> MouseEvent {
        MouseEvent { timestamp: t, ..event }
    }

    fn types(events: &[MouseEvent]) -> Vec<MouseEventType> {
        events.iter().map(|e| e.event_type).collect()
    }

    /// A region that logs every event type it receives.
    fn logging_region(rect: Rect, z: i32) -> (Arc<MouseRegion>, Arc<Mutex<Vec<MouseEventType>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut region = MouseRegion::new(rect, z);
        for t in [
            MouseEventType::Press,
            MouseEventType::Release,
            MouseEventType::Move,
            MouseEventType::Drag,
            MouseEventType::Scroll,
            MouseEventType::Click,
            MouseEventType::DoubleClick,
            MouseEventType::TripleClick,
            MouseEventType::DragStart,
            MouseEventType::DragEnd,
            MouseEventType::Enter,
            MouseEventType::Leave,
        ] {
            let log = Arc::clone(&log);
            region = region.on(t, move |e| log.lock().push(e.event_type));
        }
        (Arc::new(region), log)
    }

    fn clicks_in(events: &[MouseEvent]) -> Vec<MouseEventType> {
        events
            .iter()
            .map(|e| e.event_type)
            .filter(|t| t.is_click())
            .collect()
    }

    // ── SGR Decoding ────────────────────────────────────────────────────

    #[test]
    fn decode_press_release_scroll() {
        let press = decode_sgr(b"0;11;6", false).unwrap();
        assert_eq!((press.button, press.event_type, press.x, press.y), (MouseButton::Left, MouseEventType::Press, 10, 5));

        let release = decode_sgr(b"0;5;5", true).unwrap();
        assert_eq!(
            (release.button, release.event_type, release.x, release.y),
            (MouseButton::None, MouseEventType::Release, 4, 4)
        );

        let scroll = decode_sgr(b"64;10;10", false).unwrap();
        assert_eq!(
            (scroll.event_type, scroll.button, scroll.delta_x, scroll.delta_y),
            (MouseEventType::Scroll, MouseButton::WheelUp, 0, -1)
        );
    }

    #[test]
    fn decode_wheel_directions() {
        let down = decode_sgr(b"65;1;1", false).unwrap();
        assert_eq!((down.button, down.delta_y), (MouseButton::WheelDown, 1));
        let left = decode_sgr(b"66;1;1", false).unwrap();
        assert_eq!((left.button, left.delta_x), (MouseButton::WheelLeft, -1));
        let right = decode_sgr(b"67;1;1", false).unwrap();
        assert_eq!((right.button, right.delta_x), (MouseButton::WheelRight, 1));
    }

    #[test]
    fn decode_motion_and_modifiers() {
        let drag = decode_sgr(b"32;3;4", false).unwrap();
        assert_eq!((drag.event_type, drag.button), (MouseEventType::Drag, MouseButton::Left));
        let moved = decode_sgr(b"35;3;4", false).unwrap();
        assert_eq!((moved.event_type, moved.button), (MouseEventType::Move, MouseButton::None));
        let right = decode_sgr(b"2;1;1", false).unwrap();
        assert_eq!(right.button, MouseButton::Right);
        let mods = decode_sgr(b"28;1;1", false).unwrap();
        assert_eq!(mods.modifiers, Modifiers::SHIFT | Modifiers::ALT | Modifiers::CTRL);
        assert_eq!(mods.button, MouseButton::Left);
    }

    #[test]
    fn decode_rejects_malformed() {
        assert!(decode_sgr(b"0;5", false).is_none());
        assert!(decode_sgr(b"0;5;5;5", false).is_none());
        assert!(decode_sgr(b";5;5", false).is_none());
        assert!(decode_sgr(b"", false).is_none());
    }

    #[test]
    fn decode_origin_and_large_coordinates() {
        let origin = decode_sgr(b"0;1;1", false).unwrap();
        assert_eq!((origin.x, origin.y), (0, 0));
        let zero = decode_sgr(b"0;0;0", false).unwrap();
        assert_eq!((zero.x, zero.y), (0, 0));
        let big = decode_sgr(b"0;300;999999", false).unwrap();
        assert_eq!((big.x, big.y), (299, u16::MAX));
    }

    // ── Hit Testing ─────────────────────────────────────────────────────

    #[test]
    fn highest_z_wins() {
        let mut engine = MouseEngine::default();
        let low = Arc::new(MouseRegion::new(Rect::new(0, 0, 10, 10), 0));
        let high = Arc::new(MouseRegion::new(Rect::new(5, 5, 10, 10), 5));
        let low_id = engine.add_region(&low);
        let high_id = engine.add_region(&high);
        assert_eq!(engine.hit_test(6, 6), Some(high_id));
        assert_eq!(engine.hit_test(1, 1), Some(low_id));
        assert_eq!(engine.hit_test(20, 20), None);
        high.set_z_index(-1);
        assert_eq!(engine.hit_test(6, 6), Some(low_id));
    }

    #[test]
    fn dropped_region_stops_receiving() {
        let mut engine = MouseEngine::default();
        let (region, log) = logging_region(Rect::new(0, 0, 5, 5), 0);
        engine.add_region(&region);
        drop(region);
        assert_eq!(engine.region_count(), 0);
        engine.handle_event(&ev(MouseEventType::Press, MouseButton::Left, 1, 1));
        assert!(log.lock().is_empty());
    }

    #[test]
    fn removed_region_is_unknown_afterwards() {
        let mut engine = MouseEngine::default();
        let region = Arc::new(MouseRegion::new(Rect::new(0, 0, 5, 5), 0));
        let id = engine.add_region(&region);
        assert!(engine.remove_region(id));
        assert!(!engine.remove_region(id));
        assert_eq!(engine.hit_test(1, 1), None);
    }

    // ── Enter / Leave ───────────────────────────────────────────────────

    #[test]
    fn enter_and_leave_fire_once_per_crossing() {
        let mut engine = MouseEngine::default();
        let (a, a_log) = logging_region(Rect::new(0, 0, 5, 1), 0);
        let (b, b_log) = logging_region(Rect::new(5, 0, 5, 1), 0);
        engine.add_region(&a);
        engine.add_region(&b);

        for x in [1, 2, 3, 6, 7, 20] {
            engine.handle_event(&ev(MouseEventType::Move, MouseButton::None, x, 0));
        }
        let a_events = a_log.lock().clone();
        assert_eq!(a_events.iter().filter(|t| **t == MouseEventType::Enter).count(), 1);
        assert_eq!(a_events.iter().filter(|t| **t == MouseEventType::Leave).count(), 1);
        let b_events = b_log.lock().clone();
        assert_eq!(b_events.first(), Some(&MouseEventType::Enter));
        assert_eq!(b_events.last(), Some(&MouseEventType::Leave));
        assert_eq!(engine.hovered(), None);
    }

    // ── Clicks ──────────────────────────────────────────────────────────

    #[test]
    fn press_release_in_place_is_one_click() {
        let mut engine = MouseEngine::default();
        let (region, log) = logging_region(Rect::new(0, 0, 10, 10), 0);
        engine.add_region(&region);

        let mut all = engine.handle_event(&ev(MouseEventType::Press, MouseButton::Left, 5, 5));
        all.extend(engine.handle_event(&ev(MouseEventType::Release, MouseButton::None, 5, 5)));
        assert_eq!(clicks_in(&all), vec![MouseEventType::Click]);
        let click = all.iter().find(|e| e.event_type == MouseEventType::Click).unwrap();
        assert_eq!((click.button, click.click_count), (MouseButton::Left, 1));
        assert_eq!(
            *log.lock(),
            vec![
                MouseEventType::Enter,
                MouseEventType::Press,
                MouseEventType::Release,
                MouseEventType::Click
            ]
        );
    }

    #[test]
    fn second_click_escalates_to_double() {
        let mut engine = MouseEngine::default();
        let t0 = Instant::now();
        engine.handle_event(&at(ev(MouseEventType::Press, MouseButton::Left, 5, 5), t0));
        engine.handle_event(&at(ev(MouseEventType::Release, MouseButton::None, 5, 5), t0));
        let t1 = t0 + Duration::from_millis(150);
        engine.handle_event(&at(ev(MouseEventType::Press, MouseButton::Left, 5, 5), t1));
        let out = engine.handle_event(&at(ev(MouseEventType::Release, MouseButton::None, 5, 5), t1));
        assert_eq!(types(&out), vec![MouseEventType::Click, MouseEventType::DoubleClick]);
        assert_eq!(out[1].click_count, 2);
    }

    #[test]
    fn triple_click_then_counter_resets() {
        let mut engine = MouseEngine::default();
        let t0 = Instant::now();
        let mut last = Vec::new();
        for i in 0..4u64 {
            let t = t0 + Duration::from_millis(100 * i);
            engine.handle_event(&at(ev(MouseEventType::Press, MouseButton::Left, 1, 1), t));
            last.push(clicks_in(&engine.handle_event(&at(
                ev(MouseEventType::Release, MouseButton::None, 1, 1),
                t,
            ))));
        }
        assert_eq!(last[2], vec![MouseEventType::Click, MouseEventType::TripleClick]);
        assert_eq!(last[3], vec![MouseEventType::Click]);
    }

    #[test]
    fn slow_second_click_is_single() {
        let mut engine = MouseEngine::default();
        let t0 = Instant::now();
        engine.handle_event(&at(ev(MouseEventType::Press, MouseButton::Left, 1, 1), t0));
        engine.handle_event(&at(ev(MouseEventType::Release, MouseButton::None, 1, 1), t0));
        let t1 = t0 + Duration::from_millis(900);
        engine.handle_event(&at(ev(MouseEventType::Press, MouseButton::Left, 1, 1), t1));
        let out = engine.handle_event(&at(ev(MouseEventType::Release, MouseButton::None, 1, 1), t1));
        assert_eq!(clicks_in(&out), vec![MouseEventType::Click]);
    }

    #[test]
    fn different_button_breaks_the_sequence() {
        let mut engine = MouseEngine::default();
        let t0 = Instant::now();
        engine.handle_event(&at(ev(MouseEventType::Press, MouseButton::Left, 1, 1), t0));
        engine.handle_event(&at(ev(MouseEventType::Release, MouseButton::None, 1, 1), t0));
        engine.handle_event(&at(ev(MouseEventType::Press, MouseButton::Right, 1, 1), t0));
        let out = engine.handle_event(&at(ev(MouseEventType::Release, MouseButton::None, 1, 1), t0));
        assert_eq!(clicks_in(&out), vec![MouseEventType::Click]);
        assert_eq!(out[0].button, MouseButton::Right);
    }

    #[test]
    fn small_jitter_is_still_a_click() {
        let mut engine = MouseEngine::default();
        engine.handle_event(&ev(MouseEventType::Press, MouseButton::Left, 5, 5));
        let moved = engine.handle_event(&ev(MouseEventType::Drag, MouseButton::Left, 6, 5));
        assert!(moved.is_empty());
        let out = engine.handle_event(&ev(MouseEventType::Release, MouseButton::None, 6, 5));
        assert_eq!(clicks_in(&out), vec![MouseEventType::Click]);
    }

    // ── Capture and Drag ────────────────────────────────────────────────

    #[test]
    fn drag_start_stream_end_routed_to_captured_region() {
        let mut engine = MouseEngine::default();
        let (src, src_log) = logging_region(Rect::new(0, 0, 5, 5), 0);
        let (other, other_log) = logging_region(Rect::new(10, 0, 5, 5), 0);
        engine.add_region(&src);
        engine.add_region(&other);

        engine.handle_event(&ev(MouseEventType::Press, MouseButton::Left, 1, 1));
        let start = engine.handle_event(&ev(MouseEventType::Drag, MouseButton::Left, 4, 1));
        assert_eq!(types(&start), vec![MouseEventType::DragStart]);
        assert!(engine.is_dragging());
        engine.handle_event(&ev(MouseEventType::Drag, MouseButton::Left, 12, 1));
        // Captured: crossing another region changes no hover state yet.
        assert!(other_log.lock().is_empty());

        let end = engine.handle_event(&ev(MouseEventType::Release, MouseButton::None, 12, 1));
        assert_eq!(
            types(&end),
            vec![MouseEventType::DragEnd, MouseEventType::Leave, MouseEventType::Enter]
        );
        assert!(clicks_in(&end).is_empty());

        let src_events = src_log.lock().clone();
        assert!(src_events.contains(&MouseEventType::DragStart));
        assert_eq!(src_events.iter().filter(|t| **t == MouseEventType::Drag).count(), 2);
        assert!(src_events.contains(&MouseEventType::Release));
        assert!(src_events.contains(&MouseEventType::DragEnd));
        assert_eq!(src_events.last(), Some(&MouseEventType::Leave));
        // The other region gets the pending Enter after the release, and none
        // of the drag.
        let other_events = other_log.lock().clone();
        assert_eq!(other_events, vec![MouseEventType::Enter]);
    }

    #[test]
    fn cancel_drag_ends_without_release() {
        let mut engine = MouseEngine::default();
        let (region, log) = logging_region(Rect::new(0, 0, 20, 5), 0);
        engine.add_region(&region);
        engine.handle_event(&ev(MouseEventType::Press, MouseButton::Left, 1, 1));
        engine.handle_event(&ev(MouseEventType::Drag, MouseButton::Left, 8, 1));

        let end = engine.cancel_drag().unwrap();
        assert_eq!((end.event_type, end.x), (MouseEventType::DragEnd, 8));
        assert!(!engine.is_dragging());
        assert!(engine.cancel_drag().is_none());

        let out = engine.handle_event(&ev(MouseEventType::Release, MouseButton::None, 8, 1));
        assert!(out.is_empty());
        let seen = log.lock().clone();
        assert_eq!(seen.iter().filter(|t| **t == MouseEventType::DragEnd).count(), 1);
        assert!(!seen.contains(&MouseEventType::Click));
    }

    #[test]
    fn cancel_without_drag_is_none() {
        let mut engine = MouseEngine::default();
        engine.handle_event(&ev(MouseEventType::Press, MouseButton::Left, 1, 1));
        assert!(engine.cancel_drag().is_none());
    }

    // ── Pre-synthesized Clicks ──────────────────────────────────────────

    #[test]
    fn caller_click_suppresses_engine_click() {
        let mut engine = MouseEngine::default();
        let (region, log) = logging_region(Rect::new(0, 0, 10, 10), 0);
        engine.add_region(&region);

        engine.handle_event(&ev(MouseEventType::Press, MouseButton::Left, 2, 2));
        let mut click = ev(MouseEventType::Click, MouseButton::Left, 2, 2);
        click.click_count = 1;
        engine.handle_event(&click);
        let out = engine.handle_event(&ev(MouseEventType::Release, MouseButton::None, 2, 2));
        assert!(clicks_in(&out).is_empty());
        let seen = log.lock().clone();
        assert_eq!(seen.iter().filter(|t| **t == MouseEventType::Click).count(), 1);
    }

    #[test]
    fn late_caller_click_after_engine_click_is_dropped() {
        let mut engine = MouseEngine::default();
        let (region, log) = logging_region(Rect::new(0, 0, 10, 10), 0);
        engine.add_region(&region);

        engine.handle_event(&ev(MouseEventType::Press, MouseButton::Left, 2, 2));
        engine.handle_event(&ev(MouseEventType::Release, MouseButton::None, 2, 2));
        engine.handle_event(&ev(MouseEventType::Click, MouseButton::Left, 2, 2));
        let seen = log.lock().clone();
        assert_eq!(seen.iter().filter(|t| **t == MouseEventType::Click).count(), 1);
    }

    #[test]
    fn caller_multi_click_during_press_is_delivered_whole() {
        let mut engine = MouseEngine::default();
        let (region, log) = logging_region(Rect::new(0, 0, 10, 10), 0);
        engine.add_region(&region);

        engine.handle_event(&ev(MouseEventType::Press, MouseButton::Left, 2, 2));
        let mut click = ev(MouseEventType::Click, MouseButton::Left, 2, 2);
        click.click_count = 2;
        engine.handle_event(&click);
        engine.handle_event(&MouseEvent { event_type: MouseEventType::DoubleClick, ..click.clone() });
        engine.handle_event(&click);
        let out = engine.handle_event(&ev(MouseEventType::Release, MouseButton::None, 2, 2));

        assert!(clicks_in(&out).is_empty());
        assert_eq!(
            *log.lock(),
            vec![
                MouseEventType::Enter,
                MouseEventType::Press,
                MouseEventType::Click,
                MouseEventType::DoubleClick,
                MouseEventType::Release
            ]
        );
    }

    #[test]
    fn late_caller_copies_of_engine_clicks_are_dropped_per_kind() {
        let mut engine = MouseEngine::default();
        let (region, log) = logging_region(Rect::new(0, 0, 10, 10), 0);
        engine.add_region(&region);

        let t0 = Instant::now();
        for t in [t0, t0 + Duration::from_millis(100)] {
            engine.handle_event(&at(ev(MouseEventType::Press, MouseButton::Left, 2, 2), t));
            engine.handle_event(&at(ev(MouseEventType::Release, MouseButton::None, 2, 2), t));
        }
        let mut click = ev(MouseEventType::Click, MouseButton::Left, 2, 2);
        click.click_count = 2;
        engine.handle_event(&click);
        engine.handle_event(&MouseEvent { event_type: MouseEventType::DoubleClick, ..click });

        let seen = log.lock().clone();
        assert_eq!(seen.iter().filter(|t| **t == MouseEventType::Click).count(), 2);
        assert_eq!(seen.iter().filter(|t| **t == MouseEventType::DoubleClick).count(), 1);
    }

    #[test]
    fn caller_escalation_stands_when_engine_sent_only_a_click() {
        let mut engine = MouseEngine::default();
        let (region, log) = logging_region(Rect::new(0, 0, 10, 10), 0);
        engine.add_region(&region);

        engine.handle_event(&ev(MouseEventType::Press, MouseButton::Left, 2, 2));
        engine.handle_event(&ev(MouseEventType::Release, MouseButton::None, 2, 2));
        engine.handle_event(&ev(MouseEventType::Click, MouseButton::Left, 2, 2));
        engine.handle_event(&ev(MouseEventType::DoubleClick, MouseButton::Left, 2, 2));

        let seen = log.lock().clone();
        assert_eq!(seen.iter().filter(|t| **t == MouseEventType::Click).count(), 1);
        assert_eq!(seen.iter().filter(|t| **t == MouseEventType::DoubleClick).count(), 1);
    }

    // ── Cursor Hints and Scroll ─────────────────────────────────────────

    #[test]
    fn cursor_hint_follows_hover_and_capture() {
        let mut engine = MouseEngine::default();
        let link = Arc::new(MouseRegion::new(Rect::new(0, 0, 4, 1), 0).with_cursor_hint(CursorHint::Pointer));
        engine.add_region(&link);
        assert_eq!(engine.cursor_hint(), CursorHint::Default);
        engine.handle_event(&ev(MouseEventType::Move, MouseButton::None, 1, 0));
        assert_eq!(engine.cursor_hint(), CursorHint::Pointer);
        assert_eq!(engine.cursor_hint().css_name(), "pointer");

        engine.handle_event(&ev(MouseEventType::Press, MouseButton::Left, 1, 0));
        engine.handle_event(&ev(MouseEventType::Drag, MouseButton::Left, 9, 0));
        // Captured: the pressed region's hint holds outside its bounds.
        assert_eq!(engine.cursor_hint(), CursorHint::Pointer);
        engine.handle_event(&ev(MouseEventType::Release, MouseButton::None, 9, 0));
        assert_eq!(engine.cursor_hint(), CursorHint::Default);
    }

    #[test]
    fn scroll_goes_to_region_under_pointer() {
        let mut engine = MouseEngine::default();
        let (region, log) = logging_region(Rect::new(0, 0, 10, 10), 0);
        engine.add_region(&region);
        engine.handle_event(&decode_sgr(b"65;3;3", false).unwrap());
        assert!(log.lock().contains(&MouseEventType::Scroll));
    }

    #[test]
    fn event_local_coordinates() {
        let e = ev(MouseEventType::Press, MouseButton::Left, 7, 4);
        assert_eq!(e.local(Rect::new(5, 2, 10, 10)), (2, 2));
        assert_eq!(e.local(Rect::new(9, 9, 1, 1)), (0, 0));
    }
}
