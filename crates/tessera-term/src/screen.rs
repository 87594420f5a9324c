// SPDX-License-Identifier: MIT
//
// Screen manager: named regions composed into coordinated frames.
//
// Producers update regions from any thread; nothing reaches the terminal
// until `draw` composes every region into one frame. A draw holds the draw
// mutex for its whole duration, and so does `handle_resize`, so a resize
// never lands in the middle of a composition.
//
// Draw order is registration order, with protected regions last so that an
// overlapping producer cannot paint over them.
//
// The scheduler is a background thread blocked on a signal channel with a
// tick timeout, the same hybrid event/tick model as the input loop:
//
//   - `request_update` wakes it for an immediate draw;
//   - a burst of updates inside `min_interval` of the last draw is drained
//     and served by a single draw when the interval runs out;
//   - on a tick it draws only when something is pending or a region has a
//     draw callback (callbacks may animate).
//
// The thread and the resize subscription hold only `Weak` references, so
// dropping the last `Arc<ScreenManager>` stops everything.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace, warn};

use crate::buffer::Rect;
use crate::diff::RenderStats;
use crate::error::{Error, Result};
use crate::frame::SubFrame;
use crate::style::Style;
use crate::terminal::{Size, SubscriptionId, Terminal};

/// Custom painter for a region. Runs while the frame is open, so it must
/// not call back into the terminal.
pub type DrawFn = Arc<dyn Fn(&mut SubFrame<'_>) + Send + Sync>;

// ─── Regions ────────────────────────────────────────────────────────────────

/// One named rectangle and what to paint in it.
#[derive(Clone)]
pub struct ScreenRegion {
    name: String,
    /// Bounds as registered.
    requested: Rect,
    /// Bounds clamped to the current terminal size.
    rect: Rect,
    lines: Vec<String>,
    style: Style,
    protected: bool,
    draw_fn: Option<DrawFn>,
    order: u64,
}

impl ScreenRegion {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current bounds, clamped to the terminal.
    #[must_use]
    pub const fn rect(&self) -> Rect {
        self.rect
    }

    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    #[must_use]
    pub const fn is_protected(&self) -> bool {
        self.protected
    }

    #[must_use]
    pub const fn has_draw_fn(&self) -> bool {
        self.draw_fn.is_some()
    }

    fn paint(&self, view: &mut SubFrame<'_>) {
        view.clear();
        if let Some(draw) = &self.draw_fn {
            draw(view);
            return;
        }
        for (y, line) in (0..self.rect.height).zip(&self.lines) {
            view.print(0, y, line, &self.style);
        }
    }
}

impl std::fmt::Debug for ScreenRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScreenRegion")
            .field("name", &self.name)
            .field("rect", &self.rect)
            .field("lines", &self.lines.len())
            .field("protected", &self.protected)
            .field("draw_fn", &self.draw_fn.is_some())
            .finish_non_exhaustive()
    }
}

// ─── Scheduler ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Redraw cadence when nothing signals.
    pub tick: Duration,
    /// Minimum spacing between signal-driven draws.
    pub min_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(100),
            min_interval: Duration::from_millis(16),
        }
    }
}

enum Signal {
    Update,
    Stop,
}

struct Scheduler {
    tx: Sender<Signal>,
    handle: JoinHandle<()>,
    resize_subscription: SubscriptionId,
}

// ─── ScreenManager ──────────────────────────────────────────────────────────

pub struct ScreenManager {
    terminal: Arc<Terminal>,
    regions: RwLock<HashMap<String, ScreenRegion>>,
    draw_lock: Mutex<()>,
    /// Areas left behind by moved or removed regions, blanked on next draw.
    vacated: Mutex<Vec<Rect>>,
    pending: AtomicBool,
    next_order: AtomicU64,
    scheduler: Mutex<Option<Scheduler>>,
}

impl ScreenManager {
    #[must_use]
    pub fn new(terminal: Arc<Terminal>) -> Arc<Self> {
        Arc::new(Self {
            terminal,
            regions: RwLock::new(HashMap::new()),
            draw_lock: Mutex::new(()),
            vacated: Mutex::new(Vec::new()),
            pending: AtomicBool::new(false),
            next_order: AtomicU64::new(0),
            scheduler: Mutex::new(None),
        })
    }

    #[must_use]
    pub const fn terminal(&self) -> &Arc<Terminal> {
        &self.terminal
    }

    /// Register `name` at `rect`, or move an existing unprotected region.
    ///
    /// # Errors
    ///
    /// [`Error::ProtectedRegion`] when `name` exists and is protected.
    pub fn add_region(&self, name: &str, rect: Rect) -> Result<()> {
        let size = self.terminal.size();
        let mut regions = self.regions.write();
        if let Some(region) = regions.get_mut(name) {
            if region.protected {
                return Err(Error::ProtectedRegion(name.to_owned()));
            }
            self.vacated.lock().push(region.rect);
            region.requested = rect;
            region.rect = rect.clamp_to(size.cols, size.rows);
        } else {
            regions.insert(
                name.to_owned(),
                ScreenRegion {
                    name: name.to_owned(),
                    requested: rect,
                    rect: rect.clamp_to(size.cols, size.rows),
                    lines: Vec::new(),
                    style: Style::new(),
                    protected: false,
                    draw_fn: None,
                    order: self.next_order.fetch_add(1, Ordering::Relaxed),
                },
            );
            debug!(name, ?rect, "screen region added");
        }
        drop(regions);
        self.request_update();
        Ok(())
    }

    /// Replace a region's text, one entry per row.
    ///
    /// # Errors
    ///
    /// [`Error::RegionNotFound`], or [`Error::ProtectedRegion`].
    pub fn update_region<I, S>(&self, name: &str, lines: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_unprotected(name, |region| {
            region.lines = lines.into_iter().map(Into::into).collect();
        })?;
        trace!(name, "screen region updated");
        self.request_update();
        Ok(())
    }

    /// # Errors
    ///
    /// [`Error::RegionNotFound`], or [`Error::ProtectedRegion`].
    pub fn set_region_style(&self, name: &str, style: Style) -> Result<()> {
        self.with_unprotected(name, |region| region.style = style)?;
        self.request_update();
        Ok(())
    }

    /// Install or remove a custom painter. Protection does not apply; a
    /// painter is how a protected region keeps itself current.
    ///
    /// # Errors
    ///
    /// [`Error::RegionNotFound`].
    pub fn set_draw_fn(&self, name: &str, draw: Option<DrawFn>) -> Result<()> {
        self.with_region(name, |region| region.draw_fn = draw)?;
        self.request_update();
        Ok(())
    }

    /// # Errors
    ///
    /// [`Error::RegionNotFound`].
    pub fn set_protected(&self, name: &str, protected: bool) -> Result<()> {
        self.with_region(name, |region| region.protected = protected)?;
        debug!(name, protected, "screen region protection changed");
        self.request_update();
        Ok(())
    }

    /// # Errors
    ///
    /// [`Error::RegionNotFound`], or [`Error::ProtectedRegion`].
    pub fn remove_region(&self, name: &str) -> Result<()> {
        let mut regions = self.regions.write();
        match regions.get(name) {
            None => return Err(Error::RegionNotFound(name.to_owned())),
            Some(region) if region.protected => {
                return Err(Error::ProtectedRegion(name.to_owned()));
            }
            Some(_) => {}
        }
        if let Some(region) = regions.remove(name) {
            self.vacated.lock().push(region.rect);
        }
        drop(regions);
        debug!(name, "screen region removed");
        self.request_update();
        Ok(())
    }

    #[must_use]
    pub fn region(&self, name: &str) -> Option<ScreenRegion> {
        self.regions.read().get(name).cloned()
    }

    /// Region names in draw order.
    #[must_use]
    pub fn region_names(&self) -> Vec<String> {
        self.ordered_regions().into_iter().map(|r| r.name).collect()
    }

    fn with_region(&self, name: &str, f: impl FnOnce(&mut ScreenRegion)) -> Result<()> {
        let mut regions = self.regions.write();
        let region = regions
            .get_mut(name)
            .ok_or_else(|| Error::RegionNotFound(name.to_owned()))?;
        f(region);
        Ok(())
    }

    fn with_unprotected(&self, name: &str, f: impl FnOnce(&mut ScreenRegion)) -> Result<()> {
        let mut regions = self.regions.write();
        let region = regions
            .get_mut(name)
            .ok_or_else(|| Error::RegionNotFound(name.to_owned()))?;
        if region.protected {
            return Err(Error::ProtectedRegion(name.to_owned()));
        }
        f(region);
        Ok(())
    }

    fn ordered_regions(&self) -> Vec<ScreenRegion> {
        let mut regions: Vec<ScreenRegion> = self.regions.read().values().cloned().collect();
        regions.sort_by_key(|r| (r.protected, r.order));
        regions
    }

    // ─── Drawing ─────────────────────────────────────────────────────────

    /// Mark the screen stale and wake the scheduler, if running.
    pub fn request_update(&self) {
        self.pending.store(true, Ordering::Release);
        if let Some(scheduler) = self.scheduler.lock().as_ref() {
            let _ = scheduler.tx.send(Signal::Update);
        }
    }

    /// Whether the next tick has anything to draw.
    #[must_use]
    pub fn needs_draw(&self) -> bool {
        self.pending.load(Ordering::Acquire)
            || self.regions.read().values().any(ScreenRegion::has_draw_fn)
    }

    /// Compose every region into one frame. The terminal cursor ends where
    /// it was before the draw.
    ///
    /// # Errors
    ///
    /// Whatever [`Terminal::begin_frame`] or [`Terminal::end_frame`] return.
    pub fn draw(&self) -> Result<RenderStats> {
        let _guard = self.draw_lock.lock();
        self.pending.store(false, Ordering::Release);
        let regions = self.ordered_regions();
        let cursor = self.terminal.cursor();

        let mut frame = self.terminal.begin_frame()?;
        for rect in std::mem::take(&mut *self.vacated.lock()) {
            frame.sub_frame(rect).clear();
        }
        for region in regions.iter().filter(|r| !r.rect.is_empty()) {
            region.paint(&mut frame.sub_frame(region.rect));
        }
        match cursor {
            Some((x, y)) => frame.set_cursor(x, y),
            None => frame.clear_cursor(),
        }
        self.terminal.end_frame(frame)
    }

    /// Clamp every region to `size`. Regions that were clamped earlier grow
    /// back toward their registered bounds.
    pub fn handle_resize(&self, size: Size) {
        let guard = self.draw_lock.lock();
        for region in self.regions.write().values_mut() {
            region.rect = region.requested.clamp_to(size.cols, size.rows);
        }
        debug!(cols = size.cols, rows = size.rows, "screen regions clamped");
        drop(guard);
        self.request_update();
    }

    // ─── Scheduler ───────────────────────────────────────────────────────

    /// Start the draw scheduler. Returns `false` if it is already running.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be spawned.
    pub fn start(self: &Arc<Self>, config: SchedulerConfig) -> Result<bool> {
        let mut slot = self.scheduler.lock();
        if slot.is_some() {
            return Ok(false);
        }

        let (tx, rx) = mpsc::channel();
        let weak = Arc::downgrade(self);
        let handle = thread::Builder::new()
            .name("tessera-screen".into())
            .spawn(move || run_scheduler(&weak, &rx, config))?;

        let weak = Arc::downgrade(self);
        let resize_subscription = self.terminal.on_resize(move |size| {
            if let Some(manager) = weak.upgrade() {
                manager.handle_resize(size);
            }
        });

        *slot = Some(Scheduler {
            tx,
            handle,
            resize_subscription,
        });
        debug!(?config, "screen scheduler started");
        Ok(true)
    }

    /// Stop the scheduler and release its resize subscription. Idempotent.
    pub fn stop(&self) {
        let Some(scheduler) = self.scheduler.lock().take() else {
            return;
        };
        let _ = scheduler.tx.send(Signal::Stop);
        // The last strong reference can be dropped on the scheduler thread.
        if scheduler.handle.thread().id() != thread::current().id() {
            let _ = scheduler.handle.join();
        }
        self.terminal
            .remove_resize_subscription(scheduler.resize_subscription);
        debug!("screen scheduler stopped");
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.scheduler.lock().is_some()
    }
}

impl Drop for ScreenManager {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for ScreenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScreenManager")
            .field("terminal", &self.terminal.id())
            .field("regions", &self.regions.read().len())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

fn run_scheduler(manager: &Weak<ScreenManager>, rx: &Receiver<Signal>, config: SchedulerConfig) {
    let mut last_draw: Option<Instant> = None;
    // A coalesced burst waiting for the interval to run out.
    let mut deferred = false;

    loop {
        let wait = match last_draw {
            Some(at) if deferred => config.min_interval.saturating_sub(at.elapsed()),
            _ => config.tick,
        };
        let signal = rx.recv_timeout(wait);
        let Some(manager) = manager.upgrade() else {
            break;
        };

        match signal {
            Ok(Signal::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            Ok(Signal::Update) => {
                if last_draw.is_some_and(|at| at.elapsed() < config.min_interval) {
                    if drain(rx) {
                        break;
                    }
                    deferred = true;
                    continue;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if !deferred && !manager.needs_draw() {
                    continue;
                }
            }
        }

        deferred = false;
        match manager.draw() {
            Ok(stats) => {
                last_draw = Some(Instant::now());
                trace!(cells = stats.cells, skipped = stats.skipped, "scheduled draw");
            }
            Err(Error::Closed) => {
                debug!("terminal closed, screen scheduler exiting");
                break;
            }
            Err(err) => warn!(%err, "scheduled draw failed"),
        }
    }
}

/// Empty the signal queue. Returns `true` if a stop was among them.
fn drain(rx: &Receiver<Signal>) -> bool {
    while let Ok(signal) = rx.try_recv() {
        if matches!(signal, Signal::Stop) {
            return true;
        }
    }
    false
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::{HeadlessBackend, SharedWriter, TerminalConfig};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicUsize;

    fn manager(cols: u16, rows: u16) -> (Arc<ScreenManager>, Arc<Terminal>) {
        let terminal = Arc::new(
            Terminal::new(
                Arc::new(HeadlessBackend::new(cols, rows)),
                SharedWriter::new(),
                TerminalConfig::default(),
            )
            .unwrap(),
        );
        (ScreenManager::new(Arc::clone(&terminal)), terminal)
    }

    fn row(terminal: &Terminal, y: u16) -> String {
        let frame = terminal.begin_frame().unwrap();
        frame.back().row_text(y)
    }

    fn wait_for(mut check: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if check() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    fn counting_painter(count: &Arc<AtomicUsize>) -> DrawFn {
        let count = Arc::clone(count);
        Arc::new(move |view: &mut SubFrame<'_>| {
            count.fetch_add(1, Ordering::SeqCst);
            view.print(0, 0, "*", &Style::new());
        })
    }

    // ── Regions ─────────────────────────────────────────────────────────

    #[test]
    fn regions_draw_at_their_position() {
        let (screen, terminal) = manager(20, 4);
        screen.add_region("title", Rect::new(2, 1, 10, 2)).unwrap();
        screen.update_region("title", ["hello", "world"]).unwrap();
        screen.draw().unwrap();
        assert_eq!(row(&terminal, 1), "  hello             ");
        assert_eq!(row(&terminal, 2), "  world             ");
    }

    #[test]
    fn extra_lines_are_clipped_to_the_region() {
        let (screen, terminal) = manager(10, 3);
        screen.add_region("a", Rect::new(0, 0, 4, 1)).unwrap();
        screen.update_region("a", ["abcdefgh", "second"]).unwrap();
        screen.draw().unwrap();
        assert_eq!(row(&terminal, 0), "abcd      ");
        assert_eq!(row(&terminal, 1), "          ");
    }

    #[test]
    fn unknown_region_is_an_error() {
        let (screen, _) = manager(10, 3);
        assert!(matches!(
            screen.update_region("nope", ["x"]),
            Err(Error::RegionNotFound(name)) if name == "nope"
        ));
        assert!(matches!(screen.remove_region("nope"), Err(Error::RegionNotFound(_))));
        assert!(matches!(screen.set_protected("nope", true), Err(Error::RegionNotFound(_))));
    }

    #[test]
    fn removed_region_is_blanked_on_next_draw() {
        let (screen, terminal) = manager(10, 2);
        screen.add_region("a", Rect::new(0, 0, 10, 1)).unwrap();
        screen.update_region("a", ["visible"]).unwrap();
        screen.draw().unwrap();
        screen.remove_region("a").unwrap();
        assert!(screen.region("a").is_none());
        screen.draw().unwrap();
        assert_eq!(row(&terminal, 0), "          ");
    }

    #[test]
    fn moved_region_leaves_no_trail() {
        let (screen, terminal) = manager(10, 2);
        screen.add_region("a", Rect::new(0, 0, 4, 1)).unwrap();
        screen.update_region("a", ["move"]).unwrap();
        screen.draw().unwrap();
        screen.add_region("a", Rect::new(0, 1, 4, 1)).unwrap();
        screen.draw().unwrap();
        assert_eq!(row(&terminal, 0), "          ");
        assert_eq!(row(&terminal, 1), "move      ");
    }

    // ── Protection ──────────────────────────────────────────────────────

    #[test]
    fn protected_region_rejects_removal_and_replacement() {
        let (screen, _) = manager(10, 3);
        screen.add_region("status", Rect::new(0, 2, 10, 1)).unwrap();
        screen.set_protected("status", true).unwrap();
        assert!(matches!(screen.remove_region("status"), Err(Error::ProtectedRegion(_))));
        assert!(matches!(screen.update_region("status", ["x"]), Err(Error::ProtectedRegion(_))));
        assert!(matches!(
            screen.add_region("status", Rect::new(0, 0, 1, 1)),
            Err(Error::ProtectedRegion(_))
        ));
        screen.set_protected("status", false).unwrap();
        screen.remove_region("status").unwrap();
    }

    #[test]
    fn protected_regions_draw_last() {
        let (screen, terminal) = manager(10, 1);
        screen.add_region("guard", Rect::new(0, 0, 3, 1)).unwrap();
        screen.update_region("guard", ["ABC"]).unwrap();
        screen.set_protected("guard", true).unwrap();
        screen.add_region("body", Rect::new(0, 0, 10, 1)).unwrap();
        screen.update_region("body", ["xxxxxxxxxx"]).unwrap();
        screen.draw().unwrap();
        assert_eq!(row(&terminal, 0), "ABCxxxxxxx");
        assert_eq!(screen.region_names(), vec!["body".to_owned(), "guard".to_owned()]);
    }

    #[test]
    fn draw_fn_paints_protected_region() {
        let (screen, terminal) = manager(6, 1);
        screen.add_region("clock", Rect::new(2, 0, 4, 1)).unwrap();
        screen.set_protected("clock", true).unwrap();
        let painter: DrawFn = Arc::new(|view: &mut SubFrame<'_>| {
            view.print(0, 0, "12:00", &Style::new());
        });
        screen.set_draw_fn("clock", Some(painter)).unwrap();
        screen.draw().unwrap();
        assert_eq!(row(&terminal, 0), "  12:0");
        assert!(screen.region("clock").unwrap().has_draw_fn());
    }

    // ── Cursor and Resize ───────────────────────────────────────────────

    #[test]
    fn cursor_survives_a_draw() {
        let (screen, terminal) = manager(10, 3);
        let mut frame = terminal.begin_frame().unwrap();
        frame.set_cursor(3, 1);
        terminal.end_frame(frame).unwrap();
        screen.add_region("a", Rect::new(0, 0, 10, 3)).unwrap();
        screen.update_region("a", ["one", "two", "three"]).unwrap();
        screen.draw().unwrap();
        assert_eq!(terminal.cursor(), Some((3, 1)));
    }

    #[test]
    fn resize_clamps_and_restores_regions() {
        let (screen, _) = manager(40, 10);
        screen.add_region("a", Rect::new(10, 2, 20, 5)).unwrap();

        screen.handle_resize(Size::new(15, 4));
        assert_eq!(screen.region("a").unwrap().rect(), Rect::new(10, 2, 5, 2));

        screen.handle_resize(Size::new(5, 1));
        let rect = screen.region("a").unwrap().rect();
        assert_eq!((rect.width, rect.height), (0, 0));

        screen.handle_resize(Size::new(80, 24));
        assert_eq!(screen.region("a").unwrap().rect(), Rect::new(10, 2, 20, 5));
    }

    #[test]
    fn regions_added_beyond_the_screen_are_clamped() {
        let (screen, _) = manager(10, 5);
        screen.add_region("wide", Rect::new(4, 0, 100, 100)).unwrap();
        assert_eq!(screen.region("wide").unwrap().rect(), Rect::new(4, 0, 6, 5));
        screen.draw().unwrap();
    }

    // ── Scheduler ───────────────────────────────────────────────────────

    #[test]
    fn start_and_stop_are_idempotent() {
        let (screen, terminal) = manager(10, 3);
        assert!(screen.start(SchedulerConfig::default()).unwrap());
        assert!(!screen.start(SchedulerConfig::default()).unwrap());
        assert!(screen.is_running());
        assert_eq!(terminal.resize_subscriptions(), 1);
        screen.stop();
        screen.stop();
        assert!(!screen.is_running());
        assert_eq!(terminal.resize_subscriptions(), 0);
    }

    #[test]
    fn update_request_triggers_a_draw() {
        let (screen, _) = manager(10, 3);
        let count = Arc::new(AtomicUsize::new(0));
        screen.add_region("a", Rect::new(0, 0, 5, 1)).unwrap();
        screen.start(SchedulerConfig {
            tick: Duration::from_secs(3600),
            min_interval: Duration::ZERO,
        })
        .unwrap();
        screen.set_draw_fn("a", Some(counting_painter(&count))).unwrap();
        assert!(wait_for(|| count.load(Ordering::SeqCst) > 0));
        screen.stop();
    }

    #[test]
    fn bursts_inside_min_interval_coalesce() {
        let (screen, _) = manager(10, 3);
        let count = Arc::new(AtomicUsize::new(0));
        screen.add_region("a", Rect::new(0, 0, 5, 1)).unwrap();
        screen.set_draw_fn("a", Some(counting_painter(&count))).unwrap();
        screen.start(SchedulerConfig {
            tick: Duration::from_secs(3600),
            min_interval: Duration::from_secs(3600),
        })
        .unwrap();
        for _ in 0..5 {
            screen.request_update();
        }
        assert!(wait_for(|| count.load(Ordering::SeqCst) > 0));
        thread::sleep(Duration::from_millis(100));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        screen.stop();
    }

    #[test]
    fn terminal_resize_reaches_running_scheduler() {
        let (screen, terminal) = manager(40, 10);
        screen.add_region("a", Rect::new(0, 0, 40, 10)).unwrap();
        screen.start(SchedulerConfig::default()).unwrap();
        terminal.resize(Size::new(20, 5));
        assert_eq!(screen.region("a").unwrap().rect(), Rect::new(0, 0, 20, 5));
        screen.stop();
        terminal.resize(Size::new(30, 6));
        assert_eq!(screen.region("a").unwrap().rect(), Rect::new(0, 0, 20, 5));
    }

    #[test]
    fn dropping_the_manager_stops_the_scheduler() {
        let (screen, terminal) = manager(10, 3);
        screen.start(SchedulerConfig::default()).unwrap();
        drop(screen);
        // The scheduler thread may hold the last reference for one draw.
        assert!(wait_for(|| terminal.resize_subscriptions() == 0));
    }
}
