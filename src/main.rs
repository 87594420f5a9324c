// SPDX-License-Identifier: MIT
//
// tessera: an interactive playground for the terminal engine.
//
// Wires the crates together end to end:
//
//   tessera-kit  → configuration (TESSERA_* env, .env, tessera.json), clipboard
//   tessera-term → terminal, decoder, mouse engine, screen manager, recorder
//
// Input flows through two threads before it reaches the main loop:
//
//   stdin reader → chunk channel → decoder (tees into the recorder) → events
//
// The main loop handles events and resizes; the screen manager's scheduler
// does all drawing.
//
// Layout:
//
//   ┌──────────────────────────────┐
//   │ header (protected)           │  ← 1 row
//   ├──────────────────────────────┤
//   │ event log                    │  ← h - 4 rows
//   ├──────────────────────────────┤
//   │ [ click me ]  hover / count  │  ← 1 row, a mouse region
//   ├──────────────────────────────┤
//   │ status: metrics, recording   │  ← 1 row
//   └──────────────────────────────┘

use std::collections::VecDeque;
use std::path::Path;
use std::process;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use tessera_kit::config::{self, Source};
use tessera_kit::Clipboard;
use tessera_term::ansi::MouseMode;
use tessera_term::input::KeyEventKind;
use tessera_term::mouse::{CursorHint, MouseConfig};
use tessera_term::screen::{DrawFn, SchedulerConfig};
use tessera_term::{
    AnsiColor, Event, KeyCode, KeyEvent, Modifiers, MouseEngine, MouseEvent, MouseEventType,
    MouseRegion, Rect, RecorderConfig, ScreenManager, Size, Style, SubFrame, Terminal,
};

const CONFIG_FILE: &str = "tessera.json";
const LOG_CAPACITY: usize = 256;

// ─── Configuration ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct AppConfig {
    /// Log destination. Logging is off without one; stdout belongs to the UI.
    log_file: Option<String>,
    log_filter: String,
    record_path: String,
    record_on_start: bool,
    record_gzip: bool,
    mouse: bool,
    tick_ms: u64,
    min_redraw_ms: u64,
    paste_tab_width: usize,
    double_click_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_file: None,
            log_filter: "info".into(),
            record_path: "tessera.cast".into(),
            record_on_start: false,
            record_gzip: false,
            mouse: true,
            tick_ms: 250,
            min_redraw_ms: 16,
            paste_tab_width: 4,
            double_click_ms: 400,
        }
    }
}

impl AppConfig {
    fn load() -> Result<Self, config::ConfigError> {
        let mut sources = Vec::new();
        if Path::new(CONFIG_FILE).exists() {
            sources.push(Source::Json(CONFIG_FILE.into()));
        }
        sources.push(Source::EnvFile(".env".into()));
        sources.push(Source::Env);
        config::parse("TESSERA", &sources)
    }

    fn recorder(&self) -> RecorderConfig {
        let mut recorder = RecorderConfig::new(&self.record_path)
            .compressed(self.record_gzip)
            .with_title("tessera playground");
        recorder.env = Terminal::recording_env();
        recorder
    }
}

fn init_logging(config: &AppConfig) {
    let Some(path) = &config.log_file else {
        return;
    };
    let file = match std::fs::OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => file,
        Err(err) => {
            eprintln!("tessera: cannot open log file {path}: {err}");
            return;
        }
    };
    let filter = tracing_subscriber::EnvFilter::try_from_env("TESSERA_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .try_init();
}

// ─── Layout ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Layout {
    header: Rect,
    log: Rect,
    button: Rect,
    status: Rect,
}

const BUTTON_LABEL: &str = "[ click me ]";

impl Layout {
    fn new(size: Size) -> Self {
        let w = size.cols;
        let h = size.rows;
        let log_height = h.saturating_sub(3);
        #[allow(clippy::cast_possible_truncation)] // the label is ASCII
        let button_width = (BUTTON_LABEL.len() as u16).min(w);
        Self {
            header: Rect::new(0, 0, w, h.min(1)),
            log: Rect::new(0, 1, w, log_height.saturating_sub(1)),
            button: Rect::new(0, log_height, button_width, 1),
            status: Rect::new(0, h.saturating_sub(1), w, 1),
        }
    }
}

// ─── Event Text ─────────────────────────────────────────────────────────────

fn describe_modifiers(mods: Modifiers) -> String {
    mods.iter_names()
        .map(|(name, _)| name.to_lowercase())
        .collect::<Vec<_>>()
        .join("+")
}

fn describe_key(key: &KeyEvent) -> String {
    if key.is_paste() {
        let preview: String = key.paste_text.chars().take(40).collect();
        return format!("paste {} chars: {preview:?}", key.paste_text.chars().count());
    }
    let code = match key.code {
        KeyCode::Char(' ') => "space".to_owned(),
        KeyCode::Char(c) => c.to_string(),
        KeyCode::F(n) => format!("F{n}"),
        other => format!("{other:?}"),
    };
    let mut text = if key.modifiers.is_empty() {
        format!("key {code}")
    } else {
        format!("key {}+{code}", describe_modifiers(key.modifiers))
    };
    if key.kind != KeyEventKind::Press {
        text.push_str(&format!(" ({:?})", key.kind).to_lowercase());
    }
    text
}

fn describe_mouse(event: &MouseEvent) -> String {
    let mut text = format!("{:?} {:?} at {},{}", event.event_type, event.button, event.x, event.y)
        .to_lowercase();
    if event.click_count > 1 {
        text.push_str(&format!(" x{}", event.click_count));
    }
    if !event.modifiers.is_empty() {
        text.push_str(&format!(" [{}]", describe_modifiers(event.modifiers)));
    }
    text
}

fn describe(event: &Event) -> String {
    match event {
        Event::Key(key) => describe_key(key),
        Event::Mouse(mouse) => describe_mouse(mouse),
        Event::CursorPosition { row, col, .. } => format!("cursor at row {row}, col {col}"),
        Event::Focus { gained: true, .. } => "focus gained".to_owned(),
        Event::Focus { gained: false, .. } => "focus lost".to_owned(),
    }
}

// ─── Playground ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Continue,
    Quit,
}

struct Playground {
    config: AppConfig,
    terminal: Arc<Terminal>,
    screen: Arc<ScreenManager>,
    mouse: MouseEngine,
    button: Arc<MouseRegion>,
    clicks: Arc<AtomicUsize>,
    hovered: Arc<AtomicBool>,
    clipboard: Clipboard,
    log: VecDeque<String>,
    pointer: CursorHint,
    paused: bool,
}

impl Playground {
    fn new(config: AppConfig, terminal: Arc<Terminal>) -> tessera_term::Result<Self> {
        let layout = Layout::new(terminal.size());
        let screen = ScreenManager::new(Arc::clone(&terminal));
        let clicks = Arc::new(AtomicUsize::new(0));
        let hovered = Arc::new(AtomicBool::new(false));

        let button = {
            let clicks = Arc::clone(&clicks);
            let enter = Arc::clone(&hovered);
            let leave = Arc::clone(&hovered);
            Arc::new(
                MouseRegion::new(layout.button, 1)
                    .with_cursor_hint(CursorHint::Pointer)
                    .on(MouseEventType::Click, move |_| {
                        clicks.fetch_add(1, Ordering::Relaxed);
                    })
                    .on(MouseEventType::Enter, move |_| enter.store(true, Ordering::Relaxed))
                    .on(MouseEventType::Leave, move |_| leave.store(false, Ordering::Relaxed)),
            )
        };
        let mut mouse = MouseEngine::new(MouseConfig {
            double_click: Duration::from_millis(config.double_click_ms),
            ..MouseConfig::default()
        });
        mouse.add_region(&button);

        let mut app = Self {
            config,
            terminal,
            screen,
            mouse,
            button,
            clicks,
            hovered,
            clipboard: Clipboard::detect(),
            log: VecDeque::with_capacity(LOG_CAPACITY),
            pointer: CursorHint::Default,
            paused: false,
        };
        app.install_regions(layout)?;
        Ok(app)
    }

    fn install_regions(&mut self, layout: Layout) -> tessera_term::Result<()> {
        let screen = &self.screen;
        screen.add_region("log", layout.log)?;
        screen.add_region("status", layout.status)?;
        screen.add_region("button", layout.button)?;
        screen.set_draw_fn("button", Some(self.button_painter()))?;
        screen.add_region("header", layout.header)?;
        screen.set_draw_fn("header", Some(header_painter()))?;
        screen.set_protected("header", true)?;
        self.refresh();
        Ok(())
    }

    fn relayout(&mut self, size: Size) -> tessera_term::Result<()> {
        let layout = Layout::new(size);
        self.screen.set_protected("header", false)?;
        self.screen.add_region("header", layout.header)?;
        self.screen.set_protected("header", true)?;
        self.screen.add_region("log", layout.log)?;
        self.screen.add_region("button", layout.button)?;
        self.screen.add_region("status", layout.status)?;
        self.button.set_bounds(layout.button);
        self.push_log(format!("resized to {}x{}", size.cols, size.rows));
        Ok(())
    }

    fn button_painter(&self) -> DrawFn {
        let clicks = Arc::clone(&self.clicks);
        let hovered = Arc::clone(&self.hovered);
        Arc::new(move |view: &mut SubFrame<'_>| {
            let style = if hovered.load(Ordering::Relaxed) {
                Style::new().fg(AnsiColor::Black).bg(AnsiColor::Cyan).bold()
            } else {
                Style::new().fg(AnsiColor::Cyan)
            };
            let label_end = view.print(0, 0, BUTTON_LABEL, &style);
            let count = clicks.load(Ordering::Relaxed);
            view.print(label_end + 1, 0, &format!("{count}"), &Style::new().dim());
        })
    }

    fn push_log(&mut self, line: String) {
        if self.log.len() == LOG_CAPACITY {
            self.log.pop_front();
        }
        self.log.push_back(line);
    }

    fn status_line(&self) -> String {
        let mut parts = Vec::new();
        if self.terminal.metrics_enabled() {
            let snap = self.terminal.metrics().snapshot();
            parts.push(format!(
                "frames {} skipped {} ({:.0}%) avg {:.2}ms",
                snap.frames,
                snap.skipped_frames,
                snap.efficiency(),
                snap.avg_frame_time().as_secs_f64() * 1000.0
            ));
        } else {
            parts.push("metrics off (m)".to_owned());
        }
        parts.push(if self.paused {
            "rec paused (p)".to_owned()
        } else if self.terminal.is_recording() {
            format!("● rec {}", self.config.record_path)
        } else {
            "rec off (r)".to_owned()
        });
        parts.push(format!("clicks {}", self.clicks.load(Ordering::Relaxed)));
        parts.join(" │ ")
    }

    /// Push the log tail and the status line into their regions.
    fn refresh(&self) {
        let rows = self
            .screen
            .region("log")
            .map_or(0, |r| usize::from(r.rect().height));
        let skip = self.log.len().saturating_sub(rows);
        let tail: Vec<&str> = self.log.iter().skip(skip).map(String::as_str).collect();
        if let Err(err) = self.screen.update_region("log", tail) {
            warn!(%err, "log region update failed");
        }
        if let Err(err) = self.screen.update_region("status", [self.status_line()]) {
            warn!(%err, "status region update failed");
        }
    }

    fn handle(&mut self, event: &Event) -> Action {
        self.push_log(describe(event));
        let action = match event {
            Event::Key(key) => self.on_key(key),
            Event::Mouse(mouse) => {
                self.on_mouse(mouse);
                Action::Continue
            }
            Event::CursorPosition { .. } | Event::Focus { .. } => Action::Continue,
        };
        self.refresh();
        action
    }

    fn on_key(&mut self, key: &KeyEvent) -> Action {
        if key.kind == KeyEventKind::Release {
            return Action::Continue;
        }
        match (key.code, key.modifiers) {
            (KeyCode::Char('q'), m) if m.is_empty() => return Action::Quit,
            (KeyCode::Char('c'), m) if m == Modifiers::CTRL => return Action::Quit,
            (KeyCode::Char('l'), m) if m == Modifiers::CTRL => self.terminal.invalidate(),
            (KeyCode::Char('r'), _) => self.toggle_recording(),
            (KeyCode::Char('p'), _) => self.toggle_pause(),
            (KeyCode::Char('m'), _) => {
                let on = !self.terminal.metrics_enabled();
                self.terminal.enable_metrics(on);
            }
            (KeyCode::Char('y'), _) => self.copy_last(),
            (KeyCode::Char('d'), _) => {
                if let Err(err) = self.terminal.request_cursor_position() {
                    self.push_log(format!("cursor query failed: {err}"));
                }
            }
            (KeyCode::Escape, _) => {
                if self.mouse.cancel_drag().is_some() {
                    self.push_log("drag cancelled".to_owned());
                }
            }
            _ => {}
        }
        Action::Continue
    }

    fn on_mouse(&mut self, event: &MouseEvent) {
        for synthesized in self.mouse.handle_event(event) {
            self.push_log(format!("  → {}", describe_mouse(&synthesized)));
        }
        let hint = self.mouse.cursor_hint();
        if hint != self.pointer {
            self.pointer = hint;
            if let Err(err) = self.terminal.set_pointer_shape(hint.css_name()) {
                warn!(%err, "pointer shape change failed");
            }
        }
    }

    fn toggle_recording(&mut self) {
        self.paused = false;
        if self.terminal.is_recording() {
            match self.terminal.stop_recording() {
                Ok(summary) => self.push_log(format!(
                    "recorded {} events ({:.1}s) to {}",
                    summary.events,
                    summary.duration.as_secs_f64(),
                    summary.path.display()
                )),
                Err(err) => self.push_log(format!("recording failed: {err}")),
            }
            return;
        }
        match self.terminal.start_recording(self.config.recorder()) {
            Ok(()) => self.push_log(format!("recording to {}", self.config.record_path)),
            Err(err) => self.push_log(format!("cannot record: {err}")),
        }
    }

    fn toggle_pause(&mut self) {
        let result = if self.paused {
            self.terminal.resume_recording().map(|()| "recording resumed")
        } else {
            self.terminal.pause_recording().map(|()| "recording paused")
        };
        match result {
            Ok(line) => {
                self.paused = !self.paused;
                self.push_log(line.to_owned());
            }
            Err(err) => self.push_log(format!("pause failed: {err}")),
        }
    }

    fn copy_last(&mut self) {
        // The newest entry is the `y` press itself.
        let Some(text) = self.log.iter().rev().nth(1).cloned() else {
            return;
        };
        let line = if self.clipboard.is_available() {
            match self.clipboard.write(&text) {
                Ok(()) => format!("copied {text:?}"),
                Err(err) => format!("clipboard: {err}"),
            }
        } else {
            // No local tool; let the terminal take it (OSC 52).
            match self.terminal.copy_to_clipboard(&text) {
                Ok(()) => format!("copied {text:?} via terminal"),
                Err(err) => format!("clipboard: {err}"),
            }
        };
        self.push_log(line);
    }

    fn shutdown(self) {
        self.screen.stop();
        if self.terminal.is_recording() {
            match self.terminal.stop_recording() {
                Ok(summary) => info!(events = summary.events, path = %summary.path.display(), "recording saved"),
                Err(err) => warn!(%err, "recording failed"),
            }
        }
    }
}

fn header_painter() -> DrawFn {
    Arc::new(|view: &mut SubFrame<'_>| {
        let title = Style::new().fg(AnsiColor::Black).bg(AnsiColor::White).bold();
        view.fill(Rect::new(0, 0, view.width(), 1), ' ', &title);
        let end = 1 + view.print(1, 0, "tessera", &title);
        let help = Style::new().fg(AnsiColor::Black).bg(AnsiColor::White);
        view.print(
            end + 2,
            0,
            "q quit · r record · p pause · m metrics · y copy · d cursor · ^L redraw",
            &help,
        );
    })
}

// ─── Main ───────────────────────────────────────────────────────────────────

#[cfg(unix)]
fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    use std::sync::mpsc::{self, RecvTimeoutError};
    use std::thread;

    use tessera_term::reader::{ChunkSource, RecordingSource, StdinReader};
    use tessera_term::{Decoder, DecoderConfig, Error, TerminalConfig};

    let terminal = Arc::new(Terminal::stdio(TerminalConfig {
        mouse: config.mouse.then_some(MouseMode::Drag),
        ..TerminalConfig::default()
    })?);
    terminal.enter()?;
    if config.record_on_start {
        terminal.start_recording(config.recorder())?;
    }

    let (mut reader, chunks) = StdinReader::spawn()?;
    let (events_tx, events) = mpsc::channel();
    let source = RecordingSource::new(ChunkSource::new(chunks), Arc::clone(&terminal));
    let decoder_config = DecoderConfig {
        paste_tab_width: config.paste_tab_width,
        ..DecoderConfig::default()
    };
    let decoder = thread::Builder::new().name("tessera-decoder".into()).spawn(move || {
        let mut decoder = Decoder::with_config(source, decoder_config);
        loop {
            match decoder.read_event() {
                Ok(event) => {
                    if events_tx.send(event).is_err() {
                        break;
                    }
                }
                Err(Error::EndOfInput) => break,
                Err(err) => {
                    warn!(%err, "input decoding stopped");
                    break;
                }
            }
        }
    })?;

    let tick = Duration::from_millis(config.tick_ms);
    let scheduler = SchedulerConfig {
        tick,
        min_interval: Duration::from_millis(config.min_redraw_ms),
    };
    let mut app = Playground::new(config, Arc::clone(&terminal))?;
    app.screen.start(scheduler)?;
    info!(size = ?terminal.size(), "playground started");

    loop {
        match events.recv_timeout(tick) {
            Ok(event) => {
                if app.handle(&event) == Action::Quit {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => app.refresh(),
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if let Some(size) = terminal.poll_resize()? {
            app.relayout(size)?;
            app.refresh();
        }
    }

    app.shutdown();
    reader.stop();
    let _ = decoder.join();
    terminal.leave()?;
    Ok(())
}

#[cfg(not(unix))]
fn run(_config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    Err("tessera needs a Unix terminal".into())
}

fn main() {
    let config = AppConfig::load().unwrap_or_else(|e| {
        eprintln!("tessera: configuration: {e}");
        process::exit(1);
    });
    init_logging(&config);

    if let Err(e) = run(config) {
        eprintln!("tessera: {e}");
        process::exit(1);
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
