// SPDX-License-Identifier: MIT
//
// End-to-end tests: the terminal façade driven against a headless backend
// and an in-memory sink, with input flowing through the decoder and the
// mouse engine.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use pretty_assertions::assert_eq;
use tessera_term::metrics::FrameSample;
use tessera_term::recorder::{EventKind, read_recording};
use tessera_term::terminal::{HeadlessBackend, SharedWriter};
use tessera_term::{
    Buffer, Decoder, Error, Event, KeyCode, Modifiers, MouseButton, MouseEngine, MouseEvent,
    MouseEventType, MouseRegion, Rect, RecorderConfig, RenderMetrics, ScreenManager, Size, Style,
    Terminal, TerminalConfig, redact_credentials,
};

fn terminal(cols: u16, rows: u16) -> (Arc<Terminal>, SharedWriter) {
    let out = SharedWriter::new();
    let term = Terminal::new(
        Arc::new(HeadlessBackend::new(cols, rows)),
        out.clone(),
        TerminalConfig::default(),
    )
    .unwrap();
    (Arc::new(term), out)
}

fn events(bytes: &[u8]) -> Vec<Event> {
    let mut decoder = Decoder::new(bytes);
    let mut out = Vec::new();
    loop {
        match decoder.read_event() {
            Ok(event) => out.push(event),
            Err(Error::EndOfInput) => return out,
            Err(err) => panic!("decode failed: {err}"),
        }
    }
}

fn mouse(bytes: &[u8]) -> MouseEvent {
    match events(bytes).as_slice() {
        [Event::Mouse(m)] => m.clone(),
        other => panic!("expected one mouse event, got {other:?}"),
    }
}

// ── Rendering ───────────────────────────────────────────────────────────────

#[test]
fn static_content_costs_nothing_after_first_flush() {
    let (term, out) = terminal(40, 10);
    term.enable_metrics(true);

    let mut frame = term.begin_frame().unwrap();
    frame.print(0, 0, "status: ok", &Style::new().bold());
    let first = term.end_frame(frame).unwrap();
    assert!(!first.skipped);
    assert!(out.text().contains("status: ok"));
    out.take();

    for _ in 0..2 {
        let frame = term.begin_frame().unwrap();
        let stats = term.end_frame(frame).unwrap();
        assert!(stats.skipped);
    }
    assert!(out.contents().is_empty());

    let snapshot = term.metrics().snapshot();
    assert_eq!((snapshot.frames, snapshot.skipped_frames), (1, 2));
    assert!((term.metrics().efficiency() - 66.666).abs() < 0.1);
}

#[test]
fn only_changed_cells_are_rewritten() {
    let (term, out) = terminal(20, 2);
    let mut frame = term.begin_frame().unwrap();
    frame.print(0, 0, "abcdef", &Style::new());
    term.end_frame(frame).unwrap();
    out.take();

    let mut frame = term.begin_frame().unwrap();
    frame.print(0, 0, "abcXef", &Style::new());
    let stats = term.end_frame(frame).unwrap();
    assert_eq!(stats.cells, 1);
    let text = out.text();
    assert!(text.contains('X'));
    assert!(!text.contains("abc"));
}

#[test]
fn resize_keeps_the_overlap() {
    let (term, _) = terminal(10, 3);
    let mut frame = term.begin_frame().unwrap();
    frame.print(0, 0, "0123456789", &Style::new());
    frame.print(0, 2, "bottom", &Style::new());
    term.end_frame(frame).unwrap();

    term.resize(Size::new(4, 2));
    let frame = term.begin_frame().unwrap();
    assert_eq!(frame.back().row_text(0), "0123");
    assert_eq!(frame.back().row_text(1), "    ");
    drop(frame);

    term.resize(Size::new(6, 3));
    let frame = term.begin_frame().unwrap();
    assert_eq!(frame.back().row_text(0), "0123  ");
    assert_eq!(frame.back().row_text(2), "      ");
}

#[test]
fn frames_from_another_terminal_are_rejected() {
    let (a, _) = terminal(5, 1);
    let (b, _) = terminal(5, 1);
    let frame = a.begin_frame().unwrap();
    assert!(matches!(b.end_frame(frame), Err(Error::InvalidFrame)));
}

#[test]
fn closed_terminal_refuses_frames() {
    let (term, _) = terminal(5, 1);
    term.close().unwrap();
    assert!(matches!(term.begin_frame(), Err(Error::Closed)));
}

#[test]
fn out_of_bounds_set_cell_is_reported_but_sub_frames_clip() {
    let (term, _) = terminal(5, 2);
    let mut frame = term.begin_frame().unwrap();
    assert!(matches!(
        frame.set_cell(5, 0, 'x', &Style::new()),
        Err(Error::OutOfBounds { x: 5, y: 0 })
    ));
    let mut view = frame.sub_frame(Rect::new(1, 0, 2, 1));
    view.set_cell(9, 9, 'x', &Style::new());
    view.print(0, 0, "clipped", &Style::new());
    assert_eq!(frame.back().row_text(0), " cl  ");
}

// ── Input ───────────────────────────────────────────────────────────────────

#[test]
fn sgr_mouse_reports_decode_to_zero_based_cells() {
    let press = mouse(b"\x1b[<0;11;6M");
    assert_eq!(
        (press.button, press.event_type, press.x, press.y),
        (MouseButton::Left, MouseEventType::Press, 10, 5)
    );

    let release = mouse(b"\x1b[<0;5;5m");
    assert_eq!(
        (release.button, release.event_type, release.x, release.y),
        (MouseButton::None, MouseEventType::Release, 4, 4)
    );

    let wheel = mouse(b"\x1b[<64;10;10M");
    assert_eq!(
        (wheel.button, wheel.event_type, wheel.delta_y),
        (MouseButton::WheelUp, MouseEventType::Scroll, -1)
    );
}

#[test]
fn mixed_input_stream_decodes_in_order() {
    let decoded = events(b"a\x1b[1;5A\x1b[200~x\ty\x1b[201~\x1b[12;40R\x1b[Z");
    let Event::Key(a) = &decoded[0] else { panic!() };
    assert_eq!(a.code, KeyCode::Char('a'));

    let Event::Key(up) = &decoded[1] else { panic!() };
    assert_eq!((up.code, up.modifiers), (KeyCode::Up, Modifiers::CTRL));

    let Event::Key(paste) = &decoded[2] else { panic!() };
    assert!(paste.is_paste());
    assert_eq!(paste.paste_text, "x    y");

    assert!(matches!(decoded[3], Event::CursorPosition { row: 11, col: 39, .. }));

    let Event::Key(back_tab) = &decoded[4] else { panic!() };
    assert_eq!(back_tab.code, KeyCode::BackTab);
    assert_eq!(decoded.len(), 5);
}

#[test]
fn unknown_sequences_do_not_disturb_later_input() {
    let decoded = events(b"\x1b[99;1q\x1b[3~");
    let codes: Vec<KeyCode> = decoded
        .iter()
        .map(|e| match e {
            Event::Key(k) => k.code,
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert_eq!(codes, vec![KeyCode::Unknown, KeyCode::Delete]);
}

#[test]
fn decoded_clicks_reach_regions_and_escalate() {
    let clicks = Arc::new(AtomicUsize::new(0));
    let doubles = Arc::new(AtomicUsize::new(0));
    let region = {
        let clicks = Arc::clone(&clicks);
        let doubles = Arc::clone(&doubles);
        Arc::new(
            MouseRegion::new(Rect::new(0, 0, 10, 10), 0)
                .on(MouseEventType::Click, move |_| {
                    clicks.fetch_add(1, Ordering::SeqCst);
                })
                .on(MouseEventType::DoubleClick, move |_| {
                    doubles.fetch_add(1, Ordering::SeqCst);
                }),
        )
    };
    let mut engine = MouseEngine::default();
    engine.add_region(&region);

    let mut synthesized = Vec::new();
    for event in events(b"\x1b[<0;6;6M\x1b[<0;6;6m\x1b[<0;6;6M\x1b[<0;6;6m") {
        let Event::Mouse(m) = event else { panic!() };
        synthesized.extend(
            engine
                .handle_event(&m)
                .into_iter()
                .filter(|e| e.event_type.is_click())
                .map(|e| e.event_type),
        );
    }
    assert_eq!(
        synthesized,
        vec![MouseEventType::Click, MouseEventType::Click, MouseEventType::DoubleClick]
    );
    assert_eq!(clicks.load(Ordering::SeqCst), 2);
    assert_eq!(doubles.load(Ordering::SeqCst), 1);
}

// ── Screen Manager and Recording ────────────────────────────────────────────

#[test]
fn composed_screen_is_recorded_with_secrets_redacted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.cast");
    let (term, _) = terminal(40, 4);
    term.start_recording(RecorderConfig::new(&path).with_title("demo"))
        .unwrap();

    let screen = ScreenManager::new(Arc::clone(&term));
    screen.add_region("body", Rect::new(0, 0, 40, 2)).unwrap();
    screen.update_region("body", ["api_key=abcd1234efgh", "plain text"]).unwrap();
    screen.draw().unwrap();
    term.record_input(b"q");

    let summary = term.stop_recording().unwrap();
    assert_eq!(summary.events, 2);

    let (header, events) = read_recording(&path).unwrap();
    assert_eq!((header.width, header.height), (40, 4));
    assert_eq!(header.title.as_deref(), Some("demo"));
    assert_eq!(events[0].kind, EventKind::Output);
    assert!(events[0].data.contains("plain text"));
    assert!(events[0].data.contains("api_key"));
    assert!(!events[0].data.contains("abcd1234efgh"));
    assert_eq!((events[1].kind, events[1].data.as_str()), (EventKind::Input, "q"));
}

#[test]
fn credentials_are_redacted_keeping_the_key() {
    let redacted = redact_credentials("password: secret123");
    assert!(redacted.contains("password"));
    assert!(redacted.contains("[REDACTED]"));
    assert!(!redacted.contains("secret123"));
}

// ── Metrics ─────────────────────────────────────────────────────────────────

#[test]
fn frame_time_statistics() {
    let metrics = RenderMetrics::new();
    for ms in [10, 15, 20] {
        metrics.record_frame(FrameSample {
            duration: Duration::from_millis(ms),
            ..FrameSample::default()
        });
    }
    assert_eq!(metrics.avg_frame_time(), Duration::from_millis(15));
    assert_eq!(metrics.max_frame_time(), Duration::from_millis(20));
    assert_eq!(metrics.min_frame_time(), Duration::from_millis(10));
    assert_eq!(metrics.last_frame_time(), Duration::from_millis(20));
}

#[test]
fn buffers_compare_equal_after_flush() {
    let (term, _) = terminal(8, 2);
    let mut frame = term.begin_frame().unwrap();
    frame.print(1, 1, "世界", &Style::new());
    term.end_frame(frame).unwrap();

    let frame = term.begin_frame().unwrap();
    let mut expected = Buffer::new(8, 2);
    expected.print(1, 1, "世界", &Style::new(), None);
    assert_eq!(frame.back().row_text(1), expected.row_text(1));
}
