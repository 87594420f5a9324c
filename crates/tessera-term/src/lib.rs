// SPDX-License-Identifier: MIT
//
// tessera-term: a low-level terminal engine.
//
// Turns a raw byte-oriented terminal connection into two things: a
// double-buffered cell grid that is redrawn with minimal output, and a
// decoded stream of keyboard, mouse, paste and cursor-report events.
//
// Output side: `Terminal::begin_frame` hands out a `Frame` that draws into
// the back buffer and accumulates a dirty rectangle. `Terminal::end_frame`
// diffs only that rectangle against the front buffer and writes the changed
// cells in one synchronized burst. A frame that touched nothing writes
// nothing.
//
// Input side: `Decoder` pulls bytes from any `Read` and yields one `Event`
// per call. `MouseEngine` turns raw mouse events into clicks, multi-clicks,
// drags and hover transitions routed to application regions.
//
// Around the core: `ScreenManager` composes named regions on a scheduler,
// `RenderMetrics` counts what frames cost, and `Recorder` writes the session
// as an asciinema v2 stream with secrets redacted.

pub mod ansi;
pub mod buffer;
pub mod cell;
pub mod color;
pub mod diff;
pub mod dirty;
pub mod error;
pub mod frame;
pub mod hyperlink;
pub mod input;
pub mod metrics;
pub mod mouse;
pub mod output;
pub mod reader;
pub mod recorder;
pub mod redact;
pub mod screen;
pub mod style;
pub mod terminal;
#[cfg(unix)]
pub mod tty;

pub use buffer::{Buffer, Rect};
pub use cell::Cell;
pub use color::{AnsiColor, Color, Rgb};
pub use dirty::DirtyRegion;
pub use error::{Error, Result};
pub use frame::{Frame, SubFrame};
pub use input::{Decoder, DecoderConfig, Event, KeyCode, KeyEvent, Modifiers};
pub use metrics::{MetricsSnapshot, RenderMetrics};
pub use mouse::{MouseButton, MouseEngine, MouseEvent, MouseEventType, MouseRegion};
pub use recorder::{Recorder, RecorderConfig};
pub use redact::{Redactor, redact_credentials};
pub use screen::ScreenManager;
pub use style::{Attr, Style};
pub use terminal::{Backend, Size, Terminal, TerminalConfig};
