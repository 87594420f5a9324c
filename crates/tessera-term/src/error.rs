// SPDX-License-Identifier: MIT
//
// Error type shared by every fallible operation in the engine.
//
// Boundary conditions (clipped draws, writes during a paused recording) are
// absorbed where they happen and never reach this type. What does reach it
// falls into three groups: caller-contract violations (`Closed`,
// `InvalidFrame`, `OutOfBounds`, recorder and region misuse), environment
// failures (`Io`), and the end of an input stream.

use std::io;

use thiserror::Error;

/// Errors returned by the terminal engine.
#[derive(Debug, Error)]
pub enum Error {
    /// The terminal's output has been closed.
    #[error("terminal output is closed")]
    Closed,

    /// A frame was handed to a terminal that did not open it.
    #[error("frame does not belong to this terminal")]
    InvalidFrame,

    /// `set_cell` was called with coordinates outside the drawable area.
    #[error("cell ({x}, {y}) is outside the drawable area")]
    OutOfBounds { x: i32, y: i32 },

    /// The decoder's byte source is exhausted.
    #[error("end of input")]
    EndOfInput,

    /// A recording is already attached to the terminal.
    #[error("a recording is already active")]
    RecordingActive,

    /// No recording is attached to the terminal.
    #[error("no recording is active")]
    NotRecording,

    /// No screen region is registered under this name.
    #[error("screen region {0:?} not found")]
    RegionNotFound(String),

    /// The screen region is protected against this operation.
    #[error("screen region {0:?} is protected")]
    ProtectedRegion(String),

    /// Text too long for one OSC 52 clipboard write.
    #[error("clipboard payload of {len} bytes exceeds the {max} byte limit")]
    ClipboardTooLarge { len: usize, max: usize },

    /// A custom redaction pattern failed to compile.
    #[error("invalid redaction pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Recording header or event could not be encoded or decoded.
    #[error("recording format: {0}")]
    Format(#[from] serde_json::Error),

    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error is one of the caller-contract sentinels.
    #[must_use]
    pub const fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::Closed | Self::InvalidFrame | Self::OutOfBounds { .. }
        )
    }
}
