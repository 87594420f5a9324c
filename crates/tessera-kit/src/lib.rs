// SPDX-License-Identifier: MIT
//
// tessera-kit: collaborators for the terminal engine.
//
//   clipboard → system clipboard through OS utilities, with timeout and
//               cancellation
//   config    → typed configuration merged from environment variables,
//               `.env` files and JSON
//
// Neither shares state with the rendering core; the engine and the demo
// call them through these narrow interfaces.

pub mod clipboard;
pub mod config;

pub use clipboard::{Clipboard, ClipboardError};
pub use config::{ConfigError, Source};
