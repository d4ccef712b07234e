//! Free-space erase engine.
//!
//! Fills the free space of a writable folder with large temporary files of
//! zeros, ones, or pseudo-random data, optionally read-verifies what was
//! written, then deletes the files. Previously deleted file content is
//! overwritten in the process. This is not a secure-erase implementation:
//! it works through the regular file API and cannot reach file-system
//! metadata, resident small files, or sectors outside the visible
//! namespace.
//!
//! The library is the engine; a front end (see the bundled CLI) supplies a
//! validated [`EraseConfig`], spawns [`Eraser::run`] on a worker thread,
//! and polls [`RunState::snapshot`] while holding the cancel and pause
//! signals.

pub mod buffer;
pub mod config;
pub mod pattern;
pub mod report;
pub mod run;
pub mod space;
pub mod status;
pub mod verifier;
pub mod writer;

pub use config::{ConfigError, EraseConfig, FillMode, PassSpec};
pub use run::{Eraser, PassResult, RunSummary};
pub use status::{Action, RunState, StatusSnapshot};
