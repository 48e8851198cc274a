//! Incremental rebuild engine for mdpress.
//!
//! Keeps a rendered output tree synchronized with a markdown source tree.
//! One-shot builds regenerate everything; in watch mode, filesystem events
//! flow through a per-path debounced queue into a strictly serial task
//! runner, so bursts of editor saves collapse into single scoped rebuilds
//! and no two regenerations ever overlap.
//!
//! # Architecture
//!
//! ```text
//! notify events ──► WatchSession ──► Pipeline::file_changed
//!                                        │ (per-path dedupe)
//!                                        ▼
//!                                    TaskRunner (serial)
//!                                        │
//!                          ┌─────────────┴─────────────┐
//!                          ▼                           ▼
//!                     full build               incremental change
//!                          │                           │
//!                          └────────► ReloadSink ◄─────┘
//! ```

mod error;
mod pipeline;
mod runner;
mod scan;
mod state;
mod watch;

pub use error::EngineError;
pub use pipeline::{Pipeline, PipelineConfig};
pub use runner::TaskRunner;
pub use watch::{SessionPhase, StartupHook, WatchOptions, WatchSession};
