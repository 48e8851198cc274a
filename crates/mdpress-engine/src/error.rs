//! Engine error types.

use std::path::PathBuf;

use mdpress_render::{RenderError, TemplateError};

/// Error produced by the rebuild engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The built entry page does not exist yet; the output tree has never
    /// been produced. Always recoverable.
    #[error("Entry page not found: {}", .0.display())]
    EntryPageMissing(PathBuf),

    #[error("{0}")]
    Template(#[from] TemplateError),

    #[error("{0}")]
    Render(#[from] RenderError),

    #[error("Failed to scan source tree: {0}")]
    Scan(#[source] std::io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("{0}")]
    Preview(#[from] mdpress_preview::PreviewError),

    /// A watch session was started twice; sessions are single-use.
    #[error("Watch session already started")]
    SessionAlreadyStarted,
}

impl EngineError {
    /// True when the failure is a missing input (absent source file or
    /// never-built entry page). Missing inputs are tolerated silently;
    /// every other error is surfaced.
    #[must_use]
    pub fn is_missing_input(&self) -> bool {
        match self {
            Self::EntryPageMissing(_) => true,
            Self::Render(err) => err.is_not_found(),
            _ => false,
        }
    }
}
