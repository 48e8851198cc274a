//! Page template and markdown rendering for mdpress.
//!
//! This crate provides the rendering side of the build pipeline:
//!
//! - [`PageTemplate`] - a page template compiled at runtime from the built
//!   output tree's entry page
//! - [`Renderer`] trait - the seam the rebuild engine renders through
//! - [`MarkdownRenderer`] - the markdown-to-HTML implementation

mod markdown;
mod template;

pub use markdown::{MarkdownRenderer, RenderError, Renderer, output_path};
pub use template::{PageTemplate, PageVars, TemplateError};

/// Entry page of the built output tree, compiled into the [`PageTemplate`].
pub const ENTRY_PAGE: &str = "index.html";

/// Fallback page served when a requested output path has no source.
pub const NOT_FOUND_PAGE: &str = "404.html";

/// Extension of markup source files.
pub const SOURCE_EXTENSION: &str = "md";
