//! Markdown page rendering.
//!
//! Renders one source file at a time: markdown body via `pulldown-cmark`,
//! title from the first H1 heading, sibling navigation from the shared
//! source list, all substituted into the compiled [`PageTemplate`].

use std::fmt::Write;
use std::path::{Path, PathBuf};

use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd, html};

use crate::NOT_FOUND_PAGE;
use crate::template::{PageTemplate, PageVars, escape};

/// Error returned when page rendering fails.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Source file not found.
    #[error("Source file not found: {}", .0.display())]
    FileNotFound(PathBuf),
    /// I/O error reading the source or writing the output.
    #[error("I/O error: {0}")]
    Io(#[source] std::io::Error),
}

impl RenderError {
    /// True when the failure is a missing source file, which the build
    /// pipeline tolerates silently.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::FileNotFound(_))
    }
}

/// Rendering seam used by the rebuild engine.
///
/// Both methods take relative forward-slash source paths and write files
/// under the implementation's output root. `sources` is the full source
/// list from the last full build, so every page can enumerate its siblings.
pub trait Renderer: Send + Sync {
    /// Render one source file to its output file.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::FileNotFound`] when the source cannot be read
    /// because it does not exist, [`RenderError::Io`] otherwise.
    fn render_page(
        &self,
        source: &str,
        template: &PageTemplate,
        sources: &[String],
    ) -> Result<(), RenderError>;

    /// Render the fallback not-found page.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Io`] when the page cannot be written.
    fn render_not_found(&self, template: &PageTemplate) -> Result<(), RenderError>;
}

/// Derive the output path for a source path by substituting the markup
/// extension (`a.md` -> `a.html`, `b/c.md` -> `b/c.html`).
#[must_use]
pub fn output_path(source: &str) -> String {
    source
        .strip_suffix(".md")
        .map_or_else(|| source.to_owned(), |stem| format!("{stem}.html"))
}

/// Markdown-to-HTML renderer writing through a [`PageTemplate`].
pub struct MarkdownRenderer {
    source_dir: PathBuf,
    output_dir: PathBuf,
}

impl MarkdownRenderer {
    /// Create a renderer for the given source and output roots.
    #[must_use]
    pub fn new(source_dir: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            source_dir,
            output_dir,
        }
    }

    /// Write an output file, creating parent directories as needed.
    fn write_output(&self, relative: &str, contents: &str) -> Result<(), RenderError> {
        let path = self.output_dir.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(RenderError::Io)?;
        }
        std::fs::write(&path, contents).map_err(RenderError::Io)
    }
}

impl Renderer for MarkdownRenderer {
    fn render_page(
        &self,
        source: &str,
        template: &PageTemplate,
        sources: &[String],
    ) -> Result<(), RenderError> {
        let source_path = self.source_dir.join(source);
        let text = std::fs::read_to_string(&source_path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                RenderError::FileNotFound(source_path.clone())
            } else {
                RenderError::Io(err)
            }
        })?;

        let content = markdown_to_html(&text);
        let title = extract_title(&text).unwrap_or_else(|| title_from_path(source));
        let nav = render_nav(sources, Some(source));

        let page = template.render(&PageVars {
            title: &title,
            content: &content,
            nav: &nav,
        });

        let output = output_path(source);
        tracing::debug!(source, %output, "Rendered page");
        self.write_output(&output, &page)
    }

    fn render_not_found(&self, template: &PageTemplate) -> Result<(), RenderError> {
        let page = template.render(&PageVars {
            title: "Page not found",
            content: "<h1>Page not found</h1>\
                      <p>The page you are looking for does not exist.</p>",
            nav: &render_nav(&[], None),
        });
        self.write_output(NOT_FOUND_PAGE, &page)
    }
}

fn parser_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_TASKLISTS
}

/// Render markdown to an HTML fragment.
fn markdown_to_html(text: &str) -> String {
    let parser = Parser::new_ext(text, parser_options());
    let mut out = String::with_capacity(text.len() * 2);
    html::push_html(&mut out, parser);
    out
}

/// Extract the text of the first H1 heading, if any.
fn extract_title(text: &str) -> Option<String> {
    let mut in_heading = false;
    let mut title = String::new();

    for event in Parser::new_ext(text, parser_options()) {
        match event {
            Event::Start(Tag::Heading {
                level: HeadingLevel::H1,
                ..
            }) => in_heading = true,
            Event::End(TagEnd::Heading(HeadingLevel::H1)) => {
                return (!title.is_empty()).then_some(title);
            }
            Event::Text(t) | Event::Code(t) if in_heading => title.push_str(&t),
            _ => {}
        }
    }

    None
}

/// Fall back to the file path without extension as the title.
fn title_from_path(source: &str) -> String {
    let stem = source.strip_suffix(".md").unwrap_or(source);
    stem.rsplit('/').next().unwrap_or(stem).to_owned()
}

/// Render the sibling navigation list.
///
/// Links are root-absolute output paths so they resolve anywhere under the
/// preview server. The entry for `current` is marked active.
fn render_nav(sources: &[String], current: Option<&str>) -> String {
    let mut out = String::with_capacity(256);
    out.push_str("<nav class=\"docs-nav\"><ul>");
    for source in sources {
        let class = if current == Some(source.as_str()) {
            " class=\"active\""
        } else {
            ""
        };
        let label = source.strip_suffix(".md").unwrap_or(source);
        let _ = write!(
            out,
            "<li{class}><a href=\"/{}\">{}</a></li>",
            escape(&output_path(source)),
            escape(label),
        );
    }
    out.push_str("</ul></nav>");
    out
}
