//! Runtime-compiled page template.
//!
//! The template is compiled from the built output tree's entry page, which a
//! separate asset pipeline produces. It recognizes three placeholders:
//! `{{title}}` (HTML-escaped), `{{content}}` and `{{nav}}` (inserted raw).
//! Unknown placeholders render as empty strings.

/// A compiled placeholder slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Title,
    Content,
    Nav,
    Unknown,
}

/// One compiled template segment.
#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Slot(Slot),
}

/// Values substituted into a [`PageTemplate`].
#[derive(Debug, Clone, Copy)]
pub struct PageVars<'a> {
    /// Page title, HTML-escaped on substitution.
    pub title: &'a str,
    /// Rendered page body, inserted raw.
    pub content: &'a str,
    /// Rendered navigation markup, inserted raw.
    pub nav: &'a str,
}

/// Error returned when template compilation fails.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// A `{{` without a matching `}}`.
    #[error("Unterminated placeholder at byte offset {0}")]
    Unterminated(usize),
}

/// Compiled page template.
///
/// Compiled once per full build and shared read-only for the lifetime of a
/// build or watch session.
#[derive(Debug, Clone)]
pub struct PageTemplate {
    segments: Vec<Segment>,
}

impl PageTemplate {
    /// Compile a template from the entry page source.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Unterminated`] if a `{{` is never closed.
    pub fn compile(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = source;
        let mut offset = 0;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_owned()));
            }
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else {
                return Err(TemplateError::Unterminated(offset + start));
            };

            let slot = match after[..end].trim() {
                "title" => Slot::Title,
                "content" => Slot::Content,
                "nav" => Slot::Nav,
                _ => Slot::Unknown,
            };
            segments.push(Segment::Slot(slot));

            offset += start + 2 + end + 2;
            rest = &after[end + 2..];
        }

        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_owned()));
        }

        Ok(Self { segments })
    }

    /// Render the template with the given values.
    #[must_use]
    pub fn render(&self, vars: &PageVars<'_>) -> String {
        let mut out = String::with_capacity(8192);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Slot(Slot::Title) => out.push_str(&escape(vars.title)),
                Segment::Slot(Slot::Content) => out.push_str(vars.content),
                Segment::Slot(Slot::Nav) => out.push_str(vars.nav),
                Segment::Slot(Slot::Unknown) => {}
            }
        }
        out
    }
}

/// Escape HTML special characters.
pub(crate) fn escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#x27;"),
            _ => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const VARS: PageVars<'static> = PageVars {
        title: "Guide",
        content: "<p>Hello</p>",
        nav: "<ul></ul>",
    };

    #[test]
    fn compile_and_render_all_placeholders() {
        let template =
            PageTemplate::compile("<title>{{title}}</title>{{nav}}<main>{{content}}</main>")
                .unwrap();

        let html = template.render(&VARS);

        assert_eq!(html, "<title>Guide</title><ul></ul><main><p>Hello</p></main>");
    }

    #[test]
    fn render_escapes_title_only() {
        let template = PageTemplate::compile("{{title}}|{{content}}").unwrap();

        let html = template.render(&PageVars {
            title: "a < b",
            content: "<em>kept</em>",
            nav: "",
        });

        assert_eq!(html, "a &lt; b|<em>kept</em>");
    }

    #[test]
    fn placeholder_names_may_carry_whitespace() {
        let template = PageTemplate::compile("{{ title }}").unwrap();

        assert_eq!(template.render(&VARS), "Guide");
    }

    #[test]
    fn unknown_placeholder_renders_empty() {
        let template = PageTemplate::compile("a{{ sidebar }}b").unwrap();

        assert_eq!(template.render(&VARS), "ab");
    }

    #[test]
    fn literal_without_placeholders_is_unchanged() {
        let source = "<html><body>static</body></html>";
        let template = PageTemplate::compile(source).unwrap();

        assert_eq!(template.render(&VARS), source);
    }

    #[test]
    fn unterminated_placeholder_is_error() {
        let result = PageTemplate::compile("<main>{{content</main>");

        assert!(matches!(result, Err(TemplateError::Unterminated(6))));
    }

    #[test]
    fn escape_special_characters() {
        assert_eq!(escape("<script>"), "&lt;script&gt;");
        assert_eq!(escape("a&b"), "a&amp;b");
        assert_eq!(escape("\"hello\""), "&quot;hello&quot;");
    }
}
