//! Shared per-session build state.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use mdpress_render::PageTemplate;

/// Mutable state shared by the build tasks of one session.
///
/// The template and source list are installed wholesale by full builds and
/// read by incremental tasks. The pending set tracks paths with an
/// outstanding regeneration task; at most one entry per path exists at any
/// instant. Locks are never held across await points.
#[derive(Default)]
pub(crate) struct SessionState {
    template: Mutex<Option<Arc<PageTemplate>>>,
    sources: Mutex<Arc<Vec<String>>>,
    pending: Mutex<HashSet<String>>,
}

impl SessionState {
    /// Template installed by the last successful full build, if any.
    pub fn template(&self) -> Option<Arc<PageTemplate>> {
        self.template.lock().unwrap().as_ref().map(Arc::clone)
    }

    /// Replace the template and source list together.
    pub fn install(&self, template: Arc<PageTemplate>, sources: Vec<String>) {
        *self.template.lock().unwrap() = Some(template);
        *self.sources.lock().unwrap() = Arc::new(sources);
    }

    /// Source list enumerated by the last full build.
    pub fn sources(&self) -> Arc<Vec<String>> {
        Arc::clone(&self.sources.lock().unwrap())
    }

    /// Mark a path as having an outstanding regeneration.
    ///
    /// Returns `false` when the path is already pending, in which case the
    /// caller must not schedule another task.
    pub fn try_begin_change(&self, path: &str) -> bool {
        self.pending.lock().unwrap().insert(path.to_owned())
    }

    /// Clear a path's pending mark once its task has settled.
    pub fn finish_change(&self, path: &str) {
        self.pending.lock().unwrap().remove(path);
    }

    #[cfg(test)]
    pub fn is_pending(&self, path: &str) -> bool {
        self.pending.lock().unwrap().contains(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_change_deduplicates_until_finished() {
        let state = SessionState::default();

        assert!(state.try_begin_change("a.md"));
        assert!(!state.try_begin_change("a.md"));
        assert!(state.try_begin_change("b.md"));

        state.finish_change("a.md");
        assert!(state.try_begin_change("a.md"));
    }

    #[test]
    fn install_replaces_template_and_sources() {
        let state = SessionState::default();
        assert!(state.template().is_none());
        assert!(state.sources().is_empty());

        let template = Arc::new(PageTemplate::compile("{{content}}").unwrap());
        state.install(template, vec!["a.md".to_owned()]);

        assert!(state.template().is_some());
        assert_eq!(*state.sources(), vec!["a.md".to_owned()]);
    }
}
