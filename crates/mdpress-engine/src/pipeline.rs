//! Regeneration pipeline.
//!
//! Two kinds of work flow through the pipeline, both serialized by the
//! [`TaskRunner`]:
//!
//! - **Full builds** compile the page template from the built entry page,
//!   enumerate the source tree and re-render every page plus the
//!   not-found fallback.
//! - **Incremental changes** re-render exactly one page in response to a
//!   watcher notification, after a settle delay that lets editors finish
//!   multi-step writes.
//!
//! Change notifications are deduplicated per path: while a regeneration
//! for a path is in flight, further notifications for it are dropped.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mdpress_preview::ReloadSink;
use mdpress_render::{ENTRY_PAGE, PageTemplate, Renderer, output_path};

use crate::error::EngineError;
use crate::runner::TaskRunner;
use crate::scan::scan_sources;
use crate::state::SessionState;

/// Pipeline configuration.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Root of the markdown source tree.
    pub source_dir: PathBuf,
    /// Root of the rendered output tree.
    pub output_dir: PathBuf,
    /// Wait before reading a changed file, so editors that write in
    /// multiple steps have finished.
    pub settle_delay: Duration,
}

/// Regeneration pipeline for one build or watch session.
pub struct Pipeline {
    config: PipelineConfig,
    renderer: Arc<dyn Renderer>,
    state: SessionState,
    runner: TaskRunner,
    sink: Mutex<Option<Arc<dyn ReloadSink>>>,
}

impl Pipeline {
    /// Create a pipeline.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(config: PipelineConfig, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            config,
            renderer,
            state: SessionState::default(),
            runner: TaskRunner::new(),
            sink: Mutex::new(None),
        }
    }

    /// Root of the markdown source tree.
    #[must_use]
    pub fn source_dir(&self) -> &Path {
        &self.config.source_dir
    }

    /// Root of the rendered output tree.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    /// Attach the preview notification sink.
    pub fn set_reload_sink(&self, sink: Arc<dyn ReloadSink>) {
        *self.sink.lock().unwrap() = Some(sink);
    }

    fn sink(&self) -> Option<Arc<dyn ReloadSink>> {
        self.sink.lock().unwrap().as_ref().map(Arc::clone)
    }

    /// True once a full build has installed a template.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state.template().is_some()
    }

    /// Number of sources enumerated by the last full build.
    #[must_use]
    pub fn source_count(&self) -> usize {
        self.state.sources().len()
    }

    /// Schedule a full rebuild of the output tree.
    ///
    /// Always runs through the serial task queue, so it cannot race with
    /// an in-flight per-file regeneration.
    pub fn schedule_full_build(self: &Arc<Self>) {
        let pipeline = Arc::clone(self);
        self.runner.enqueue(async move { pipeline.full_build().await });
    }

    /// Entry point for raw change notifications from the watcher.
    ///
    /// `path` is the relative source path as observed. A path whose
    /// regeneration is already in flight is dropped, not queued; rapid
    /// successive saves may be coalesced. The rendered page sees the
    /// source list from the last full build, so a file created during
    /// watch mode appears in other pages' navigation only after the next
    /// full build.
    pub fn file_changed(self: &Arc<Self>, path: String) {
        if !self.state.try_begin_change(&path) {
            return;
        }
        let pipeline = Arc::clone(self);
        self.runner.enqueue(async move {
            pipeline.handle_change(&path).await;
            // Settling, not success, clears the pending mark.
            pipeline.state.finish_change(&path);
        });
    }

    /// Stop accepting work and wait for queued tasks to finish.
    pub async fn drain(&self) {
        self.runner.drain().await;
    }

    async fn full_build(&self) {
        if let Err(err) = self.try_full_build().await {
            if !err.is_missing_input() {
                tracing::error!(error = %err, "Full build failed");
            }
        }
    }

    async fn try_full_build(&self) -> Result<(), EngineError> {
        let entry = self.config.output_dir.join(ENTRY_PAGE);
        let html = tokio::fs::read_to_string(&entry).await.map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                EngineError::EntryPageMissing(entry.clone())
            } else {
                EngineError::Io(err)
            }
        })?;
        let template = Arc::new(PageTemplate::compile(&html)?);
        let sources = scan_sources(&self.config.source_dir).map_err(EngineError::Scan)?;

        // Install before rendering: incremental changes may proceed even
        // if a page later in this run fails.
        self.state.install(Arc::clone(&template), sources);
        let sources = self.state.sources();

        tracing::info!(pages = sources.len(), "Running full build");
        for source in sources.iter() {
            self.renderer.render_page(source, &template, &sources)?;
        }
        self.renderer.render_not_found(&template)?;

        if let Some(sink) = self.sink() {
            sink.reload(None);
        }
        Ok(())
    }

    async fn handle_change(&self, path: &str) {
        if let Err(err) = self.try_handle_change(path).await {
            if !err.is_missing_input() {
                tracing::error!(path, error = %err, "Failed to regenerate page");
            }
        }
    }

    async fn try_handle_change(&self, path: &str) -> Result<(), EngineError> {
        // Nothing to patch until the first full build has run.
        let Some(template) = self.state.template() else {
            return Ok(());
        };

        tokio::time::sleep(self.config.settle_delay).await;

        let absolute = self.config.source_dir.join(path);
        let metadata = tokio::fs::metadata(&absolute).await.map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                EngineError::Render(mdpress_render::RenderError::FileNotFound(absolute.clone()))
            } else {
                EngineError::Io(err)
            }
        })?;
        // Directory-rename artifacts arrive as change events too.
        if !metadata.is_file() {
            return Ok(());
        }

        let source = path.replace('\\', "/");
        let output = output_path(&source);
        let sources = self.state.sources();
        self.renderer.render_page(&source, &template, &sources)?;

        tracing::info!(page = %output, "Regenerated page");
        if let Some(sink) = self.sink() {
            sink.reload(Some(&output));
        }
        Ok(())
    }
}
