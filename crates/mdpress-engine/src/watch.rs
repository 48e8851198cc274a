//! Watch session lifecycle.
//!
//! A [`WatchSession`] owns the filesystem watcher and the preview server
//! for one dev-mode session:
//!
//! ```text
//! Idle -> Starting -> Active -> Stopping -> Stopped
//! ```
//!
//! While active, raw watcher events are pumped into the pipeline's
//! debounced change queue. Stopping detaches the watcher, which ends the
//! event stream cleanly, and closes the preview server immediately;
//! in-flight regeneration tasks are left to run to completion.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use mdpress_preview::{PreviewServer, ReloadSink};
use mdpress_render::SOURCE_EXTENSION;

use crate::error::EngineError;
use crate::pipeline::Pipeline;

/// Callback invoked with the preview server handle once it is listening.
pub type StartupHook = Box<dyn FnOnce(&PreviewServer) + Send>;

/// Watch session options.
pub struct WatchOptions {
    /// Preview server host.
    pub host: String,
    /// Preview server port (0 picks an ephemeral port).
    pub port: u16,
    /// Invoked with the preview server handle during startup.
    pub on_startup: Option<StartupHook>,
}

/// Session lifecycle phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Starting,
    Active,
    Stopping,
    Stopped,
}

/// Watch session controller.
///
/// Single-use: a stopped session cannot be restarted, create a new one.
pub struct WatchSession {
    pipeline: Arc<Pipeline>,
    phase: Mutex<SessionPhase>,
    watcher: Mutex<Option<RecommendedWatcher>>,
    preview: Mutex<Option<Arc<PreviewServer>>>,
    pump: Mutex<Option<JoinHandle<Result<(), EngineError>>>>,
}

impl WatchSession {
    /// Create an idle session around a pipeline.
    #[must_use]
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            phase: Mutex::new(SessionPhase::Idle),
            watcher: Mutex::new(None),
            preview: Mutex::new(None),
            pump: Mutex::new(None),
        }
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        *self.phase.lock().unwrap()
    }

    /// Address of the preview server, once the session is active.
    #[must_use]
    pub fn preview_addr(&self) -> Option<SocketAddr> {
        self.preview
            .lock()
            .unwrap()
            .as_ref()
            .map(|preview| preview.local_addr())
    }

    /// Start the session: create the output directory, start the preview
    /// server, attach the filesystem watcher and begin pumping events.
    ///
    /// # Errors
    ///
    /// Returns an error when the session was already started, the preview
    /// server cannot bind, or the watcher cannot be attached.
    pub async fn start(&self, options: WatchOptions) -> Result<(), EngineError> {
        {
            let mut phase = self.phase.lock().unwrap();
            if *phase != SessionPhase::Idle {
                return Err(EngineError::SessionAlreadyStarted);
            }
            *phase = SessionPhase::Starting;
        }

        tokio::fs::create_dir_all(self.pipeline.output_dir()).await?;

        let preview = Arc::new(
            PreviewServer::start(
                self.pipeline.output_dir().to_path_buf(),
                &options.host,
                options.port,
            )
            .await?,
        );
        if let Some(hook) = options.on_startup {
            hook(&preview);
        }
        let sink: Arc<dyn ReloadSink> = Arc::clone(&preview);
        self.pipeline.set_reload_sink(sink);

        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher =
            notify::recommended_watcher(move |result: Result<Event, notify::Error>| {
                // Dropping the watcher drops this sender, ending the
                // stream cleanly.
                let _ = tx.send(result);
            })?;
        watcher.watch(self.pipeline.source_dir(), RecursiveMode::Recursive)?;

        let pipeline = Arc::clone(&self.pipeline);
        let source_dir = self.pipeline.source_dir().to_path_buf();
        let pump = tokio::spawn(pump_events(rx, pipeline, source_dir));

        *self.watcher.lock().unwrap() = Some(watcher);
        *self.preview.lock().unwrap() = Some(preview);
        *self.pump.lock().unwrap() = Some(pump);
        *self.phase.lock().unwrap() = SessionPhase::Active;

        tracing::info!(
            source = %self.pipeline.source_dir().display(),
            "Watching for changes"
        );
        Ok(())
    }

    /// Wait for the event stream to end.
    ///
    /// Returns an error when the watcher transport fails; cancellation via
    /// [`stop`](Self::stop) ends the stream cleanly.
    pub async fn wait(&self) -> Result<(), EngineError> {
        let pump = self.pump.lock().unwrap().take();
        match pump {
            Some(handle) => match handle.await {
                Ok(result) => result,
                Err(err) => {
                    tracing::error!(error = %err, "Event pump task failed");
                    Ok(())
                }
            },
            None => Ok(()),
        }
    }

    /// Stop the session: detach the watcher and close the preview server.
    ///
    /// In-flight regeneration tasks are not cancelled; drain the pipeline
    /// afterwards to let them finish. Idempotent.
    pub async fn stop(&self) {
        {
            let mut phase = self.phase.lock().unwrap();
            if !matches!(*phase, SessionPhase::Starting | SessionPhase::Active) {
                return;
            }
            *phase = SessionPhase::Stopping;
        }

        // Ends the event stream: the watcher callback holds the only sender.
        drop(self.watcher.lock().unwrap().take());

        if let Some(preview) = self.preview.lock().unwrap().take() {
            preview.close();
        }

        let pump = self.pump.lock().unwrap().take();
        if let Some(pump) = pump {
            let _ = pump.await;
        }

        *self.phase.lock().unwrap() = SessionPhase::Stopped;
        tracing::info!("Watch session stopped");
    }
}

/// Forward watcher events into the pipeline until the stream ends.
async fn pump_events(
    mut rx: mpsc::UnboundedReceiver<Result<Event, notify::Error>>,
    pipeline: Arc<Pipeline>,
    source_dir: PathBuf,
) -> Result<(), EngineError> {
    while let Some(result) = rx.recv().await {
        // Transport failures are fatal to the session and surface to the
        // host through wait().
        let event = result?;
        if !is_relevant(&event.kind) {
            continue;
        }
        for path in event.paths {
            if let Some(relative) = relative_source_path(&path, &source_dir) {
                pipeline.file_changed(relative);
            }
        }
    }
    // Watcher detached: clean end of stream.
    Ok(())
}

const fn is_relevant(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// Relative path for a markdown source event; other paths are dropped.
fn relative_source_path(path: &Path, source_dir: &Path) -> Option<String> {
    if !path.extension().is_some_and(|ext| ext == SOURCE_EXTENSION) {
        return None;
    }
    let relative = path.strip_prefix(source_dir).ok()?;
    Some(relative.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    use mdpress_render::MarkdownRenderer;

    use crate::pipeline::PipelineConfig;

    const TEMPLATE: &str = "<title>{{title}}</title><main>{{content}}</main>";

    struct Fixture {
        dir: tempfile::TempDir,
        pipeline: Arc<Pipeline>,
        session: WatchSession,
    }

    impl Fixture {
        fn docs(&self) -> PathBuf {
            self.dir.path().join("docs")
        }

        fn dist(&self) -> PathBuf {
            self.dir.path().join("dist")
        }
    }

    fn fixture(settle: Duration) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("docs")).unwrap();
        std::fs::create_dir_all(dir.path().join("dist")).unwrap();
        // Canonicalize so watcher-reported paths strip cleanly even when
        // the temp dir sits behind a symlink.
        let docs = dir.path().join("docs").canonicalize().unwrap();
        let dist = dir.path().join("dist").canonicalize().unwrap();
        std::fs::write(dist.join("index.html"), TEMPLATE).unwrap();

        let renderer = Arc::new(MarkdownRenderer::new(docs.clone(), dist.clone()));
        let pipeline = Arc::new(Pipeline::new(
            PipelineConfig {
                source_dir: docs,
                output_dir: dist,
                settle_delay: settle,
            },
            renderer,
        ));
        let session = WatchSession::new(Arc::clone(&pipeline));

        Fixture {
            dir,
            pipeline,
            session,
        }
    }

    fn options() -> WatchOptions {
        WatchOptions {
            host: "127.0.0.1".to_owned(),
            port: 0,
            on_startup: None,
        }
    }

    async fn wait_for(mut condition: impl FnMut() -> bool, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        condition()
    }

    #[tokio::test]
    async fn session_lifecycle_phases() {
        let f = fixture(Duration::from_millis(10));
        assert_eq!(f.session.phase(), SessionPhase::Idle);

        f.session.start(options()).await.unwrap();
        assert_eq!(f.session.phase(), SessionPhase::Active);
        assert!(f.session.preview_addr().is_some());

        f.session.stop().await;
        assert_eq!(f.session.phase(), SessionPhase::Stopped);

        // Terminal: a stopped session cannot restart.
        let err = f.session.start(options()).await.unwrap_err();
        assert!(matches!(err, EngineError::SessionAlreadyStarted));
    }

    #[tokio::test]
    async fn startup_hook_sees_the_listening_server() {
        let f = fixture(Duration::from_millis(10));
        let seen = Arc::new(Mutex::new(None));

        let seen_clone = Arc::clone(&seen);
        let mut opts = options();
        opts.on_startup = Some(Box::new(move |server: &PreviewServer| {
            *seen_clone.lock().unwrap() = Some(server.local_addr());
        }));

        f.session.start(opts).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), f.session.preview_addr());
        f.session.stop().await;
    }

    #[tokio::test]
    async fn stop_returns_promptly_while_a_task_is_in_flight() {
        let f = fixture(Duration::from_millis(800));
        std::fs::write(f.docs().join("a.md"), "# A\n").unwrap();

        f.session.start(options()).await.unwrap();
        f.pipeline.schedule_full_build();
        assert!(
            wait_for(|| f.dist().join("a.html").is_file(), Duration::from_secs(2)).await,
            "full build did not complete"
        );

        std::fs::write(f.docs().join("a.md"), "# A changed\n").unwrap();
        f.pipeline.file_changed("a.md".to_owned());

        // Stop while the change task is sitting in its settle delay.
        let started = Instant::now();
        f.session.stop().await;
        assert!(started.elapsed() < Duration::from_millis(400));
        assert_eq!(f.session.phase(), SessionPhase::Stopped);

        // The in-flight task still runs to completion.
        f.pipeline.drain().await;
        let html = std::fs::read_to_string(f.dist().join("a.html")).unwrap();
        assert!(html.contains("A changed"));
    }

    #[tokio::test]
    async fn wait_returns_cleanly_after_stop() {
        let f = fixture(Duration::from_millis(10));
        f.session.start(options()).await.unwrap();

        f.session.stop().await;
        f.session.wait().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn file_edit_regenerates_the_page() {
        let f = fixture(Duration::from_millis(50));
        std::fs::write(f.docs().join("a.md"), "# First\n").unwrap();

        f.session.start(options()).await.unwrap();
        f.pipeline.schedule_full_build();
        assert!(
            wait_for(|| f.dist().join("a.html").is_file(), Duration::from_secs(2)).await,
            "full build did not complete"
        );

        std::fs::write(f.docs().join("a.md"), "# Second\n").unwrap();

        let dist = f.dist();
        let regenerated = wait_for(
            || {
                std::fs::read_to_string(dist.join("a.html"))
                    .is_ok_and(|html| html.contains("Second"))
            },
            Duration::from_secs(5),
        )
        .await;
        assert!(regenerated, "edit was not picked up by the watcher");

        f.session.stop().await;
        f.pipeline.drain().await;
    }

    #[test]
    fn relative_source_path_filters_and_strips() {
        let source_dir = Path::new("/site/docs");

        assert_eq!(
            relative_source_path(Path::new("/site/docs/a.md"), source_dir),
            Some("a.md".to_owned())
        );
        assert_eq!(
            relative_source_path(Path::new("/site/docs/b/c.md"), source_dir),
            Some("b/c.md".to_owned())
        );
        assert_eq!(
            relative_source_path(Path::new("/site/docs/image.png"), source_dir),
            None
        );
        assert_eq!(
            relative_source_path(Path::new("/elsewhere/a.md"), source_dir),
            None
        );
    }
}
