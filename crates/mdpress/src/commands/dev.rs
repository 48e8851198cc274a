//! `mdpress dev` command implementation.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use mdpress_config::{CliSettings, Config};
use mdpress_engine::{Pipeline, PipelineConfig, WatchOptions, WatchSession};
use mdpress_render::MarkdownRenderer;

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the dev command.
#[derive(Args)]
pub(crate) struct DevArgs {
    /// Path to configuration file (default: auto-discover mdpress.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Documentation source directory (overrides config).
    #[arg(short, long)]
    source_dir: Option<PathBuf>,

    /// Rendered output directory (overrides config).
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Host to bind the preview server to (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind the preview server to (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Milliseconds to wait before reading a changed file (overrides config).
    #[arg(long)]
    settle_delay_ms: Option<u64>,

    /// Enable verbose output (show per-page rebuild logs).
    #[arg(short, long)]
    pub verbose: bool,
}

impl DevArgs {
    /// Execute the dev command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails, the preview server cannot
    /// bind, or the filesystem watcher fails.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            host: self.host,
            port: self.port,
            source_dir: self.source_dir,
            output_dir: self.output_dir,
            watch_enabled: None,
            settle_delay_ms: self.settle_delay_ms,
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        let docs = &config.docs_resolved;

        output.info(&format!("Source directory: {}", docs.source_dir.display()));
        output.info(&format!("Output directory: {}", docs.output_dir.display()));

        let renderer = Arc::new(MarkdownRenderer::new(
            docs.source_dir.clone(),
            docs.output_dir.clone(),
        ));
        let pipeline = Arc::new(Pipeline::new(
            PipelineConfig {
                source_dir: docs.source_dir.clone(),
                output_dir: docs.output_dir.clone(),
                settle_delay: config.watch.settle_delay(),
            },
            renderer,
        ));

        if !config.watch.enabled {
            // Watch disabled: behave like a one-shot build.
            pipeline.schedule_full_build();
            pipeline.drain().await;
            return Ok(());
        }

        let session = WatchSession::new(Arc::clone(&pipeline));
        session
            .start(WatchOptions {
                host: config.server.host.clone(),
                port: config.server.port,
                on_startup: Some(Box::new(|server| {
                    Output::new().success(&format!(
                        "Preview server running at http://{}",
                        server.local_addr()
                    ));
                })),
            })
            .await?;
        output.info("Press Ctrl-C to stop");

        pipeline.schedule_full_build();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            result = session.wait() => result?,
        }

        session.stop().await;
        pipeline.drain().await;

        Ok(())
    }
}
