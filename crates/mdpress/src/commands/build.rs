//! `mdpress build` command implementation.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use mdpress_config::{CliSettings, Config};
use mdpress_engine::{Pipeline, PipelineConfig};
use mdpress_render::{ENTRY_PAGE, MarkdownRenderer};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the build command.
#[derive(Args)]
pub(crate) struct BuildArgs {
    /// Path to configuration file (default: auto-discover mdpress.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Documentation source directory (overrides config).
    #[arg(short, long)]
    source_dir: Option<PathBuf>,

    /// Rendered output directory (overrides config).
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Enable verbose output (show per-page rebuild logs).
    #[arg(short, long)]
    pub verbose: bool,
}

impl BuildArgs {
    /// Execute the build command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the output directory
    /// cannot be created.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            source_dir: self.source_dir,
            output_dir: self.output_dir,
            ..CliSettings::default()
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        let docs = &config.docs_resolved;

        std::fs::create_dir_all(&docs.output_dir)?;

        // The page template comes from the built entry page; without it a
        // build is a silent no-op, so give the operator a hint up front.
        if !docs.output_dir.join(ENTRY_PAGE).is_file() {
            output.warning(&format!(
                "No {} in {} - produce the entry page before building",
                ENTRY_PAGE,
                docs.output_dir.display()
            ));
        }

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

        pipeline.schedule_full_build();
        pipeline.drain().await;

        if pipeline.is_ready() {
            output.success(&format!(
                "Rendered {} pages to {}",
                pipeline.source_count(),
                docs.output_dir.display()
            ));
        }

        Ok(())
    }
}
