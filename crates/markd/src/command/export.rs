use crate::app::Args;
use crate::logging;
use anyhow::{anyhow, Result};
use clap::Parser;
use markd_core::Theme;
use markd_export::Exporter;
use std::path::PathBuf;

/// Output directory used when neither the command line nor the config names one.
const DEFAULT_OUTPUT: &str = "output";

/// Export Markdown to static HTML.
#[derive(Parser, Debug, Clone)]
pub struct Export {
    /// Markdown file or directory to export.
    source: PathBuf,

    /// Output directory, or the `.html` file to write when exporting a single file.
    output: Option<PathBuf>,

    /// Theme of the exported pages.
    #[clap(long)]
    theme: Option<Theme>,

    /// Minify the exported HTML.
    #[clap(long)]
    minify: bool,
}

impl Export {
    pub async fn run(self, args: Args) -> Result<()> {
        let (mut config, config_err) = args.load_config()?;
        if let Some(theme) = self.theme {
            config.render.theme = theme;
        }
        config.validate()?;

        let _guard = logging::init(&config.log, args.log_file.as_deref())?;

        if let Some(err) = config_err {
            tracing::warn!(%err, "Ignoring the malformed config file, using the defaults");
        }

        let output = self
            .output
            .or_else(|| config.export.output_dir.as_ref().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));
        let minify = self.minify || config.export.minify;
        let source = self.source;

        let exporter = Exporter::new(config.render.render_options());
        let summary = tokio::task::spawn_blocking({
            let output = output.clone();
            move || exporter.export(&source, &output, minify)
        })
        .await??;

        for failure in &summary.failures {
            eprintln!("failed: {}: {}", failure.source.display(), failure.reason);
        }

        println!(
            "Exported {} file(s) to {}",
            summary.succeeded(),
            output.display()
        );

        if summary.is_success() {
            Ok(())
        } else {
            Err(anyhow!("{} file(s) failed to export", summary.failed()))
        }
    }
}
