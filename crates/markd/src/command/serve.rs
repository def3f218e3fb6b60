use crate::app::Args;
use crate::logging;
use anyhow::{Context, Result};
use clap::Parser;
use markd_config::Config;
use markd_core::{Shutdown, Theme};
use markd_server::{AppState, ServeOptions};
use std::path::PathBuf;
use tokio::net::TcpListener;

/// Preview a Markdown file or directory.
#[derive(Parser, Debug, Clone)]
pub struct Serve {
    /// Markdown file or directory to serve.
    #[clap(default_value = ".")]
    path: PathBuf,

    /// Port to listen on.
    #[clap(long)]
    port: Option<u16>,

    /// Address to bind.
    #[clap(long)]
    host: Option<String>,

    /// Theme of the preview: light, dark, catppuccin-mocha or catppuccin-latte.
    #[clap(long)]
    theme: Option<Theme>,

    /// Do not open the browser.
    #[clap(long)]
    no_open: bool,

    /// Disable live reload.
    #[clap(long)]
    no_reload: bool,

    /// Max log level: trace, debug, info, warn or error.
    #[clap(long)]
    log_level: Option<String>,
}

impl Serve {
    /// Explicit flags win over the config file and the environment.
    pub fn apply_flags(&self, config: &mut Config) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(theme) = self.theme {
            config.render.theme = theme;
        }
        if self.no_open {
            config.server.open_browser = false;
        }
        if self.no_reload {
            config.server.live_reload = false;
        }
        if let Some(level) = &self.log_level {
            config.log.max_level = level.trim().to_ascii_lowercase();
        }
    }

    pub async fn run(self, args: Args) -> Result<()> {
        let (mut config, config_err) = args.load_config()?;
        self.apply_flags(&mut config);
        config.validate()?;

        let _guard = logging::init(&config.log, args.log_file.as_deref())?;

        if let Some(err) = config_err {
            tracing::warn!(%err, "Ignoring the malformed config file, using the defaults");
        }

        let state = AppState::builder(&self.path)
            .render_options(config.render.render_options())
            .live_reload(config.server.live_reload)
            .build()
            .with_context(|| format!("cannot serve {}", self.path.display()))?;

        let host = config.server.host.as_str();
        let port = config.server.port;
        let listener = TcpListener::bind((host, port))
            .await
            .with_context(|| format!("failed to listen on {host}:{port}"))?;

        let shutdown = Shutdown::new();
        tokio::spawn({
            let shutdown = shutdown.clone();
            async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        tracing::info!("Received Ctrl-C");
                        shutdown.trigger();
                    }
                    Err(err) => tracing::warn!(?err, "Failed to listen for Ctrl-C"),
                }
            }
        });

        let options = ServeOptions {
            watcher: config.watcher.to_watcher_config(),
            open_browser: config.server.open_browser,
        };

        markd_server::serve(listener, state, options, shutdown).await?;

        Ok(())
    }
}
