use crate::command;
use anyhow::Result;
use clap::Parser;
use markd_config::{load_config, Config};
use std::path::PathBuf;

#[derive(Parser, Debug)]
pub enum RunCmd {
    /// Preview a Markdown file or directory in the browser, reloading on save.
    #[clap(name = "serve")]
    Serve(command::serve::Serve),
    /// Export Markdown to self-contained HTML files.
    #[clap(name = "export")]
    Export(command::export::Export),
}

/// Arguments shared by every subcommand.
#[derive(Parser, Debug)]
pub struct Args {
    /// Write the log to this file instead of stderr.
    #[clap(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Specify the path of the config file.
    #[clap(long, global = true)]
    pub config_file: Option<PathBuf>,
}

impl Args {
    /// Defaults, then the config file, then the `MARKD_*` environment.
    ///
    /// A malformed config file is not fatal, the parse error is handed back
    /// so that it can be logged once logging is up.
    pub fn load_config(&self) -> Result<(Config, Option<String>)> {
        let loaded = load_config(self.config_file.clone());

        let config_err = loaded
            .maybe_error
            .map(|err| format!("{}: {err}", loaded.file_path.display()));

        let mut config = loaded.config;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;

        Ok((config, config_err))
    }
}

impl RunCmd {
    pub async fn run(self, args: Args) -> Result<()> {
        match self {
            Self::Serve(serve) => serve.run(args).await,
            Self::Export(export) => export.run(args).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Markd;
    use markd_core::Theme;

    #[test]
    fn test_parse_serve() {
        let markd = Markd::try_parse_from([
            "markd",
            "serve",
            "docs",
            "--port",
            "9000",
            "--theme",
            "catppuccin-mocha",
            "--no-open",
            "--log-file",
            "/tmp/markd.log",
        ])
        .unwrap();

        assert_eq!(markd.args.log_file, Some(PathBuf::from("/tmp/markd.log")));
        let RunCmd::Serve(serve) = markd.cmd else {
            panic!("expected the serve command");
        };

        let mut config = Config::default();
        serve.apply_flags(&mut config);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.render.theme, Theme::CatppuccinMocha);
        assert!(!config.server.open_browser);
        assert!(config.server.live_reload);
    }

    #[test]
    fn test_parse_export() {
        let markd =
            Markd::try_parse_from(["markd", "--config-file", "markd.toml", "export", "docs", "site", "--minify"])
                .unwrap();

        assert_eq!(markd.args.config_file, Some(PathBuf::from("markd.toml")));
        assert!(matches!(markd.cmd, RunCmd::Export(_)));
    }

    #[test]
    fn test_invalid_flags_are_rejected() {
        assert!(Markd::try_parse_from(["markd", "serve", "--theme", "solarized"]).is_err());
        assert!(Markd::try_parse_from(["markd", "serve", "--port", "70000"]).is_err());
        assert!(Markd::try_parse_from(["markd", "export"]).is_err());
    }
}
