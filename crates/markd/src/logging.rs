use anyhow::{anyhow, Result};
use markd_config::LogConfig;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Log files above this size are started afresh.
const MAX_LOG_FILE_SIZE: u64 = 8 * 1024 * 1024;

/// `max_level` as the default directive, `log_target` adding per-target ones.
fn env_filter(max_level: &str, log_target: &str) -> Result<EnvFilter> {
    let mut filter = EnvFilter::try_new(max_level)?;
    for directive in log_target
        .split(',')
        .map(str::trim)
        .filter(|directive| !directive.is_empty())
    {
        filter = filter.add_directive(directive.parse()?);
    }
    Ok(filter)
}

/// Removes the log file at `log_path` if it grew too large.
fn truncate_oversized(log_path: &Path) -> Result<()> {
    if let Ok(metadata) = std::fs::metadata(log_path) {
        if log_path.is_file() && metadata.len() > MAX_LOG_FILE_SIZE {
            std::fs::remove_file(log_path)?;
        }
    }
    Ok(())
}

/// Installs the global subscriber.
///
/// `log_file` from the command line wins over the one in the config. The
/// returned guard flushes the file writer and must be held until exit.
pub fn init(config: &LogConfig, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = env_filter(&config.max_level, &config.log_target)?;

    let maybe_log = log_file
        .map(Path::to_path_buf)
        .or_else(|| config.log_file.as_ref().map(PathBuf::from));

    if let Some(log_path) = maybe_log {
        truncate_oversized(&log_path)?;

        let file_name = log_path
            .file_name()
            .ok_or_else(|| anyhow!("no file name in {log_path:?}"))?;

        let directory = log_path
            .parent()
            .ok_or_else(|| anyhow!("{log_path:?} has no parent"))?;

        let file_appender = tracing_appender::rolling::never(directory, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let subscriber = tracing_subscriber::FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_line_number(true)
            .with_writer(non_blocking)
            .with_ansi(false)
            .finish();

        tracing::subscriber::set_global_default(subscriber)?;

        Ok(Some(guard))
    } else {
        let subscriber = tracing_subscriber::FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(std::io::stderr().is_terminal())
            .finish();

        tracing::subscriber::set_global_default(subscriber)?;

        Ok(None)
    }
}
