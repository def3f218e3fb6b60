//! File watching for the live preview.
//!
//! [`FileWatcher`] wraps a `notify` backend (native first, polling as a
//! fallback) and a debounce task. Raw notifications flow from the backend
//! callback into an unbounded queue; the task folds them through a
//! [`Debouncer`] and hands out one [`WatchSignal`] per settled burst.

mod debounce;
mod filter;

pub use self::debounce::{ChangeKind, Debouncer, SettledChange, WatchEvent, DEFAULT_DEBOUNCE};
pub use self::filter::{is_hidden_or_ignored_dir, PathFilter, IGNORED_DIRS};

use crate::shutdown::Shutdown;
use notify::event::{EventKind, ModifyKind, RenameMode};
use notify::{PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

/// Configuration for the file watcher.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Quiet period after the last raw event before a burst settles
    pub debounce: Duration,
    /// Interval of the polling backend, used when native watching fails
    pub poll_interval: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            poll_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("watch root {path} is not accessible: {source}")]
    RootMissing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no file watching backend is available: {0}")]
    Backend(#[from] notify::Error),
}

/// What the watcher hands to its consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchSignal {
    /// One settled burst of edits.
    Changed(SettledChange),
    /// The watched root is gone. No further signals follow.
    SourceRemoved(PathBuf),
    /// The backend reported an error and stopped delivering events. No
    /// further signals follow.
    Failed(String),
}

/// What the backend callback forwards to the debounce task.
#[derive(Debug)]
enum RawMessage {
    Event(WatchEvent),
    /// Something was removed that the filter does not track, possibly the
    /// watched directory itself.
    FilteredRemoval,
    Failed(notify::Error),
}

/// Whether the watcher follows one file or a whole tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchMode {
    SingleFile(PathBuf),
    Directory(PathBuf),
}

impl WatchMode {
    pub fn root(&self) -> &Path {
        match self {
            Self::SingleFile(path) | Self::Directory(path) => path,
        }
    }
}

pub struct FileWatcher {
    mode: WatchMode,
    signals: UnboundedReceiver<WatchSignal>,
    task: JoinHandle<()>,
    // Dropping the backend stops the notifications.
    _backend: Box<dyn Watcher + Send>,
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl FileWatcher {
    /// Starts watching `root`, a Markdown file or a directory.
    ///
    /// Must be called from within a tokio runtime. The watch ends when
    /// `shutdown` triggers, when the root is removed or when the watcher is
    /// dropped.
    pub fn spawn(
        root: &Path,
        config: WatcherConfig,
        shutdown: Shutdown,
    ) -> Result<Self, WatchError> {
        let root = root
            .canonicalize()
            .map_err(|source| WatchError::RootMissing {
                path: root.to_path_buf(),
                source,
            })?;

        let (mode, watch_target, recursive_mode) = if root.is_file() {
            let parent = root
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| root.clone());
            (
                WatchMode::SingleFile(root.clone()),
                parent,
                RecursiveMode::NonRecursive,
            )
        } else {
            (
                WatchMode::Directory(root.clone()),
                root.clone(),
                RecursiveMode::Recursive,
            )
        };

        let filter = Arc::new(PathFilter::new(&mode));
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();

        let backend = start_backend(&watch_target, recursive_mode, &config, filter, raw_tx)?;

        let (signal_tx, signals) = mpsc::unbounded_channel();
        let task = tokio::spawn(debounce_loop(
            mode.clone(),
            Debouncer::new(config.debounce),
            raw_rx,
            signal_tx,
            shutdown,
        ));

        Ok(Self {
            mode,
            signals,
            task,
            _backend: backend,
        })
    }

    pub fn mode(&self) -> &WatchMode {
        &self.mode
    }

    pub fn root(&self) -> &Path {
        self.mode.root()
    }

    /// Next settled signal, `None` once the watch has ended.
    pub async fn recv(&mut self) -> Option<WatchSignal> {
        self.signals.recv().await
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn start_backend(
    target: &Path,
    recursive_mode: RecursiveMode,
    config: &WatcherConfig,
    filter: Arc<PathFilter>,
    raw_tx: UnboundedSender<RawMessage>,
) -> Result<Box<dyn Watcher + Send>, WatchError> {
    let native = RecommendedWatcher::new(
        event_handler(filter.clone(), raw_tx.clone()),
        notify::Config::default(),
    )
    .and_then(|mut watcher| {
        watcher.watch(target, recursive_mode)?;
        Ok(watcher)
    });

    match native {
        Ok(watcher) => {
            tracing::info!(path = ?target, "Started native file watcher");
            Ok(Box::new(watcher))
        }
        Err(err) => {
            tracing::warn!(
                ?err,
                path = ?target,
                "Native file watcher failed, falling back to polling"
            );
            let mut watcher = PollWatcher::new(
                event_handler(filter, raw_tx),
                notify::Config::default().with_poll_interval(config.poll_interval),
            )?;
            watcher.watch(target, recursive_mode)?;
            tracing::info!(
                path = ?target,
                poll_interval = ?config.poll_interval,
                "Started polling file watcher"
            );
            Ok(Box::new(watcher))
        }
    }
}

/// Maps a raw notification onto zero or more [`WatchEvent`]s.
fn classify(event: &notify::Event) -> Vec<(PathBuf, ChangeKind)> {
    let kind = match event.kind {
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Remove(_) => ChangeKind::Deleted,
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => ChangeKind::Deleted,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => ChangeKind::Created,
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut changes = Vec::with_capacity(2);
            if let Some(from) = event.paths.first() {
                changes.push((from.clone(), ChangeKind::Deleted));
            }
            if let Some(to) = event.paths.get(1) {
                changes.push((to.clone(), ChangeKind::Created));
            }
            return changes;
        }
        // Some backends cannot tell which side of a rename they saw.
        EventKind::Modify(ModifyKind::Name(_)) => {
            return event
                .paths
                .iter()
                .map(|path| {
                    let kind = if path.exists() {
                        ChangeKind::Modified
                    } else {
                        ChangeKind::Deleted
                    };
                    (path.clone(), kind)
                })
                .collect();
        }
        EventKind::Modify(_) => ChangeKind::Modified,
        EventKind::Access(_) | EventKind::Any | EventKind::Other => return Vec::new(),
    };

    event.paths.iter().map(|path| (path.clone(), kind)).collect()
}

fn event_handler(
    filter: Arc<PathFilter>,
    raw_tx: UnboundedSender<RawMessage>,
) -> impl FnMut(notify::Result<notify::Event>) + Send + 'static {
    move |res| match res {
        Ok(event) => {
            for (path, kind) in classify(&event) {
                let message = if filter.accepts(&path) {
                    tracing::trace!(path = ?path, ?kind, "Raw file event");
                    RawMessage::Event(WatchEvent::new(path, kind))
                } else if kind == ChangeKind::Deleted {
                    RawMessage::FilteredRemoval
                } else {
                    continue;
                };
                if raw_tx.send(message).is_err() {
                    return;
                }
            }
        }
        Err(err) => {
            tracing::error!(?err, "File watcher error");
            let _ = raw_tx.send(RawMessage::Failed(err));
        }
    }
}

async fn debounce_loop(
    mode: WatchMode,
    mut debouncer: Debouncer,
    mut raw_rx: UnboundedReceiver<RawMessage>,
    signal_tx: UnboundedSender<WatchSignal>,
    shutdown: Shutdown,
) {
    loop {
        let deadline = debouncer.deadline();
        // Parked far away while idle, the branch is disabled anyway.
        let wake_at = deadline
            .map(tokio::time::Instant::from_std)
            .unwrap_or_else(|| tokio::time::Instant::now() + Duration::from_secs(3600));

        tokio::select! {
            biased;

            _ = shutdown.wait() => {
                tracing::debug!(root = ?mode.root(), "Watcher stopped by shutdown");
                break;
            }
            maybe_message = raw_rx.recv() => match maybe_message {
                Some(RawMessage::Event(event)) => debouncer.push(event),
                Some(RawMessage::FilteredRemoval) => {
                    if let WatchMode::Directory(root) = &mode {
                        if !root.exists() {
                            tracing::warn!(root = ?root, "Watched source was removed");
                            let _ = signal_tx.send(WatchSignal::SourceRemoved(root.clone()));
                            break;
                        }
                    }
                }
                Some(RawMessage::Failed(err)) => {
                    tracing::warn!(root = ?mode.root(), ?err, "File watcher failed, watch ended");
                    let _ = signal_tx.send(WatchSignal::Failed(err.to_string()));
                    break;
                }
                None => break,
            },
            _ = tokio::time::sleep_until(wake_at), if deadline.is_some() => {
                let Some(settled) = debouncer.poll(std::time::Instant::now()) else {
                    continue;
                };

                if is_source_removed(&mode, &settled) {
                    tracing::warn!(root = ?mode.root(), "Watched source was removed");
                    let _ = signal_tx.send(WatchSignal::SourceRemoved(mode.root().to_path_buf()));
                    break;
                }

                tracing::debug!(paths = settled.len(), "Settled file change");
                if signal_tx.send(WatchSignal::Changed(settled)).is_err() {
                    break;
                }
            }
        }
    }
}

fn is_source_removed(mode: &WatchMode, settled: &SettledChange) -> bool {
    match mode {
        WatchMode::SingleFile(file) => {
            settled.kind_of(file) == Some(ChangeKind::Deleted) && !file.exists()
        }
        WatchMode::Directory(root) => !root.exists(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind};

    #[test]
    fn test_watcher_config_default() {
        let config = WatcherConfig::default();
        assert_eq!(config.debounce, Duration::from_millis(150));
        assert_eq!(config.poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_classify_rename_both() {
        let event = notify::Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("/d/a.md.tmp"))
            .add_path(PathBuf::from("/d/a.md"));

        assert_eq!(
            classify(&event),
            vec![
                (PathBuf::from("/d/a.md.tmp"), ChangeKind::Deleted),
                (PathBuf::from("/d/a.md"), ChangeKind::Created),
            ]
        );
    }

    #[test]
    fn test_classify_basic_kinds() {
        let path = PathBuf::from("/d/a.md");
        let kinds = [
            (EventKind::Create(CreateKind::File), Some(ChangeKind::Created)),
            (
                EventKind::Modify(ModifyKind::Data(DataChange::Content)),
                Some(ChangeKind::Modified),
            ),
            (EventKind::Remove(RemoveKind::File), Some(ChangeKind::Deleted)),
            (EventKind::Any, None),
        ];

        for (kind, expected) in kinds {
            let event = notify::Event::new(kind).add_path(path.clone());
            let classified = classify(&event);
            assert_eq!(classified.first().map(|(_, kind)| *kind), expected);
        }
    }

    async fn wait_for_signal(watcher: &mut FileWatcher) -> Option<WatchSignal> {
        tokio::time::timeout(Duration::from_secs(5), watcher.recv())
            .await
            .ok()
            .flatten()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_single_file_edit_settles_once() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.md");
        std::fs::write(&file, "# Title").unwrap();

        let shutdown = Shutdown::new();
        let mut watcher = FileWatcher::spawn(&file, WatcherConfig::default(), shutdown.clone())
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        std::fs::write(&file, "# Title2").unwrap();
        std::fs::write(&file, "# Title3").unwrap();

        match wait_for_signal(&mut watcher).await {
            Some(WatchSignal::Changed(settled)) => {
                assert!(settled.contains(&file.canonicalize().unwrap()));
            }
            other => panic!("expected a settled change, got {other:?}"),
        }

        // Both writes landed in the same burst.
        let extra = tokio::time::timeout(Duration::from_millis(500), watcher.recv()).await;
        assert!(extra.is_err(), "unexpected second signal: {extra:?}");

        shutdown.trigger();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_removed_root_file_terminates_watch() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.md");
        std::fs::write(&file, "# Title").unwrap();

        let mut watcher =
            FileWatcher::spawn(&file, WatcherConfig::default(), Shutdown::new()).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        std::fs::remove_file(&file).unwrap();

        let mut removed = false;
        while let Some(signal) = wait_for_signal(&mut watcher).await {
            if let WatchSignal::SourceRemoved(_) = signal {
                removed = true;
                break;
            }
        }
        assert!(removed);
        assert!(watcher.recv().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_directory_mode_ignores_non_markdown() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "# A").unwrap();

        let mut watcher =
            FileWatcher::spawn(dir.path(), WatcherConfig::default(), Shutdown::new()).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        std::fs::write(dir.path().join("a.md"), "# A2").unwrap();

        match wait_for_signal(&mut watcher).await {
            Some(WatchSignal::Changed(settled)) => {
                let names: Vec<_> = settled
                    .paths()
                    .filter_map(|p| p.file_name())
                    .map(|name| name.to_string_lossy().into_owned())
                    .collect();
                assert_eq!(names, ["a.md"]);
            }
            other => panic!("expected a settled change, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileWatcher::spawn(
            &dir.path().join("nope.md"),
            WatcherConfig::default(),
            Shutdown::new(),
        )
        .unwrap_err();
        assert!(matches!(err, WatchError::RootMissing { .. }));
    }

    /// Feeds raw notifications through the handler into a running debounce task.
    fn directory_pipeline(
        root: &Path,
    ) -> (
        impl FnMut(notify::Result<notify::Event>),
        UnboundedReceiver<WatchSignal>,
        JoinHandle<()>,
    ) {
        let mode = WatchMode::Directory(root.to_path_buf());
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let (signal_tx, signals) = mpsc::unbounded_channel();
        let handler = event_handler(Arc::new(PathFilter::new(&mode)), raw_tx);
        let task = tokio::spawn(debounce_loop(
            mode,
            Debouncer::new(DEFAULT_DEBOUNCE),
            raw_rx,
            signal_tx,
            Shutdown::new(),
        ));
        (handler, signals, task)
    }

    #[tokio::test]
    async fn test_backend_error_ends_watch() {
        let dir = tempfile::tempdir().unwrap();
        let (mut handler, mut signals, task) = directory_pipeline(dir.path());

        handler(Err(notify::Error::generic("inotify queue overflow")));

        match signals.recv().await {
            Some(WatchSignal::Failed(reason)) => assert!(reason.contains("inotify queue overflow")),
            other => panic!("expected a failure, got {other:?}"),
        }
        assert!(signals.recv().await.is_none());
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_filtered_removal_of_root_ends_watch() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("docs");
        std::fs::create_dir(&root).unwrap();
        let (mut handler, mut signals, task) = directory_pipeline(&root);

        // A non-Markdown file goes away while the root still exists.
        handler(Ok(notify::Event::new(EventKind::Remove(RemoveKind::File))
            .add_path(root.join("notes.txt"))));
        let early = tokio::time::timeout(Duration::from_millis(300), signals.recv()).await;
        assert!(early.is_err(), "unexpected signal: {early:?}");

        std::fs::remove_dir(&root).unwrap();
        handler(Ok(
            notify::Event::new(EventKind::Remove(RemoveKind::Folder)).add_path(root.clone()),
        ));

        assert_eq!(signals.recv().await, Some(WatchSignal::SourceRemoved(root)));
        assert!(signals.recv().await.is_none());
        task.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_removed_directory_without_markdown_terminates_watch() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("docs");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(root.join("notes.txt"), "plain").unwrap();

        let mut watcher =
            FileWatcher::spawn(&root, WatcherConfig::default(), Shutdown::new()).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        std::fs::remove_dir_all(&root).unwrap();

        let mut removed = false;
        while let Some(signal) = wait_for_signal(&mut watcher).await {
            if let WatchSignal::SourceRemoved(_) = signal {
                removed = true;
                break;
            }
        }
        assert!(removed);
    }
}
