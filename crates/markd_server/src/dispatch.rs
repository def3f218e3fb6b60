use crate::state::AppState;
use markd_core::watcher::ChangeKind;
use markd_core::{FileWatcher, Shutdown, WatchSignal};
use std::ops::ControlFlow;
use tokio::task::JoinHandle;

/// Drains watcher signals into the render cache and the broadcaster.
///
/// Every settled burst invalidates the affected cache entries (deleted files
/// are forgotten entirely) and then triggers exactly one reload broadcast.
pub fn spawn_reload_dispatcher(
    mut watcher: FileWatcher,
    state: AppState,
    shutdown: Shutdown,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let signal = tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                signal = watcher.recv() => signal,
            };

            let Some(signal) = signal else {
                break;
            };
            if apply_signal(&state, signal).is_break() {
                break;
            }
        }
        tracing::debug!("Reload dispatcher stopped");
    })
}

fn apply_signal(state: &AppState, signal: WatchSignal) -> ControlFlow<()> {
    match signal {
        WatchSignal::Changed(settled) => {
            for (path, kind) in settled.iter() {
                if kind == ChangeKind::Deleted {
                    state.cache().evict(path);
                } else {
                    state.cache().invalidate(path);
                }
            }
            tracing::info!(paths = settled.len(), "Source changed, reloading clients");
            state.broadcaster().notify(settled.into_paths());
            ControlFlow::Continue(())
        }
        WatchSignal::SourceRemoved(root) => {
            tracing::warn!(
                root = %root.display(),
                "Served source was removed, live reload stopped"
            );
            state.cache().evict(&root);
            state.broadcaster().notify(vec![root]);
            ControlFlow::Break(())
        }
        WatchSignal::Failed(reason) => {
            tracing::warn!(
                %reason,
                "File watching failed, live reload is disabled: refresh the browser manually"
            );
            state.disable_live_reload();
            // Open tabs would otherwise wait for a reload that never comes.
            state.broadcaster().shutdown();
            ControlFlow::Break(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use markd_core::watcher::{Debouncer, WatchEvent};
    use markd_core::RenderOptions;
    use std::time::Duration;

    fn state() -> (tempfile::TempDir, AppState) {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::builder(dir.path()).build().unwrap();
        (dir, state)
    }

    #[tokio::test]
    async fn test_change_invalidates_and_broadcasts() {
        let (_dir, state) = state();
        let path = state.root().join("a.md");
        state
            .cache()
            .get_or_render(&path, "# A", &RenderOptions::gfm())
            .unwrap();
        let mut channel = state.broadcaster().register();

        let mut debouncer = Debouncer::default();
        debouncer.push(WatchEvent::new(path.clone(), ChangeKind::Modified));
        let settled = debouncer.flush().unwrap();
        assert!(apply_signal(&state, WatchSignal::Changed(settled)).is_continue());

        assert!(state.cache().peek(&path).is_none());
        let instruction = tokio::time::timeout(Duration::from_secs(1), channel.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(instruction.paths, vec![path]);
        assert!(state.live_reload());
    }

    #[tokio::test]
    async fn test_watch_failure_disables_live_reload() {
        let (_dir, state) = state();
        let mut channel = state.broadcaster().register();
        assert!(state.live_reload());

        let signal = WatchSignal::Failed("inotify queue overflow".into());
        assert!(apply_signal(&state, signal).is_break());

        assert!(!state.live_reload());
        assert!(state.broadcaster().is_empty());
        assert!(channel.recv().await.is_none());
    }

    #[test]
    fn test_removed_source_stops_dispatch() {
        let (_dir, state) = state();
        let root = state.root().to_path_buf();
        assert!(apply_signal(&state, WatchSignal::SourceRemoved(root)).is_break());
        assert!(state.live_reload());
    }
}
