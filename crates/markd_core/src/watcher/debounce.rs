//! Debounce state machine turning raw filesystem events into settled changes.
//!
//! The machine has two states. It is `Idle` until an event arrives, then
//! `Accumulating` with a deadline one window past the latest event. Every new
//! event pushes the deadline out again. Once [`Debouncer::poll`] is called at
//! or after the deadline, the accumulated paths are handed out as a single
//! [`SettledChange`] and the machine returns to `Idle`.
//!
//! Time is passed in by the caller as a monotonic [`Instant`], which keeps the
//! machine free of timers and trivially testable.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Default quiet period before a burst is considered settled.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(150);

/// What happened to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

impl ChangeKind {
    /// Folds a later observation of the same path into this one.
    ///
    /// A path deleted and then recreated within one window was replaced in
    /// place, so it surfaces as `Modified` rather than as a removal.
    pub fn merge(self, later: ChangeKind) -> ChangeKind {
        use ChangeKind::*;

        match (self, later) {
            (_, Deleted) => Deleted,
            (Deleted, Created | Modified) => Modified,
            (Created, Created | Modified) => Created,
            (Modified, Created | Modified) => Modified,
        }
    }
}

/// A single raw notification, consumed immediately by the [`Debouncer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub observed_at: Instant,
}

impl WatchEvent {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
            observed_at: Instant::now(),
        }
    }
}

/// Every path touched by one burst of edits, with its merged change kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettledChange {
    paths: BTreeMap<PathBuf, ChangeKind>,
}

impl SettledChange {
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.paths.keys().map(PathBuf::as_path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, ChangeKind)> {
        self.paths.iter().map(|(path, kind)| (path.as_path(), *kind))
    }

    pub fn kind_of(&self, path: &Path) -> Option<ChangeKind> {
        self.paths.get(path).copied()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn into_paths(self) -> Vec<PathBuf> {
        self.paths.into_keys().collect()
    }
}

#[derive(Debug)]
enum State {
    Idle,
    Accumulating {
        deadline: Instant,
        pending: BTreeMap<PathBuf, ChangeKind>,
    },
}

#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    state: State,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: State::Idle,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, State::Idle)
    }

    /// When the current burst settles, `None` while idle.
    pub fn deadline(&self) -> Option<Instant> {
        match &self.state {
            State::Idle => None,
            State::Accumulating { deadline, .. } => Some(*deadline),
        }
    }

    /// Records `event`, moving the deadline to one window past it.
    pub fn push(&mut self, event: WatchEvent) {
        let event_deadline = event.observed_at + self.window;

        match &mut self.state {
            State::Idle => {
                let mut pending = BTreeMap::new();
                pending.insert(event.path, event.kind);
                self.state = State::Accumulating {
                    deadline: event_deadline,
                    pending,
                };
            }
            State::Accumulating { deadline, pending } => {
                // Events may be observed slightly out of order across threads,
                // the deadline never moves backwards.
                *deadline = (*deadline).max(event_deadline);
                pending
                    .entry(event.path)
                    .and_modify(|kind| *kind = kind.merge(event.kind))
                    .or_insert(event.kind);
            }
        }
    }

    /// Settles the current burst if `now` has reached its deadline.
    pub fn poll(&mut self, now: Instant) -> Option<SettledChange> {
        match &self.state {
            State::Accumulating { deadline, .. } if now >= *deadline => {
                match std::mem::replace(&mut self.state, State::Idle) {
                    State::Accumulating { pending, .. } => Some(SettledChange { paths: pending }),
                    State::Idle => None,
                }
            }
            _ => None,
        }
    }

    /// Settles whatever is pending regardless of the deadline.
    pub fn flush(&mut self) -> Option<SettledChange> {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::Accumulating { pending, .. } => Some(SettledChange { paths: pending }),
            State::Idle => None,
        }
    }
}
