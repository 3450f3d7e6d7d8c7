//! Debounced filesystem watcher for the screenshots directory
//!
//! ShareX writes a capture in several bursts (create, a few appends, a
//! final rename on some configurations), so raw notify events are
//! coalesced per path and only released after the path has been quiet for
//! a debounce window. The watch is shallow: the screenshots folder has no
//! subdirectories worth tracking, and recursive watches on it would pull
//! in ShareX's own temp subfolders.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, channel};
use std::time::{Duration, Instant};

use notify::{
    Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher, event::ModifyKind,
};
use thiserror::Error;
use tracing::{debug, trace};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("failed to create filesystem watcher: {0}")]
    Create(#[from] notify::Error),

    #[error("failed to watch {path}: {source}")]
    WatchPath {
        path: PathBuf,
        source: notify::Error,
    },
}

/// A coalesced per-path change, released once the path goes quiet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub path: PathBuf,
    pub kind: FileEventKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEventKind {
    Created,
    Modified,
    Removed,
    Renamed,
}

impl From<EventKind> for FileEventKind {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Create(_) => FileEventKind::Created,
            EventKind::Modify(ModifyKind::Name(_)) => FileEventKind::Renamed,
            EventKind::Modify(_) => FileEventKind::Modified,
            EventKind::Remove(_) => FileEventKind::Removed,
            // Access / other events carry no content change we care about,
            // but a re-stat is harmless
            _ => FileEventKind::Modified,
        }
    }
}

struct Pending {
    kind: FileEventKind,
    last_seen: Instant,
}

/// Watches one directory and yields debounced, coalesced change batches
pub struct DirectoryWatcher {
    // Held for its Drop; dropping it stops the native watch
    _watcher: RecommendedWatcher,
    raw_rx: Receiver<Result<Event, notify::Error>>,
    pending: HashMap<PathBuf, Pending>,
    debounce: Duration,
}

impl DirectoryWatcher {
    /// Starts a shallow native watch on `dir`
    pub fn new(dir: &Path, debounce: Duration) -> Result<Self, WatchError> {
        let (tx, raw_rx) = channel();
        let config = Config::default().with_compare_contents(false);
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                let _ = tx.send(res);
            },
            config,
        )?;
        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::WatchPath {
                path: dir.to_path_buf(),
                source,
            })?;
        debug!(dir = %dir.display(), "watching screenshots directory");

        Ok(Self {
            _watcher: watcher,
            raw_rx,
            pending: HashMap::new(),
            debounce,
        })
    }

    /// Waits until at least one path has been quiet for the debounce
    /// window, then returns all such paths as one batch
    pub async fn next_batch(&mut self) -> Vec<FileEvent> {
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        loop {
            ticker.tick().await;
            self.drain_raw();
            let batch = self.flush_quiet(Instant::now());
            if !batch.is_empty() {
                return batch;
            }
        }
    }

    /// Pulls every raw notify event off the channel and folds it into the
    /// pending map
    fn drain_raw(&mut self) {
        while let Ok(result) = self.raw_rx.try_recv() {
            let event = match result {
                Ok(event) => event,
                Err(e) => {
                    trace!("watcher error event: {e}");
                    continue;
                }
            };
            let kind = FileEventKind::from(event.kind);
            let now = Instant::now();
            for path in event.paths {
                self.note(path, kind, now);
            }
        }
    }

    fn note(&mut self, path: PathBuf, kind: FileEventKind, now: Instant) {
        self.pending
            .entry(path)
            .and_modify(|pending| {
                pending.kind = Self::coalesce(pending.kind, kind);
                pending.last_seen = now;
            })
            .or_insert(Pending {
                kind,
                last_seen: now,
            });
    }

    /// Coalescing rules for successive events on the same path
    ///
    /// Remove then Create is a replacement, so a Modify. Anything after a
    /// Remove other than Create stays a Remove. Otherwise the later kind
    /// wins, except that a Create stays a Create through subsequent
    /// modifies (the consumer re-stats either way).
    fn coalesce(earlier: FileEventKind, later: FileEventKind) -> FileEventKind {
        use FileEventKind::*;
        match (earlier, later) {
            (Removed, Created) => Modified,
            (Removed, _) => Removed,
            (Created, Modified) => Created,
            (_, later) => later,
        }
    }

    /// Releases pending entries whose last event is older than the
    /// debounce window
    fn flush_quiet(&mut self, now: Instant) -> Vec<FileEvent> {
        let debounce = self.debounce;
        let ready: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, pending)| now.duration_since(pending.last_seen) >= debounce)
            .map(|(path, _)| path.clone())
            .collect();

        let mut batch = Vec::with_capacity(ready.len());
        for path in ready {
            if let Some(pending) = self.pending.remove(&path) {
                batch.push(FileEvent {
                    path,
                    kind: pending.kind,
                });
            }
        }
        batch
    }
}
