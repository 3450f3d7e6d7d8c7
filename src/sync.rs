//! Directory synchronizer
//!
//! Translates filesystem observations (the startup scan and debounced
//! watcher events) into cache mutations on the [`ScreenshotLibrary`]. This
//! is the only place that stats and classifies files; a failure on one
//! file is logged and skipped so a single unreadable capture never blocks
//! the rest of the directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::{LibraryError, LibraryResult};
use crate::media;
use crate::model::{FileRecord, MediaKind};
use crate::service::ScreenshotLibrary;
use crate::watch::{FileEvent, FileEventKind};

/// Outcome of the startup scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub images: usize,
    pub gifs: usize,
    pub skipped: usize,
}

pub struct DirectorySynchronizer {
    library: Arc<ScreenshotLibrary>,
    dir: PathBuf,
}

impl DirectorySynchronizer {
    pub fn new(library: Arc<ScreenshotLibrary>, dir: PathBuf) -> Self {
        Self { library, dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Scans the directory once and seeds both category caches
    ///
    /// Candidates are sorted newest-first and cut to cache capacity per
    /// category before any upsert, so seeding a directory with years of
    /// captures does not churn through eviction. Re-running the scan over
    /// an unchanged directory is a no-op.
    pub async fn initial_scan(&self) -> LibraryResult<ScanSummary> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| LibraryError::io(&self.dir, e))?;

        let mut images = Vec::new();
        let mut gifs = Vec::new();
        let mut summary = ScanSummary::default();

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| LibraryError::io(&self.dir, e))?
        {
            let path = entry.path();
            if Self::is_ignored(&path) {
                continue;
            }
            match self.build_record(&path).await {
                Ok(Some(record)) => match record.kind {
                    MediaKind::Image => images.push(record),
                    MediaKind::Gif => gifs.push(record),
                    MediaKind::Other => {}
                },
                Ok(None) => {}
                Err(e) => {
                    summary.skipped += 1;
                    warn!(path = %path.display(), "skipping unreadable entry: {e}");
                }
            }
        }

        let config = self.library.config();
        summary.images = Self::seed(&self.library, images, config.max_images);
        summary.gifs = Self::seed(&self.library, gifs, config.max_gifs);

        info!(
            dir = %self.dir.display(),
            images = summary.images,
            gifs = summary.gifs,
            skipped = summary.skipped,
            "initial scan complete"
        );
        Ok(summary)
    }

    /// Keeps the newest `capacity` candidates and upserts them oldest
    /// first, so later insertion order matches recency
    fn seed(library: &ScreenshotLibrary, mut records: Vec<FileRecord>, capacity: usize) -> usize {
        records.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));
        records.truncate(capacity);
        let seeded = records.len();
        for record in records.into_iter().rev() {
            library.upsert_record(record);
        }
        seeded
    }

    /// Applies one debounced watcher event
    pub async fn apply_event(&self, event: FileEvent) {
        if Self::is_ignored(&event.path) {
            return;
        }
        let Some(name) = basename(&event.path) else {
            return;
        };

        match event.kind {
            FileEventKind::Removed => {
                debug!(name = %name, "file removed");
                self.library.remove_name(&name);
            }
            // Created, Modified and Renamed all resolve the same way: the
            // current state on disk decides. A rename target shows up as
            // its own Created event; the vanished source drops out here.
            FileEventKind::Created | FileEventKind::Modified | FileEventKind::Renamed => {
                match self.build_record(&event.path).await {
                    Ok(Some(record)) => {
                        if record.kind == MediaKind::Other {
                            self.library.remove_name(&name);
                        } else {
                            debug!(name = %name, kind = %record.kind, "file observed");
                            self.library.upsert_record(record);
                        }
                    }
                    Ok(None) | Err(_) => {
                        // Gone again, or unreadable: treat as removed
                        self.library.remove_name(&name);
                    }
                }
            }
        }
    }

    /// Stats and classifies one path; `Ok(None)` means it no longer exists
    /// or is not a regular file
    async fn build_record(&self, path: &Path) -> LibraryResult<Option<FileRecord>> {
        let meta = match tokio::fs::metadata(path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LibraryError::io(path, e)),
        };
        if !meta.is_file() {
            return Ok(None);
        }

        let Some(name) = basename(path) else {
            return Ok(None);
        };
        let modified = meta.modified().map_err(|e| LibraryError::io(path, e))?;

        Ok(Some(FileRecord {
            name,
            path: path.to_path_buf(),
            size: meta.len(),
            modified_at: DateTime::<Utc>::from(modified),
            kind: media::classify(path).await,
        }))
    }

    /// Dotfiles and editor droppings never enter the caches
    fn is_ignored(path: &Path) -> bool {
        basename(path).is_none_or(|name| name.starts_with('.'))
    }
}

fn basename(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::time::{Duration, SystemTime};

    use crate::config::ServerConfig;

    use super::*;

    fn library_for(dir: &Path) -> Arc<ScreenshotLibrary> {
        Arc::new(ScreenshotLibrary::new(
            ServerConfig::default(),
            Some(dir.to_path_buf()),
        ))
    }

    fn write_png(dir: &Path, name: &str, age_secs: u64) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"\x89PNG\r\n\x1a\nfake").unwrap();
        let mtime = SystemTime::now() - Duration::from_secs(age_secs);
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
        path
    }

    #[tokio::test]
    async fn test_initial_scan_seeds_both_categories() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.png", 30);
        write_png(dir.path(), "b.png", 20);
        std::fs::write(dir.path().join("c.gif"), b"GIF89a....").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"not media").unwrap();

        let library = library_for(dir.path());
        let sync = DirectorySynchronizer::new(Arc::clone(&library), dir.path().to_path_buf());
        let summary = sync.initial_scan().await.unwrap();

        assert_eq!(summary.images, 2);
        assert_eq!(summary.gifs, 1);
        assert_eq!(library.stats().images, 2);
        assert_eq!(library.stats().gifs, 1);
    }

    #[tokio::test]
    async fn test_initial_scan_prefilters_to_capacity() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..20 {
            // Lower i is newer
            write_png(dir.path(), &format!("shot{i:02}.png"), i * 60);
        }

        let mut config = ServerConfig::default();
        config.max_images = 4;
        let library = Arc::new(ScreenshotLibrary::new(
            config,
            Some(dir.path().to_path_buf()),
        ));
        let sync = DirectorySynchronizer::new(Arc::clone(&library), dir.path().to_path_buf());
        let summary = sync.initial_scan().await.unwrap();

        assert_eq!(summary.images, 4);
        assert_eq!(library.stats().images, 4);

        let reply = library.list_screenshots(10);
        let text = reply.text_joined();
        assert!(text.contains("shot00.png"));
        assert!(text.contains("shot03.png"));
        assert!(!text.contains("shot04.png"));
    }

    #[tokio::test]
    async fn test_initial_scan_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.png", 10);

        let library = library_for(dir.path());
        let sync = DirectorySynchronizer::new(Arc::clone(&library), dir.path().to_path_buf());
        sync.initial_scan().await.unwrap();
        sync.initial_scan().await.unwrap();

        assert_eq!(library.stats().images, 1);
    }

    #[tokio::test]
    async fn test_scan_ignores_dotfiles_and_subdirs() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), ".hidden.png", 0);
        std::fs::create_dir(dir.path().join("History")).unwrap();
        write_png(dir.path(), "real.png", 0);

        let library = library_for(dir.path());
        let sync = DirectorySynchronizer::new(Arc::clone(&library), dir.path().to_path_buf());
        let summary = sync.initial_scan().await.unwrap();

        assert_eq!(summary.images, 1);
        assert_eq!(summary.skipped, 0);
    }

    #[tokio::test]
    async fn test_scan_missing_directory_errors() {
        let library = library_for(Path::new("/nonexistent"));
        let sync =
            DirectorySynchronizer::new(library, PathBuf::from("/nonexistent/screenshots"));
        assert!(sync.initial_scan().await.is_err());
    }

    #[tokio::test]
    async fn test_create_event_upserts() {
        let dir = tempfile::tempdir().unwrap();
        let library = library_for(dir.path());
        let sync = DirectorySynchronizer::new(Arc::clone(&library), dir.path().to_path_buf());

        let path = write_png(dir.path(), "new.png", 0);
        sync.apply_event(FileEvent {
            path,
            kind: FileEventKind::Created,
        })
        .await;

        assert_eq!(library.stats().images, 1);
    }

    #[tokio::test]
    async fn test_remove_event_drops_record() {
        let dir = tempfile::tempdir().unwrap();
        let library = library_for(dir.path());
        let sync = DirectorySynchronizer::new(Arc::clone(&library), dir.path().to_path_buf());

        let path = write_png(dir.path(), "gone.png", 0);
        sync.apply_event(FileEvent {
            path: path.clone(),
            kind: FileEventKind::Created,
        })
        .await;
        assert_eq!(library.stats().images, 1);

        std::fs::remove_file(&path).unwrap();
        sync.apply_event(FileEvent {
            path,
            kind: FileEventKind::Removed,
        })
        .await;
        assert_eq!(library.stats().images, 0);
    }

    #[tokio::test]
    async fn test_rename_of_vanished_file_removes() {
        let dir = tempfile::tempdir().unwrap();
        let library = library_for(dir.path());
        let sync = DirectorySynchronizer::new(Arc::clone(&library), dir.path().to_path_buf());

        let path = write_png(dir.path(), "moved.png", 0);
        sync.apply_event(FileEvent {
            path: path.clone(),
            kind: FileEventKind::Created,
        })
        .await;

        std::fs::rename(&path, dir.path().join("renamed.png")).unwrap();
        sync.apply_event(FileEvent {
            path,
            kind: FileEventKind::Renamed,
        })
        .await;

        assert_eq!(library.stats().images, 0, "old name must drop out");
    }

    #[tokio::test]
    async fn test_dotfile_events_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let library = library_for(dir.path());
        let sync = DirectorySynchronizer::new(Arc::clone(&library), dir.path().to_path_buf());

        let path = write_png(dir.path(), ".tmp.png", 0);
        sync.apply_event(FileEvent {
            path,
            kind: FileEventKind::Created,
        })
        .await;

        assert_eq!(library.stats().images, 0);
    }
}
