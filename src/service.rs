//! Screenshot library service: cache ownership and the query facade
//!
//! One [`ScreenshotLibrary`] instance owns both category caches and the
//! derived frame cache behind a single mutex. All mutation flows through
//! the synchronizer-facing methods here; query operations are read-only
//! apart from the frame cache write-through.
//!
//! Locking discipline: the mutex is only held for map mutation and
//! snapshotting. File reads and frame decodes run without the lock, and a
//! finished extraction is re-validated against the current source record
//! before it is cached, so a result computed against a file that changed
//! mid-decode is dropped instead of served stale.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::cache::{BoundedCache, FrameCache};
use crate::config::ServerConfig;
use crate::error::LibraryError;
use crate::extract;
use crate::media;
use crate::model::{ExtractedFrameSet, Extraction, FileRecord, MediaKind, Reply};

/// Occupancy snapshot of all three caches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub images: usize,
    pub images_capacity: usize,
    pub gifs: usize,
    pub gifs_capacity: usize,
    pub frame_sets: usize,
}

struct LibraryState {
    images: BoundedCache,
    gifs: BoundedCache,
    frames: FrameCache,
}

/// Parameters for one trip through the extraction engine
#[derive(Debug, Clone, Copy)]
struct ExtractParams {
    max_frames: usize,
    stride: Option<usize>,
    size_limit: u64,
    explicit: bool,
}

/// Target of the shared GIF resolution path
enum GifTarget {
    /// 1-based position in the newest-first ordering
    Index(usize),
    /// Exact basename, position-independent
    Name(String),
}

/// The running service instance
pub struct ScreenshotLibrary {
    config: ServerConfig,
    screenshots_dir: Option<PathBuf>,
    state: Mutex<LibraryState>,
}

impl ScreenshotLibrary {
    /// Creates a library for the given (possibly undetermined) directory
    ///
    /// A `None` directory keeps the service running with empty caches;
    /// every query then reports the configuration problem instead of the
    /// process crashing at startup.
    pub fn new(config: ServerConfig, screenshots_dir: Option<PathBuf>) -> Self {
        let state = LibraryState {
            images: BoundedCache::new(config.max_images),
            gifs: BoundedCache::new(config.max_gifs),
            frames: FrameCache::new(),
        };
        Self {
            config,
            screenshots_dir,
            state: Mutex::new(state),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn screenshots_dir(&self) -> Option<&Path> {
        self.screenshots_dir.as_deref()
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock_state();
        CacheStats {
            images: state.images.len(),
            images_capacity: state.images.capacity(),
            gifs: state.gifs.len(),
            gifs_capacity: state.gifs.capacity(),
            frame_sets: state.frames.len(),
        }
    }

    /// Whether a derived frame set is currently cached for `name`
    pub fn frame_set_cached(&self, name: &str) -> bool {
        self.lock_state().frames.get(name).is_some()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, LibraryState> {
        // The lock is never held across await points or panicking code
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ----- mutation (synchronizer-facing) -----

    /// Routes a freshly observed record into its category cache
    ///
    /// GIF upserts invalidate any derived frame set for the same name
    /// (the content may have changed), and evictions cascade into the
    /// frame cache so a set never outlives its source record.
    pub fn upsert_record(&self, record: FileRecord) {
        let mut state = self.lock_state();
        match record.kind {
            MediaKind::Image => {
                state.images.upsert(record);
            }
            MediaKind::Gif => {
                let name = record.name.clone();
                state.frames.invalidate(&name);
                let evicted = state.gifs.upsert(record);
                for evicted_name in evicted {
                    state.frames.invalidate(&evicted_name);
                }
            }
            MediaKind::Other => {}
        }
    }

    /// Removes a basename from both category caches and the frame cache
    pub fn remove_name(&self, name: &str) {
        let mut state = self.lock_state();
        state.images.remove(name);
        state.gifs.remove(name);
        state.frames.invalidate(name);
        debug!(name, "removed from caches");
    }

    // ----- queries -----

    /// Newest `count` still images with their bytes re-read from disk
    pub async fn latest_screenshots(&self, count: usize) -> Reply {
        if let Some(reply) = self.dir_unavailable() {
            return reply;
        }
        let count = count.clamp(1, 5);
        let files = self.lock_state().images.values_newest_first(Some(count));

        if files.is_empty() {
            return Reply::text(
                "No screenshots found. Take a screenshot with ShareX and try again.",
            );
        }

        let mut reply = Reply::default();
        for file in files {
            match tokio::fs::read(&file.path).await {
                Ok(bytes) => {
                    reply.push_text(format!(
                        "Screenshot: {} ({})",
                        file.name,
                        file.modified_local()
                    ));
                    reply.push_image(bytes, media::mime_type(&file.path));
                }
                Err(e) => {
                    warn!(name = %file.name, "failed to read screenshot: {e}");
                    reply.push_text(format!("Failed to read screenshot {}: {e}", file.name));
                }
            }
        }
        reply
    }

    /// Latest (index 1) or indexed GIF, resolved through the frame cache
    pub async fn gif_by_index(&self, index: usize) -> Reply {
        if let Some(reply) = self.dir_unavailable() {
            return reply;
        }
        self.gif_reply(GifTarget::Index(index), self.implicit_params()).await
    }

    /// Newest-first GIF listing with 1-based index numbers
    pub fn list_gifs(&self) -> Reply {
        if let Some(reply) = self.dir_unavailable() {
            return reply;
        }
        let gifs = self.lock_state().gifs.values_newest_first(None);
        if gifs.is_empty() {
            return Reply::text("No GIF files found. Record a GIF with ShareX and try again.");
        }

        let listing = gifs
            .iter()
            .enumerate()
            .map(|(i, file)| {
                format!(
                    "{}. {} - {:.2} KB - {}",
                    i + 1,
                    file.name,
                    file.size_kb(),
                    file.modified_local()
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        Reply::text(format!(
            "Available GIFs (use check_gif_by_index with the number):\n{listing}\n\nUse index \
             1 for the latest GIF, or specify 2-{} for older ones.",
            gifs.len()
        ))
    }

    /// Fetch by filename from either category cache
    pub async fn screenshot_by_name(&self, name: &str) -> Reply {
        if let Some(reply) = self.dir_unavailable() {
            return reply;
        }

        enum Found {
            Image(FileRecord),
            Gif,
            Missing,
        }

        let found = {
            let state = self.lock_state();
            if let Some(record) = state.images.get(name) {
                Found::Image(record.clone())
            } else if state.gifs.get(name).is_some() {
                Found::Gif
            } else {
                Found::Missing
            }
        };

        match found {
            Found::Image(file) => match tokio::fs::read(&file.path).await {
                Ok(bytes) => {
                    let mut reply = Reply::text(format!(
                        "Screenshot: {} ({})",
                        file.name,
                        file.modified_local()
                    ));
                    reply.push_image(bytes, media::mime_type(&file.path));
                    reply
                }
                Err(e) => Reply::error(format!("Failed to read screenshot {}: {e}", file.name)),
            },
            Found::Gif => {
                self.gif_reply(GifTarget::Name(name.to_string()), self.implicit_params())
                    .await
            }
            Found::Missing => Self::reply_from_error(&LibraryError::NotFound {
                name: name.to_string(),
            }),
        }
    }

    /// Merged newest-first listing with category occupancy stats
    pub fn list_screenshots(&self, limit: usize) -> Reply {
        if let Some(reply) = self.dir_unavailable() {
            return reply;
        }
        let stats = self.stats();
        let mut all = {
            let state = self.lock_state();
            let mut all = state.images.values_newest_first(None);
            all.extend(state.gifs.values_newest_first(None));
            all
        };

        if all.is_empty() {
            return Reply::text("No files cached. Take a screenshot with ShareX to start tracking.");
        }

        all.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));
        all.truncate(limit.max(1));

        let listing = all
            .iter()
            .map(|file| {
                format!(
                    "- {} ({}, {:.2} KB, {})",
                    file.name,
                    media::mime_type(&file.path),
                    file.size_kb(),
                    file.modified_local()
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        Reply::text(format!(
            "Available screenshots ({} files, Images: {}/{}, GIFs: {}/{}):\n{listing}",
            all.len(),
            stats.images,
            stats.images_capacity,
            stats.gifs,
            stats.gifs_capacity
        ))
    }

    /// Explicit extraction with caller-chosen sampling parameters
    ///
    /// `name` defaults to the newest GIF; this path uses the wider
    /// explicit size ceiling.
    pub async fn extract_frames(
        &self,
        name: Option<&str>,
        max_frames: usize,
        stride: Option<usize>,
    ) -> Reply {
        if let Some(reply) = self.dir_unavailable() {
            return reply;
        }
        let target = match name {
            None => GifTarget::Index(1),
            Some(name) => {
                let state = self.lock_state();
                if state.images.get(name).is_some() {
                    return Reply::error(format!(
                        "{name} is a still image, not a GIF; use get_screenshot_by_name instead."
                    ));
                }
                if state.gifs.get(name).is_none() {
                    return Self::reply_from_error(&LibraryError::NotFound {
                        name: name.to_string(),
                    });
                }
                GifTarget::Name(name.to_string())
            }
        };

        let params = ExtractParams {
            max_frames: max_frames.max(1),
            stride,
            size_limit: self.config.max_gif_bytes_explicit,
            explicit: true,
        };
        self.gif_reply(target, params).await
    }

    // ----- internals -----

    /// Default sampling parameters for the implicit (non-extract) tools
    fn implicit_params(&self) -> ExtractParams {
        ExtractParams {
            max_frames: self.config.max_frames_per_gif,
            stride: None,
            size_limit: self.config.max_gif_bytes_auto,
            explicit: false,
        }
    }

    fn dir_unavailable(&self) -> Option<Reply> {
        if self.screenshots_dir.is_some() {
            return None;
        }
        Some(Self::reply_from_error(&LibraryError::WatchedDirUnavailable))
    }

    fn reply_from_error(error: &LibraryError) -> Reply {
        Reply::error(format!("{error}\n\n{}", error.hint()))
    }

    /// Shared GIF path for implicit fetches and explicit extraction
    ///
    /// The target is resolved and the frame cache consulted under one lock
    /// acquisition, so a concurrent upsert cannot shift the newest-first
    /// ordering between resolving a name and picking the record.
    async fn gif_reply(&self, target: GifTarget, params: ExtractParams) -> Reply {
        let (record, cached) = {
            let state = self.lock_state();
            let gifs = state.gifs.values_newest_first(None);
            if gifs.is_empty() {
                return Reply::text(
                    "No GIF files found. Record a GIF with ShareX and try again.",
                );
            }
            let record = match &target {
                GifTarget::Index(index) => {
                    if *index == 0 || *index > gifs.len() {
                        return Self::reply_from_error(&LibraryError::IndexOutOfRange {
                            index: *index,
                            count: gifs.len(),
                        });
                    }
                    gifs[*index - 1].clone()
                }
                GifTarget::Name(name) => match gifs.iter().find(|r| r.name == *name) {
                    Some(record) => record.clone(),
                    None => {
                        return Self::reply_from_error(&LibraryError::NotFound {
                            name: name.clone(),
                        });
                    }
                },
            };

            // Cache-first, but only the default sampling parameters may
            // reuse a cached set; explicit calls recompute.
            let cached = if params.stride.is_none()
                && params.max_frames == self.config.max_frames_per_gif
            {
                state
                    .frames
                    .get(&record.name)
                    .filter(|set| set.source_modified_at == record.modified_at)
                    .cloned()
            } else {
                None
            };
            (record, cached)
        };

        if let Some(set) = cached {
            debug!(name = %record.name, "serving cached frame set");
            return Self::format_frame_set(&record, &set);
        }

        let task_record = record.clone();
        let joined = tokio::task::spawn_blocking(move || {
            extract::extract(
                &task_record,
                params.max_frames,
                params.stride,
                params.size_limit,
                params.explicit,
            )
        })
        .await;

        let result = match joined {
            Ok(result) => result,
            Err(e) => Err(LibraryError::DecodeFailed {
                name: record.name.clone(),
                reason: format!("extraction task failed: {e}"),
            }),
        };

        match result {
            Ok(Extraction::Passthrough { bytes }) => {
                let mut reply =
                    Reply::text(format!("GIF: {} (static/single frame)", record.name));
                reply.push_image(bytes, "image/gif");
                reply
            }
            Ok(Extraction::Sampled(set)) => {
                self.store_frame_set(&set);
                Self::format_frame_set(&record, &set)
            }
            Err(error) => Self::reply_from_error(&error),
        }
    }

    /// Write-through insert, rejected if the source record moved on while
    /// the decode ran without the lock
    fn store_frame_set(&self, set: &ExtractedFrameSet) {
        let mut state = self.lock_state();
        let still_current = state
            .gifs
            .get(&set.source_name)
            .is_some_and(|record| record.modified_at == set.source_modified_at);
        if still_current {
            state.frames.put(set.clone());
        } else {
            debug!(name = %set.source_name, "dropping stale extraction result");
        }
    }

    fn format_frame_set(record: &FileRecord, set: &ExtractedFrameSet) -> Reply {
        let mut header = format!(
            "GIF: {}\nSize: {:.2} KB\nTotal frames: {}\nShowing: {} frames",
            record.name,
            record.size_kb(),
            set.total_frames,
            set.frames.len()
        );
        if set.is_subsampled() {
            header.push_str(&format!(" (every {} frames)", set.sample_stride));
        }
        if !set.failures.is_empty() {
            let failed: Vec<String> = set
                .failures
                .iter()
                .map(|f| format!("{} ({})", f.index + 1, f.reason))
                .collect();
            header.push_str(&format!(
                "\nNote: {} frame(s) failed to decode: {}",
                set.failures.len(),
                failed.join(", ")
            ));
        }

        let mut reply = Reply::text(header);
        for frame in &set.frames {
            reply.push_text(format!("Frame {}/{}:", frame.index + 1, set.total_frames));
            reply.push_image(frame.png.clone(), "image/png");
        }
        reply
    }
}
