//! Error types for screenshot library operations
//!
//! Every failure mode here maps to a reported, human-readable reply at the
//! query facade boundary; nothing is allowed to escape as an unhandled
//! transport fault. Each variant carries enough context for the message and
//! exposes an actionable next step through [`LibraryError::hint`].

use std::path::PathBuf;

/// Result type alias for library operations
pub type LibraryResult<T> = Result<T, LibraryError>;

/// Error type for cache, scan, and extraction operations
#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    /// Requested name absent from both category caches
    #[error("Screenshot \"{name}\" not found in the cache")]
    NotFound {
        /// The filename that was requested
        name: String,
    },

    /// 1-based GIF index outside the currently cached range
    #[error("Invalid GIF index {index}; valid range is 1-{count}")]
    IndexOutOfRange {
        /// The requested index
        index: usize,
        /// Number of GIFs currently cached
        count: usize,
    },

    /// File exceeds the size ceiling for the requested operation
    #[error(
        "GIF {name} is too large ({:.2} MB); the limit for this operation is {} MB",
        *.size as f64 / (1024.0 * 1024.0),
        .limit / (1024 * 1024)
    )]
    TooLarge {
        /// Basename of the oversized file
        name: String,
        /// Observed size in bytes
        size: u64,
        /// Ceiling in bytes for the call path that rejected it
        limit: u64,
        /// Whether the caller was already on the explicit extraction path
        explicit: bool,
    },

    /// Whole-file or frame-stream decode failed
    #[error("Failed to decode {name}: {reason}")]
    DecodeFailed {
        /// Basename of the file that failed
        name: String,
        /// Decoder error text
        reason: String,
    },

    /// Stat or read failure on a single file
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Path the operation touched
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// The watched directory could not be determined at startup
    #[error("The ShareX screenshots directory could not be determined")]
    WatchedDirUnavailable,
}

impl LibraryError {
    /// Convenience constructor for I/O failures
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LibraryError::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns an actionable next step for this error
    pub fn hint(&self) -> &'static str {
        match self {
            LibraryError::NotFound { .. } => {
                "Use list_screenshots to see the cached files. Only the most recent \
                 screenshots are tracked; older files age out of the cache."
            }
            LibraryError::IndexOutOfRange { .. } => {
                "Use list_gifs to see the available GIFs and their index numbers. Index 1 \
                 is always the most recent GIF."
            }
            LibraryError::TooLarge { explicit, .. } => {
                if *explicit {
                    "The file exceeds the absolute extraction ceiling. Raise \
                     SHAREX_MCP_MAX_GIF_BYTES if you really need frames from it."
                } else {
                    "Large GIFs are skipped on the implicit path to keep requests \
                     responsive. Call extract_gif_frames, which allows files up to the \
                     explicit extraction limit."
                }
            }
            LibraryError::DecodeFailed { .. } => {
                "The file might be corrupted or in an unsupported format. Re-record the \
                 capture with ShareX and try again."
            }
            LibraryError::Io { .. } => {
                "Check that the file still exists and is readable. ShareX may have been \
                 mid-write; retrying usually succeeds."
            }
            LibraryError::WatchedDirUnavailable => {
                "Set SHAREX_MCP_SCREENSHOTS_DIR to the ShareX screenshots folder, or \
                 install ShareX so the default location can be auto-detected."
            }
        }
    }
}
