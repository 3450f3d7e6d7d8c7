//! Data models for the screenshot library
//!
//! Defines the metadata record kept per watched file, the derived
//! frame-extraction result, and the reply parts that query operations
//! produce for the MCP transport layer.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Media category of a watched file, decided once at ingestion
///
/// Only `Image` and `Gif` files enter the caches; `Other` is dropped
/// immediately by the directory synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Still image (PNG, JPEG, WebP, BMP)
    Image,
    /// Animated (or single-frame) GIF
    Gif,
    /// Anything else; never cached
    Other,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Gif => "gif",
            MediaKind::Other => "other",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Metadata for one file in the watched directory
///
/// `name` is the basename and the identity key for cache lookups;
/// `modified_at` is the sole ordering key for "most recent" queries and
/// for eviction. Only metadata is cached, never file content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Basename, unique within a category cache
    pub name: String,
    /// Absolute path for later reads
    pub path: PathBuf,
    /// Byte length at last observation
    pub size: u64,
    /// Last-modification timestamp at last observation
    pub modified_at: DateTime<Utc>,
    /// Media category
    pub kind: MediaKind,
}

impl FileRecord {
    /// Human-readable size in KB, matching the listing format
    pub fn size_kb(&self) -> f64 {
        self.size as f64 / 1024.0
    }

    /// Modification time formatted for reply text
    pub fn modified_local(&self) -> String {
        self.modified_at
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }
}

/// One sampled, PNG-encoded frame of a GIF
#[derive(Debug, Clone)]
pub struct ExtractedFrame {
    /// Zero-based frame index within the source animation
    pub index: usize,
    /// PNG-encoded pixels
    pub png: Vec<u8>,
}

/// A frame that failed to decode; kept as an inline diagnostic so the
/// rest of the extraction still counts as a valid partial result
#[derive(Debug, Clone)]
pub struct FrameFailure {
    pub index: usize,
    pub reason: String,
}

/// Result of sampling frames from one GIF
///
/// `frames.len()` may be smaller than `total_frames`; `sample_stride`
/// tells the caller the effective interval between sampled frames.
#[derive(Debug, Clone)]
pub struct ExtractedFrameSet {
    /// Basename of the source GIF (key into the animation cache)
    pub source_name: String,
    /// Modification time of the source when extraction ran; used to
    /// reject stale write-through inserts
    pub source_modified_at: DateTime<Utc>,
    /// Sampled frames, oldest first, at most max-frames-per-gif
    pub frames: Vec<ExtractedFrame>,
    /// True frame count of the source animation
    pub total_frames: usize,
    /// Interval between sampled frame indices
    pub sample_stride: usize,
    /// Frames that failed to decode, if any
    pub failures: Vec<FrameFailure>,
    /// When the extraction ran; diagnostics only
    pub extracted_at: DateTime<Utc>,
}

impl ExtractedFrameSet {
    /// Whether the set covers fewer frames than the source holds
    pub fn is_subsampled(&self) -> bool {
        self.frames.len() < self.total_frames
    }
}

/// Outcome of the frame extraction engine for one GIF
#[derive(Debug, Clone)]
pub enum Extraction {
    /// Static or single-frame file, returned whole without per-frame
    /// decoding; never cached
    Passthrough { bytes: Vec<u8> },
    /// Sampled multi-frame extraction
    Sampled(ExtractedFrameSet),
}

/// One content block of a query reply
#[derive(Debug, Clone)]
pub enum ReplyPart {
    Text(String),
    Image { data: Vec<u8>, mime: &'static str },
}

/// Structured reply of a query operation
///
/// Every failure mode is a reported reply with `is_error` set; nothing
/// escapes the query facade as a transport-level fault.
#[derive(Debug, Clone, Default)]
pub struct Reply {
    pub parts: Vec<ReplyPart>,
    pub is_error: bool,
}

impl Reply {
    pub fn text(msg: impl Into<String>) -> Self {
        Self {
            parts: vec![ReplyPart::Text(msg.into())],
            is_error: false,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            parts: vec![ReplyPart::Text(msg.into())],
            is_error: true,
        }
    }

    pub fn push_text(&mut self, msg: impl Into<String>) {
        self.parts.push(ReplyPart::Text(msg.into()));
    }

    pub fn push_image(&mut self, data: Vec<u8>, mime: &'static str) {
        self.parts.push(ReplyPart::Image { data, mime });
    }

    /// Concatenated text parts, for assertions and logging
    pub fn text_joined(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ReplyPart::Text(t) => Some(t.as_str()),
                ReplyPart::Image { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Number of image parts in the reply
    pub fn image_count(&self) -> usize {
        self.parts
            .iter()
            .filter(|p| matches!(p, ReplyPart::Image { .. }))
            .count()
    }
}
