//! Server configuration
//!
//! Defaults mirror the recognized options: 10 tracked images, 5 tracked
//! GIFs, 10 extracted frames per GIF, and a pair of size ceilings for the
//! implicit (10 MiB) and explicit (50 MiB) extraction paths. Environment
//! overrides are applied once at bootstrap; the rest of the core only ever
//! sees the resolved struct.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_IMAGES: usize = 10;
pub const DEFAULT_MAX_GIFS: usize = 5;
pub const DEFAULT_MAX_FRAMES_PER_GIF: usize = 10;
/// Ceiling for implicit "give me the latest GIF" extraction
pub const DEFAULT_MAX_GIF_BYTES_AUTO: u64 = 10 * 1024 * 1024;
/// Absolute ceiling for the explicit extraction tool
pub const DEFAULT_MAX_GIF_BYTES_EXPLICIT: u64 = 50 * 1024 * 1024;

/// Resolved server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    /// Explicit path to the ShareX screenshots folder; wins over detection
    pub screenshots_dir: Option<PathBuf>,
    /// Whether to auto-detect the ShareX folder when no path is given
    pub auto_detect_sharex: bool,
    /// Capacity of the image category cache
    pub max_images: usize,
    /// Capacity of the GIF category cache
    pub max_gifs: usize,
    /// Maximum frames sampled per GIF on the default path
    pub max_frames_per_gif: usize,
    /// Size ceiling in bytes for implicit latest-GIF extraction
    pub max_gif_bytes_auto: u64,
    /// Size ceiling in bytes for the explicit extraction tool
    pub max_gif_bytes_explicit: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            screenshots_dir: None,
            auto_detect_sharex: true,
            max_images: DEFAULT_MAX_IMAGES,
            max_gifs: DEFAULT_MAX_GIFS,
            max_frames_per_gif: DEFAULT_MAX_FRAMES_PER_GIF,
            max_gif_bytes_auto: DEFAULT_MAX_GIF_BYTES_AUTO,
            max_gif_bytes_explicit: DEFAULT_MAX_GIF_BYTES_EXPLICIT,
        }
    }
}

/// Environment variables recognized at bootstrap
const ENV_KEYS: &[&str] = &[
    "SHAREX_MCP_SCREENSHOTS_DIR",
    "SHAREX_MCP_AUTO_DETECT",
    "SHAREX_MCP_MAX_IMAGES",
    "SHAREX_MCP_MAX_GIFS",
    "SHAREX_MCP_MAX_FRAMES",
    "SHAREX_MCP_MAX_GIF_BYTES_AUTO",
    "SHAREX_MCP_MAX_GIF_BYTES",
];

impl ServerConfig {
    /// Builds a config from defaults plus any recognized environment overrides
    pub fn from_env() -> Self {
        let mut config = Self::default();
        for key in ENV_KEYS {
            if let Ok(value) = std::env::var(key) {
                if !config.apply_override(key, &value) {
                    tracing::warn!("Ignoring unparseable {key}={value}");
                }
            }
        }
        config
    }

    /// Applies a single override; returns false if the value did not parse
    pub fn apply_override(&mut self, key: &str, value: &str) -> bool {
        match key {
            "SHAREX_MCP_SCREENSHOTS_DIR" => {
                self.screenshots_dir = Some(PathBuf::from(value));
                true
            }
            "SHAREX_MCP_AUTO_DETECT" => match value.parse() {
                Ok(v) => {
                    self.auto_detect_sharex = v;
                    true
                }
                Err(_) => false,
            },
            "SHAREX_MCP_MAX_IMAGES" => Self::parse_into(value, &mut self.max_images),
            "SHAREX_MCP_MAX_GIFS" => Self::parse_into(value, &mut self.max_gifs),
            "SHAREX_MCP_MAX_FRAMES" => Self::parse_into(value, &mut self.max_frames_per_gif),
            "SHAREX_MCP_MAX_GIF_BYTES_AUTO" => Self::parse_into(value, &mut self.max_gif_bytes_auto),
            "SHAREX_MCP_MAX_GIF_BYTES" => Self::parse_into(value, &mut self.max_gif_bytes_explicit),
            _ => false,
        }
    }

    fn parse_into<T: std::str::FromStr>(value: &str, slot: &mut T) -> bool {
        match value.parse() {
            Ok(v) => {
                *slot = v;
                true
            }
            Err(_) => false,
        }
    }
}
