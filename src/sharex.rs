//! ShareX installation detection
//!
//! ShareX keeps its settings under `~/Documents/ShareX`, with
//! `ApplicationConfig.json` naming a custom screenshots folder when the
//! user moved it. Detection is best-effort: any failure (no config dir,
//! unreadable or malformed JSON) resolves to `None` and the caller falls
//! back to degraded empty-cache mode.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

const CONFIG_FILE: &str = "ApplicationConfig.json";

/// The two settings we care about out of ShareX's large config file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ShareXAppConfig {
    #[serde(rename = "UseCustomScreenshotsPath")]
    use_custom_screenshots_path: bool,
    #[serde(rename = "CustomScreenshotsPath")]
    custom_screenshots_path: Option<String>,
}

/// `~/Documents/ShareX`, from `USERPROFILE` (Windows) or `HOME`
pub fn config_dir() -> Option<PathBuf> {
    let home = std::env::var_os("USERPROFILE").or_else(|| std::env::var_os("HOME"))?;
    Some(PathBuf::from(home).join("Documents").join("ShareX"))
}

/// Resolves the screenshots folder of an installed ShareX, if any
pub async fn detect_screenshots_dir() -> Option<PathBuf> {
    let config_dir = config_dir()?;
    resolve_in(&config_dir).await
}

/// Detection against an explicit config dir, the unit under test
async fn resolve_in(config_dir: &Path) -> Option<PathBuf> {
    let settings = config_dir.join(CONFIG_FILE);
    let content = match tokio::fs::read_to_string(&settings).await {
        Ok(content) => content,
        Err(e) => {
            debug!(path = %settings.display(), "no readable ShareX config: {e}");
            return None;
        }
    };

    let parsed: ShareXAppConfig = match serde_json::from_str(&content) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!(path = %settings.display(), "malformed ShareX config: {e}");
            return None;
        }
    };

    let dir = match (parsed.use_custom_screenshots_path, parsed.custom_screenshots_path) {
        (true, Some(custom)) if !custom.is_empty() => PathBuf::from(custom),
        _ => config_dir.join("Screenshots"),
    };
    debug!(dir = %dir.display(), "detected ShareX screenshots directory");
    Some(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn resolve_with(config_json: &str) -> (tempfile::TempDir, Option<PathBuf>) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), config_json).unwrap();
        let resolved = resolve_in(dir.path()).await;
        (dir, resolved)
    }

    #[tokio::test]
    async fn test_default_screenshots_subfolder() {
        let (dir, resolved) = resolve_with(r#"{"FirstTimeRunDate": "2024-01-01"}"#).await;
        assert_eq!(resolved, Some(dir.path().join("Screenshots")));
    }

    #[tokio::test]
    async fn test_custom_path_honored_when_enabled() {
        let (_dir, resolved) = resolve_with(
            r#"{"UseCustomScreenshotsPath": true, "CustomScreenshotsPath": "/mnt/d/Captures"}"#,
        )
        .await;
        assert_eq!(resolved, Some(PathBuf::from("/mnt/d/Captures")));
    }

    #[tokio::test]
    async fn test_custom_path_ignored_when_disabled() {
        let (dir, resolved) = resolve_with(
            r#"{"UseCustomScreenshotsPath": false, "CustomScreenshotsPath": "/mnt/d/Captures"}"#,
        )
        .await;
        assert_eq!(resolved, Some(dir.path().join("Screenshots")));
    }

    #[tokio::test]
    async fn test_empty_custom_path_falls_back() {
        let (dir, resolved) = resolve_with(
            r#"{"UseCustomScreenshotsPath": true, "CustomScreenshotsPath": ""}"#,
        )
        .await;
        assert_eq!(resolved, Some(dir.path().join("Screenshots")));
    }

    #[tokio::test]
    async fn test_missing_config_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(resolve_in(dir.path()).await, None);
    }

    #[tokio::test]
    async fn test_malformed_config_is_none() {
        let (_dir, resolved) = resolve_with("not json {{{").await;
        assert_eq!(resolved, None);
    }
}
