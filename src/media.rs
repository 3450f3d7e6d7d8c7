//! Media classification for watched files
//!
//! Classification happens exactly once, when the synchronizer ingests a
//! file; the rest of the system only ever branches on the resulting
//! [`MediaKind`]. Extensions decide the candidate kind; for GIFs the
//! header bytes are confirmed so a mislabelled file does not reach the
//! frame extraction engine.

use std::path::Path;

use tokio::io::AsyncReadExt;

use crate::model::MediaKind;

/// GIF87a / GIF89a signatures
const GIF_MAGIC: &[u8; 4] = b"GIF8";

/// Classifies a path by extension, confirming GIF headers on disk
///
/// Falls back to the extension verdict when the header read fails; the
/// caller's stat has already established the file exists, and a truncated
/// read will surface as a decode failure later anyway.
pub async fn classify(path: &Path) -> MediaKind {
    let Some(ext) = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
    else {
        return MediaKind::Other;
    };

    match ext.as_str() {
        "gif" => {
            if has_gif_magic(path).await.unwrap_or(true) {
                MediaKind::Gif
            } else {
                MediaKind::Other
            }
        }
        "png" | "jpg" | "jpeg" | "webp" | "bmp" => MediaKind::Image,
        _ => MediaKind::Other,
    }
}

async fn has_gif_magic(path: &Path) -> std::io::Result<bool> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut header = [0u8; 4];
    file.read_exact(&mut header).await?;
    Ok(&header == GIF_MAGIC)
}

/// MIME type for reply content, derived from the file extension
pub fn mime_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}
