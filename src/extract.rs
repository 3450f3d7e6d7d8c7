//! GIF frame extraction engine
//!
//! Given the metadata record of a cached GIF, decodes a bounded,
//! evenly-spaced subset of its frames and re-encodes each one as PNG for
//! transport. The engine applies a size ceiling before touching the file
//! (full-frame decode of very large animations must not stall the request
//! path), probes the true frame count without decoding pixels, and
//! bypasses extraction entirely for static or single-frame files.
//!
//! A per-frame decode failure degrades to an inline diagnostic in the
//! result; partial results are valid results.

use std::fs::File;
use std::io::BufReader;

use chrono::Utc;
use image::{AnimationDecoder, ExtendedColorType, ImageEncoder, codecs::gif::GifDecoder,
            codecs::png::PngEncoder};
use tracing::{debug, warn};

use crate::error::{LibraryError, LibraryResult};
use crate::model::{ExtractedFrame, ExtractedFrameSet, Extraction, FileRecord, FrameFailure};

/// Which indices to sample from an animation with a known frame count
///
/// Default stride is `max(1, total / target)` with `target = min(total,
/// max_frames)`. An explicit stride overrides the computed one, and the
/// target becomes `min(max_frames, ceil(total / stride))`. Sampled indices
/// are `i * stride`, clamped to the last frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplePlan {
    pub total_frames: usize,
    pub stride: usize,
    pub indices: Vec<usize>,
}

impl SamplePlan {
    pub fn new(total_frames: usize, max_frames: usize, stride_override: Option<usize>) -> Self {
        // Extraction bypasses planning for 0/1-frame files, but the plan
        // itself must not divide by zero on degenerate input
        let total_frames = total_frames.max(1);
        let max_frames = max_frames.max(1);
        let (stride, target) = match stride_override {
            Some(stride) => {
                let stride = stride.max(1);
                (stride, max_frames.min(total_frames.div_ceil(stride)))
            }
            None => {
                let target = total_frames.min(max_frames);
                ((total_frames / target).max(1), target)
            }
        };

        let indices = (0..target)
            .map(|i| (i * stride).min(total_frames - 1))
            .collect();

        Self {
            total_frames,
            stride,
            indices,
        }
    }
}

/// Counts frames by walking frame metadata only, skipping pixel decode
pub fn probe_frame_count(record: &FileRecord) -> LibraryResult<usize> {
    let file = File::open(&record.path).map_err(|e| LibraryError::io(&record.path, e))?;

    let mut options = gif::DecodeOptions::new();
    options.skip_frame_decoding(true);
    let mut decoder = options
        .read_info(BufReader::new(file))
        .map_err(|e| decode_failed(record, e))?;

    let mut count = 0usize;
    loop {
        match decoder.next_frame_info() {
            Ok(Some(_)) => count += 1,
            Ok(None) => break,
            Err(e) => return Err(decode_failed(record, e)),
        }
    }
    Ok(count)
}

/// Runs the full extraction pipeline for one GIF record
///
/// `size_limit` is the ceiling for this call path (implicit fetches use
/// the tighter default); `explicit` only affects the hint attached to a
/// `TooLarge` rejection.
pub fn extract(
    record: &FileRecord,
    max_frames: usize,
    stride_override: Option<usize>,
    size_limit: u64,
    explicit: bool,
) -> LibraryResult<Extraction> {
    if record.size > size_limit {
        return Err(LibraryError::TooLarge {
            name: record.name.clone(),
            size: record.size,
            limit: size_limit,
            explicit,
        });
    }

    let total_frames = probe_frame_count(record)?;
    if total_frames <= 1 {
        // Static or single-frame: extraction overhead is not justified
        debug!(name = %record.name, "single-frame GIF, returning whole file");
        let bytes =
            std::fs::read(&record.path).map_err(|e| LibraryError::io(&record.path, e))?;
        return Ok(Extraction::Passthrough { bytes });
    }

    let plan = SamplePlan::new(total_frames, max_frames, stride_override);
    debug!(
        name = %record.name,
        total_frames,
        sampled = plan.indices.len(),
        stride = plan.stride,
        "extracting frames"
    );

    let file = File::open(&record.path).map_err(|e| LibraryError::io(&record.path, e))?;
    let decoder = GifDecoder::new(BufReader::new(file)).map_err(|e| decode_failed(record, e))?;

    let mut frames = Vec::with_capacity(plan.indices.len());
    let mut failures = Vec::new();
    let mut wanted = plan.indices.iter().copied().peekable();
    let last_wanted = *plan.indices.last().unwrap_or(&0);

    for (index, decoded) in decoder.into_frames().enumerate() {
        if index > last_wanted {
            break;
        }
        if wanted.peek() != Some(&index) {
            // Not a sampled index; the decoder still has to walk past it
            if let Err(e) = decoded {
                warn!(name = %record.name, index, "skipping undecodable frame: {e}");
            }
            continue;
        }

        match decoded {
            Ok(frame) => match encode_frame_png(frame) {
                Ok(png) => {
                    while wanted.peek() == Some(&index) {
                        wanted.next();
                        frames.push(ExtractedFrame {
                            index,
                            png: png.clone(),
                        });
                    }
                }
                Err(reason) => {
                    while wanted.peek() == Some(&index) {
                        wanted.next();
                        failures.push(FrameFailure { index, reason: reason.clone() });
                    }
                }
            },
            Err(e) => {
                let reason = e.to_string();
                warn!(name = %record.name, index, "frame decode failed: {reason}");
                while wanted.peek() == Some(&index) {
                    wanted.next();
                    failures.push(FrameFailure { index, reason: reason.clone() });
                }
            }
        }
    }

    // The stream ended before every planned index was reached
    for index in wanted {
        failures.push(FrameFailure {
            index,
            reason: "frame missing from stream".to_string(),
        });
    }

    if frames.is_empty() {
        return Err(LibraryError::DecodeFailed {
            name: record.name.clone(),
            reason: failures
                .first()
                .map(|f| f.reason.clone())
                .unwrap_or_else(|| "no frames decoded".to_string()),
        });
    }

    Ok(Extraction::Sampled(ExtractedFrameSet {
        source_name: record.name.clone(),
        source_modified_at: record.modified_at,
        frames,
        total_frames,
        sample_stride: plan.stride,
        failures,
        extracted_at: Utc::now(),
    }))
}

fn encode_frame_png(frame: image::Frame) -> Result<Vec<u8>, String> {
    let buffer = frame.into_buffer();
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(
            buffer.as_raw(),
            buffer.width(),
            buffer.height(),
            ExtendedColorType::Rgba8,
        )
        .map_err(|e| e.to_string())?;
    Ok(out)
}

fn decode_failed(record: &FileRecord, error: impl std::fmt::Display) -> LibraryError {
    LibraryError::DecodeFailed {
        name: record.name.clone(),
        reason: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use image::{Frame, Rgba, RgbaImage, codecs::gif::GifEncoder};

    use super::*;
    use crate::model::MediaKind;

    fn write_gif(path: &Path, frame_count: usize) {
        let file = File::create(path).unwrap();
        let mut encoder = GifEncoder::new(file);
        let frames = (0..frame_count).map(|i| {
            let shade = (i * 40 % 256) as u8;
            Frame::new(RgbaImage::from_pixel(8, 8, Rgba([shade, 0, 0, 255])))
        });
        encoder.encode_frames(frames).unwrap();
    }

    fn record_for(path: &Path) -> FileRecord {
        let meta = std::fs::metadata(path).unwrap();
        FileRecord {
            name: path.file_name().unwrap().to_string_lossy().into_owned(),
            path: path.to_path_buf(),
            size: meta.len(),
            modified_at: Utc::now(),
            kind: MediaKind::Gif,
        }
    }

    #[test]
    fn test_sample_plan_37_frames_max_10() {
        let plan = SamplePlan::new(37, 10, None);
        assert_eq!(plan.stride, 3);
        assert_eq!(plan.indices, vec![0, 3, 6, 9, 12, 15, 18, 21, 24, 27]);
    }

    #[test]
    fn test_sample_plan_fewer_frames_than_max() {
        let plan = SamplePlan::new(4, 10, None);
        assert_eq!(plan.stride, 1);
        assert_eq!(plan.indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_sample_plan_explicit_stride() {
        let plan = SamplePlan::new(10, 10, Some(4));
        assert_eq!(plan.stride, 4);
        // ceil(10 / 4) = 3 targets
        assert_eq!(plan.indices, vec![0, 4, 8]);
    }

    #[test]
    fn test_sample_plan_explicit_stride_capped_by_max_frames() {
        let plan = SamplePlan::new(100, 3, Some(10));
        assert_eq!(plan.indices, vec![0, 10, 20]);
    }

    #[test]
    fn test_sample_plan_indices_clamped() {
        let plan = SamplePlan::new(2, 10, Some(5));
        assert_eq!(plan.indices, vec![0]);
    }

    #[test]
    fn test_sample_plan_zero_frames_does_not_panic() {
        let plan = SamplePlan::new(0, 10, None);
        assert_eq!(plan.stride, 1);
        assert_eq!(plan.indices, vec![0]);

        let plan = SamplePlan::new(0, 10, Some(3));
        assert_eq!(plan.indices, vec![0]);
    }

    #[test]
    fn test_probe_frame_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("five.gif");
        write_gif(&path, 5);

        let count = probe_frame_count(&record_for(&path)).unwrap();
        assert_eq!(count, 5);
    }

    #[test]
    fn test_probe_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.gif");
        std::fs::write(&path, b"GIF8 but nothing valid after").unwrap();

        let err = probe_frame_count(&record_for(&path)).unwrap_err();
        assert!(matches!(err, LibraryError::DecodeFailed { .. }));
    }

    #[test]
    fn test_extract_samples_evenly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("six.gif");
        write_gif(&path, 6);

        let extraction =
            extract(&record_for(&path), 3, None, u64::MAX, false).unwrap();
        let Extraction::Sampled(set) = extraction else {
            panic!("expected sampled extraction");
        };

        assert_eq!(set.total_frames, 6);
        assert_eq!(set.sample_stride, 2);
        let indices: Vec<_> = set.frames.iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![0, 2, 4]);
        assert!(set.failures.is_empty());
        for frame in &set.frames {
            // PNG signature
            assert_eq!(&frame.png[..4], &[0x89, b'P', b'N', b'G']);
        }
    }

    #[test]
    fn test_extract_all_frames_when_short() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("three.gif");
        write_gif(&path, 3);

        let Extraction::Sampled(set) =
            extract(&record_for(&path), 10, None, u64::MAX, false).unwrap()
        else {
            panic!("expected sampled extraction");
        };
        assert_eq!(set.frames.len(), 3);
        assert!(!set.is_subsampled());
    }

    #[test]
    fn test_partial_failure_keeps_decoded_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("torn.gif");
        write_gif(&path, 2);

        // Append a frame with intact block structure (so the metadata
        // probe still counts it) whose first LZW code is out of range
        let mut bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.pop(), Some(0x3B), "expected GIF trailer");
        bytes.extend_from_slice(&[
            0x2C, 0, 0, 0, 0, 2, 0, 2, 0, 0x80, // image descriptor, local palette flag
            0, 0, 0, 0xFF, 0xFF, 0xFF, // two-entry palette
            0x07, // LZW minimum code size
            0x02, 0xAA, 0xBB, // undecodable data sub-block
            0x00, 0x3B, // block terminator, trailer
        ]);
        std::fs::write(&path, &bytes).unwrap();

        let record = record_for(&path);
        assert_eq!(probe_frame_count(&record).unwrap(), 3);

        let Extraction::Sampled(set) =
            extract(&record, 10, None, u64::MAX, false).unwrap()
        else {
            panic!("expected sampled extraction");
        };
        assert_eq!(set.total_frames, 3);
        let indices: Vec<_> = set.frames.iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![0, 1]);
        assert_eq!(set.failures.len(), 1);
        assert_eq!(set.failures[0].index, 2);
        assert!(!set.failures[0].reason.is_empty());
    }

    #[test]
    fn test_single_frame_bypass() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("still.gif");
        write_gif(&path, 1);

        let extraction =
            extract(&record_for(&path), 10, None, u64::MAX, false).unwrap();
        let Extraction::Passthrough { bytes } = extraction else {
            panic!("single-frame GIF should bypass per-frame decode");
        };
        assert_eq!(bytes, std::fs::read(&path).unwrap());
    }

    #[test]
    fn test_size_ceiling_rejection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anim.gif");
        write_gif(&path, 4);
        let record = record_for(&path);

        let err = extract(&record, 10, None, 16, false).unwrap_err();
        match err {
            LibraryError::TooLarge { size, limit, explicit, .. } => {
                assert_eq!(size, record.size);
                assert_eq!(limit, 16);
                assert!(!explicit);
            }
            other => panic!("expected TooLarge, got {other:?}"),
        }
    }
}
