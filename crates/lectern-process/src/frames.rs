//! Frame sampling from decoded video.

use crate::error::{ProcessError, ProcessResult};
use crate::ffmpeg::get_media_info;
use crate::tool::{drain_stderr, require, require_file};
use image::RgbImage;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

/// Decides which decoded frames to keep.
///
/// Frame `n` (0-based, decode order) is kept when
/// `n >= kept * interval`, with `interval = original_fps / desired_fps`.
#[derive(Debug, Clone)]
pub struct FrameSelector {
    interval: f64,
    kept: u32,
}

impl FrameSelector {
    /// `desired_fps = None` keeps every frame.
    pub fn new(original_fps: f64, desired_fps: Option<f64>) -> Result<Self, f64> {
        if !original_fps.is_finite() || original_fps <= 0.0 {
            return Err(original_fps);
        }
        let interval = match desired_fps {
            Some(desired) if desired.is_finite() && desired > 0.0 => original_fps / desired,
            Some(desired) => return Err(desired),
            None => 1.0,
        };
        Ok(Self { interval, kept: 0 })
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    pub fn kept(&self) -> u32 {
        self.kept
    }

    /// Offer frame `n`; returns the output index when the frame is kept.
    pub fn offer(&mut self, n: u64) -> Option<u32> {
        if n as f64 >= self.kept as f64 * self.interval {
            let index = self.kept;
            self.kept += 1;
            Some(index)
        } else {
            None
        }
    }
}

/// A frame written to disk by [`sample_frames`].
#[derive(Debug, Clone, PartialEq)]
pub struct SampledFrame {
    pub path: PathBuf,
    /// Sequential index among kept frames.
    pub index: u32,
    /// Position of the frame in decode order.
    pub source_frame: u64,
    /// Seconds from the start, `source_frame / original_fps`.
    pub timestamp: f64,
}

/// File name for a kept frame.
pub fn frame_file_name(stem: &str, timestamp: f64, index: u32) -> String {
    format!("{}_time_{:.2}_frame_{:04}.png", stem, timestamp, index)
}

fn save_frame(path: &Path, width: u32, height: u32, rgb: &[u8]) -> ProcessResult<()> {
    let image = RgbImage::from_raw(width, height, rgb.to_vec())
        .ok_or_else(|| ProcessError::Image("frame buffer size mismatch".to_string()))?;
    image.save(path)?;
    Ok(())
}

/// Decode `video_path` and write the selected frames to `output_dir` as PNG.
pub fn sample_frames(
    video_path: &Path,
    output_dir: &Path,
    desired_fps: Option<f64>,
) -> ProcessResult<Vec<SampledFrame>> {
    require_file(video_path)?;
    require("ffmpeg")?;

    let info = get_media_info(video_path)?;
    if !info.has_video() || info.width == 0 || info.height == 0 {
        return Err(ProcessError::NoVideoStream(video_path.to_path_buf()));
    }
    let original_fps = info.fps.unwrap_or(0.0);
    let mut selector =
        FrameSelector::new(original_fps, desired_fps).map_err(|fps| ProcessError::InvalidFrameRate {
            path: video_path.to_path_buf(),
            fps,
        })?;

    let stem = video_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("frame");

    info!(
        "Sampling {:?} at {:?} fps (source {:.3} fps, interval {:.3})",
        video_path,
        desired_fps,
        original_fps,
        selector.interval()
    );

    let mut child = Command::new("ffmpeg")
        .args(["-v", "error", "-noautorotate", "-i"])
        .arg(video_path)
        .args(["-an", "-sn", "-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| ProcessError::ParseError("ffmpeg stdout unavailable".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .map(drain_stderr)
        .ok_or_else(|| ProcessError::ParseError("ffmpeg stderr unavailable".to_string()))?;

    let frame_len = info.width as usize * info.height as usize * 3;
    let mut buffer = vec![0u8; frame_len];
    let mut frames = Vec::new();
    let mut n: u64 = 0;

    let decode_result = loop {
        match stdout.read_exact(&mut buffer) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => break Ok(()),
            Err(e) => break Err(ProcessError::Io(e)),
        }

        if let Some(index) = selector.offer(n) {
            let timestamp = n as f64 / original_fps;
            let path = output_dir.join(frame_file_name(stem, timestamp, index));
            if let Err(e) = save_frame(&path, info.width, info.height, &buffer) {
                let _ = child.kill();
                break Err(e);
            }
            frames.push(SampledFrame {
                path,
                index,
                source_frame: n,
                timestamp,
            });
        }
        n += 1;
    };

    drop(stdout);
    let status = child.wait()?;
    let stderr = stderr.join().unwrap_or_default();
    decode_result?;

    if !status.success() {
        if frames.is_empty() {
            return Err(ProcessError::ToolFailed {
                tool: "ffmpeg".to_string(),
                code: status.code(),
                stderr,
            });
        }
        warn!("ffmpeg reported errors after {} frames: {}", n, stderr);
    }

    debug!("Kept {} of {} decoded frames", frames.len(), n);
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_selector(original_fps: f64, desired_fps: Option<f64>, total: u64) -> Vec<u64> {
        let mut selector = FrameSelector::new(original_fps, desired_fps).unwrap();
        (0..total).filter(|n| selector.offer(*n).is_some()).collect()
    }

    #[test]
    fn test_same_fps_keeps_every_frame() {
        let selector = FrameSelector::new(30.0, Some(30.0)).unwrap();
        assert_eq!(selector.interval(), 1.0);
        assert_eq!(run_selector(30.0, Some(30.0), 10), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_unset_fps_keeps_every_frame() {
        assert_eq!(run_selector(25.0, None, 5), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_half_fps_keeps_every_other_frame() {
        assert_eq!(run_selector(30.0, Some(15.0), 10), vec![0, 2, 4, 6, 8]);
    }

    #[test]
    fn test_one_fps_from_thirty() {
        assert_eq!(run_selector(30.0, Some(1.0), 95), vec![0, 30, 60, 90]);
    }

    #[test]
    fn test_never_exceeds_source_frames() {
        // Asking for more than the source has keeps each frame once
        assert_eq!(run_selector(10.0, Some(60.0), 4), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_indices_strictly_increase() {
        let mut selector = FrameSelector::new(29.97, Some(2.0)).unwrap();
        let indices: Vec<u32> = (0..300).filter_map(|n| selector.offer(n)).collect();
        assert!(indices.windows(2).all(|w| w[1] == w[0] + 1));
        assert_eq!(selector.kept() as usize, indices.len());
    }

    #[test]
    fn test_zero_fps_fails_fast() {
        assert_eq!(FrameSelector::new(0.0, Some(1.0)).unwrap_err(), 0.0);
        assert!(FrameSelector::new(f64::NAN, None).is_err());
        assert!(FrameSelector::new(30.0, Some(0.0)).is_err());
    }

    #[test]
    fn test_frame_file_name() {
        assert_eq!(
            frame_file_name("lecture", 1.0 / 3.0, 7),
            "lecture_time_0.33_frame_0007.png"
        );
        assert_eq!(
            frame_file_name("lecture", 120.0, 120),
            "lecture_time_120.00_frame_0120.png"
        );
    }

    #[test]
    fn test_missing_video() {
        let dir = tempfile::tempdir().unwrap();
        let result = sample_frames(Path::new("/nonexistent/clip.mp4"), dir.path(), Some(1.0));
        assert!(matches!(result, Err(ProcessError::FileNotFound(_))));
    }
}
