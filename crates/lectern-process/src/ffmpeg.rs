//! FFmpeg integration for probing and audio handling.

use crate::error::{ProcessError, ProcessResult};
use crate::tool::{require, require_file, run};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Information about an audio or video file.
#[derive(Debug, Clone, Default)]
pub struct MediaInfo {
    /// Duration in seconds.
    pub duration: f64,
    /// Width in pixels, 0 without a video stream.
    pub width: u32,
    /// Height in pixels, 0 without a video stream.
    pub height: u32,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    /// Frame rate of the first video stream.
    pub fps: Option<f64>,
    /// Bitrate in bits per second.
    pub bitrate: Option<u64>,
}

impl MediaInfo {
    pub fn has_audio(&self) -> bool {
        self.audio_codec.is_some()
    }

    pub fn has_video(&self) -> bool {
        self.video_codec.is_some()
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
}

/// Parse an ffprobe rate such as `"30000/1001"` or `"25"`.
fn parse_rate(rate: &str) -> Option<f64> {
    let value = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            if den > 0.0 {
                num / den
            } else {
                return None;
            }
        }
        None => rate.parse().ok()?,
    };
    (value.is_finite() && value > 0.0).then_some(value)
}

fn parse_probe(json: &str) -> ProcessResult<MediaInfo> {
    let probe: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| ProcessError::ParseError(format!("Failed to parse ffprobe output: {}", e)))?;

    let video_stream = probe.streams.iter().find(|s| s.codec_type == "video");
    let audio_stream = probe.streams.iter().find(|s| s.codec_type == "audio");

    let duration = probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    let fps = video_stream.and_then(|s| {
        s.avg_frame_rate
            .as_deref()
            .and_then(parse_rate)
            .or_else(|| s.r_frame_rate.as_deref().and_then(parse_rate))
    });

    Ok(MediaInfo {
        duration,
        width: video_stream.and_then(|s| s.width).unwrap_or(0),
        height: video_stream.and_then(|s| s.height).unwrap_or(0),
        video_codec: video_stream.and_then(|s| s.codec_name.clone()),
        audio_codec: audio_stream.and_then(|s| s.codec_name.clone()),
        fps,
        bitrate: probe.format.bit_rate.as_deref().and_then(|b| b.parse().ok()),
    })
}

/// Probe an audio or video file with ffprobe.
pub fn get_media_info(path: &Path) -> ProcessResult<MediaInfo> {
    require_file(path)?;
    require("ffprobe")?;

    let output = run(
        "ffprobe",
        Command::new("ffprobe")
            .args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path),
    )?;

    let info = parse_probe(&String::from_utf8_lossy(&output.stdout))?;
    debug!(
        "Probed {:?}: {:.2}s, fps {:?}, audio {:?}",
        path, info.duration, info.fps, info.audio_codec
    );
    Ok(info)
}

/// Extract the audio track of a video into `output_dir/<stem>.<format>`.
pub fn extract_audio(video_path: &Path, output_dir: &Path, format: &str) -> ProcessResult<PathBuf> {
    require_file(video_path)?;
    require("ffmpeg")?;

    let stem = video_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("audio");
    let audio_path = output_dir.join(format!("{}.{}", stem, format));

    info!("Extracting audio from {:?} to {:?}", video_path, audio_path);

    run(
        "ffmpeg",
        Command::new("ffmpeg")
            .args(["-v", "error", "-i"])
            .arg(video_path)
            .args([
                "-vn", // No video
                "-ac", "1", // Mono
                "-ar", "16000", // Speech models resample to 16 kHz anyway
                "-y",
            ])
            .arg(&audio_path),
    )?;

    Ok(audio_path)
}

/// Re-encode `duration` seconds of `source` starting at `start` into `dest`.
///
/// The container is chosen from the extension of `dest`.
pub fn export_audio_slice(source: &Path, dest: &Path, start: f64, duration: f64) -> ProcessResult<()> {
    require_file(source)?;
    require("ffmpeg")?;

    debug!(
        "Exporting slice {:.3}s+{:.3}s of {:?} to {:?}",
        start, duration, source, dest
    );

    run(
        "ffmpeg",
        Command::new("ffmpeg")
            .args(["-v", "error"])
            .args(["-ss", &format!("{:.3}", start)])
            .args(["-t", &format!("{:.3}", duration)])
            .arg("-i")
            .arg(source)
            .args(["-vn", "-y"])
            .arg(dest),
    )?;

    Ok(())
}
