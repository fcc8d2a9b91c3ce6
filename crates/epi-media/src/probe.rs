//! FFprobe media information.

use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;

use epi_models::MediaInfo;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Codecs with frame-accurate random access during render.
const FAST_SEEK_CODECS: &[&str] = &[
    "h264", "hevc", "vp8", "vp9", "av1", "prores", "mjpeg", "mpeg4",
];

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    #[serde(default)]
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    duration: Option<String>,
}

async fn run_ffprobe(input: &OsStr) -> MediaResult<FfprobeOutput> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(input)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::ffprobe_failed(
            format!("FFprobe failed for {}", input.to_string_lossy()),
            Some(String::from_utf8_lossy(&output.stderr).to_string()),
        ));
    }

    Ok(serde_json::from_slice(&output.stdout)?)
}

fn parse_duration(value: Option<&String>) -> Option<f64> {
    value
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
}

/// Probe a video file for duration, resolution and seekability.
pub async fn probe_media(path: impl AsRef<Path>) -> MediaResult<MediaInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let probe = run_ffprobe(path.as_os_str()).await?;

    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::InvalidVideo("No video stream found".to_string()))?;

    let duration_secs = parse_duration(video_stream.duration.as_ref())
        .or_else(|| parse_duration(probe.format.as_ref().and_then(|f| f.duration.as_ref())))
        .ok_or_else(|| {
            MediaError::InvalidVideo(format!("No duration reported for {}", path.display()))
        })?;

    let fps = video_stream
        .avg_frame_rate
        .as_ref()
        .or(video_stream.r_frame_rate.as_ref())
        .and_then(|r| parse_frame_rate(r))
        .unwrap_or(30.0);

    let codec = video_stream.codec_name.clone().unwrap_or_default();
    let fast_seek = can_fast_seek(&codec);

    debug!(
        path = %path.display(),
        duration_secs,
        codec = %codec,
        can_fast_seek = fast_seek,
        "Probed media"
    );

    Ok(MediaInfo {
        duration_secs,
        width: video_stream.width.unwrap_or(0),
        height: video_stream.height.unwrap_or(0),
        fps,
        codec,
        can_fast_seek: fast_seek,
    })
}

/// Duration of the first audio stream at a path or URL.
pub async fn probe_audio_duration(input: &str) -> MediaResult<f64> {
    let probe = run_ffprobe(OsStr::new(input)).await?;

    probe
        .streams
        .first()
        .and_then(|s| parse_duration(s.duration.as_ref()))
        .or_else(|| parse_duration(probe.format.as_ref().and_then(|f| f.duration.as_ref())))
        .ok_or_else(|| MediaError::InvalidAudio(format!("No duration reported for {}", input)))
}

/// Whether frames of this codec can be extracted quickly at any position.
pub fn can_fast_seek(codec: &str) -> bool {
    let codec = codec.trim().to_ascii_lowercase();
    FAST_SEEK_CODECS.contains(&codec.as_str())
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
pub fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.parse().ok()
}
