//! Source media probing with ffprobe

use super::types::{ExportError, MediaInfo};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

/// Reads stream layout and duration of a movie file
pub trait MediaProbe: Send + Sync {
    fn probe(&self, path: &Path) -> Result<MediaInfo, ExportError>;
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
    #[serde(default)]
    side_data_list: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

impl ProbeStream {
    fn is(&self, kind: &str) -> bool {
        self.codec_type.as_deref() == Some(kind)
    }

    /// Clockwise rotation from the legacy `rotate` tag or the display matrix
    fn rotation(&self) -> u32 {
        if let Some(degrees) = self.tags.get("rotate").and_then(|r| r.parse::<i64>().ok()) {
            return degrees.rem_euclid(360) as u32;
        }
        self.side_data_list
            .iter()
            .find_map(|side| side.get("rotation").and_then(|r| r.as_f64()))
            .map(|degrees| (-(degrees.round() as i64)).rem_euclid(360) as u32)
            .unwrap_or(0)
    }
}

fn parse_secs(value: Option<&str>) -> Option<Duration> {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

/// Parse `ffprobe -of json` output
pub fn parse_probe_output(json: &str) -> Result<MediaInfo, ExportError> {
    let output: ProbeOutput = serde_json::from_str(json)
        .map_err(|e| ExportError::Probe(format!("Unexpected ffprobe output: {e}")))?;

    let video = output.streams.iter().find(|s| s.is("video"));
    let has_audio = output.streams.iter().any(|s| s.is("audio"));

    let duration = parse_secs(output.format.as_ref().and_then(|f| f.duration.as_deref()))
        .or_else(|| parse_secs(video.and_then(|v| v.duration.as_deref())))
        .ok_or_else(|| ExportError::Probe("missing duration".to_string()))?;

    Ok(MediaInfo {
        duration,
        has_video: video.is_some(),
        has_audio,
        width: video.and_then(|v| v.width).unwrap_or(0),
        height: video.and_then(|v| v.height).unwrap_or(0),
        rotation: video.map(ProbeStream::rotation).unwrap_or(0),
    })
}

/// `MediaProbe` backed by the ffprobe executable
pub struct FfprobeProbe {
    ffprobe_path: String,
}

impl FfprobeProbe {
    pub fn new(ffprobe_path: impl Into<String>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
        }
    }
}

impl MediaProbe for FfprobeProbe {
    fn probe(&self, path: &Path) -> Result<MediaInfo, ExportError> {
        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "error",
                "-show_entries",
                "stream=codec_type,width,height,duration:stream_tags=rotate:stream_side_data=rotation:format=duration",
                "-of",
                "json",
            ])
            .arg(path)
            .output()
            .map_err(|e| ExportError::Probe(format!("Failed to run ffprobe: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExportError::Probe(format!("ffprobe failed: {stderr}")));
        }

        let info = parse_probe_output(&String::from_utf8_lossy(&output.stdout))?;
        tracing::debug!("Probed {:?}: {:?}", path, info);
        Ok(info)
    }
}
