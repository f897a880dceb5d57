//! Recorder configuration
//!
//! Defaults mirror the camera screen: 60 second maximum, 100 ms timer, rear
//! camera. Values can be supplied as JSON or overridden with `SEGMENT_CAM_*`
//! environment variables.

use crate::capture::{CameraPosition, Resolution};
use crate::export::ExportQuality;
use crate::utils::paths::default_documents_dir;
use crate::utils::{AppError, AppResult};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Device demuxer ffmpeg reads the camera and microphone from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureInput {
    /// macOS AVFoundation devices
    AvFoundation,
    /// Linux video4linux2 camera with ALSA microphone
    V4l2,
    /// Windows DirectShow devices
    DirectShow,
}

impl CaptureInput {
    pub fn platform_default() -> Self {
        if cfg!(target_os = "macos") {
            CaptureInput::AvFoundation
        } else if cfg!(target_os = "windows") {
            CaptureInput::DirectShow
        } else {
            CaptureInput::V4l2
        }
    }
}

/// Camera and microphone settings for the capture backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureConfig {
    /// ffmpeg executable used for capture
    pub ffmpeg_path: String,
    pub input: CaptureInput,
    /// Device used for `CameraPosition::Front`
    pub front_device: String,
    /// Device used for `CameraPosition::Rear`
    pub rear_device: String,
    /// Microphone device (None = no audio input)
    pub microphone_device: Option<String>,
    pub resolution: Resolution,
    pub fps: u32,
}

impl CaptureConfig {
    pub fn device_for(&self, position: CameraPosition) -> &str {
        match position {
            CameraPosition::Front => &self.front_device,
            CameraPosition::Rear => &self.rear_device,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        let input = CaptureInput::platform_default();
        let (front, rear, mic) = match input {
            CaptureInput::AvFoundation => ("0", "1", "0"),
            CaptureInput::V4l2 => ("/dev/video0", "/dev/video1", "default"),
            CaptureInput::DirectShow => ("Front Camera", "Rear Camera", "Microphone"),
        };

        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            input,
            front_device: front.to_string(),
            rear_device: rear.to_string(),
            microphone_device: Some(mic.to_string()),
            resolution: Resolution {
                width: 1280,
                height: 720,
            },
            fps: 30,
        }
    }
}

/// Settings for merging and exporting segments
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportConfig {
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub quality: ExportQuality,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            quality: ExportQuality::Highest,
        }
    }
}

/// Question shown above the camera preview
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptConfig {
    pub asker: String,
    pub question: String,
}

/// Top-level recorder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecorderConfig {
    /// Maximum total length of all segments, in seconds
    pub max_video_length_secs: f64,
    /// Recording timer interval, in milliseconds
    pub tick_interval_ms: u64,
    /// Directory receiving segment and merged files
    pub documents_dir: PathBuf,
    /// Camera used when the session is acquired
    pub camera_position: CameraPosition,
    pub capture: CaptureConfig,
    pub export: ExportConfig,
    pub prompt: Option<PromptConfig>,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            max_video_length_secs: 60.0,
            tick_interval_ms: 100,
            documents_dir: default_documents_dir(),
            camera_position: CameraPosition::Rear,
            capture: CaptureConfig::default(),
            export: ExportConfig::default(),
            prompt: None,
        }
    }
}

impl RecorderConfig {
    /// Maximum total length. Values too large for a `Duration` saturate;
    /// `validate` rejects them.
    pub fn max_video_length(&self) -> Duration {
        Duration::try_from_secs_f64(self.max_video_length_secs.max(0.0)).unwrap_or(Duration::MAX)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Reject values the recorder cannot run with
    pub fn validate(&self) -> AppResult<()> {
        if !self.max_video_length_secs.is_finite() || self.max_video_length_secs <= 0.0 {
            return Err(AppError::Config(format!(
                "maxVideoLengthSecs must be a positive number, got {}",
                self.max_video_length_secs
            )));
        }
        if Duration::try_from_secs_f64(self.max_video_length_secs).is_err() {
            return Err(AppError::Config(format!(
                "maxVideoLengthSecs is out of range, got {}",
                self.max_video_length_secs
            )));
        }
        if self.tick_interval_ms == 0 {
            return Err(AppError::Config("tickIntervalMs must be greater than zero".to_string()));
        }
        if self.capture.fps == 0 {
            return Err(AppError::Config("capture.fps must be greater than zero".to_string()));
        }
        Ok(())
    }

    /// Parse a JSON configuration; missing fields take their defaults
    pub fn from_json_str(json: &str) -> AppResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with `SEGMENT_CAM_*` environment overrides applied
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("SEGMENT_CAM_MAX_LENGTH") {
            config.max_video_length_secs = value
                .parse()
                .with_context(|| format!("invalid SEGMENT_CAM_MAX_LENGTH: {value}"))?;
        }
        if let Some(value) = lookup("SEGMENT_CAM_TICK_MS") {
            config.tick_interval_ms = value
                .parse()
                .with_context(|| format!("invalid SEGMENT_CAM_TICK_MS: {value}"))?;
        }
        if let Some(value) = lookup("SEGMENT_CAM_DOCUMENTS_DIR") {
            config.documents_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup("SEGMENT_CAM_CAMERA") {
            config.camera_position = match value.to_ascii_lowercase().as_str() {
                "front" => CameraPosition::Front,
                "rear" | "back" => CameraPosition::Rear,
                other => anyhow::bail!("invalid SEGMENT_CAM_CAMERA: {other}"),
            };
        }
        if let Some(value) = lookup("SEGMENT_CAM_FFMPEG") {
            config.capture.ffmpeg_path = value.clone();
            config.export.ffmpeg_path = value;
        }
        if let Some(value) = lookup("SEGMENT_CAM_FFPROBE") {
            config.export.ffprobe_path = value;
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = RecorderConfig::default();
        assert_eq!(config.max_video_length(), Duration::from_secs(60));
        assert_eq!(config.tick_interval(), Duration::from_millis(100));
        assert_eq!(config.camera_position, CameraPosition::Rear);
        assert_eq!(config.export.quality, ExportQuality::Highest);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_partial_override() {
        let config = RecorderConfig::from_json_str(
            r#"{ "maxVideoLengthSecs": 15, "cameraPosition": "front", "capture": { "fps": 24 } }"#,
        )
        .unwrap();
        assert_eq!(config.max_video_length(), Duration::from_secs(15));
        assert_eq!(config.camera_position, CameraPosition::Front);
        assert_eq!(config.capture.fps, 24);
        assert_eq!(config.tick_interval_ms, 100);
    }

    #[test]
    fn test_json_rejects_zero_length() {
        let err = RecorderConfig::from_json_str(r#"{ "maxVideoLengthSecs": 0 }"#).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_json_rejects_out_of_range_length() {
        let err = RecorderConfig::from_json_str(r#"{ "maxVideoLengthSecs": 1e300 }"#).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_out_of_range_length_saturates_instead_of_panicking() {
        let config = RecorderConfig {
            max_video_length_secs: 1e300,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert_eq!(config.max_video_length(), Duration::MAX);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("SEGMENT_CAM_MAX_LENGTH", "30"),
            ("SEGMENT_CAM_CAMERA", "front"),
            ("SEGMENT_CAM_FFMPEG", "/opt/ffmpeg"),
        ]
        .into_iter()
        .collect();

        let config = RecorderConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.max_video_length_secs, 30.0);
        assert_eq!(config.camera_position, CameraPosition::Front);
        assert_eq!(config.capture.ffmpeg_path, "/opt/ffmpeg");
        assert_eq!(config.export.ffmpeg_path, "/opt/ffmpeg");
    }

    #[test]
    fn test_env_rejects_bad_camera() {
        let result = RecorderConfig::from_lookup(|k| {
            (k == "SEGMENT_CAM_CAMERA").then(|| "sideways".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_device_for_position() {
        let capture = CaptureConfig {
            front_device: "front-cam".to_string(),
            rear_device: "rear-cam".to_string(),
            ..CaptureConfig::default()
        };
        assert_eq!(capture.device_for(CameraPosition::Front), "front-cam");
        assert_eq!(capture.device_for(CameraPosition::Rear), "rear-cam");
    }
}
