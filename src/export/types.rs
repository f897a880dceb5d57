//! Export types and configuration
//!
//! This module defines the quality presets, probed media metadata and
//! errors used when merging segments into one movie.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Export quality levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportQuality {
    Low,
    Medium,
    High,
    Highest,
}

impl ExportQuality {
    /// Get the CRF value for H.264 encoding
    /// Lower values = higher quality, larger files
    pub fn crf(&self) -> u8 {
        match self {
            ExportQuality::Low => 28,
            ExportQuality::Medium => 23,
            ExportQuality::High => 18,
            ExportQuality::Highest => 12,
        }
    }

    /// Get the FFmpeg preset for H.264 encoding
    pub fn h264_preset(&self) -> &'static str {
        match self {
            ExportQuality::Low => "faster",
            ExportQuality::Medium => "medium",
            ExportQuality::High => "slow",
            ExportQuality::Highest => "slower",
        }
    }
}

impl Default for ExportQuality {
    fn default() -> Self {
        Self::Highest
    }
}

/// Why an export was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportPurpose {
    /// Merged movie is played back in place
    Preview,
    /// Merged movie is the final result of the session
    Finish,
}

/// Stream layout and timing of a source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaInfo {
    /// True duration of the source asset
    pub duration: Duration,
    pub has_video: bool,
    pub has_audio: bool,
    pub width: u32,
    pub height: u32,
    /// Clockwise display rotation in degrees
    pub rotation: u32,
}

/// Export errors
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("FFmpeg error: {0}")]
    Ffmpeg(String),

    #[error("Probe error: {0}")]
    Probe(String),

    #[error("No segments to export")]
    NoSegments,

    #[error("An export is already in progress")]
    InProgress,

    #[error("Export cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_ordering() {
        assert!(ExportQuality::Highest.crf() < ExportQuality::High.crf());
        assert!(ExportQuality::High.crf() < ExportQuality::Low.crf());
        assert_eq!(ExportQuality::default(), ExportQuality::Highest);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(ExportError::InProgress.to_string(), "An export is already in progress");
        assert_eq!(ExportError::NoSegments.to_string(), "No segments to export");
        assert_eq!(
            ExportError::Ffmpeg("exit 1".to_string()).to_string(),
            "FFmpeg error: exit 1"
        );
    }

    #[test]
    fn test_purpose_serializes_lowercase() {
        let json = serde_json::to_string(&ExportPurpose::Finish).unwrap();
        assert_eq!(json, "\"finish\"");
    }
}
