//! Capture trait definitions
//!
//! Platform-agnostic contract for the camera/microphone session.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Which physical camera feeds the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraPosition {
    Front,
    Rear,
}

impl CameraPosition {
    pub fn toggled(self) -> Self {
        match self {
            CameraPosition::Front => CameraPosition::Rear,
            CameraPosition::Rear => CameraPosition::Front,
        }
    }
}

impl Default for CameraPosition {
    fn default() -> Self {
        Self::Rear
    }
}

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// Capture errors
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Already recording")]
    AlreadyRecording,

    #[error("Not recording")]
    NotRecording,

    #[error("Recording could not be finalized: {0}")]
    Finalize(String),
}

pub type CaptureResult<T> = Result<T, CaptureError>;

/// A platform capture session writing one movie file per recording
#[async_trait]
pub trait CaptureBackend: Send {
    /// Backend identifier for logs
    fn name(&self) -> &str;

    /// Open the platform session (devices, encoder availability)
    async fn acquire(&mut self) -> CaptureResult<()>;

    /// Tear the platform session down, abandoning any recording in progress
    async fn release(&mut self) -> CaptureResult<()>;

    /// Switch the active video input
    async fn select_camera(&mut self, position: CameraPosition) -> CaptureResult<()>;

    /// Start writing audio and video to `output`
    async fn begin_recording(&mut self, output: &Path) -> CaptureResult<()>;

    /// Finish the current file and return where it was written
    async fn end_recording(&mut self) -> CaptureResult<PathBuf>;

    fn is_recording(&self) -> bool;
}
