//! Camera and microphone capture
//!
//! The `CaptureBackend` trait is the platform seam; `CaptureSessionManager`
//! adds temp file handling and validation on top of it.

pub mod ffmpeg;
pub mod session;
pub mod traits;

#[cfg(test)]
pub(crate) mod fake;

pub use ffmpeg::FfmpegCaptureBackend;
pub use session::CaptureSessionManager;
pub use traits::{CameraPosition, CaptureBackend, CaptureError, CaptureResult, Resolution};
