//! Segment merge and export
//!
//! This module builds a single timeline from the recorded segments and
//! renders it to one movie file with ffmpeg.

pub mod compositor;
pub mod ffmpeg;
pub mod probe;
pub mod types;

pub use compositor::{CompositionPlan, Compositor, FfmpegCompositor, Placement};
pub use probe::{FfprobeProbe, MediaProbe};
pub use types::{ExportError, ExportPurpose, ExportQuality, MediaInfo};
