//! Segment compositor
//!
//! Concatenates the recorded segments into one timeline and renders it to a
//! single movie. Placement uses each file's probed duration, not the
//! duration tracked by the recording timer.

use super::ffmpeg::{build_export_args, run_ffmpeg};
use super::probe::{FfprobeProbe, MediaProbe};
use super::types::{ExportError, ExportQuality};
use crate::config::ExportConfig;
use crate::recorder::Segment;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::time::Duration;

/// One segment placed on the output timeline
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub source: PathBuf,
    /// Position of the segment on the output timeline
    pub start: Duration,
    /// Probed source duration
    pub duration: Duration,
    /// Without audio the gap is filled with silence
    pub has_audio: bool,
}

/// Ordered timeline built from the segments
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionPlan {
    pub placements: Vec<Placement>,
    /// Frame size taken from the first placed segment
    pub width: u32,
    pub height: u32,
    /// Orientation of the first placed segment, applied to the whole output
    pub rotation: u32,
    /// Segments dropped because they had no usable video
    pub skipped: Vec<PathBuf>,
}

impl CompositionPlan {
    /// Place every segment back to back starting at zero.
    ///
    /// A segment without a video track (or one that cannot be probed)
    /// contributes nothing to either track.
    pub fn build(segments: &[Segment], probe: &dyn MediaProbe) -> Result<Self, ExportError> {
        let mut cursor = Duration::ZERO;
        let mut placements = Vec::with_capacity(segments.len());
        let mut skipped = Vec::new();
        let mut frame: Option<(u32, u32, u32)> = None;

        for segment in segments {
            let source = segment.location().to_path_buf();
            let info = match probe.probe(&source) {
                Ok(info) => info,
                Err(e) => {
                    tracing::warn!("Skipping segment {:?}: {}", source, e);
                    skipped.push(source);
                    continue;
                }
            };

            if !info.has_video {
                tracing::warn!("Skipping segment {:?}: no video track", source);
                skipped.push(source);
                continue;
            }
            if !info.has_audio {
                tracing::warn!("Segment {:?} has no audio track, filling with silence", source);
            }

            frame.get_or_insert((info.width, info.height, info.rotation));
            placements.push(Placement {
                source,
                start: cursor,
                duration: info.duration,
                has_audio: info.has_audio,
            });
            cursor += info.duration;
        }

        let (width, height, rotation) = frame.ok_or(ExportError::NoSegments)?;
        Ok(Self {
            placements,
            width,
            height,
            rotation,
            skipped,
        })
    }

    pub fn total_duration(&self) -> Duration {
        self.placements.iter().map(|p| p.duration).sum()
    }
}

/// Renders an ordered list of segments into one output file
pub trait Compositor: Send + Sync {
    /// Merge `segments` into `output`. Setting `cancel` aborts the render
    /// with `ExportError::Cancelled`.
    fn compose(&self, segments: &[Segment], output: &Path, cancel: &AtomicBool) -> Result<PathBuf, ExportError>;
}

/// Compositor backed by ffprobe and a single ffmpeg concat render
pub struct FfmpegCompositor {
    ffmpeg_path: String,
    quality: ExportQuality,
    probe: Box<dyn MediaProbe>,
}

impl FfmpegCompositor {
    pub fn new(config: &ExportConfig) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            quality: config.quality,
            probe: Box::new(FfprobeProbe::new(config.ffprobe_path.clone())),
        }
    }

    pub fn with_probe(config: &ExportConfig, probe: Box<dyn MediaProbe>) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            quality: config.quality,
            probe,
        }
    }

    /// Build the timeline without rendering it
    pub fn plan(&self, segments: &[Segment]) -> Result<CompositionPlan, ExportError> {
        if segments.is_empty() {
            return Err(ExportError::NoSegments);
        }
        CompositionPlan::build(segments, self.probe.as_ref())
    }
}

impl Compositor for FfmpegCompositor {
    fn compose(&self, segments: &[Segment], output: &Path, cancel: &AtomicBool) -> Result<PathBuf, ExportError> {
        let plan = self.plan(segments)?;
        tracing::info!(
            "Merging {} segments ({:.2}s, {} skipped) into {:?}",
            plan.placements.len(),
            plan.total_duration().as_secs_f64(),
            plan.skipped.len(),
            output
        );

        let args = build_export_args(&plan, output, self.quality);
        run_ffmpeg(&self.ffmpeg_path, &args, cancel)?;

        let written = std::fs::metadata(output).map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            return Err(ExportError::Ffmpeg(format!("{} was not written", output.display())));
        }

        tracing::info!("Export finished: {:?}", output);
        Ok(output.to_path_buf())
    }
}
