//! Recording state management
//!
//! Defines the recording status, the raw elapsed-time state and the
//! projections published to the presentation layer.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Current status of the recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingStatus {
    /// Not capturing, more footage can be recorded
    Idle,
    /// Currently capturing a segment
    Recording,
    /// Maximum length used up; only removing a segment leaves this state
    MaxReached,
}

impl Default for RecordingStatus {
    fn default() -> Self {
        Self::Idle
    }
}

/// Raw elapsed-time bookkeeping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordingState {
    pub is_recording: bool,

    /// Total recorded time, including the segment in progress
    pub elapsed: Duration,

    /// `elapsed` at the moment the last segment was committed
    pub elapsed_at_last_segment_boundary: Duration,
}

impl RecordingState {
    pub fn status(&self, max: Duration) -> RecordingStatus {
        if self.is_recording {
            RecordingStatus::Recording
        } else if self.elapsed >= max {
            RecordingStatus::MaxReached
        } else {
            RecordingStatus::Idle
        }
    }

    /// Length of the segment currently being recorded
    pub fn pending_segment_duration(&self) -> Duration {
        self.elapsed
            .saturating_sub(self.elapsed_at_last_segment_boundary)
    }
}

/// UI-facing values derived from the state and the segment store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Projections {
    pub status: RecordingStatus,
    pub elapsed_text: String,
    /// Fraction of the maximum length used, in `[0, 1]`
    pub elapsed_percent: f64,
    pub elapsed_secs: f64,
    pub is_recording: bool,
    pub has_segments: bool,
    pub max_reached: bool,
}

impl Projections {
    pub fn derive(state: &RecordingState, segment_count: usize, max: Duration) -> Self {
        let percent = if max.is_zero() {
            1.0
        } else {
            (state.elapsed.as_secs_f64() / max.as_secs_f64()).clamp(0.0, 1.0)
        };

        Self {
            status: state.status(max),
            elapsed_text: format_elapsed(state.elapsed),
            elapsed_percent: percent,
            elapsed_secs: state.elapsed.as_secs_f64(),
            is_recording: state.is_recording,
            has_segments: segment_count > 0,
            max_reached: state.elapsed >= max,
        }
    }
}

impl Default for Projections {
    fn default() -> Self {
        Self::derive(&RecordingState::default(), 0, Duration::from_secs(60))
    }
}

/// Format whole elapsed seconds as `MM:SS`
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
