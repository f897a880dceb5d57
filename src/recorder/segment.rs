//! Recorded segments
//!
//! A segment is one continuous clip committed when recording stops. The
//! store keeps them in recording order and only supports append and
//! remove-last.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One continuous recorded clip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    location: PathBuf,
    duration: Duration,
}

impl Segment {
    pub fn new(location: PathBuf, duration: Duration) -> Self {
        Self { location, duration }
    }

    /// File holding the clip
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Recorded length as tracked by the timer
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration.as_secs_f64()
    }
}

/// Ordered sequence of segments
#[derive(Debug, Clone, Default)]
pub struct SegmentStore {
    segments: Vec<Segment>,
}

impl SegmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    pub fn pop_last(&mut self) -> Option<Segment> {
        self.segments.pop()
    }

    pub fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    pub fn as_slice(&self) -> &[Segment] {
        &self.segments
    }

    /// Sum of recorded durations
    pub fn total_duration(&self) -> Duration {
        self.segments.iter().map(Segment::duration).sum()
    }

    pub fn clear(&mut self) {
        self.segments.clear();
    }
}
