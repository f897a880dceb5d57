//! Recording state machine
//!
//! Owns the elapsed-time state and the segment store. Every transition
//! recomputes the projections and publishes them on a `watch` channel.

use super::segment::{Segment, SegmentStore};
use super::state::{Projections, RecordingState, RecordingStatus};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;

/// Result of delivering a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not recording, nothing changed
    Ignored,
    /// Elapsed time advanced and is still below the maximum
    Advanced,
    /// Elapsed time is at the maximum; the caller must stop recording
    LimitReached,
}

pub struct RecordingMachine {
    max_length: Duration,
    state: RecordingState,
    segments: SegmentStore,
    projections_tx: watch::Sender<Projections>,
}

impl RecordingMachine {
    pub fn new(max_length: Duration) -> Self {
        let state = RecordingState::default();
        let (projections_tx, _) = watch::channel(Projections::derive(&state, 0, max_length));
        Self {
            max_length,
            state,
            segments: SegmentStore::new(),
            projections_tx,
        }
    }

    pub fn max_length(&self) -> Duration {
        self.max_length
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn status(&self) -> RecordingStatus {
        self.state.status(self.max_length)
    }

    pub fn is_recording(&self) -> bool {
        self.state.is_recording
    }

    pub fn segments(&self) -> &SegmentStore {
        &self.segments
    }

    /// Latest published projections
    pub fn projections(&self) -> Projections {
        self.projections_tx.borrow().clone()
    }

    /// Observe projections; the receiver always holds the latest value
    pub fn watch_projections(&self) -> watch::Receiver<Projections> {
        self.projections_tx.subscribe()
    }

    /// Subscribe to transition events

    /// Whether `start` would begin a new segment
    pub fn can_start(&self) -> bool {
        self.status() == RecordingStatus::Idle
    }

    /// Enter the recording state.
    ///
    /// Returns `false` without changing anything when already recording or
    /// when the maximum length is used up.
    pub fn start(&mut self) -> bool {
        if !self.can_start() {
            tracing::debug!("Ignoring start in {:?}", self.status());
            return false;
        }

        self.state.is_recording = true;
        self.publish();
        true
    }

    /// Advance elapsed time by one timer interval
    pub fn tick(&mut self, delta: Duration) -> TickOutcome {
        if !self.state.is_recording {
            return TickOutcome::Ignored;
        }

        if self.state.elapsed >= self.max_length {
            return TickOutcome::LimitReached;
        }

        self.state.elapsed = self.state.elapsed.saturating_add(delta).min(self.max_length);
        self.publish();

        if self.state.elapsed >= self.max_length {
            tracing::info!("Maximum length of {:?} reached", self.max_length);
            TickOutcome::LimitReached
        } else {
            TickOutcome::Advanced
        }
    }

    /// Leave the recording state and commit the finished clip.
    ///
    /// The segment duration is the time recorded since the last commit.
    pub fn stop(&mut self, location: PathBuf) -> Option<Segment> {
        if !self.state.is_recording {
            return None;
        }

        let segment = Segment::new(location, self.state.pending_segment_duration());
        self.state.is_recording = false;
        self.state.elapsed_at_last_segment_boundary = self.state.elapsed;
        self.segments.push(segment.clone());

        tracing::info!(
            "Committed segment #{} ({:.1}s) at {:?}",
            self.segments.len(),
            segment.duration_secs(),
            segment.location()
        );
        self.publish();
        Some(segment)
    }

    /// Leave the recording state without committing a segment.
    ///
    /// Time recorded since the last commit is discarded.
    pub fn abort(&mut self) {
        if !self.state.is_recording {
            return;
        }

        self.state.is_recording = false;
        self.state.elapsed = self.state.elapsed_at_last_segment_boundary;
        tracing::warn!("Recording aborted, no segment committed");
        self.publish();
    }

    /// Remove the newest segment, undoing its `stop`.
    ///
    /// No-op on an empty store or while recording.
    pub fn remove_last_segment(&mut self) -> Option<Segment> {
        if self.state.is_recording {
            tracing::debug!("Ignoring segment removal while recording");
            return None;
        }

        let segment = self.segments.pop_last()?;
        self.state.elapsed = self.state.elapsed.saturating_sub(segment.duration());
        self.state.elapsed_at_last_segment_boundary = self.state.elapsed;

        tracing::info!(
            "Removed segment ({:.1}s), {} remaining",
            segment.duration_secs(),
            self.segments.len()
        );
        self.publish();
        Some(segment)
    }

    /// Drop every segment and return to a fresh idle state
    pub fn reset(&mut self) {
        self.segments.clear();
        self.state = RecordingState::default();
        self.publish();
    }

    fn publish(&self) {
        let projections = Projections::derive(&self.state, self.segments.len(), self.max_length);
        self.projections_tx.send_replace(projections);
    }

}
