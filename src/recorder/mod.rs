//! Segmented recording
//!
//! - `RecordingMachine` tracks elapsed time and the segment store
//! - `RecordingTimer` drives it while a segment is being captured
//! - `RecorderController` ties capture, timing and export together

pub mod controller;
pub mod machine;
pub mod segment;
pub mod state;
pub mod timer;

pub use controller::{Intent, RecorderController, RecorderEvent, RecorderHandle};
pub use machine::{RecordingMachine, TickOutcome};
pub use segment::{Segment, SegmentStore};
pub use state::{format_elapsed, Projections, RecordingState, RecordingStatus};
pub use timer::{RecordingTimer, DEFAULT_TICK_INTERVAL};
