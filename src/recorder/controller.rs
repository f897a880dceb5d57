//! Recorder controller
//!
//! One task owns the recording machine, the capture session and the export
//! slot. User intents, timer ticks and export completions all arrive on
//! channels and are handled strictly one after another, so no state is
//! shared across threads.

use super::machine::{RecordingMachine, TickOutcome};
use super::segment::Segment;
use super::state::Projections;
use super::timer::RecordingTimer;
use crate::capture::{CameraPosition, CaptureBackend, CaptureError, CaptureSessionManager, FfmpegCaptureBackend};
use crate::config::RecorderConfig;
use crate::export::{Compositor, ExportError, ExportPurpose, FfmpegCompositor};
use crate::text::StyledText;
use crate::utils::paths::merged_output_path;
use crate::utils::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

const EVENT_CAPACITY: usize = 64;

/// Requests coming from the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Intent {
    Start,
    Stop,
    ToggleCamera,
    DeleteLastSegment,
    RequestPreview,
    RequestFinish,
    Close,
}

/// Notifications for the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub enum RecorderEvent {
    SegmentCommitted(Segment),
    SegmentRemoved(Segment),
    CameraChanged(CameraPosition),
    /// Recording could not start or its file could not be finalized
    RecordingFailed { reason: String },
    ExportCompleted { path: PathBuf, purpose: ExportPurpose },
    ExportFailed { reason: String, purpose: ExportPurpose },
    /// The recorder was closed; the presenter should go away
    Dismissed,
}

enum Internal {
    Tick { generation: u64, delta: Duration },
    ExportFinished {
        purpose: ExportPurpose,
        result: Result<PathBuf, ExportError>,
    },
}

struct ExportSlot {
    purpose: ExportPurpose,
    cancel: Arc<AtomicBool>,
}

/// Cloneable front end to a running controller.
///
/// The controller stops once every handle has been dropped.
#[derive(Clone)]
pub struct RecorderHandle {
    intents: mpsc::UnboundedSender<Intent>,
    projections: watch::Receiver<Projections>,
    events: broadcast::Sender<RecorderEvent>,
    caption: Option<StyledText>,
}

impl RecorderHandle {
    /// Queue an intent. Returns `false` once the controller has exited.
    pub fn send(&self, intent: Intent) -> bool {
        self.intents.send(intent).is_ok()
    }

    pub fn start(&self) -> bool {
        self.send(Intent::Start)
    }

    pub fn stop(&self) -> bool {
        self.send(Intent::Stop)
    }

    pub fn toggle_camera(&self) -> bool {
        self.send(Intent::ToggleCamera)
    }

    pub fn delete_last_segment(&self) -> bool {
        self.send(Intent::DeleteLastSegment)
    }

    pub fn request_preview(&self) -> bool {
        self.send(Intent::RequestPreview)
    }

    pub fn request_finish(&self) -> bool {
        self.send(Intent::RequestFinish)
    }

    pub fn close(&self) -> bool {
        self.send(Intent::Close)
    }

    /// Latest display values, updated on every state change
    pub fn projections(&self) -> watch::Receiver<Projections> {
        self.projections.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecorderEvent> {
        self.events.subscribe()
    }

    /// Caption shown over the preview, if a prompt is configured
    pub fn caption(&self) -> Option<&StyledText> {
        self.caption.as_ref()
    }
}

pub struct RecorderController {
    machine: RecordingMachine,
    capture: CaptureSessionManager,
    compositor: Arc<dyn Compositor>,
    timer: RecordingTimer,
    timer_generation: u64,
    export: Option<ExportSlot>,
    intents: mpsc::UnboundedReceiver<Intent>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    internal_rx: mpsc::UnboundedReceiver<Internal>,
    events: broadcast::Sender<RecorderEvent>,
}

impl RecorderController {
    pub fn new(
        config: &RecorderConfig,
        backend: Box<dyn CaptureBackend>,
        compositor: Arc<dyn Compositor>,
    ) -> (Self, RecorderHandle) {
        let machine = RecordingMachine::new(config.max_video_length());
        let capture = CaptureSessionManager::new(backend, config.documents_dir.clone(), config.camera_position);
        let (intent_tx, intent_rx) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let handle = RecorderHandle {
            intents: intent_tx,
            projections: machine.watch_projections(),
            events: events.clone(),
            caption: config
                .prompt
                .as_ref()
                .map(|p| StyledText::prompt(&p.asker, &p.question)),
        };

        let controller = Self {
            machine,
            capture,
            compositor,
            timer: RecordingTimer::new(config.tick_interval()),
            timer_generation: 0,
            export: None,
            intents: intent_rx,
            internal_tx,
            internal_rx,
            events,
        };
        (controller, handle)
    }

    /// Controller wired to ffmpeg capture and export
    pub fn from_config(config: &RecorderConfig) -> AppResult<(Self, RecorderHandle)> {
        config.validate()?;
        let backend = FfmpegCaptureBackend::new(config.capture.clone());
        let compositor = FfmpegCompositor::new(&config.export);
        Ok(Self::new(config, Box::new(backend), Arc::new(compositor)))
    }

    /// Run the controller on the tokio runtime
    pub fn spawn(self) -> JoinHandle<AppResult<()>> {
        tokio::spawn(self.run())
    }

    /// Process intents until `Close` or until every handle is dropped
    pub async fn run(mut self) -> AppResult<()> {
        tracing::info!("Recorder controller started");
        if let Err(e) = self.capture.acquire().await {
            self.report_capture_error(e);
        }

        loop {
            tokio::select! {
                intent = self.intents.recv() => match intent {
                    Some(intent) => {
                        self.handle_intent(intent).await;
                        if intent == Intent::Close {
                            break;
                        }
                    }
                    None => {
                        tracing::info!("All recorder handles dropped");
                        break;
                    }
                },
                Some(internal) = self.internal_rx.recv() => self.handle_internal(internal).await,
            }
        }

        self.shutdown().await
    }

    async fn handle_intent(&mut self, intent: Intent) {
        tracing::debug!("Intent: {:?}", intent);
        match intent {
            Intent::Start => self.start_recording().await,
            Intent::Stop => self.stop_recording().await,
            Intent::ToggleCamera => self.toggle_camera().await,
            Intent::DeleteLastSegment => {
                if let Some(segment) = self.machine.remove_last_segment() {
                    self.emit(RecorderEvent::SegmentRemoved(segment));
                }
            }
            Intent::RequestPreview => self.request_export(ExportPurpose::Preview).await,
            Intent::RequestFinish => self.request_export(ExportPurpose::Finish).await,
            Intent::Close => self.close().await,
        }
    }

    async fn handle_internal(&mut self, internal: Internal) {
        match internal {
            Internal::Tick { generation, delta } => {
                // Ticks queued before the last stop belong to a finished segment.
                if generation != self.timer_generation {
                    return;
                }
                if self.machine.tick(delta) == TickOutcome::LimitReached {
                    self.stop_recording().await;
                }
            }
            Internal::ExportFinished { purpose, result } => {
                self.export = None;
                match result {
                    Ok(path) => {
                        tracing::info!("{:?} export written to {:?}", purpose, path);
                        self.emit(RecorderEvent::ExportCompleted { path, purpose });
                    }
                    Err(ExportError::Cancelled) => {
                        tracing::info!("{:?} export cancelled", purpose);
                    }
                    Err(e) => {
                        tracing::error!("{:?} export failed: {}", purpose, e);
                        self.emit(RecorderEvent::ExportFailed {
                            reason: e.to_string(),
                            purpose,
                        });
                    }
                }
            }
        }
    }

    async fn start_recording(&mut self) {
        if !self.machine.can_start() {
            tracing::debug!("Ignoring start in {:?}", self.machine.status());
            return;
        }

        if !self.capture.is_acquired() {
            if let Err(e) = self.capture.acquire().await {
                self.report_capture_error(e);
                return;
            }
        }

        match self.capture.begin_recording().await {
            Ok(path) => {
                self.machine.start();
                self.start_timer();
                tracing::info!("Recording segment to {:?}", path);
            }
            Err(e) => self.report_capture_error(e),
        }
    }

    async fn stop_recording(&mut self) {
        if !self.machine.is_recording() {
            return;
        }

        self.stop_timer();
        match self.capture.end_recording().await {
            Ok(path) => {
                if let Some(segment) = self.machine.stop(path) {
                    self.emit(RecorderEvent::SegmentCommitted(segment));
                }
            }
            Err(e) => {
                self.machine.abort();
                self.report_capture_error(e);
            }
        }
    }

    /// Switch cameras, splitting the current segment if recording
    async fn toggle_camera(&mut self) {
        let was_recording = self.machine.is_recording();
        if was_recording {
            self.stop_recording().await;
        }

        match self.capture.toggle_camera().await {
            Ok(position) => self.emit(RecorderEvent::CameraChanged(position)),
            Err(e) => self.report_capture_error(e),
        }

        if was_recording {
            self.start_recording().await;
        }
    }

    async fn request_export(&mut self, purpose: ExportPurpose) {
        if self.machine.is_recording() {
            self.stop_recording().await;
        }

        if self.export.is_some() {
            self.emit_export_failure(ExportError::InProgress, purpose);
            return;
        }
        if self.machine.segments().is_empty() {
            self.emit_export_failure(ExportError::NoSegments, purpose);
            return;
        }

        let segments = self.machine.segments().as_slice().to_vec();
        let output = merged_output_path(self.capture.documents_dir());
        let cancel = Arc::new(AtomicBool::new(false));
        self.export = Some(ExportSlot {
            purpose,
            cancel: cancel.clone(),
        });

        tracing::info!(
            "Starting {:?} export of {} segments to {:?}",
            purpose,
            segments.len(),
            output
        );

        let compositor = self.compositor.clone();
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || compositor.compose(&segments, &output, &cancel))
                .await
                .unwrap_or_else(|e| Err(ExportError::Ffmpeg(format!("Export task panicked: {e}"))));
            let _ = tx.send(Internal::ExportFinished { purpose, result });
        });
    }

    async fn close(&mut self) {
        if self.machine.is_recording() {
            self.stop_recording().await;
        }
        if let Some(slot) = &self.export {
            tracing::info!("Cancelling {:?} export on close", slot.purpose);
            slot.cancel.store(true, Ordering::Relaxed);
        }
        self.emit(RecorderEvent::Dismissed);
    }

    async fn shutdown(mut self) -> AppResult<()> {
        self.stop_timer();
        self.machine.reset();
        self.capture.release().await?;
        tracing::info!("Recorder controller stopped");
        Ok(())
    }

    fn start_timer(&mut self) {
        self.timer_generation += 1;
        let generation = self.timer_generation;
        let tx = self.internal_tx.clone();
        self.timer
            .start(move |delta| tx.send(Internal::Tick { generation, delta }).is_ok());
    }

    fn stop_timer(&mut self) {
        self.timer.stop();
        self.timer_generation += 1;
    }

    fn report_capture_error(&self, error: CaptureError) {
        let error = AppError::from(error);
        tracing::error!("Capture failed: {}", error);
        self.emit(RecorderEvent::RecordingFailed {
            reason: error.to_string(),
        });
    }

    fn emit_export_failure(&self, error: ExportError, purpose: ExportPurpose) {
        tracing::warn!("Rejecting {:?} export: {}", purpose, error);
        self.emit(RecorderEvent::ExportFailed {
            reason: error.to_string(),
            purpose,
        });
    }

    fn emit(&self, event: RecorderEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
