//! In-memory capture backend for tests

use super::traits::{CameraPosition, CaptureBackend, CaptureError, CaptureResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Default)]
struct FakeState {
    acquired: bool,
    camera: Option<CameraPosition>,
    current: Option<PathBuf>,
    recordings: Vec<PathBuf>,
    cameras_at_begin: Vec<CameraPosition>,
    empty_files: bool,
    fail_next_begin: bool,
    fail_acquire: bool,
}

/// Writes a small placeholder file per recording
pub struct FakeCaptureBackend {
    state: Arc<Mutex<FakeState>>,
}

/// Test-side handle to inspect and steer a `FakeCaptureBackend`
#[derive(Clone)]
pub struct FakeCaptureControl {
    state: Arc<Mutex<FakeState>>,
}

impl FakeCaptureBackend {
    pub fn new() -> (Self, FakeCaptureControl) {
        let state = Arc::new(Mutex::new(FakeState::default()));
        (
            Self {
                state: state.clone(),
            },
            FakeCaptureControl { state },
        )
    }
}

impl FakeCaptureControl {
    pub fn recordings(&self) -> Vec<PathBuf> {
        self.state.lock().recordings.clone()
    }

    pub fn cameras_at_begin(&self) -> Vec<CameraPosition> {
        self.state.lock().cameras_at_begin.clone()
    }

    pub fn camera(&self) -> CameraPosition {
        self.state.lock().camera.unwrap_or_default()
    }

    pub fn is_acquired(&self) -> bool {
        self.state.lock().acquired
    }

    pub fn is_recording(&self) -> bool {
        self.state.lock().current.is_some()
    }

    pub fn write_empty_files(&self, empty: bool) {
        self.state.lock().empty_files = empty;
    }

    pub fn fail_next_begin(&self) {
        self.state.lock().fail_next_begin = true;
    }

    pub fn fail_acquire(&self) {
        self.state.lock().fail_acquire = true;
    }
}

#[async_trait]
impl CaptureBackend for FakeCaptureBackend {
    fn name(&self) -> &str {
        "fake"
    }

    async fn acquire(&mut self) -> CaptureResult<()> {
        let mut state = self.state.lock();
        if state.fail_acquire {
            return Err(CaptureError::DeviceUnavailable("no camera".to_string()));
        }
        state.acquired = true;
        Ok(())
    }

    async fn release(&mut self) -> CaptureResult<()> {
        let mut state = self.state.lock();
        state.acquired = false;
        state.current = None;
        Ok(())
    }

    async fn select_camera(&mut self, position: CameraPosition) -> CaptureResult<()> {
        self.state.lock().camera = Some(position);
        Ok(())
    }

    async fn begin_recording(&mut self, output: &Path) -> CaptureResult<()> {
        let mut state = self.state.lock();
        if std::mem::take(&mut state.fail_next_begin) {
            return Err(CaptureError::Configuration("cannot add movie output".to_string()));
        }
        let contents: &[u8] = if state.empty_files { b"" } else { b"moov" };
        std::fs::write(output, contents)?;
        let camera = state.camera.unwrap_or_default();
        state.cameras_at_begin.push(camera);
        state.current = Some(output.to_path_buf());
        Ok(())
    }

    async fn end_recording(&mut self) -> CaptureResult<PathBuf> {
        let mut state = self.state.lock();
        let path = state.current.take().ok_or(CaptureError::NotRecording)?;
        state.recordings.push(path.clone());
        Ok(path)
    }

    fn is_recording(&self) -> bool {
        self.state.lock().current.is_some()
    }
}
