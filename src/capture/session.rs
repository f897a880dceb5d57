//! Capture session manager
//!
//! Owns the platform capture backend and the temp file of the recording in
//! progress. A finished file is only handed back after it has been checked
//! to exist and hold data.

use super::traits::{CameraPosition, CaptureBackend, CaptureError, CaptureResult};
use crate::utils::paths::temp_segment_path;
use std::path::{Path, PathBuf};

pub struct CaptureSessionManager {
    backend: Box<dyn CaptureBackend>,
    documents_dir: PathBuf,
    camera: CameraPosition,
    current_file: Option<PathBuf>,
    acquired: bool,
}

impl CaptureSessionManager {
    pub fn new(backend: Box<dyn CaptureBackend>, documents_dir: PathBuf, camera: CameraPosition) -> Self {
        Self {
            backend,
            documents_dir,
            camera,
            current_file: None,
            acquired: false,
        }
    }

    pub fn camera_position(&self) -> CameraPosition {
        self.camera
    }

    pub fn documents_dir(&self) -> &Path {
        &self.documents_dir
    }

    pub fn is_acquired(&self) -> bool {
        self.acquired
    }

    pub fn is_recording(&self) -> bool {
        self.current_file.is_some()
    }

    /// Temp file of the recording in progress
    pub fn current_file(&self) -> Option<&Path> {
        self.current_file.as_deref()
    }

    /// Open the platform session and apply the configured camera
    pub async fn acquire(&mut self) -> CaptureResult<()> {
        if self.acquired {
            return Ok(());
        }

        std::fs::create_dir_all(&self.documents_dir)?;
        self.backend.acquire().await?;
        self.backend.select_camera(self.camera).await?;
        self.acquired = true;

        tracing::info!(
            "Capture session '{}' ready, writing to {:?}",
            self.backend.name(),
            self.documents_dir
        );
        Ok(())
    }

    /// Close the platform session. An unfinished recording is discarded.
    pub async fn release(&mut self) -> CaptureResult<()> {
        if !self.acquired {
            return Ok(());
        }

        if let Some(file) = self.current_file.take() {
            tracing::warn!("Discarding unfinished recording {:?}", file);
        }
        self.backend.release().await?;
        self.acquired = false;
        Ok(())
    }

    /// Switch the active camera. Not allowed while recording.
    pub async fn select_camera(&mut self, position: CameraPosition) -> CaptureResult<()> {
        if self.is_recording() {
            return Err(CaptureError::AlreadyRecording);
        }
        if self.acquired {
            self.backend.select_camera(position).await?;
        }
        self.camera = position;
        Ok(())
    }

    /// Switch to the other camera and return the new position
    pub async fn toggle_camera(&mut self) -> CaptureResult<CameraPosition> {
        let next = self.camera.toggled();
        self.select_camera(next).await?;
        Ok(next)
    }

    /// Start recording to a fresh temp file
    pub async fn begin_recording(&mut self) -> CaptureResult<PathBuf> {
        if !self.acquired {
            return Err(CaptureError::Configuration("capture session not acquired".to_string()));
        }
        if self.current_file.is_some() {
            return Err(CaptureError::AlreadyRecording);
        }

        let path = temp_segment_path(&self.documents_dir);
        self.backend.begin_recording(&path).await?;
        self.current_file = Some(path.clone());
        Ok(path)
    }

    /// Finish the recording and return the validated file
    pub async fn end_recording(&mut self) -> CaptureResult<PathBuf> {
        if self.current_file.take().is_none() {
            return Err(CaptureError::NotRecording);
        }

        let path = self.backend.end_recording().await?;
        validate_recording(&path)?;
        Ok(path)
    }
}

/// Check that a finished recording exists and is non-empty
fn validate_recording(path: &Path) -> CaptureResult<()> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| CaptureError::Finalize(format!("{} is unreadable: {e}", path.display())))?;

    if metadata.len() == 0 {
        let _ = std::fs::remove_file(path);
        return Err(CaptureError::Finalize(format!("{} is empty", path.display())));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::fake::{FakeCaptureBackend, FakeCaptureControl};

    fn manager(dir: &Path) -> (CaptureSessionManager, FakeCaptureControl) {
        let (backend, control) = FakeCaptureBackend::new();
        let manager = CaptureSessionManager::new(Box::new(backend), dir.to_path_buf(), CameraPosition::Rear);
        (manager, control)
    }

    #[tokio::test]
    async fn test_record_one_segment() {
        let dir = tempfile::tempdir().unwrap();
        let (mut session, control) = manager(dir.path());
        session.acquire().await.unwrap();

        let temp = session.begin_recording().await.unwrap();
        assert!(temp.starts_with(dir.path()));
        assert!(temp.to_string_lossy().ends_with("-temp.mov"));
        assert!(session.is_recording());

        let finished = session.end_recording().await.unwrap();
        assert_eq!(finished, temp);
        assert!(!session.is_recording());
        assert_eq!(control.recordings(), vec![temp]);
    }

    #[tokio::test]
    async fn test_begin_before_acquire_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (mut session, _control) = manager(dir.path());
        let err = session.begin_recording().await.unwrap_err();
        assert!(matches!(err, CaptureError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_empty_file_is_finalize_error() {
        let dir = tempfile::tempdir().unwrap();
        let (mut session, control) = manager(dir.path());
        session.acquire().await.unwrap();
        control.write_empty_files(true);

        let temp = session.begin_recording().await.unwrap();
        let err = session.end_recording().await.unwrap_err();
        assert!(matches!(err, CaptureError::Finalize(_)));
        assert!(!temp.exists());
        assert!(!session.is_recording());
    }

    #[tokio::test]
    async fn test_backend_failure_leaves_session_idle() {
        let dir = tempfile::tempdir().unwrap();
        let (mut session, control) = manager(dir.path());
        session.acquire().await.unwrap();
        control.fail_next_begin();

        assert!(session.begin_recording().await.is_err());
        assert!(!session.is_recording());
        assert!(session.begin_recording().await.is_ok());
    }

    #[tokio::test]
    async fn test_toggle_camera() {
        let dir = tempfile::tempdir().unwrap();
        let (mut session, control) = manager(dir.path());
        session.acquire().await.unwrap();

        assert_eq!(session.toggle_camera().await.unwrap(), CameraPosition::Front);
        assert_eq!(control.camera(), CameraPosition::Front);
    }

    #[tokio::test]
    async fn test_camera_switch_while_recording_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (mut session, _control) = manager(dir.path());
        session.acquire().await.unwrap();
        session.begin_recording().await.unwrap();

        let err = session.toggle_camera().await.unwrap_err();
        assert!(matches!(err, CaptureError::AlreadyRecording));
        assert_eq!(session.camera_position(), CameraPosition::Rear);
    }

    #[tokio::test]
    async fn test_release_discards_recording() {
        let dir = tempfile::tempdir().unwrap();
        let (mut session, control) = manager(dir.path());
        session.acquire().await.unwrap();
        session.begin_recording().await.unwrap();

        session.release().await.unwrap();
        assert!(!session.is_recording());
        assert!(!session.is_acquired());
        assert!(!control.is_acquired());
    }
}
