//! Camera capture through ffmpeg device inputs
//!
//! Each recording spawns one ffmpeg process that reads the selected camera
//! and the microphone and writes a QuickTime movie. Sending `q` on stdin
//! makes ffmpeg flush and close the file.

use super::traits::{CameraPosition, CaptureBackend, CaptureError, CaptureResult};
use crate::config::{CaptureConfig, CaptureInput};
use async_trait::async_trait;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::time::Instant;

/// How long a freshly spawned capture must survive before it counts as started
pub const DEFAULT_STARTUP_GRACE: Duration = Duration::from_millis(500);
const STARTUP_POLL: Duration = Duration::from_millis(25);

/// Build the ffmpeg argument list for one segment recording
pub fn build_capture_args(config: &CaptureConfig, position: CameraPosition, output: &Path) -> Vec<String> {
    let camera = config.device_for(position);
    let size = format!("{}x{}", config.resolution.width, config.resolution.height);
    let fps = config.fps.to_string();

    let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-nostats", "-y"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    match config.input {
        CaptureInput::AvFoundation => {
            let device = match &config.microphone_device {
                Some(mic) => format!("{camera}:{mic}"),
                None => format!("{camera}:none"),
            };
            args.extend([
                "-f".to_string(),
                "avfoundation".to_string(),
                "-framerate".to_string(),
                fps,
                "-video_size".to_string(),
                size,
                "-i".to_string(),
                device,
            ]);
        }
        CaptureInput::V4l2 => {
            args.extend([
                "-f".to_string(),
                "v4l2".to_string(),
                "-framerate".to_string(),
                fps,
                "-video_size".to_string(),
                size,
                "-i".to_string(),
                camera.to_string(),
            ]);
            if let Some(mic) = &config.microphone_device {
                args.extend([
                    "-f".to_string(),
                    "alsa".to_string(),
                    "-i".to_string(),
                    mic.clone(),
                ]);
            }
        }
        CaptureInput::DirectShow => {
            let device = match &config.microphone_device {
                Some(mic) => format!("video={camera}:audio={mic}"),
                None => format!("video={camera}"),
            };
            args.extend([
                "-f".to_string(),
                "dshow".to_string(),
                "-framerate".to_string(),
                fps,
                "-video_size".to_string(),
                size,
                "-i".to_string(),
                device,
            ]);
        }
    }

    args.extend([
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        "veryfast".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
    ]);

    if config.microphone_device.is_some() {
        args.extend([
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            "128k".to_string(),
        ]);
    }

    args.extend([
        "-f".to_string(),
        "mov".to_string(),
        output.to_string_lossy().to_string(),
    ]);
    args
}

/// Capture backend driving one ffmpeg process per segment
pub struct FfmpegCaptureBackend {
    config: CaptureConfig,
    position: CameraPosition,
    process: Option<Child>,
    output: Option<PathBuf>,
    acquired: bool,
    startup_grace: Duration,
}

impl FfmpegCaptureBackend {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            position: CameraPosition::default(),
            process: None,
            output: None,
            acquired: false,
            startup_grace: DEFAULT_STARTUP_GRACE,
        }
    }

    pub fn with_startup_grace(mut self, grace: Duration) -> Self {
        self.startup_grace = grace;
        self
    }

    pub fn camera_position(&self) -> CameraPosition {
        self.position
    }

    /// Wait out the startup grace period.
    ///
    /// ffmpeg exits within it when a device cannot be opened; the exit is
    /// reported with whatever ffmpeg wrote to stderr.
    async fn await_startup(process: &mut Child, grace: Duration) -> CaptureResult<()> {
        let deadline = Instant::now() + grace;
        loop {
            if let Some(status) = process.try_wait()? {
                let mut stderr = String::new();
                if let Some(mut pipe) = process.stderr.take() {
                    let _ = pipe.read_to_string(&mut stderr);
                }
                return Err(CaptureError::DeviceUnavailable(format!(
                    "FFmpeg capture exited with {status}: {}",
                    stderr.trim()
                )));
            }
            if Instant::now() >= deadline {
                return Ok(());
            }
            tokio::time::sleep(STARTUP_POLL).await;
        }
    }
}

#[async_trait]
impl CaptureBackend for FfmpegCaptureBackend {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn acquire(&mut self) -> CaptureResult<()> {
        if self.acquired {
            return Ok(());
        }

        let ffmpeg = self.config.ffmpeg_path.clone();
        let available = tokio::task::spawn_blocking(move || {
            Command::new(ffmpeg)
                .arg("-version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map(|status| status.success())
                .unwrap_or(false)
        })
        .await
        .unwrap_or(false);

        if !available {
            return Err(CaptureError::DeviceUnavailable(format!(
                "FFmpeg not found at '{}'. Please install FFmpeg",
                self.config.ffmpeg_path
            )));
        }

        self.acquired = true;
        tracing::info!(
            "Capture session acquired ({:?}, {}x{} @ {}fps)",
            self.config.input,
            self.config.resolution.width,
            self.config.resolution.height,
            self.config.fps
        );
        Ok(())
    }

    async fn release(&mut self) -> CaptureResult<()> {
        if let Some(mut process) = self.process.take() {
            tracing::warn!("Releasing capture session with a recording in progress");
            let _ = process.kill();
            let _ = process.wait();
        }
        self.output = None;
        self.acquired = false;
        tracing::info!("Capture session released");
        Ok(())
    }

    async fn select_camera(&mut self, position: CameraPosition) -> CaptureResult<()> {
        if self.process.is_some() {
            return Err(CaptureError::AlreadyRecording);
        }
        self.position = position;
        tracing::info!(
            "Selected {:?} camera ({})",
            position,
            self.config.device_for(position)
        );
        Ok(())
    }

    async fn begin_recording(&mut self, output: &Path) -> CaptureResult<()> {
        if !self.acquired {
            return Err(CaptureError::Configuration("capture session not acquired".to_string()));
        }
        if self.process.is_some() {
            return Err(CaptureError::AlreadyRecording);
        }

        let args = build_capture_args(&self.config, self.position, output);
        tracing::debug!("Starting ffmpeg capture: {:?}", args);

        let mut process = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CaptureError::Configuration(format!("Failed to start FFmpeg capture: {e}")))?;

        if let Err(e) = Self::await_startup(&mut process, self.startup_grace).await {
            tracing::error!("Capture failed to start: {}", e);
            let _ = std::fs::remove_file(output);
            return Err(e);
        }

        self.process = Some(process);
        self.output = Some(output.to_path_buf());
        tracing::info!("Recording {:?} camera to {:?}", self.position, output);
        Ok(())
    }

    async fn end_recording(&mut self) -> CaptureResult<PathBuf> {
        let mut process = self.process.take().ok_or(CaptureError::NotRecording)?;
        let output = self.output.take().ok_or(CaptureError::NotRecording)?;

        let result = tokio::task::spawn_blocking(move || {
            if let Some(mut stdin) = process.stdin.take() {
                // ffmpeg may already be gone; the exit status tells us.
                let _ = stdin.write_all(b"q");
            }
            process.wait_with_output()
        })
        .await
        .map_err(|e| CaptureError::Finalize(format!("capture task failed: {e}")))??;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(CaptureError::Finalize(format!(
                "FFmpeg capture exited with status {}: {}",
                result.status,
                stderr.trim()
            )));
        }

        tracing::info!("Recording finished: {:?}", output);
        Ok(output)
    }

    fn is_recording(&self) -> bool {
        self.process.is_some()
    }
}

impl Drop for FfmpegCaptureBackend {
    fn drop(&mut self) {
        if let Some(mut process) = self.process.take() {
            let _ = process.kill();
            let _ = process.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Resolution;

    fn config(input: CaptureInput) -> CaptureConfig {
        CaptureConfig {
            ffmpeg_path: "ffmpeg".to_string(),
            input,
            front_device: "front".to_string(),
            rear_device: "rear".to_string(),
            microphone_device: Some("mic".to_string()),
            resolution: Resolution {
                width: 640,
                height: 480,
            },
            fps: 30,
        }
    }

    fn arg_after<'a>(args: &'a [String], flag: &str) -> Vec<&'a str> {
        args.windows(2)
            .filter(|w| w[0] == flag)
            .map(|w| w[1].as_str())
            .collect()
    }

    #[test]
    fn test_avfoundation_combines_camera_and_mic() {
        let args = build_capture_args(
            &config(CaptureInput::AvFoundation),
            CameraPosition::Front,
            Path::new("/tmp/1-temp.mov"),
        );
        assert_eq!(arg_after(&args, "-i"), vec!["front:mic"]);
        assert_eq!(arg_after(&args, "-video_size"), vec!["640x480"]);
        assert_eq!(args.last().unwrap(), "/tmp/1-temp.mov");
    }

    #[test]
    fn test_v4l2_adds_alsa_input() {
        let args = build_capture_args(
            &config(CaptureInput::V4l2),
            CameraPosition::Rear,
            Path::new("out.mov"),
        );
        assert_eq!(arg_after(&args, "-i"), vec!["rear", "mic"]);
        assert_eq!(arg_after(&args, "-f"), vec!["v4l2", "alsa", "mov"]);
        assert!(args.contains(&"aac".to_string()));
    }

    #[test]
    fn test_no_microphone_skips_audio_codec() {
        let mut cfg = config(CaptureInput::DirectShow);
        cfg.microphone_device = None;
        let args = build_capture_args(&cfg, CameraPosition::Rear, Path::new("out.mov"));
        assert_eq!(arg_after(&args, "-i"), vec!["video=rear"]);
        assert!(!args.contains(&"aac".to_string()));
    }

    #[tokio::test]
    async fn test_begin_requires_acquire() {
        let mut backend = FfmpegCaptureBackend::new(config(CaptureInput::V4l2));
        let err = backend.begin_recording(Path::new("out.mov")).await.unwrap_err();
        assert!(matches!(err, CaptureError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_acquire_fails_without_ffmpeg() {
        let mut cfg = config(CaptureInput::V4l2);
        cfg.ffmpeg_path = "/nonexistent/ffmpeg-binary".to_string();
        let mut backend = FfmpegCaptureBackend::new(cfg);
        let err = backend.acquire().await.unwrap_err();
        assert!(matches!(err, CaptureError::DeviceUnavailable(_)));
    }

    /// Write an executable shell script standing in for ffmpeg.
    /// `-version` always succeeds; `body` runs for capture invocations.
    #[cfg(unix)]
    fn stub_ffmpeg(dir: &Path, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("ffmpeg");
        let script = format!(
            "#!/bin/sh\nif [ \"$1\" = \"-version\" ]; then exit 0; fi\nfor last; do out=\"$last\"; done\n{body}\n"
        );
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().to_string()
    }

    #[cfg(unix)]
    async fn stub_backend(dir: &Path, body: &str) -> FfmpegCaptureBackend {
        let mut cfg = config(CaptureInput::V4l2);
        cfg.ffmpeg_path = stub_ffmpeg(dir, body);
        let mut backend = FfmpegCaptureBackend::new(cfg).with_startup_grace(Duration::from_secs(2));
        backend.acquire().await.unwrap();
        backend
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_device_failure_fails_begin() {
        let dir = tempfile::tempdir().unwrap();
        let body = "sleep 0.2\necho 'Could not open video device' >&2\nexit 1";
        let mut backend = stub_backend(dir.path(), body).await;
        let output = dir.path().join("1-temp.mov");

        let err = backend.begin_recording(&output).await.unwrap_err();
        match err {
            CaptureError::DeviceUnavailable(msg) => assert!(msg.contains("Could not open video device")),
            other => panic!("expected DeviceUnavailable, got {other:?}"),
        }
        assert!(!backend.is_recording());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_device_failure_leaves_session_idle() {
        use crate::capture::CaptureSessionManager;

        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(CaptureInput::V4l2);
        cfg.ffmpeg_path = stub_ffmpeg(dir.path(), "sleep 0.2\nexit 1");
        let backend = FfmpegCaptureBackend::new(cfg).with_startup_grace(Duration::from_secs(2));
        let mut session =
            CaptureSessionManager::new(Box::new(backend), dir.path().join("docs"), CameraPosition::Rear);
        session.acquire().await.unwrap();

        assert!(session.begin_recording().await.is_err());
        assert!(!session.is_recording());
        assert!(session.current_file().is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_clean_quit_finishes_recording() {
        let dir = tempfile::tempdir().unwrap();
        let body = "read -r cmd\nprintf 'moov' > \"$out\"\nexit 0";
        let mut backend = stub_backend(dir.path(), body).await;
        let output = dir.path().join("1-temp.mov");

        backend.begin_recording(&output).await.unwrap();
        assert!(backend.is_recording());

        let finished = backend.end_recording().await.unwrap();
        assert_eq!(finished, output);
        assert_eq!(std::fs::read(&output).unwrap(), b"moov");
        assert!(!backend.is_recording());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_crashed_capture_is_finalize_error() {
        let dir = tempfile::tempdir().unwrap();
        let body = "read -r cmd\nprintf 'mo' > \"$out\"\necho 'Conversion failed!' >&2\nexit 1";
        let mut backend = stub_backend(dir.path(), body).await;
        let output = dir.path().join("1-temp.mov");

        backend.begin_recording(&output).await.unwrap();
        let err = backend.end_recording().await.unwrap_err();
        match err {
            CaptureError::Finalize(msg) => assert!(msg.contains("Conversion failed!")),
            other => panic!("expected Finalize, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_end_without_begin() {
        let mut backend = FfmpegCaptureBackend::new(config(CaptureInput::V4l2));
        let err = backend.end_recording().await.unwrap_err();
        assert!(matches!(err, CaptureError::NotRecording));
    }
}
