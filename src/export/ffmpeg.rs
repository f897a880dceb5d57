//! FFmpeg invocation for merged exports
//!
//! The whole timeline is rendered by one ffmpeg process using a `concat`
//! filter graph. Each input is trimmed to its probed duration so audio and
//! video stay aligned segment by segment. Orientation is baked into the
//! pixels, so the output carries no rotation metadata.

use super::compositor::CompositionPlan;
use super::types::{ExportError, ExportQuality};
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const AUDIO_SAMPLE_RATE: u32 = 48_000;
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Filter turning stored pixels upright for a clockwise display rotation
pub fn rotation_filter(rotation: u32) -> Option<&'static str> {
    match rotation % 360 {
        90 => Some("transpose=clock"),
        180 => Some("hflip,vflip"),
        270 => Some("transpose=cclock"),
        _ => None,
    }
}

/// Frame size of the output once the rotation has been applied
pub fn output_size(plan: &CompositionPlan) -> (u32, u32) {
    match plan.rotation % 360 {
        90 | 270 => (plan.height, plan.width),
        _ => (plan.width, plan.height),
    }
}

/// Build the filter_complex that concatenates every placement.
///
/// Every segment gets the first segment's rotation. Returns the graph and
/// the output video/audio labels.
pub fn build_concat_filter(plan: &CompositionPlan) -> (String, String, String) {
    let mut filters = Vec::new();
    let mut concat_inputs = String::new();
    let (w, h) = output_size(plan);
    let rotate = rotation_filter(plan.rotation);

    for (i, placement) in plan.placements.iter().enumerate() {
        let secs = placement.duration.as_secs_f64();

        let mut video = format!("[{i}:v:0]trim=duration={secs},setpts=PTS-STARTPTS");
        if let Some(rotate) = rotate {
            video.push(',');
            video.push_str(rotate);
        }
        if w > 0 && h > 0 {
            video.push_str(&format!(
                ",scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1"
            ));
        }
        filters.push(format!("{video}[v{i}]"));

        if placement.has_audio {
            filters.push(format!(
                "[{i}:a:0]atrim=duration={secs},asetpts=PTS-STARTPTS,aresample={AUDIO_SAMPLE_RATE}[a{i}]"
            ));
        } else {
            filters.push(format!(
                "anullsrc=r={AUDIO_SAMPLE_RATE}:cl=stereo,atrim=duration={secs},asetpts=PTS-STARTPTS[a{i}]"
            ));
        }

        concat_inputs.push_str(&format!("[v{i}][a{i}]"));
    }

    filters.push(format!(
        "{concat_inputs}concat=n={}:v=1:a=1[vout][aout]",
        plan.placements.len()
    ));

    (filters.join(";"), "vout".to_string(), "aout".to_string())
}

/// Full ffmpeg argument list for rendering `plan` into `output`
pub fn build_export_args(plan: &CompositionPlan, output: &Path, quality: ExportQuality) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-y".to_string(),
    ];

    for placement in &plan.placements {
        // Rotation is applied once, in the filter graph.
        args.extend([
            "-noautorotate".to_string(),
            "-i".to_string(),
            placement.source.to_string_lossy().to_string(),
        ]);
    }

    let (filter, video_label, audio_label) = build_concat_filter(plan);
    args.extend([
        "-filter_complex".to_string(),
        filter,
        "-map".to_string(),
        format!("[{video_label}]"),
        "-map".to_string(),
        format!("[{audio_label}]"),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        quality.h264_preset().to_string(),
        "-crf".to_string(),
        quality.crf().to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        "192k".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        "-f".to_string(),
        "mov".to_string(),
        output.to_string_lossy().to_string(),
    ]);
    args
}

/// Run ffmpeg to completion, killing it if `cancel` is set
pub fn run_ffmpeg(ffmpeg_path: &str, args: &[String], cancel: &AtomicBool) -> Result<(), ExportError> {
    tracing::debug!("Starting FFmpeg export: {:?}", args);

    let mut process = Command::new(ffmpeg_path)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ExportError::Ffmpeg(format!("Failed to start FFmpeg: {e}")))?;

    // Drain stderr on a helper thread so a chatty ffmpeg never blocks.
    let stderr_reader = process.stderr.take().map(|mut stderr| {
        std::thread::spawn(move || {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf);
            buf
        })
    });

    let status = loop {
        if cancel.load(Ordering::Relaxed) {
            tracing::info!("Cancelling FFmpeg export");
            let _ = process.kill();
            let _ = process.wait();
            return Err(ExportError::Cancelled);
        }
        match process.try_wait()? {
            Some(status) => break status,
            None => std::thread::sleep(POLL_INTERVAL),
        }
    };

    let stderr = stderr_reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();

    if !status.success() {
        return Err(ExportError::Ffmpeg(format!(
            "FFmpeg exited with status {status}: {}",
            stderr.trim()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::compositor::Placement;
    use std::path::PathBuf;

    fn plan(placements: Vec<Placement>) -> CompositionPlan {
        CompositionPlan {
            placements,
            width: 1280,
            height: 720,
            rotation: 90,
            skipped: Vec::new(),
        }
    }

    fn placement(name: &str, start_ms: u64, ms: u64, has_audio: bool) -> Placement {
        Placement {
            source: PathBuf::from(name),
            start: Duration::from_millis(start_ms),
            duration: Duration::from_millis(ms),
            has_audio,
        }
    }

    #[test]
    fn test_concat_filter_two_segments() {
        let plan = plan(vec![placement("a.mov", 0, 3000, true), placement("b.mov", 3000, 2000, true)]);
        let (filter, video, audio) = build_concat_filter(&plan);

        assert!(filter.contains("[0:v:0]trim=duration=3,"));
        assert!(filter.contains("[1:a:0]atrim=duration=2,"));
        assert!(filter.ends_with("[v0][a0][v1][a1]concat=n=2:v=1:a=1[vout][aout]"));
        assert_eq!(video, "vout");
        assert_eq!(audio, "aout");
    }

    #[test]
    fn test_missing_audio_uses_silence() {
        let plan = plan(vec![placement("a.mov", 0, 1500, false)]);
        let (filter, _, _) = build_concat_filter(&plan);

        assert!(filter.contains("anullsrc=r=48000:cl=stereo,atrim=duration=1.5"));
        assert!(!filter.contains("[0:a:0]"));
    }

    #[test]
    fn test_export_args_inputs_and_rotation() {
        let plan = plan(vec![placement("a.mov", 0, 1000, true), placement("b.mov", 1000, 1000, true)]);
        let args = build_export_args(&plan, Path::new("/tmp/1-merged.mov"), ExportQuality::Highest);

        let inputs: Vec<_> = args
            .windows(2)
            .filter(|w| w[0] == "-i")
            .map(|w| w[1].clone())
            .collect();
        assert_eq!(inputs, vec!["a.mov", "b.mov"]);
        assert!(!args.iter().any(|a| a.starts_with("rotate=")));
        assert!(args.contains(&"slower".to_string()));
        assert_eq!(args.last().unwrap(), "/tmp/1-merged.mov");
    }

    #[test]
    fn test_portrait_rotation_is_applied_to_pixels() {
        let plan = plan(vec![placement("a.mov", 0, 1000, true), placement("b.mov", 1000, 1000, true)]);
        let (filter, _, _) = build_concat_filter(&plan);

        assert_eq!(output_size(&plan), (720, 1280));
        assert!(filter.contains("[0:v:0]trim=duration=1,setpts=PTS-STARTPTS,transpose=clock,scale=720:1280"));
        assert!(filter.contains("[1:v:0]trim=duration=1,setpts=PTS-STARTPTS,transpose=clock,scale=720:1280"));
        assert!(filter.contains("pad=720:1280:"));
    }

    #[test]
    fn test_rotation_filters() {
        assert_eq!(rotation_filter(0), None);
        assert_eq!(rotation_filter(90), Some("transpose=clock"));
        assert_eq!(rotation_filter(180), Some("hflip,vflip"));
        assert_eq!(rotation_filter(270), Some("transpose=cclock"));
    }

    #[test]
    fn test_upright_plan_has_no_rotation_filter() {
        let mut plan = plan(vec![placement("a.mov", 0, 1000, true)]);
        plan.rotation = 0;
        let (filter, _, _) = build_concat_filter(&plan);

        assert_eq!(output_size(&plan), (1280, 720));
        assert!(!filter.contains("transpose"));
        assert!(filter.contains("scale=1280:720"));
    }

    #[test]
    fn test_run_ffmpeg_missing_binary() {
        let err = run_ffmpeg("/nonexistent/ffmpeg-binary", &[], &AtomicBool::new(false)).unwrap_err();
        assert!(matches!(err, ExportError::Ffmpeg(_)));
    }
}
