//! File naming for segment and merged movie files
//!
//! Names are derived from whole seconds since the 2001-01-01 reference
//! epoch, e.g. `<documents>/719323200-temp.mov`.

use chrono::{DateTime, TimeZone, Utc};
use std::path::{Path, PathBuf};

/// Suffix for in-progress segment recordings
pub const TEMP_SUFFIX: &str = "temp";

/// Suffix for merged exports
pub const MERGED_SUFFIX: &str = "merged";

/// Extension used for every file the recorder writes
pub const MOVIE_EXTENSION: &str = "mov";

fn reference_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Whole seconds elapsed since 2001-01-01T00:00:00Z
pub fn reference_timestamp(now: DateTime<Utc>) -> i64 {
    (now - reference_epoch()).num_seconds()
}

/// Build a unique movie path inside `dir`.
///
/// Two files started within the same second would share a timestamp, so an
/// existing path gets a `-1`, `-2`, ... counter appended.
pub fn unique_movie_path(dir: &Path, now: DateTime<Utc>, suffix: &str) -> PathBuf {
    let stamp = reference_timestamp(now);
    let candidate = dir.join(format!("{stamp}-{suffix}.{MOVIE_EXTENSION}"));
    if !candidate.exists() {
        return candidate;
    }

    let mut counter = 1u32;
    loop {
        let candidate = dir.join(format!("{stamp}-{suffix}-{counter}.{MOVIE_EXTENSION}"));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Path for a new segment recording
pub fn temp_segment_path(dir: &Path) -> PathBuf {
    unique_movie_path(dir, Utc::now(), TEMP_SUFFIX)
}

/// Path for a new merged export
pub fn merged_output_path(dir: &Path) -> PathBuf {
    unique_movie_path(dir, Utc::now(), MERGED_SUFFIX)
}

/// Default documents directory for recordings
pub fn default_documents_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join("Documents").join("segment-cam"))
        .unwrap_or_else(|| std::env::temp_dir().join("segment-cam"))
}
