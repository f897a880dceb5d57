//! Segment Cam - record a short video in segments, then merge them.
//!
//! This is the library crate. It provides the recorder controller and the
//! capture, timing and export pieces it is built from.

pub mod capture;
pub mod config;
pub mod export;
pub mod recorder;
pub mod text;
pub mod utils;

pub use config::RecorderConfig;
pub use recorder::{Intent, RecorderController, RecorderEvent, RecorderHandle};
pub use utils::{AppError, AppResult};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default filter. Calling this more than once is
/// harmless.
pub fn init_tracing() {
    let installed = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "segment_cam_lib=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("Starting Segment Cam v{}", env!("CARGO_PKG_VERSION"));
    }
}
