//! Frame Recorder - depth camera frame summaries, one CSV per modality.
//!
//! Captures depth, color, accelerometer and gyroscope frames, reduces each
//! frame to a row of summary fields, and appends the rows to per-session,
//! per-modality record files.

pub mod capture;
pub mod commands;
pub mod features;
pub mod recorder;
pub mod utils;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging; `RUST_LOG` overrides the default filter
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "frame_recorder=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
