//! Recording state management
//!
//! Defines the session state machine, termination policies, recorder
//! configuration and the end-of-session report.

use crate::capture::{Modality, StreamConfig};
use crate::utils::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Current state of a session controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Nothing started yet
    #[default]
    Idle,
    /// Stream open, capture loop running
    Recording,
    /// Stream closed; terminal
    Stopped,
}

/// When a session ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TerminationPolicy {
    /// Record for this many seconds
    FixedDuration(NonZeroU64),
    /// Record until an interrupt is requested
    UntilInterrupt,
}

impl TerminationPolicy {
    /// Fixed-duration policy, or `None` for zero seconds
    pub fn fixed_secs(secs: u64) -> Option<Self> {
        NonZeroU64::new(secs).map(TerminationPolicy::FixedDuration)
    }

    pub fn duration(&self) -> Option<Duration> {
        match self {
            TerminationPolicy::FixedDuration(secs) => Some(Duration::from_secs(secs.get())),
            TerminationPolicy::UntilInterrupt => None,
        }
    }
}

/// Why the capture loop ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    DurationElapsed,
    Interrupted,
}

/// Recorder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecorderConfig {
    /// Directory holding one subdirectory per session
    pub root_dir: PathBuf,

    /// Streams to enable on the device
    pub stream: StreamConfig,

    /// Longest wait for one frame set, in milliseconds
    pub acquire_timeout_ms: u64,

    /// Record file field separator
    pub delimiter: char,

    /// Whether fixed-duration sessions also stop on interrupt
    pub interrupt_fixed_duration: bool,

    /// Serial numbers exposed by the simulated device backend
    pub simulated_devices: Vec<String>,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("Realsense CSV"),
            stream: StreamConfig::default(),
            acquire_timeout_ms: 5000,
            delimiter: super::writer::DEFAULT_DELIMITER,
            interrupt_fixed_duration: true,
            simulated_devices: vec!["012345678901".to_string()],
        }
    }
}

impl RecorderConfig {
    /// Load from a JSON file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RecorderConfig = serde_json::from_str(&content)?;
        config.validate()?;
        tracing::debug!("Loaded recorder config from {:?}", path);
        Ok(config)
    }

    /// Reject settings that would produce unreadable record files.
    ///
    /// The delimiter must not collide with decimal points, number signs,
    /// digits, quoting or line breaks.
    pub fn validate(&self) -> AppResult<()> {
        let d = self.delimiter;
        if d.is_alphanumeric() || matches!(d, '.' | ',' | '+' | '-' | '"' | '\n' | '\r') {
            return Err(AppError::InvalidInput(format!(
                "delimiter {d:?} clashes with field contents"
            )));
        }
        Ok(())
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    /// Directory of the named session
    pub fn session_dir(&self, session_name: &str) -> PathBuf {
        self.root_dir.join(session_name)
    }
}

/// Path of the record file for one session and modality
pub fn record_path(session_dir: &Path, session_name: &str, modality: Modality) -> PathBuf {
    session_dir.join(format!("{session_name} {modality} data.csv"))
}

/// Summary of a finished session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub session_name: String,

    pub directory: PathBuf,

    pub policy: TerminationPolicy,

    pub stop_reason: StopReason,

    /// Wall-clock recording time in milliseconds
    pub elapsed_ms: f64,

    /// Capture cycles completed
    pub cycles: u64,

    /// Value rows written, per modality actually observed
    pub rows: BTreeMap<Modality, u64>,
}

impl SessionReport {
    /// Elapsed time truncated to whole seconds
    pub fn elapsed_secs(&self) -> u64 {
        (self.elapsed_ms / 1000.0) as u64
    }
}
