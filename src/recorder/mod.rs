//! Recording system module
//!
//! This module implements the capture-extract-persist loop:
//! - SessionController to run one session against a device gateway
//! - RecordWriter for append-only per-modality record files
//! - Session state, termination policy and configuration

pub mod coordinator;
pub mod state;
pub mod writer;

pub use coordinator::{InterruptFlag, SessionController};
pub use state::{
    record_path, RecorderConfig, SessionReport, SessionState, StopReason, TerminationPolicy,
};
pub use writer::{append_row, RecordWriter, DEFAULT_DELIMITER};
