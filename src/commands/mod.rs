//! Command handlers
//!
//! Operator-facing layer between the binary and the recorder: input
//! classification and prompting, Ctrl-C handling, and the record command
//! itself.

pub mod input;
pub mod record;
pub mod signal;

pub use input::{classify_args, ParsedArgs, Prompter};
pub use record::{prepare, record, PreparedSession, RecordRequest};
pub use signal::arm_interrupt;
