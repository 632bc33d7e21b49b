//! Recording command
//!
//! Resolves the serial number, session name and termination policy from
//! command-line values and interactive prompts, then runs the session.

use super::input::{is_valid_session_name, session_exists, Prompter};
use crate::capture::DeviceGateway;
use crate::recorder::{RecorderConfig, SessionController, SessionReport, TerminationPolicy};
use crate::utils::error::{AppError, AppResult};
use std::io::{BufRead, Write};

/// Values supplied on the command line; anything missing is prompted for
#[derive(Debug, Clone, Default)]
pub struct RecordRequest {
    pub serial: Option<String>,
    pub duration: Option<u64>,
    pub name: Option<String>,
}

/// Everything needed to start a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedSession {
    pub serial: String,
    pub name: String,
    pub policy: TerminationPolicy,
}

/// Resolve a request into a session, checking that the device is attached
/// before asking for anything else.
pub fn prepare<G, R, W>(
    request: RecordRequest,
    gateway: &G,
    config: &RecorderConfig,
    prompter: &mut Prompter<R, W>,
) -> AppResult<PreparedSession>
where
    G: DeviceGateway,
    R: BufRead,
    W: Write,
{
    let serial = match request.serial {
        Some(serial) => serial,
        None => {
            prompter.say("Serial number not detected.")?;
            prompter.serial_number()?
        }
    };

    if !gateway.is_connected(&serial) {
        tracing::error!("Device {} is not connected", serial);
        return Err(AppError::DeviceUnavailable { serial });
    }
    tracing::info!("Device {} is connected", serial);

    let name = match request.name {
        Some(name) if !is_valid_session_name(&name) => {
            prompter.say("Invalid session name.")?;
            prompter.session_name(&config.root_dir)?
        }
        Some(name) if session_exists(&config.root_dir, &name) => {
            prompter.say("A session with this name already exists.")?;
            prompter.session_name(&config.root_dir)?
        }
        Some(name) => name,
        None => {
            prompter.say("Session name not detected.")?;
            prompter.session_name(&config.root_dir)?
        }
    };

    let policy = match request.duration.and_then(TerminationPolicy::fixed_secs) {
        Some(policy) => policy,
        None => prompter.policy()?,
    };

    Ok(PreparedSession {
        serial,
        name,
        policy,
    })
}

/// Run a prepared session on `controller` and report how long it lasted
pub fn record<G, W>(
    controller: &mut SessionController<G>,
    prepared: &PreparedSession,
    out: &mut W,
) -> AppResult<SessionReport>
where
    G: DeviceGateway,
    W: Write,
{
    writeln!(out, "Recording has started...")?;
    match prepared.policy {
        TerminationPolicy::FixedDuration(secs) => {
            writeln!(out, "It will stop by itself after {secs} seconds.")?
        }
        TerminationPolicy::UntilInterrupt => {
            writeln!(out, "Press Ctrl+C to stop the recording.")?
        }
    }

    let report = controller.run(prepared.policy, &prepared.name)?;

    writeln!(
        out,
        "Recording stopped!\nThe recording lasted {} seconds.",
        report.elapsed_secs()
    )?;
    Ok(report)
}
