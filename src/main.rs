//! frame-recorder binary

use anyhow::Context;
use clap::Parser;
use frame_recorder::capture::SimulatedGateway;
use frame_recorder::commands::{self, classify_args, Prompter, RecordRequest};
use frame_recorder::recorder::{RecorderConfig, SessionController};
use frame_recorder::utils::AppError;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

/// Record depth camera frame summaries to per-session CSV files
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Serial number, duration and session name in any order
    #[arg(num_args = 0..=3)]
    tokens: Vec<String>,

    /// 12-digit device serial number
    #[arg(long)]
    serial: Option<String>,

    /// Recording duration in seconds
    #[arg(long)]
    duration: Option<u64>,

    /// Session name
    #[arg(long)]
    name: Option<String>,

    /// Directory holding the session directories
    #[arg(long)]
    root: Option<PathBuf>,

    /// JSON recorder configuration
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Args {
    fn request(&self) -> RecordRequest {
        let parsed = classify_args(&self.tokens);
        RecordRequest {
            serial: self.serial.clone().or(parsed.serial),
            duration: self.duration.or(parsed.duration),
            name: self.name.clone().or(parsed.name),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    frame_recorder::init_tracing();

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            let code = e
                .downcast_ref::<AppError>()
                .map(AppError::exit_code)
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => RecorderConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => RecorderConfig::default(),
    };
    if let Some(root) = &args.root {
        config.root_dir = root.clone();
    }
    info!("Starting frame-recorder v{}", env!("CARGO_PKG_VERSION"));
    info!("  root: {}", config.root_dir.display());

    let gateway = SimulatedGateway::new(config.simulated_devices.clone());
    let request = args.request();

    // Prompts block on stdin, keep them off the runtime threads
    let prepared = {
        let gateway = gateway.clone();
        let config = config.clone();
        tokio::task::spawn_blocking(move || {
            let stdin = std::io::stdin();
            let mut prompter = Prompter::new(stdin.lock(), std::io::stdout());
            commands::prepare(request, &gateway, &config, &mut prompter)
        })
        .await??
    };

    let mut controller = SessionController::new(gateway, config);
    let _signal = commands::arm_interrupt(controller.interrupt_flag(), controller.state_handle())
        .await
        .context("installing the Ctrl-C handler")?;

    let report = tokio::task::spawn_blocking(move || {
        commands::record(&mut controller, &prepared, &mut std::io::stdout())
    })
    .await??;

    info!("Session report: {}", serde_json::to_string(&report)?);
    Ok(())
}
