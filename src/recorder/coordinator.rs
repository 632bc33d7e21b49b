//! Session controller
//!
//! Drives one recording session: opens the device stream, runs the
//! capture-extract-persist loop until the termination policy says stop,
//! and closes the stream exactly once on every exit path.

use super::state::{
    record_path, RecorderConfig, SessionReport, SessionState, StopReason, TerminationPolicy,
};
use super::writer::RecordWriter;
use crate::capture::{DeviceGateway, FrameAcquirer, Modality, StreamHandle};
use crate::features;
use crate::utils::error::{AppError, AppResult, DeviceError};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Cross-thread stop request for a running session
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the capture loop to stop after the current cycle
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Owns an open stream and closes it at most once, on drop at the latest
struct StreamGuard<S: StreamHandle> {
    stream: S,
    closed: bool,
}

impl<S: StreamHandle> StreamGuard<S> {
    fn new(stream: S) -> Self {
        Self {
            stream,
            closed: false,
        }
    }

    fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream.close()
    }
}

impl<S: StreamHandle> Drop for StreamGuard<S> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("Failed to stop stream during unwind: {}", e);
        }
    }
}

/// Loop state of the session being recorded
struct ActiveSession {
    name: String,
    dir: PathBuf,
    started: Instant,
    cycles: u64,
    writers: [Option<RecordWriter>; 4],
}

impl ActiveSession {
    fn writer(&mut self, modality: Modality, delimiter: char) -> &mut RecordWriter {
        let (dir, name) = (&self.dir, &self.name);
        self.writers[modality.index()].get_or_insert_with(|| {
            RecordWriter::new(record_path(dir, name, modality), delimiter)
        })
    }

    fn rows(&self) -> BTreeMap<Modality, u64> {
        Modality::ALL
            .into_iter()
            .filter_map(|m| {
                self.writers[m.index()]
                    .as_ref()
                    .map(|w| (m, w.rows_written()))
            })
            .collect()
    }
}

/// Runs exactly one recording session against a device gateway
pub struct SessionController<G: DeviceGateway> {
    gateway: G,
    config: RecorderConfig,
    state: Arc<RwLock<SessionState>>,
    interrupt: InterruptFlag,
}

impl<G: DeviceGateway> SessionController<G> {
    pub fn new(gateway: G, config: RecorderConfig) -> Self {
        Self {
            gateway,
            config,
            state: Arc::new(RwLock::new(SessionState::Idle)),
            interrupt: InterruptFlag::new(),
        }
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Shared view of the state for observers on other threads
    pub fn state_handle(&self) -> Arc<RwLock<SessionState>> {
        Arc::clone(&self.state)
    }

    /// Flag that stops the session when requested
    pub fn interrupt_flag(&self) -> InterruptFlag {
        self.interrupt.clone()
    }

    /// Record `session_name` until `policy` says stop.
    ///
    /// The stream is closed before this returns, whether the loop ended
    /// normally or failed.
    pub fn run(
        &mut self,
        policy: TerminationPolicy,
        session_name: &str,
    ) -> AppResult<SessionReport> {
        if self.state() != SessionState::Idle {
            return Err(AppError::Session(
                "a controller records only one session".to_string(),
            ));
        }

        let dir = self.config.session_dir(session_name);
        let stream = match self.open(&dir) {
            Ok(stream) => stream,
            Err(e) => {
                *self.state.write() = SessionState::Stopped;
                return Err(e);
            }
        };

        let mut guard = StreamGuard::new(stream);
        *self.state.write() = SessionState::Recording;
        let mut session = ActiveSession {
            name: session_name.to_string(),
            dir,
            started: Instant::now(),
            cycles: 0,
            writers: Default::default(),
        };
        match policy {
            TerminationPolicy::FixedDuration(secs) => {
                tracing::info!("Recording '{}' for {} seconds", session_name, secs)
            }
            TerminationPolicy::UntilInterrupt => {
                tracing::info!("Recording '{}' until interrupted", session_name)
            }
        }

        let outcome = self.capture_loop(guard.stream_mut(), &mut session, policy);
        let closed = guard.close();
        *self.state.write() = SessionState::Stopped;

        let elapsed = session.started.elapsed();
        tracing::info!(
            "Recording stopped after {} cycles. Duration: {} seconds",
            session.cycles,
            elapsed.as_secs()
        );

        let stop_reason = match outcome {
            Ok(reason) => reason,
            Err(e) => {
                if let Err(close_err) = closed {
                    tracing::warn!("Failed to stop stream after error: {}", close_err);
                }
                tracing::error!("Session '{}' aborted: {}", session_name, e);
                return Err(e);
            }
        };
        closed?;

        Ok(SessionReport {
            session_name: session.name.clone(),
            directory: session.dir.clone(),
            policy,
            stop_reason,
            elapsed_ms: elapsed.as_secs_f64() * 1000.0,
            cycles: session.cycles,
            rows: session.rows(),
        })
    }

    /// Create the session directory and start streaming
    fn open(&self, dir: &Path) -> AppResult<G::Stream> {
        std::fs::create_dir_all(dir)?;
        let stream = self.gateway.open_stream(&self.config.stream)?;
        Ok(stream)
    }

    fn capture_loop(
        &self,
        stream: &mut G::Stream,
        session: &mut ActiveSession,
        policy: TerminationPolicy,
    ) -> AppResult<StopReason> {
        let deadline = policy.duration();
        let honor_interrupt = deadline.is_none() || self.config.interrupt_fixed_duration;
        let mut acquirer = FrameAcquirer::new(stream, self.config.acquire_timeout());

        loop {
            if deadline.is_some_and(|d| session.started.elapsed() >= d) {
                return Ok(StopReason::DurationElapsed);
            }
            if honor_interrupt && self.interrupt.is_requested() {
                tracing::info!("Interrupt received");
                return Ok(StopReason::Interrupted);
            }

            let bundle = acquirer.next_bundle()?;
            session.cycles += 1;
            for (modality, frame) in bundle.frames() {
                let record = features::extract(frame, modality);
                session.writer(modality, self.config.delimiter).append(&record)?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{
        DeviceInfo, Frame, FrameSet, MotionSample, SimulatedGateway, StreamConfig,
    };
    use crate::utils::error::AcquisitionError;
    use parking_lot::Mutex;
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Wait,
        Close,
    }

    enum Step {
        Deliver(FrameSet),
        /// Deliver and raise the interrupt flag, as a Ctrl-C landing mid-wait
        DeliverAndInterrupt(FrameSet),
        Fail,
    }

    /// Gateway replaying a fixed script and logging every stream call
    struct ScriptedGateway {
        steps: Mutex<Option<Vec<Step>>>,
        events: Arc<Mutex<Vec<Event>>>,
        interrupt: InterruptFlag,
    }

    struct ScriptedStream {
        steps: std::vec::IntoIter<Step>,
        events: Arc<Mutex<Vec<Event>>>,
        interrupt: InterruptFlag,
    }

    impl ScriptedGateway {
        fn new(steps: Vec<Step>, interrupt: InterruptFlag) -> Self {
            Self {
                steps: Mutex::new(Some(steps)),
                events: Arc::new(Mutex::new(Vec::new())),
                interrupt,
            }
        }

        fn closes(&self) -> usize {
            self.events.lock().iter().filter(|e| **e == Event::Close).count()
        }
    }

    impl DeviceGateway for ScriptedGateway {
        type Stream = ScriptedStream;

        fn devices(&self) -> Vec<DeviceInfo> {
            vec![DeviceInfo {
                serial_number: "012345678901".into(),
                name: "scripted".into(),
            }]
        }

        fn open_stream(&self, _config: &StreamConfig) -> Result<ScriptedStream, DeviceError> {
            let steps = self.steps.lock().take().ok_or(DeviceError::Busy)?;
            Ok(ScriptedStream {
                steps: steps.into_iter(),
                events: Arc::clone(&self.events),
                interrupt: self.interrupt.clone(),
            })
        }
    }

    impl StreamHandle for ScriptedStream {
        fn wait_for_frames(&mut self, _timeout: Duration) -> Result<FrameSet, AcquisitionError> {
            self.events.lock().push(Event::Wait);
            match self.steps.next() {
                Some(Step::Deliver(set)) => Ok(set),
                Some(Step::DeliverAndInterrupt(set)) => {
                    self.interrupt.request();
                    Ok(set)
                }
                Some(Step::Fail) | None => {
                    Err(AcquisitionError::Disconnected("scripted".into()))
                }
            }
        }

        fn close(&mut self) -> Result<(), DeviceError> {
            self.events.lock().push(Event::Close);
            Ok(())
        }
    }

    fn accel_only(n: u64) -> FrameSet {
        FrameSet {
            motion: vec![Frame::motion(
                Modality::Accel,
                1_700_000_000_000 + n as i64,
                n,
                MotionSample { x: 1.0, y: 0.0, z: 0.0 },
            )],
            ..Default::default()
        }
    }

    fn test_config(root: &Path) -> RecorderConfig {
        RecorderConfig {
            root_dir: root.to_path_buf(),
            acquire_timeout_ms: 500,
            ..Default::default()
        }
    }

    fn small_config(root: &Path) -> RecorderConfig {
        let mut config = test_config(root);
        config.stream.depth.width = 8;
        config.stream.depth.height = 6;
        config.stream.color.width = 8;
        config.stream.color.height = 6;
        config
    }

    fn line_count(path: &Path) -> usize {
        fs::read_to_string(path).unwrap().lines().count()
    }

    #[test]
    fn test_interrupt_closes_stream_once_on_any_iteration() {
        for k in 1..=4u64 {
            let dir = tempdir().unwrap();
            let interrupt = InterruptFlag::new();
            let mut steps: Vec<Step> = (1..k).map(|n| Step::Deliver(accel_only(n))).collect();
            steps.push(Step::DeliverAndInterrupt(accel_only(k)));
            steps.push(Step::Deliver(accel_only(k + 1)));
            let gateway = ScriptedGateway::new(steps, interrupt.clone());
            let events = Arc::clone(&gateway.events);

            let mut controller = SessionController::new(gateway, test_config(dir.path()));
            controller.interrupt = interrupt;
            let report = controller
                .run(TerminationPolicy::UntilInterrupt, "Walk")
                .unwrap();

            let events = events.lock().clone();
            assert_eq!(events.iter().filter(|e| **e == Event::Close).count(), 1);
            assert_eq!(events.last(), Some(&Event::Close));
            assert_eq!(report.stop_reason, StopReason::Interrupted);
            assert_eq!(report.cycles, k);
            assert_eq!(report.rows.get(&Modality::Accel), Some(&k));
            assert_eq!(controller.state(), SessionState::Stopped);
        }
    }

    #[test]
    fn test_acquisition_error_still_closes_stream() {
        let dir = tempdir().unwrap();
        let gateway = ScriptedGateway::new(
            vec![Step::Deliver(accel_only(1)), Step::Fail],
            InterruptFlag::new(),
        );
        let mut controller = SessionController::new(gateway, test_config(dir.path()));

        let err = controller
            .run(TerminationPolicy::UntilInterrupt, "Walk")
            .unwrap_err();

        assert!(matches!(err, AppError::Acquisition(_)));
        assert_eq!(controller.gateway.closes(), 1);
        assert_eq!(controller.state(), SessionState::Stopped);
        let accel = dir.path().join("Walk").join("Walk accel data.csv");
        assert_eq!(line_count(&accel), 2);
    }

    #[test]
    fn test_persistence_error_still_closes_stream() {
        let dir = tempdir().unwrap();
        // A directory where the record file should go makes the open fail
        let blocker = dir.path().join("Walk").join("Walk accel data.csv");
        fs::create_dir_all(&blocker).unwrap();
        let steps = vec![Step::Deliver(accel_only(1))];
        let gateway = ScriptedGateway::new(steps, InterruptFlag::new());
        let mut controller = SessionController::new(gateway, test_config(dir.path()));

        let err = controller
            .run(TerminationPolicy::UntilInterrupt, "Walk")
            .unwrap_err();

        assert!(matches!(err, AppError::Persistence(_)));
        assert_eq!(controller.gateway.closes(), 1);
    }

    #[test]
    fn test_absent_modality_creates_no_file() {
        let dir = tempdir().unwrap();
        let interrupt = InterruptFlag::new();
        let gateway = ScriptedGateway::new(
            vec![
                Step::Deliver(accel_only(1)),
                Step::DeliverAndInterrupt(FrameSet::default()),
            ],
            interrupt.clone(),
        );
        let mut controller = SessionController::new(gateway, test_config(dir.path()));
        controller.interrupt = interrupt;

        let report = controller.run(TerminationPolicy::UntilInterrupt, "Walk").unwrap();

        let session_dir = dir.path().join("Walk");
        assert_eq!(report.cycles, 2);
        assert_eq!(line_count(&session_dir.join("Walk accel data.csv")), 2);
        for missing in ["depth", "color", "gyro"] {
            assert!(!session_dir.join(format!("Walk {missing} data.csv")).exists());
        }
        assert_eq!(report.rows.len(), 1);
    }

    #[test]
    fn test_fixed_duration_elapsed_bounds() {
        let dir = tempdir().unwrap();
        let gateway = SimulatedGateway::new(["012345678901"]);
        let mut controller = SessionController::new(gateway.clone(), small_config(dir.path()));

        let report = controller
            .run(TerminationPolicy::fixed_secs(1).unwrap(), "Bounded")
            .unwrap();

        assert_eq!(report.stop_reason, StopReason::DurationElapsed);
        assert!(report.elapsed_ms >= 1000.0);
        // one 30 fps cycle of overshoot plus scheduling slack
        assert!(report.elapsed_ms < 1000.0 + 500.0);
        assert!(report.cycles > 0);
        assert_eq!(gateway.close_count(), 1);
        assert!(!gateway.is_streaming());
    }

    #[test]
    fn test_fixed_duration_honors_interrupt_when_enabled() {
        let dir = tempdir().unwrap();
        let gateway = SimulatedGateway::new(["012345678901"]).unpaced();
        let mut controller = SessionController::new(gateway.clone(), small_config(dir.path()));
        controller.interrupt_flag().request();

        let report = controller
            .run(TerminationPolicy::fixed_secs(3600).unwrap(), "Stopped")
            .unwrap();

        assert_eq!(report.stop_reason, StopReason::Interrupted);
        assert_eq!(report.cycles, 0);
        assert_eq!(gateway.close_count(), 1);
    }

    #[test]
    fn test_fixed_duration_ignores_interrupt_when_disabled() {
        let dir = tempdir().unwrap();
        let gateway = SimulatedGateway::new(["012345678901"]);
        let mut config = small_config(dir.path());
        config.interrupt_fixed_duration = false;
        let mut controller = SessionController::new(gateway, config);
        controller.interrupt_flag().request();

        let report = controller
            .run(TerminationPolicy::fixed_secs(1).unwrap(), "Bounded")
            .unwrap();

        assert_eq!(report.stop_reason, StopReason::DurationElapsed);
        assert!(report.cycles > 0);
    }

    #[test]
    fn test_rerun_same_name_appends() {
        let dir = tempdir().unwrap();
        let gateway = SimulatedGateway::new(["012345678901"]).unpaced().fail_after(3);
        let path = dir.path().join("Again").join("Again depth data.csv");

        let mut first = SessionController::new(gateway.clone(), small_config(dir.path()));
        assert!(first.run(TerminationPolicy::UntilInterrupt, "Again").is_err());
        let after_first = line_count(&path);
        assert_eq!(after_first, 4);

        let mut second = SessionController::new(gateway.clone(), small_config(dir.path()));
        assert!(second.run(TerminationPolicy::UntilInterrupt, "Again").is_err());

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 7);
        assert_eq!(content.lines().filter(|l| l.starts_with("Timestamp")).count(), 1);
        assert!(content.starts_with("Timestamp;"));
        assert_eq!(gateway.close_count(), 2);
    }

    #[test]
    fn test_controller_runs_once() {
        let dir = tempdir().unwrap();
        let gateway = SimulatedGateway::new(["012345678901"]).unpaced();
        let mut controller = SessionController::new(gateway, small_config(dir.path()));
        controller.interrupt_flag().request();
        controller.run(TerminationPolicy::UntilInterrupt, "Once").unwrap();

        let err = controller
            .run(TerminationPolicy::UntilInterrupt, "Twice")
            .unwrap_err();
        assert!(matches!(err, AppError::Session(_)));
    }

    #[test]
    fn test_open_failure_leaves_controller_stopped() {
        let dir = tempdir().unwrap();
        let gateway = SimulatedGateway::new(["012345678901"]).unpaced();
        let _held = gateway.open_stream(&small_config(dir.path()).stream).unwrap();
        let mut controller = SessionController::new(gateway.clone(), small_config(dir.path()));

        let err = controller
            .run(TerminationPolicy::UntilInterrupt, "Busy")
            .unwrap_err();

        assert!(matches!(err, AppError::Device(DeviceError::Busy)));
        assert_eq!(controller.state(), SessionState::Stopped);
    }

    #[test]
    fn test_all_modalities_recorded() {
        let dir = tempdir().unwrap();
        let gateway = SimulatedGateway::new(["012345678901"]).unpaced().fail_after(2);
        let mut controller = SessionController::new(gateway, small_config(dir.path()));
        let _ = controller.run(TerminationPolicy::UntilInterrupt, "Full");

        let session_dir = dir.path().join("Full");
        for modality in Modality::ALL {
            let path = record_path(&session_dir, "Full", modality);
            let content = fs::read_to_string(&path).unwrap();
            let mut lines = content.lines();
            let header = lines.next().unwrap();
            assert_eq!(header, features::labels_for(modality).join(";"));
            assert_eq!(lines.count(), 2);
        }
    }
}
