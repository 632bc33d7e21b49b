//! Simulated depth camera
//!
//! Produces deterministic synthetic depth, color and IMU frames at the
//! configured rate. Used when no hardware backend is available and by the
//! recorder tests.

use super::frame::{Frame, FrameSet, ImageInfo, Modality, MotionSample, SampleBuffer};
use super::traits::{DeviceGateway, DeviceInfo, Resolution, StreamConfig, StreamHandle};
use crate::utils::error::{AcquisitionError, DeviceError};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const STANDARD_GRAVITY: f64 = 9.80665;

/// Gyro frames delivered per frame set; the IMU runs faster than the cameras
const GYRO_PER_SET: u64 = 2;

/// Gateway exposing one or more simulated devices
#[derive(Debug, Clone)]
pub struct SimulatedGateway {
    devices: Vec<DeviceInfo>,
    streaming: Arc<AtomicBool>,
    closes: Arc<AtomicUsize>,
    fail_after: Option<u64>,
    paced: bool,
}

impl SimulatedGateway {
    pub fn new<I, S>(serials: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let devices = serials
            .into_iter()
            .map(|serial| DeviceInfo {
                serial_number: serial.into(),
                name: "Simulated Depth Camera".to_string(),
            })
            .collect();
        Self {
            devices,
            streaming: Arc::new(AtomicBool::new(false)),
            closes: Arc::new(AtomicUsize::new(0)),
            fail_after: None,
            paced: true,
        }
    }

    /// Make streams report a disconnection after delivering `sets` frame sets
    pub fn fail_after(mut self, sets: u64) -> Self {
        self.fail_after = Some(sets);
        self
    }

    /// Deliver frame sets immediately instead of at the configured rate
    pub fn unpaced(mut self) -> Self {
        self.paced = false;
        self
    }

    /// Whether a stream is currently open
    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::SeqCst)
    }

    /// Number of streams closed so far
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl DeviceGateway for SimulatedGateway {
    type Stream = SimulatedStream;

    fn devices(&self) -> Vec<DeviceInfo> {
        self.devices.clone()
    }

    fn open_stream(&self, config: &StreamConfig) -> Result<SimulatedStream, DeviceError> {
        if self.devices.is_empty() {
            return Err(DeviceError::NotFound("any".to_string()));
        }
        for res in [config.depth, config.color] {
            if res.width == 0 || res.height == 0 || res.fps == 0 {
                return Err(DeviceError::Config(format!(
                    "unsupported profile {}x{} @ {}fps",
                    res.width, res.height, res.fps
                )));
            }
        }
        if self.streaming.swap(true, Ordering::SeqCst) {
            return Err(DeviceError::Busy);
        }

        tracing::info!(
            "Simulated stream started: depth {}x{} @ {}fps, color {}x{} @ {}fps, accel={}, gyro={}",
            config.depth.width,
            config.depth.height,
            config.depth.fps,
            config.color.width,
            config.color.height,
            config.color.fps,
            config.accel,
            config.gyro,
        );

        Ok(SimulatedStream {
            config: config.clone(),
            streaming: Arc::clone(&self.streaming),
            closes: Arc::clone(&self.closes),
            closed: false,
            opened_at: Instant::now(),
            clock_origin_ms: Utc::now().timestamp_millis(),
            sets_delivered: 0,
            motion_counter: 0,
            fail_after: self.fail_after,
            paced: self.paced,
        })
    }
}

/// Stream handle of a [`SimulatedGateway`]
#[derive(Debug)]
pub struct SimulatedStream {
    config: StreamConfig,
    streaming: Arc<AtomicBool>,
    closes: Arc<AtomicUsize>,
    closed: bool,
    opened_at: Instant,
    clock_origin_ms: i64,
    sets_delivered: u64,
    motion_counter: u64,
    fail_after: Option<u64>,
    paced: bool,
}

impl SimulatedStream {
    fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.config.depth.fps.max(self.config.color.fps)))
    }

    fn device_clock_ms(&self) -> i64 {
        self.clock_origin_ms + self.opened_at.elapsed().as_millis() as i64
    }

    fn next_motion_number(&mut self) -> u64 {
        self.motion_counter += 1;
        self.motion_counter
    }

    fn build_set(&mut self) -> FrameSet {
        let n = self.sets_delivered;
        let timestamp_ms = self.device_clock_ms();
        let mut motion = Vec::new();

        if self.config.accel {
            let number = self.next_motion_number();
            motion.push(Frame::motion(Modality::Accel, timestamp_ms, number, accel_sample(n)));
        }
        if self.config.gyro {
            for k in 0..GYRO_PER_SET {
                let number = self.next_motion_number();
                motion.push(Frame::motion(
                    Modality::Gyro,
                    timestamp_ms,
                    number,
                    gyro_sample(n * GYRO_PER_SET + k),
                ));
            }
        }

        FrameSet {
            depth: Some(depth_frame(self.config.depth, timestamp_ms, n)),
            color: Some(color_frame(self.config.color, timestamp_ms, n)),
            motion,
        }
    }
}

impl StreamHandle for SimulatedStream {
    fn wait_for_frames(&mut self, timeout: Duration) -> Result<FrameSet, AcquisitionError> {
        if self.closed {
            return Err(AcquisitionError::Closed);
        }
        if self.fail_after.is_some_and(|limit| self.sets_delivered >= limit) {
            return Err(AcquisitionError::Disconnected(
                "simulated device unplugged".to_string(),
            ));
        }
        if self.paced {
            let interval = self.frame_interval();
            if interval > timeout {
                std::thread::sleep(timeout);
                return Err(AcquisitionError::Timeout(timeout));
            }
            std::thread::sleep(interval);
        }

        let set = self.build_set();
        self.sets_delivered += 1;
        Ok(set)
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.streaming.store(false, Ordering::SeqCst);
        self.closes.fetch_add(1, Ordering::SeqCst);
        tracing::info!("Simulated stream stopped after {} frame sets", self.sets_delivered);
        Ok(())
    }
}

impl Drop for SimulatedStream {
    fn drop(&mut self) {
        if !self.closed {
            // Release the device even if the owner forgot to stop it
            self.streaming.store(false, Ordering::SeqCst);
        }
    }
}

fn depth_frame(res: Resolution, timestamp_ms: i64, n: u64) -> Frame {
    let (w, h) = (res.width as usize, res.height as usize);
    let mut samples = Vec::with_capacity(w * h);
    for y in 0..h {
        for x in 0..w {
            // Tilted plane between 0.3 m and 4.3 m, drifting with the frame index
            samples.push(300 + ((x + y + n as usize) % 4000) as u16);
        }
    }
    let info = ImageInfo {
        bits_per_pixel: 16,
        bytes_per_pixel: 2,
        width: res.width,
        height: res.height,
        stride_in_bytes: res.width * 2,
    };
    Frame::image(Modality::Depth, SampleBuffer::U16(samples), timestamp_ms, n + 1, info)
}

fn color_frame(res: Resolution, timestamp_ms: i64, n: u64) -> Frame {
    let (w, h) = (res.width as usize, res.height as usize);
    let mut samples = Vec::with_capacity(w * h * 3);
    for y in 0..h {
        for x in 0..w {
            samples.push(((x + n as usize) % 256) as u8);
            samples.push(((y + n as usize) % 256) as u8);
            samples.push(((x ^ y) % 256) as u8);
        }
    }
    let info = ImageInfo {
        bits_per_pixel: 24,
        bytes_per_pixel: 3,
        width: res.width,
        height: res.height,
        stride_in_bytes: res.width * 3,
    };
    Frame::image(Modality::Color, SampleBuffer::U8(samples), timestamp_ms, n + 1, info)
}

fn accel_sample(n: u64) -> MotionSample {
    let t = n as f64 * 0.1;
    MotionSample {
        x: (0.05 * t.sin()) as f32,
        y: -STANDARD_GRAVITY as f32,
        z: (0.02 * t.cos()) as f32,
    }
}

fn gyro_sample(n: u64) -> MotionSample {
    let t = n as f64 * 0.05;
    MotionSample {
        x: (0.01 * t.sin()) as f32,
        y: 0.0,
        z: (-0.01 * t.cos()) as f32,
    }
}
