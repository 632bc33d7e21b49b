//! Capture trait definitions
//!
//! Device-agnostic traits for the camera gateway and its streaming handle.

use super::frame::FrameSet;
use crate::utils::error::{AcquisitionError, DeviceError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Information about a connected camera
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// 12-digit serial number
    pub serial_number: String,

    /// Device name
    pub name: String,
}

/// Video resolution and rate of an image stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 30,
        }
    }
}

/// Streams to enable when opening the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreamConfig {
    /// z16 depth stream
    pub depth: Resolution,

    /// bgr8 color stream
    pub color: Resolution,

    /// Accelerometer at device-default rate
    pub accel: bool,

    /// Gyroscope at device-default rate
    pub gyro: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            depth: Resolution::default(),
            color: Resolution::default(),
            accel: true,
            gyro: true,
        }
    }
}

/// An open, exclusively owned connection to the camera's data streams
pub trait StreamHandle: Send {
    /// Block until the next frame set arrives or `timeout` elapses
    fn wait_for_frames(&mut self, timeout: Duration) -> Result<FrameSet, AcquisitionError>;

    /// Stop streaming and release the device
    fn close(&mut self) -> Result<(), DeviceError>;
}

/// Entry point to the camera hardware
pub trait DeviceGateway {
    type Stream: StreamHandle;

    /// Connected devices
    fn devices(&self) -> Vec<DeviceInfo>;

    /// Check whether a device with this serial number is attached
    fn is_connected(&self, serial_number: &str) -> bool {
        self.devices()
            .iter()
            .any(|d| d.serial_number == serial_number)
    }

    /// Configure and start streaming
    fn open_stream(&self, config: &StreamConfig) -> Result<Self::Stream, DeviceError>;
}
