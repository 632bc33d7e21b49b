//! Device capture
//!
//! This module provides the camera gateway traits, the frame data model,
//! frame acquisition, and the simulated device backend.

pub mod acquirer;
pub mod frame;
pub mod simulated;
pub mod traits;

pub use acquirer::FrameAcquirer;
pub use frame::{
    Frame, FrameBundle, FramePayload, FrameSet, ImageInfo, Modality, ModalityKind, MotionSample,
    SampleBuffer,
};
pub use simulated::{SimulatedGateway, SimulatedStream};
pub use traits::{DeviceGateway, DeviceInfo, Resolution, StreamConfig, StreamHandle};
