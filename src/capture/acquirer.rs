//! Frame acquisition
//!
//! Turns whatever a stream delivers in one wait into an aligned bundle.

use super::frame::{FrameBundle, FrameSet, Modality};
use super::traits::StreamHandle;
use crate::utils::error::AcquisitionError;
use std::time::Duration;

/// Synchronous adapter over a borrowed stream handle
pub struct FrameAcquirer<'a, S: StreamHandle> {
    stream: &'a mut S,
    timeout: Duration,
}

impl<'a, S: StreamHandle> FrameAcquirer<'a, S> {
    pub fn new(stream: &'a mut S, timeout: Duration) -> Self {
        Self { stream, timeout }
    }

    /// Block until the next frame set and pick one frame per modality.
    ///
    /// Errors from the stream are passed through untouched.
    pub fn next_bundle(&mut self) -> Result<FrameBundle, AcquisitionError> {
        let set = self.stream.wait_for_frames(self.timeout)?;
        Ok(align(set))
    }
}

/// Depth and color come from their own slots; motion is the first frame of
/// each category among the interleaved motion frames.
fn align(mut set: FrameSet) -> FrameBundle {
    let accel = set.take_first(Modality::Accel);
    let gyro = set.take_first(Modality::Gyro);
    FrameBundle {
        depth: set.depth,
        color: set.color,
        accel,
        gyro,
    }
}
