//! Frame data model
//!
//! Typed frames for the four sensor modalities, the raw frame set a device
//! stream delivers, and the aligned bundle handed to the recorder.

use serde::{Deserialize, Serialize};

/// Kind of data a modality carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModalityKind {
    Image,
    Motion,
}

/// One sensor data stream of the camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Depth,
    Color,
    Accel,
    Gyro,
}

impl Modality {
    /// All modalities, in the order they are processed each cycle
    pub const ALL: [Modality; 4] = [
        Modality::Depth,
        Modality::Color,
        Modality::Accel,
        Modality::Gyro,
    ];

    /// Name used in record file names
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Depth => "depth",
            Modality::Color => "color",
            Modality::Accel => "accel",
            Modality::Gyro => "gyro",
        }
    }

    pub fn kind(&self) -> ModalityKind {
        match self {
            Modality::Depth | Modality::Color => ModalityKind::Image,
            Modality::Accel | Modality::Gyro => ModalityKind::Motion,
        }
    }

    /// Position of this modality in [`Modality::ALL`]
    pub fn index(&self) -> usize {
        match self {
            Modality::Depth => 0,
            Modality::Color => 1,
            Modality::Accel => 2,
            Modality::Gyro => 3,
        }
    }
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw sample buffer of a frame, in the stream's native element type
#[derive(Debug, Clone, PartialEq)]
pub enum SampleBuffer {
    /// 8-bit samples (color channels)
    U8(Vec<u8>),
    /// 16-bit samples (z16 depth)
    U16(Vec<u16>),
    /// Float samples (motion data)
    F32(Vec<f32>),
}

impl SampleBuffer {
    pub fn len(&self) -> usize {
        match self {
            SampleBuffer::U8(v) => v.len(),
            SampleBuffer::U16(v) => v.len(),
            SampleBuffer::F32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Image layout of a depth or color frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub bits_per_pixel: u32,
    pub bytes_per_pixel: u32,
    pub width: u32,
    pub height: u32,
    pub stride_in_bytes: u32,
}

/// One accelerometer or gyroscope reading, in the device's float32 precision
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Modality-specific part of a frame
#[derive(Debug, Clone, PartialEq)]
pub enum FramePayload {
    Image(ImageInfo),
    Motion(MotionSample),
}

/// A single frame delivered by the device
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub modality: Modality,
    pub samples: SampleBuffer,
    /// Device clock, milliseconds since an arbitrary device epoch
    pub timestamp_ms: i64,
    pub frame_number: u64,
    pub payload: FramePayload,
}

impl Frame {
    /// Build an image frame
    pub fn image(
        modality: Modality,
        samples: SampleBuffer,
        timestamp_ms: i64,
        frame_number: u64,
        info: ImageInfo,
    ) -> Self {
        debug_assert_eq!(modality.kind(), ModalityKind::Image);
        Self {
            modality,
            samples,
            timestamp_ms,
            frame_number,
            payload: FramePayload::Image(info),
        }
    }

    /// Build a motion frame; the sample buffer holds the three axis readings
    pub fn motion(
        modality: Modality,
        timestamp_ms: i64,
        frame_number: u64,
        sample: MotionSample,
    ) -> Self {
        debug_assert_eq!(modality.kind(), ModalityKind::Motion);
        Self {
            modality,
            samples: SampleBuffer::F32(vec![sample.x, sample.y, sample.z]),
            timestamp_ms,
            frame_number,
            payload: FramePayload::Motion(sample),
        }
    }
}

/// Everything a stream produced in one wait.
///
/// Image streams occupy their own slot; motion sub-streams arrive
/// interleaved, possibly with several frames of the same category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameSet {
    pub depth: Option<Frame>,
    pub color: Option<Frame>,
    pub motion: Vec<Frame>,
}

impl FrameSet {
    /// Remove and return the first motion frame of the given category.
    ///
    /// Remaining motion frames keep their arrival order.
    pub fn take_first(&mut self, modality: Modality) -> Option<Frame> {
        let pos = self.motion.iter().position(|f| f.modality == modality)?;
        Some(self.motion.remove(pos))
    }
}

/// One acquisition cycle's aligned frames, at most one per modality
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameBundle {
    pub depth: Option<Frame>,
    pub color: Option<Frame>,
    pub accel: Option<Frame>,
    pub gyro: Option<Frame>,
}

impl FrameBundle {
    pub fn get(&self, modality: Modality) -> Option<&Frame> {
        match modality {
            Modality::Depth => self.depth.as_ref(),
            Modality::Color => self.color.as_ref(),
            Modality::Accel => self.accel.as_ref(),
            Modality::Gyro => self.gyro.as_ref(),
        }
    }

    /// Present frames in processing order
    pub fn frames(&self) -> impl Iterator<Item = (Modality, &Frame)> {
        Modality::ALL
            .into_iter()
            .filter_map(move |m| self.get(m).map(|f| (m, f)))
    }

    pub fn is_empty(&self) -> bool {
        self.frames().next().is_none()
    }
}
