//! Per-frame feature extraction
//!
//! Reduces a frame to one row of scalar fields: when it was captured, its
//! sequence number, buffer statistics, and either the image layout or the
//! motion vector with its orientation and magnitude.

use crate::capture::frame::{
    Frame, FramePayload, ImageInfo, Modality, MotionSample, SampleBuffer,
};
use chrono::{Local, TimeZone};
use std::fmt;

const COMMON_LABELS: [&str; 5] = ["Timestamp", "Frame number", "Minimum", "Mean", "Maximum"];

/// Column labels of depth and color records
pub const IMAGE_LABELS: [&str; 10] = [
    COMMON_LABELS[0],
    COMMON_LABELS[1],
    COMMON_LABELS[2],
    COMMON_LABELS[3],
    COMMON_LABELS[4],
    "Bits per pixel",
    "Bytes per pixel",
    "Width",
    "Height",
    "Stride in bytes",
];

/// Column labels of accel and gyro records
pub const MOTION_LABELS: [&str; 10] = [
    COMMON_LABELS[0],
    COMMON_LABELS[1],
    COMMON_LABELS[2],
    COMMON_LABELS[3],
    COMMON_LABELS[4],
    "X",
    "Y",
    "Z",
    "Orientation",
    "Magnitude",
];

/// One scalar cell of a record
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Int(i64),
    Float(f64),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Int(v) => write!(f, "{v}"),
            // Keep a decimal point on whole floats so columns stay typed
            FieldValue::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{v:.1}"),
            FieldValue::Float(v) => write!(f, "{v}"),
        }
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        FieldValue::Int(i64::from(v))
    }
}

/// Values of one row plus the matching column labels
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    pub values: Vec<FieldValue>,
    pub labels: &'static [&'static str],
}

/// Minimum, mean and maximum of a sample buffer
#[derive(Debug, Clone, PartialEq)]
pub struct SampleStats {
    pub min: FieldValue,
    /// Rounded to two decimals
    pub mean: f64,
    pub max: FieldValue,
}

/// Extraction routine for one modality
struct Extraction {
    labels: &'static [&'static str],
    extra: fn(&Frame) -> Vec<FieldValue>,
}

const IMAGE_EXTRACTION: Extraction = Extraction {
    labels: &IMAGE_LABELS,
    extra: image_fields,
};

const MOTION_EXTRACTION: Extraction = Extraction {
    labels: &MOTION_LABELS,
    extra: motion_fields,
};

fn dispatch(modality: Modality) -> &'static Extraction {
    match modality {
        Modality::Depth | Modality::Color => &IMAGE_EXTRACTION,
        Modality::Accel | Modality::Gyro => &MOTION_EXTRACTION,
    }
}

/// Column labels written for a modality
pub fn labels_for(modality: Modality) -> &'static [&'static str] {
    dispatch(modality).labels
}

/// Compute the record for `frame`, interpreted as `modality`
pub fn extract(frame: &Frame, modality: Modality) -> FeatureRecord {
    debug_assert_eq!(frame.modality, modality, "frame routed to the wrong extractor");

    let extraction = dispatch(modality);
    let stats = sample_stats(&frame.samples);

    let mut values = Vec::with_capacity(extraction.labels.len());
    values.push(FieldValue::Text(format_timestamp(frame.timestamp_ms)));
    values.push(FieldValue::Int(frame.frame_number as i64));
    values.push(stats.min);
    values.push(FieldValue::Float(stats.mean));
    values.push(stats.max);
    values.extend((extraction.extra)(frame));

    debug_assert_eq!(values.len(), extraction.labels.len());
    FeatureRecord {
        values,
        labels: extraction.labels,
    }
}

fn image_fields(frame: &Frame) -> Vec<FieldValue> {
    match &frame.payload {
        FramePayload::Image(info) => image_values(info),
        FramePayload::Motion(_) => {
            tracing::error!(
                "{} frame {} carries motion data",
                frame.modality,
                frame.frame_number
            );
            image_values(&ImageInfo {
                bits_per_pixel: 0,
                bytes_per_pixel: 0,
                width: 0,
                height: 0,
                stride_in_bytes: 0,
            })
        }
    }
}

fn image_values(info: &ImageInfo) -> Vec<FieldValue> {
    vec![
        info.bits_per_pixel.into(),
        info.bytes_per_pixel.into(),
        info.width.into(),
        info.height.into(),
        info.stride_in_bytes.into(),
    ]
}

fn motion_fields(frame: &Frame) -> Vec<FieldValue> {
    let sample = match &frame.payload {
        FramePayload::Motion(sample) => *sample,
        FramePayload::Image(_) => {
            tracing::error!(
                "{} frame {} carries image data",
                frame.modality,
                frame.frame_number
            );
            MotionSample {
                x: 0.0,
                y: 0.0,
                z: 0.0,
            }
        }
    };
    vec![
        FieldValue::Float(f64::from(sample.x)),
        FieldValue::Float(f64::from(sample.y)),
        FieldValue::Float(f64::from(sample.z)),
        FieldValue::Float(orientation(&sample)),
        FieldValue::Float(magnitude(&sample)),
    ]
}

/// Angle of the x axis against the y-z plane, in radians
pub fn orientation(sample: &MotionSample) -> f64 {
    let (x, y, z) = widen(sample);
    x.atan2(y.hypot(z))
}

/// Euclidean norm of the motion vector
pub fn magnitude(sample: &MotionSample) -> f64 {
    let (x, y, z) = widen(sample);
    x.hypot(y).hypot(z)
}

fn widen(sample: &MotionSample) -> (f64, f64, f64) {
    (f64::from(sample.x), f64::from(sample.y), f64::from(sample.z))
}

/// Render a device-clock timestamp in local time as `YYYYMMDD_HHMMSS_mmm`
pub fn format_timestamp(timestamp_ms: i64) -> String {
    let millis = timestamp_ms.rem_euclid(1000);
    match Local.timestamp_millis_opt(timestamp_ms).single() {
        Some(dt) => format!("{}_{:03}", dt.format("%Y%m%d_%H%M%S"), millis),
        None => format!("{timestamp_ms}"),
    }
}

/// Minimum, mean and maximum of the buffer.
///
/// An empty buffer is reported as all zeros.
pub fn sample_stats(samples: &SampleBuffer) -> SampleStats {
    if samples.is_empty() {
        tracing::warn!("Empty sample buffer, reporting zero statistics");
        return SampleStats {
            min: FieldValue::Int(0),
            mean: 0.0,
            max: FieldValue::Int(0),
        };
    }

    match samples {
        SampleBuffer::U8(v) => int_stats(v.iter().map(|&s| i64::from(s)), v.len()),
        SampleBuffer::U16(v) => int_stats(v.iter().map(|&s| i64::from(s)), v.len()),
        SampleBuffer::F32(v) => {
            let (mut min, mut max, mut sum) = (f64::INFINITY, f64::NEG_INFINITY, 0.0);
            for &s in v {
                let s = f64::from(s);
                min = min.min(s);
                max = max.max(s);
                sum += s;
            }
            SampleStats {
                min: FieldValue::Float(min),
                mean: round2(sum / v.len() as f64),
                max: FieldValue::Float(max),
            }
        }
    }
}

fn int_stats(iter: impl Iterator<Item = i64>, len: usize) -> SampleStats {
    let (mut min, mut max, mut sum) = (i64::MAX, i64::MIN, 0i64);
    for s in iter {
        min = min.min(s);
        max = max.max(s);
        sum += s;
    }
    SampleStats {
        min: FieldValue::Int(min),
        mean: round2(sum as f64 / len as f64),
        max: FieldValue::Int(max),
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
