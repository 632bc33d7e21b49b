//! Feature extraction module
//!
//! Summarizes raw frames into fixed-layout rows for the record files.

mod extractor;

pub use extractor::{
    extract, format_timestamp, labels_for, magnitude, orientation, sample_stats, FeatureRecord,
    FieldValue, SampleStats, IMAGE_LABELS, MOTION_LABELS,
};
