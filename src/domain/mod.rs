//! Domain types for the bird detection pipeline.
//!
//! This module contains the core data structures:
//! - Capture times and the cutover correction
//! - Detection records and the relabel/plausibility rule
//! - Environmental samples
//! - Dataset rows and discovered audio files

pub mod audio;
pub mod capture;
pub mod detection;
pub mod row;
pub mod telemetry;

// Re-export commonly used types
pub use audio::{AudioFile, FileStatus};
pub use capture::{
    capture_time_from_path, correct_mislabelled_utc, cutover, parse_capture_time, CaptureTime,
    CaptureTimeError, EASTERN,
};
pub use detection::{DetectionRecord, Verdict, AIRPLANE_LABEL, ENGINE_LABEL};
pub use row::{DatasetRow, DATASET_HEADERS};
pub use telemetry::{celsius_to_fahrenheit, EnvironmentalSample};
