//! Rows of the cumulative dataset.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::capture::CaptureTime;
use super::detection::DetectionRecord;
use super::telemetry::EnvironmentalSample;

/// Column header of the dataset CSV, in order
pub const DATASET_HEADERS: [&str; 7] = [
    "Bird_Species",
    "Timestamp",
    "Start_Offset",
    "Confidence",
    "Temperature",
    "Filename",
    "Battery_Voltage",
];

/// One persisted detection merged with telemetry.
///
/// Field order matches [`DATASET_HEADERS`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRow {
    #[serde(rename = "Bird_Species")]
    pub species: String,

    /// Capture time of the source file (not of the detection window)
    #[serde(rename = "Timestamp")]
    pub timestamp: DateTime<FixedOffset>,

    #[serde(rename = "Start_Offset")]
    pub start_offset: f64,

    #[serde(rename = "Confidence")]
    pub confidence: f64,

    /// Degrees Fahrenheit
    #[serde(rename = "Temperature")]
    pub temperature_f: f64,

    /// Ledger identity of the source recording
    #[serde(rename = "Filename")]
    pub source_path: String,

    #[serde(rename = "Battery_Voltage")]
    pub battery_voltage: f64,
}

impl DatasetRow {
    /// Merge a kept detection with its file's capture time and telemetry
    pub fn merge(
        detection: DetectionRecord,
        captured_at: &CaptureTime,
        sample: &EnvironmentalSample,
        source_path: &str,
    ) -> Self {
        Self {
            species: detection.common_name,
            timestamp: captured_at.fixed_offset(),
            start_offset: detection.start_offset,
            confidence: detection.confidence,
            temperature_f: sample.temperature_f,
            source_path: source_path.to_string(),
            battery_voltage: sample.battery_voltage,
        }
    }
}
