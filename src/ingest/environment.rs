//! Environmental index built from the sensor logger's summary table.
//!
//! The summary CSV has one row per recording with the logger's timestamp,
//! temperature in Celsius and battery voltage. Timestamps go through the same
//! cutover correction as recording filenames so the two can be joined on
//! exact equality.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::domain::{parse_capture_time, CaptureTime, CaptureTimeError, EnvironmentalSample};

/// Errors that can occur loading the environmental index
#[derive(Debug, Error)]
pub enum EnvironmentError {
    #[error("Failed to read summary table {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed summary table: {0}")]
    Csv(#[from] csv::Error),

    #[error("Bad timestamp on summary line {line}: {source}")]
    Timestamp {
        line: usize,
        #[source]
        source: CaptureTimeError,
    },
}

/// Summary table row as written by the logger
#[derive(Debug, Deserialize)]
struct SummaryRecord {
    #[serde(rename = "File Name", default)]
    file_name: Option<String>,

    #[serde(rename = "Timestamp")]
    timestamp: String,

    #[serde(rename = "Temperature (C)")]
    temperature_c: f64,

    #[serde(rename = "Battery Voltage (V)")]
    battery_voltage: f64,
}

/// Exact-match lookup of telemetry by capture time
#[derive(Debug, Clone, Default)]
pub struct EnvironmentIndex {
    samples: BTreeMap<DateTime<Utc>, EnvironmentalSample>,
}

impl EnvironmentIndex {
    /// Load and index the summary table at `path`
    pub async fn load(path: &Path) -> Result<Self, EnvironmentError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| EnvironmentError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        Self::from_reader(bytes.as_slice())
    }

    /// Parse a summary table from any reader.
    ///
    /// Later rows win when two rows share a corrected timestamp.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, EnvironmentError> {
        let mut csv = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut samples = BTreeMap::new();
        for (index, result) in csv.deserialize::<SummaryRecord>().enumerate() {
            let record = result?;
            let time = parse_capture_time(&record.timestamp).map_err(|source| {
                EnvironmentError::Timestamp {
                    // header is line 1
                    line: index + 2,
                    source,
                }
            })?;

            let sample =
                EnvironmentalSample::from_celsius(record.temperature_c, record.battery_voltage);
            if samples.insert(time.with_timezone(&Utc), sample).is_some() {
                debug!(
                    timestamp = %time,
                    file = record.file_name.as_deref().unwrap_or(""),
                    "Duplicate summary timestamp, keeping the later row"
                );
            }
        }

        Ok(Self { samples })
    }

    /// Exact-key lookup; no interpolation
    pub fn get(&self, time: &CaptureTime) -> Option<&EnvironmentalSample> {
        self.samples.get(&time.with_timezone(&Utc))
    }

    /// Number of indexed samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Earliest and latest indexed instants
    pub fn span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let first = self.samples.keys().next()?;
        let last = self.samples.keys().next_back()?;
        Some((*first, *last))
    }
}

impl FromIterator<(CaptureTime, EnvironmentalSample)> for EnvironmentIndex {
    fn from_iter<I: IntoIterator<Item = (CaptureTime, EnvironmentalSample)>>(iter: I) -> Self {
        Self {
            samples: iter
                .into_iter()
                .map(|(time, sample)| (time.with_timezone(&Utc), sample))
                .collect(),
        }
    }
}
