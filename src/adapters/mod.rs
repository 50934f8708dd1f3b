//! Adapter interfaces for the external species classifier.
//!
//! A [`Classifier`] is whatever actually runs the model. The
//! [`DetectionAdapter`] wraps one and owns the contract the pipeline relies
//! on: typed, validated records in classifier order, none below the
//! confidence floor.

pub mod birdnet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::DetectionRecord;

// Re-export the BirdNET bridge
pub use birdnet::{BirdnetBridge, BridgeConfig, OutputSink};

/// Errors from the classifier or its output
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Failed to start classifier '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Classifier I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Classifier exited unexpectedly ({status})")]
    Exited { status: String },

    #[error("Classifier response for {path} has an unexpected shape: {source}")]
    MalformedResponse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Classifier failed on {path}: {message}")]
    Classifier { path: String, message: String },

    #[error("Invalid detection in {path}: {reason}")]
    InvalidDetection { path: String, reason: String },
}

/// Recording site coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// One classification request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifyRequest {
    pub path: String,
    pub lat: f64,
    pub lon: f64,
    pub min_conf: f64,
    pub return_all_detections: bool,
}

/// Detection exactly as the classifier reports it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub common_name: String,
    pub scientific_name: String,
    pub confidence: f64,
    pub start_time: f64,
    pub end_time: f64,
    pub is_predicted_for_location_and_date: bool,

    /// "Scientific_Common" label, informational only
    #[serde(default)]
    pub label: Option<String>,
}

/// Trait for species classifiers.
///
/// Implementations are stateful and not shareable; the pipeline holds the
/// only instance for the whole run.
#[async_trait]
pub trait Classifier: Send {
    /// Human-readable classifier name
    fn name(&self) -> &str;

    /// Run the model over one file
    async fn classify(&mut self, request: &ClassifyRequest)
        -> Result<Vec<RawDetection>, AdapterError>;
}

/// Uniform detection contract over a [`Classifier`]
pub struct DetectionAdapter {
    classifier: Box<dyn Classifier>,
}

impl DetectionAdapter {
    pub fn new(classifier: Box<dyn Classifier>) -> Self {
        Self { classifier }
    }

    /// Name of the wrapped classifier
    pub fn classifier_name(&self) -> &str {
        self.classifier.name()
    }

    /// Detect species in one recording.
    ///
    /// Records come back in classifier order. Anything under `min_confidence`
    /// is removed here even if the classifier ignored the threshold.
    pub async fn detect(
        &mut self,
        path: &str,
        location: Location,
        min_confidence: f64,
    ) -> Result<Vec<DetectionRecord>, AdapterError> {
        let request = ClassifyRequest {
            path: path.to_string(),
            lat: location.latitude,
            lon: location.longitude,
            min_conf: min_confidence,
            return_all_detections: true,
        };

        let raw = self.classifier.classify(&request).await?;

        let mut records = Vec::with_capacity(raw.len());
        for detection in raw {
            let record = validate(path, detection)?;
            if record.confidence >= min_confidence {
                records.push(record);
            }
        }

        Ok(records)
    }
}

fn validate(path: &str, raw: RawDetection) -> Result<DetectionRecord, AdapterError> {
    let invalid = |reason: String| AdapterError::InvalidDetection {
        path: path.to_string(),
        reason,
    };

    if !(0.0..=1.0).contains(&raw.confidence) {
        return Err(invalid(format!("confidence {} outside [0, 1]", raw.confidence)));
    }
    if !raw.start_time.is_finite() || raw.start_time < 0.0 {
        return Err(invalid(format!("start offset {} is negative", raw.start_time)));
    }
    if !raw.end_time.is_finite() || raw.end_time < raw.start_time {
        return Err(invalid(format!(
            "end offset {} precedes start {}",
            raw.end_time, raw.start_time
        )));
    }
    if raw.common_name.trim().is_empty() {
        return Err(invalid("empty species name".to_string()));
    }

    Ok(DetectionRecord {
        common_name: raw.common_name,
        scientific_name: raw.scientific_name,
        confidence: raw.confidence,
        start_offset: raw.start_time,
        end_offset: raw.end_time,
        plausible: raw.is_predicted_for_location_and_date,
    })
}
