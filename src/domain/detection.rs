//! Detection records returned by the species classifier.

/// Label the classifier uses for mechanical/engine noise
pub const ENGINE_LABEL: &str = "Engine";

/// Label engine detections are rewritten to.
///
/// The recorder sits under an approach path, so engine noise is aircraft.
pub const AIRPLANE_LABEL: &str = "Airplane";

/// A single validated detection within one audio file
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionRecord {
    /// Species common name (the dataset label)
    pub common_name: String,

    /// Species scientific name
    pub scientific_name: String,

    /// Classifier confidence in [0, 1]
    pub confidence: f64,

    /// Offset of the detection window start within the file (seconds)
    pub start_offset: f64,

    /// Offset of the detection window end within the file (seconds)
    pub end_offset: f64,

    /// Whether the classifier expects this species at the location and date
    pub plausible: bool,
}

/// Outcome of applying the relabel and plausibility rules to a detection
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Keep the detection (possibly relabelled)
    Keep(DetectionRecord),

    /// Drop the detection: species not expected here at this time
    Implausible(DetectionRecord),
}

impl DetectionRecord {
    /// Apply the domain rules.
    ///
    /// Engine detections become airplanes and are kept whatever their
    /// plausibility flag says; anything else implausible is dropped.
    pub fn triage(mut self) -> Verdict {
        if self.common_name == ENGINE_LABEL {
            self.common_name = AIRPLANE_LABEL.to_string();
            return Verdict::Keep(self);
        }

        if self.plausible {
            Verdict::Keep(self)
        } else {
            Verdict::Implausible(self)
        }
    }
}
