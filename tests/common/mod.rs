//! Shared fixtures for pipeline integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use birdlog::adapters::{AdapterError, Classifier, ClassifyRequest, RawDetection};
use birdlog::core::{
    Pipeline, PipelineContext, PipelineError, PipelineSettings, RunSummary, StatePaths,
};
use birdlog::domain::AudioFile;
use birdlog::ingest::{Scanner, ScannerConfig};
use birdlog::DetectionAdapter;

pub const SUMMARY_HEADER: &str = "File Name,Timestamp,Temperature (C),Battery Voltage (V)";

/// Stand-in for the external model: canned detections per file name, and a
/// log of every path it was asked about
#[derive(Clone, Default)]
pub struct Scripted {
    responses: HashMap<String, Vec<RawDetection>>,
    failures: HashMap<String, String>,
    pub seen: Arc<Mutex<Vec<String>>>,
}

impl Scripted {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, file_name: &str, detections: Vec<RawDetection>) -> Self {
        self.responses.insert(file_name.to_string(), detections);
        self
    }

    pub fn fail(mut self, file_name: &str, message: &str) -> Self {
        self.failures
            .insert(file_name.to_string(), message.to_string());
        self
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Classifier for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn classify(
        &mut self,
        request: &ClassifyRequest,
    ) -> Result<Vec<RawDetection>, AdapterError> {
        self.seen.lock().unwrap().push(request.path.clone());

        let file_name = Path::new(&request.path)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();

        if let Some(message) = self.failures.get(&file_name) {
            return Err(AdapterError::Classifier {
                path: request.path.clone(),
                message: message.clone(),
            });
        }

        Ok(self.responses.get(&file_name).cloned().unwrap_or_default())
    }
}

pub fn detection(name: &str, confidence: f64, plausible: bool) -> RawDetection {
    RawDetection {
        common_name: name.to_string(),
        scientific_name: format!("{} sp.", name),
        confidence,
        start_time: 0.0,
        end_time: 3.0,
        is_predicted_for_location_and_date: plausible,
        label: None,
    }
}

/// A recordings tree plus state files in a temp dir
pub struct Fixture {
    pub temp: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("recordings")).unwrap();
        std::fs::create_dir_all(temp.path().join("data")).unwrap();
        std::fs::write(
            temp.path().join("data").join("SUMMARY.csv"),
            format!("{}\n", SUMMARY_HEADER),
        )
        .unwrap();
        Self { temp }
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn recordings(&self) -> PathBuf {
        self.root().join("recordings")
    }

    /// Create an (empty) recording and return its ledger identity
    pub fn recording(&self, name: &str) -> String {
        let path = self.recordings().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, b"").unwrap();
        path.to_string_lossy().into_owned()
    }

    /// Append a telemetry row
    pub fn telemetry(&self, timestamp: &str, temperature_c: f64, battery_voltage: f64) {
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(self.paths().summary)
            .unwrap();
        writeln!(
            file,
            "x.WAV,{},{},{}",
            timestamp, temperature_c, battery_voltage
        )
        .unwrap();
    }

    pub fn paths(&self) -> StatePaths {
        StatePaths {
            ledger: self.root().join("analysis_tracker.txt"),
            dataset: self.root().join("data").join("bird_data.csv"),
            summary: self.root().join("data").join("SUMMARY.csv"),
        }
    }

    pub fn dataset_text(&self) -> String {
        std::fs::read_to_string(self.paths().dataset).unwrap_or_default()
    }

    pub fn ledger_text(&self) -> String {
        std::fs::read_to_string(self.paths().ledger).unwrap_or_default()
    }

    pub fn scan(&self, ctx: &PipelineContext) -> Vec<AudioFile> {
        Scanner::new(ScannerConfig {
            root: self.recordings(),
            extension: "WAV".to_string(),
        })
        .scan(&ctx.ledger)
        .unwrap()
        .files
    }

    /// Load state, scan and run one batch, the way `birdlog run` does
    pub async fn run(
        &self,
        classifier: Scripted,
        settings: PipelineSettings,
    ) -> (Result<RunSummary, PipelineError>, PipelineContext) {
        let mut ctx = PipelineContext::load(&self.paths()).await.unwrap();
        let files = self.scan(&ctx);

        let adapter = DetectionAdapter::new(Box::new(classifier));
        let mut pipeline = Pipeline::new(adapter, settings);
        let result = pipeline.run(&mut ctx, files).await;
        (result, ctx)
    }
}
