//! birdlog - Incremental acoustic bird detection pipeline
//!
//! Walks a tree of field recordings, runs each new one through an external
//! species classifier, joins the detections with the logger's telemetry and
//! appends them to a cumulative CSV dataset.
//!
//! # Architecture
//!
//! The system is built around a processed-file ledger:
//! - A recording is classified at most once, ever
//! - A file enters the ledger only after its rows are in the dataset
//! - Re-running over the same recordings changes nothing
//!
//! # Modules
//!
//! - `adapters`: External classifier integration (BirdNET bridge)
//! - `core`: Batch logic (Pipeline, Dataset, persistence, run lock)
//! - `domain`: Data structures (capture times, detections, dataset rows)
//! - `ingest`: Inputs (Ledger, telemetry index, recording scanner)
//! - `report`: Species by hour activity table
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Classify everything new
//! birdlog run
//!
//! # See what is pending
//! birdlog status
//!
//! # Detections per species and hour
//! birdlog report --species wren
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod ingest;
pub mod report;

// Re-export main types at crate root for convenience
pub use adapters::{BirdnetBridge, BridgeConfig, Classifier, DetectionAdapter, Location};
pub use crate::core::{
    Dataset, MissingSamplePolicy, Pipeline, PipelineContext, PipelineError, PipelineSettings,
    RunSummary,
};
pub use domain::{AudioFile, CaptureTime, DatasetRow, DetectionRecord, EnvironmentalSample};
pub use ingest::{EnvironmentIndex, Ledger, Scanner, ScannerConfig};
pub use report::ActivityTable;
