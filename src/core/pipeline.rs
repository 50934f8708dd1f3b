//! Merge and accumulate.
//!
//! Drives one batch: for every pending recording, look up its telemetry,
//! run the classifier, triage the detections and append the merged rows.
//! A file is recorded in the ledger only after all of its rows are in the
//! dataset. State is checkpointed every few files and once more at the end,
//! and whatever completed is saved before a fatal error is returned.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{AdapterError, DetectionAdapter, Location};
use crate::domain::{AudioFile, CaptureTime, DatasetRow, FileStatus, Verdict};
use crate::ingest::{EnvironmentError, EnvironmentIndex, Ledger, LedgerError, ScanError};

use super::dataset::{Dataset, DatasetError};
use super::lock::LockError;
use super::persist::{self, PersistError};
use super::progress::ProgressTracker;

/// Errors that end a batch
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Environment(#[from] EnvironmentError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("Detection failed for {path}: {source}")]
    Classifier {
        path: String,
        #[source]
        source: AdapterError,
    },

    #[error("No environmental sample for {path} at {timestamp}")]
    MissingSample { path: String, timestamp: String },
}

/// What to do when a recording has no matching telemetry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MissingSamplePolicy {
    /// Stop the batch (completed files are still saved)
    #[default]
    Abort,

    /// Warn and leave the file unrecorded so a later run retries it
    Skip,
}

/// Knobs for a batch
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    /// Recording site, passed to the classifier
    pub location: Location,

    /// Inclusive confidence floor
    pub min_confidence: f64,

    pub missing_sample: MissingSamplePolicy,

    /// Save after this many files; 0 saves only at the end
    pub checkpoint_every: usize,

    /// Handle at most this many pending files
    pub limit: Option<usize>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            location: Location {
                latitude: 38.97,
                longitude: -77.25,
            },
            min_confidence: 0.65,
            missing_sample: MissingSamplePolicy::Abort,
            checkpoint_every: 25,
            limit: None,
        }
    }
}

/// Files the pipeline reads and writes
#[derive(Debug, Clone, PartialEq)]
pub struct StatePaths {
    pub ledger: PathBuf,
    pub dataset: PathBuf,
    pub summary: PathBuf,
}

/// Mutable state a batch works against
#[derive(Debug)]
pub struct PipelineContext {
    pub ledger: Ledger,
    pub environment: EnvironmentIndex,
    pub dataset: Dataset,
}

impl PipelineContext {
    pub fn new(ledger: Ledger, environment: EnvironmentIndex, dataset: Dataset) -> Self {
        Self {
            ledger,
            environment,
            dataset,
        }
    }

    /// Load ledger, dataset and telemetry, then reconcile the ledger
    pub async fn load(paths: &StatePaths) -> Result<Self, PipelineError> {
        let ledger = Ledger::load(paths.ledger.clone()).await?;
        let dataset = Dataset::load(paths.dataset.clone()).await?;
        let environment = EnvironmentIndex::load(&paths.summary).await?;

        info!(
            ledger_entries = ledger.len(),
            rows = dataset.len(),
            samples = environment.len(),
            "Loaded state"
        );

        let mut ctx = Self::new(ledger, environment, dataset);
        let recovered = ctx.reconcile();
        if recovered > 0 {
            warn!(
                recovered,
                "Ledger was behind the dataset, recovered entries from row sources"
            );
        }

        Ok(ctx)
    }

    /// Add every dataset source path missing from the ledger.
    ///
    /// A crash between saving the dataset and saving the ledger leaves rows
    /// for files the ledger does not know; without this those files would be
    /// classified again and their rows duplicated.
    pub fn reconcile(&mut self) -> usize {
        reconcile(&self.dataset, &mut self.ledger)
    }
}

/// Catch the ledger up with the dataset's source paths
pub fn reconcile(dataset: &Dataset, ledger: &mut Ledger) -> usize {
    let missing: Vec<String> = dataset
        .source_paths()
        .into_iter()
        .filter(|path| !ledger.contains(path))
        .map(str::to_string)
        .collect();
    ledger.absorb(missing)
}

/// Outcome of a batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Files classified and recorded in the ledger
    pub files_processed: usize,

    /// Files already in the ledger
    pub already_processed: usize,

    /// Rows appended to the dataset
    pub rows_added: usize,

    /// Detections dropped as implausible
    pub detections_dropped: usize,

    /// Files left unrecorded for lack of telemetry
    pub skipped_missing_sample: Vec<String>,

    /// Checkpoints that wrote something
    pub checkpoints: usize,

    pub elapsed: Duration,
}

enum FileOutcome {
    Merged { rows: usize, dropped: usize },
    MissingSample,
}

/// A file that will be handed to the classifier this run
struct PendingFile {
    path: String,
    captured_at: CaptureTime,
}

/// Batch driver
pub struct Pipeline {
    adapter: DetectionAdapter,
    settings: PipelineSettings,
    run_id: Uuid,
}

impl Pipeline {
    pub fn new(adapter: DetectionAdapter, settings: PipelineSettings) -> Self {
        Self {
            adapter,
            settings,
            run_id: Uuid::new_v4(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Process every file not yet in the ledger.
    ///
    /// Files marked processed by the scan, or found in the ledger now, are
    /// never handed to the classifier.
    #[instrument(skip_all, fields(run_id = %self.run_id, classifier = %self.adapter.classifier_name()))]
    pub async fn run(
        &mut self,
        ctx: &mut PipelineContext,
        files: Vec<AudioFile>,
    ) -> Result<RunSummary, PipelineError> {
        let started = Instant::now();

        let mut pending = Vec::new();
        let mut done = 0;
        for file in files {
            match file.status {
                FileStatus::Pending { captured_at } if !ctx.ledger.contains(&file.path) => {
                    pending.push(PendingFile {
                        path: file.path,
                        captured_at,
                    });
                }
                _ => {
                    debug!(path = %file.path, "Already analyzed, skipping");
                    done += 1;
                }
            }
        }
        if let Some(limit) = self.settings.limit {
            pending.truncate(limit);
        }

        let mut summary = RunSummary {
            already_processed: done,
            ..RunSummary::default()
        };
        let mut tracker = ProgressTracker::new(done, pending.len());
        let mut since_checkpoint = 0;

        info!(
            pending = pending.len(),
            already_processed = done,
            "Starting batch"
        );

        for file in &pending {
            let file_started = Instant::now();

            let outcome = match self.process_file(ctx, file).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(path = %file.path, error = %e, "Batch aborted");
                    if let Err(save_err) = self.checkpoint(ctx, &mut summary).await {
                        error!(error = %save_err, "Failed to save completed work");
                    }
                    return Err(e);
                }
            };

            match outcome {
                FileOutcome::Merged { rows, dropped } => {
                    summary.files_processed += 1;
                    summary.rows_added += rows;
                    summary.detections_dropped += dropped;
                    since_checkpoint += 1;
                }
                FileOutcome::MissingSample => {
                    summary.skipped_missing_sample.push(file.path.clone());
                }
            }

            let elapsed = file_started.elapsed();
            let progress = tracker.record(elapsed);
            info!(
                "Analysis of {} took {:.1}s. {}",
                file.path,
                elapsed.as_secs_f64(),
                progress
            );

            if self.settings.checkpoint_every > 0 && since_checkpoint >= self.settings.checkpoint_every
            {
                self.checkpoint(ctx, &mut summary).await?;
                since_checkpoint = 0;
            }
        }

        self.checkpoint(ctx, &mut summary).await?;
        summary.elapsed = started.elapsed();

        info!(
            files = summary.files_processed,
            rows = summary.rows_added,
            dropped = summary.detections_dropped,
            skipped = summary.skipped_missing_sample.len(),
            "Batch complete"
        );

        Ok(summary)
    }

    async fn process_file(
        &mut self,
        ctx: &mut PipelineContext,
        file: &PendingFile,
    ) -> Result<FileOutcome, PipelineError> {
        let captured_at = &file.captured_at;

        let sample = match ctx.environment.get(captured_at) {
            Some(sample) => *sample,
            None => match self.settings.missing_sample {
                MissingSamplePolicy::Abort => {
                    return Err(PipelineError::MissingSample {
                        path: file.path.clone(),
                        timestamp: captured_at.to_rfc3339(),
                    });
                }
                MissingSamplePolicy::Skip => {
                    warn!(
                        path = %file.path,
                        timestamp = %captured_at.to_rfc3339(),
                        "No environmental sample, leaving file for a later run"
                    );
                    return Ok(FileOutcome::MissingSample);
                }
            },
        };

        info!(path = %file.path, "Analyzing");

        let detections = self
            .adapter
            .detect(
                &file.path,
                self.settings.location,
                self.settings.min_confidence,
            )
            .await
            .map_err(|source| PipelineError::Classifier {
                path: file.path.clone(),
                source,
            })?;

        let mut rows = 0;
        let mut dropped = 0;
        for detection in detections {
            match detection.triage() {
                Verdict::Keep(kept) => {
                    ctx.dataset
                        .push(DatasetRow::merge(kept, captured_at, &sample, &file.path));
                    rows += 1;
                }
                Verdict::Implausible(rejected) => {
                    debug!(
                        species = %rejected.common_name,
                        "Not predicted for location and date, skipping"
                    );
                    dropped += 1;
                }
            }
        }

        ctx.ledger.record(file.path.clone());
        Ok(FileOutcome::Merged { rows, dropped })
    }

    async fn checkpoint(
        &self,
        ctx: &mut PipelineContext,
        summary: &mut RunSummary,
    ) -> Result<(), PipelineError> {
        if persist::save(&mut ctx.dataset, &mut ctx.ledger).await? {
            summary.checkpoints += 1;
        }
        Ok(())
    }
}
