//! Core batch logic.
//!
//! This module contains:
//! - Dataset: the cumulative detection table
//! - Pipeline: per-file merge and accumulate
//! - Persist: whole-file saves of dataset and ledger
//! - Progress: remaining-time estimate
//! - Lock: one run at a time

pub mod dataset;
pub mod lock;
pub mod persist;
pub mod pipeline;
pub mod progress;

// Re-export commonly used types
pub use dataset::{Dataset, DatasetError};
pub use lock::{LockError, RunLock};
pub use persist::{replace_file, save, PersistError};
pub use pipeline::{
    reconcile, MissingSamplePolicy, Pipeline, PipelineContext, PipelineError, PipelineSettings,
    RunSummary, StatePaths,
};
pub use progress::{Progress, ProgressTracker};
