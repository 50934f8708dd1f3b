//! Recording discovery.
//!
//! Walks the recordings root for audio files, checks each against the ledger
//! and derives capture times for the ones still pending.

use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ledger::Ledger;
use crate::domain::{
    capture_time_from_path, AudioFile, CaptureTime, CaptureTimeError, FileStatus,
};

/// Errors that can occur while scanning
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Recordings directory does not exist: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Invalid scan pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Cannot derive capture time for {path}: {source}")]
    Timestamp {
        path: String,
        #[source]
        source: CaptureTimeError,
    },
}

/// Configuration for the scanner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Root directory searched recursively
    pub root: PathBuf,

    /// Audio file extension, without the dot (matched case-insensitively)
    pub extension: String,
}

impl ScannerConfig {
    /// Check that the root exists
    pub fn validate(&self) -> Result<(), ScanError> {
        if !self.root.is_dir() {
            return Err(ScanError::DirectoryNotFound(self.root.clone()));
        }
        Ok(())
    }

    fn pattern(&self) -> String {
        let extension = self.extension.trim_start_matches('.');
        format!(
            "{}/**/*.{}",
            Pattern::escape(&self.root.to_string_lossy()),
            Pattern::escape(extension)
        )
    }
}

/// Result of a scan, in discovery order
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub files: Vec<AudioFile>,
}

impl ScanResult {
    /// Files not yet in the ledger, with their capture times
    pub fn pending(&self) -> impl Iterator<Item = (&str, &CaptureTime)> {
        self.files
            .iter()
            .filter_map(|file| Some((file.path.as_str(), file.captured_at()?)))
    }

    pub fn pending_count(&self) -> usize {
        self.pending().count()
    }

    pub fn processed_count(&self) -> usize {
        self.files.len() - self.pending_count()
    }

    pub fn total(&self) -> usize {
        self.files.len()
    }

    /// Consume the result, keeping only pending files
    pub fn into_pending(self) -> Vec<AudioFile> {
        self.files
            .into_iter()
            .filter(|file| !file.is_processed())
            .collect()
    }
}

/// Finds recordings and splits them into processed and pending
pub struct Scanner {
    config: ScannerConfig,
}

impl Scanner {
    pub fn new(config: ScannerConfig) -> Self {
        Self { config }
    }

    /// Get the current configuration
    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Scan the root once.
    ///
    /// Pending files whose names do not parse as timestamps fail the whole
    /// scan. Files already in the ledger are never parsed.
    pub fn scan(&self, ledger: &Ledger) -> Result<ScanResult, ScanError> {
        self.config.validate()?;

        let options = MatchOptions {
            case_sensitive: false,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };

        let mut result = ScanResult::default();

        for entry in glob::glob_with(&self.config.pattern(), options)? {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!("Error accessing entry: {}", e);
                    continue;
                }
            };

            if !path.is_file() {
                continue;
            }

            result.files.push(classify(&path, ledger)?);
        }

        Ok(result)
    }
}

fn classify(path: &Path, ledger: &Ledger) -> Result<AudioFile, ScanError> {
    let identity = path.to_string_lossy().into_owned();

    if ledger.contains(&identity) {
        return Ok(AudioFile {
            path: identity,
            status: FileStatus::Processed,
        });
    }

    let captured_at = capture_time_from_path(path).map_err(|source| ScanError::Timestamp {
        path: identity.clone(),
        source,
    })?;

    Ok(AudioFile {
        path: identity,
        status: FileStatus::Pending { captured_at },
    })
}
