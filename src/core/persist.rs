//! Whole-file persistence of the dataset and ledger.
//!
//! Every write goes to a temp file in the destination directory and is then
//! renamed over the target, so readers only ever see the old or the new file.
//! The dataset is written before the ledger: after a crash between the two
//! the ledger can only lag the dataset, and [`crate::core::Dataset::source_paths`]
//! lets the next run catch it up.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

use crate::core::dataset::{Dataset, DatasetError};
use crate::ingest::ledger::{Ledger, LedgerError};

/// Errors from a combined save
#[derive(Debug, Error)]
pub enum PersistError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Save the cumulative dataset, then the ledger.
///
/// Files already in sync with memory are left untouched. Returns whether
/// anything was written.
pub async fn save(dataset: &mut Dataset, ledger: &mut Ledger) -> Result<bool, PersistError> {
    let mut wrote = false;

    if dataset.is_dirty() {
        dataset.save().await?;
        wrote = true;
    }
    if ledger.is_dirty() {
        ledger.flush().await?;
        wrote = true;
    }

    if wrote {
        debug!(
            rows = dataset.len(),
            ledger_entries = ledger.len(),
            "Checkpoint written"
        );
    }
    Ok(wrote)
}

/// Atomically replace `path` with `contents`
pub async fn replace_file(path: &Path, contents: Vec<u8>) -> io::Result<()> {
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || replace_file_blocking(&path, &contents))
        .await
        .map_err(io::Error::other)?
}

fn replace_file_blocking(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(contents)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}
