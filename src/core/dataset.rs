//! Cumulative detection dataset.
//!
//! Rows are only ever appended. On disk the dataset is a CSV with a fixed
//! header, rewritten whole on every save.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;

use super::persist::replace_file;
use crate::domain::{DatasetRow, DATASET_HEADERS};

/// Errors that can occur with the dataset
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Failed to read dataset {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed dataset {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to encode dataset: {0}")]
    Encode(#[from] csv::Error),

    #[error("Failed to write dataset {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// All rows from previous runs plus the ones appended in this run
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Location of the CSV file
    path: PathBuf,

    rows: Vec<DatasetRow>,

    /// How many rows came from disk at load time
    loaded: usize,

    /// How many rows the file on disk holds
    saved: usize,

    /// Whether the file exists at all
    on_disk: bool,
}

impl Dataset {
    /// Create an empty dataset that will be written to `path`
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            rows: Vec::new(),
            loaded: 0,
            saved: 0,
            on_disk: false,
        }
    }

    /// Load existing rows, treating a missing file as empty
    pub async fn load(path: PathBuf) -> Result<Self, DatasetError> {
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::new(path)),
            Err(source) => return Err(DatasetError::Read { path, source }),
        };

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(bytes.as_slice());

        let rows = match reader.deserialize().collect::<Result<Vec<DatasetRow>, _>>() {
            Ok(rows) => rows,
            Err(source) => return Err(DatasetError::Parse { path, source }),
        };

        let loaded = rows.len();
        Ok(Self {
            path,
            rows,
            loaded,
            saved: loaded,
            on_disk: true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a row
    pub fn push(&mut self, row: DatasetRow) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[DatasetRow] {
        &self.rows
    }

    /// Rows appended since load
    pub fn new_rows(&self) -> &[DatasetRow] {
        &self.rows[self.loaded..]
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether the file on disk is missing or behind
    pub fn is_dirty(&self) -> bool {
        !self.on_disk || self.rows.len() > self.saved
    }

    /// Distinct source recordings referenced by any row
    pub fn source_paths(&self) -> BTreeSet<&str> {
        self.rows.iter().map(|row| row.source_path.as_str()).collect()
    }

    /// Encode the whole dataset as CSV (header always present)
    pub fn to_csv(&self) -> Result<Vec<u8>, DatasetError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());

        writer.write_record(DATASET_HEADERS)?;
        for row in &self.rows {
            writer.serialize(row)?;
        }

        writer.into_inner().map_err(|e| DatasetError::Write {
            path: self.path.clone(),
            source: e.into_error(),
        })
    }

    /// Replace the dataset file with every row
    pub async fn save(&mut self) -> Result<(), DatasetError> {
        let bytes = self.to_csv()?;
        replace_file(&self.path, bytes)
            .await
            .map_err(|source| DatasetError::Write {
                path: self.path.clone(),
                source,
            })?;

        self.saved = self.rows.len();
        self.on_disk = true;
        Ok(())
    }
}
