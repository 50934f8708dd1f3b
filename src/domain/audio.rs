//! Audio files discovered under the recordings root.

use super::capture::CaptureTime;

/// Processing state of a discovered file
#[derive(Debug, Clone, PartialEq)]
pub enum FileStatus {
    /// Already in the ledger; never handed to the classifier again
    Processed,

    /// Not yet processed, with its corrected capture time
    Pending { captured_at: CaptureTime },
}

/// An audio file identified by its path string
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFile {
    /// Path identity (the exact string stored in the ledger)
    pub path: String,

    pub status: FileStatus,
}

impl AudioFile {
    pub fn is_processed(&self) -> bool {
        matches!(self.status, FileStatus::Processed)
    }

    /// Capture time, if the file is still pending
    pub fn captured_at(&self) -> Option<&CaptureTime> {
        match &self.status {
            FileStatus::Pending { captured_at } => Some(captured_at),
            FileStatus::Processed => None,
        }
    }
}
