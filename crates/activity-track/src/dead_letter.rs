//! Dead-letter sink for batches that were acknowledged but could not be
//! persisted.
//!
//! Each failure becomes one JSON line so the batch can be replayed by hand.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use track_agent::EventRecord;

/// A batch that failed persistence after it was acknowledged
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetter {
    /// When persistence failed
    pub failed_at: DateTime<Utc>,
    /// Error message from the store
    pub error: String,
    /// The acknowledged records, in submission order
    pub records: Vec<EventRecord>,
}

impl DeadLetter {
    pub fn new(error: impl ToString, records: Vec<EventRecord>) -> Self {
        Self {
            failed_at: Utc::now(),
            error: error.to_string(),
            records,
        }
    }
}

#[derive(Debug, Default)]
pub struct DeadLetterSink {
    path: Option<PathBuf>,
    // Serializes appends from concurrent persistence tasks
    write_lock: Mutex<()>,
}

impl DeadLetterSink {
    /// Sink appending to `path`
    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            write_lock: Mutex::new(()),
        }
    }

    /// Sink that only logs
    pub fn log_only() -> Self {
        Self::default()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record a failed batch. Never panics; write failures are logged.
    pub fn push(&self, letter: &DeadLetter) {
        let Some(path) = &self.path else {
            tracing::error!(
                records = letter.records.len(),
                error = %letter.error,
                "dropping batch that failed persistence (no dead-letter file configured)"
            );
            return;
        };

        match self.append(path, letter) {
            Ok(()) => tracing::warn!(
                records = letter.records.len(),
                path = %path.display(),
                "batch written to dead-letter file"
            ),
            Err(e) => tracing::error!(
                records = letter.records.len(),
                path = %path.display(),
                "failed to write dead-letter entry: {e}"
            ),
        }
    }

    fn append(&self, path: &Path, letter: &DeadLetter) -> Result<()> {
        let mut line = serde_json::to_vec(letter)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(&line)?;
        Ok(())
    }
}

/// Read every entry from a dead-letter file
pub fn read_all(path: &Path) -> Result<Vec<DeadLetter>> {
    let content = std::fs::read_to_string(path)?;
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| Ok(serde_json::from_str(line)?))
        .collect()
}
