//! Feature log persistence
//!
//! Best-effort: callers log failures and carry on.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::info;

/// Errors from the feature log
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to open feature log {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write feature log: {0}")]
    Write(#[from] std::io::Error),
}

/// Append-only record of produced features
pub trait FeatureLog: Send + Sync {
    fn log_feature(
        &self,
        timestamp_ms: u32,
        sequence: u16,
        payload: i8,
    ) -> Result<(), StorageError>;
}

/// `timestamp,sequence,payload` lines in a CSV file, flushed per line
#[derive(Debug)]
pub struct CsvFeatureLog {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl CsvFeatureLog {
    /// Open `path` for appending, creating it if needed
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| StorageError::Open {
                path: path.to_owned(),
                source,
            })?;

        info!(?path, "feature log opened");

        Ok(Self {
            path: path.to_owned(),
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FeatureLog for CsvFeatureLog {
    fn log_feature(
        &self,
        timestamp_ms: u32,
        sequence: u16,
        payload: i8,
    ) -> Result<(), StorageError> {
        let mut writer = match self.writer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        writeln!(writer, "{timestamp_ms},{sequence},{payload}")?;
        writer.flush()?;
        Ok(())
    }
}

/// Log that discards everything, used when the real one cannot be opened
#[derive(Debug, Default)]
pub struct NullFeatureLog;

impl FeatureLog for NullFeatureLog {
    fn log_feature(&self, _: u32, _: u16, _: i8) -> Result<(), StorageError> {
        Ok(())
    }
}
