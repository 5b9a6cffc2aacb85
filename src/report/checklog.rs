use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classify::ValidationStatus;

use super::error::ReportError;

pub const DEFAULT_CHECK_LOG: &str = "logs/checks.ndjson";

/// One line of the check log: a single session against one MX host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckRecord {
    pub mx_host: String,
    pub timestamp: DateTime<Utc>,
    /// The server gave a verdict on the recipient (accepted or rejected).
    pub success: bool,
    pub latency_ms: f64,
    pub status: ValidationStatus,
}

/// Append-only NDJSON log read by external monitoring. Records are
/// buffered; [`CheckLog::flush`] pushes them to the file, and dropping the
/// log flushes what is left.
pub struct CheckLog {
    path: PathBuf,
    out: BufWriter<File>,
}

impl CheckLog {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ReportError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ReportError::open(parent, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| ReportError::open(&path, e))?;
        Ok(Self {
            path,
            out: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, record: &CheckRecord) -> Result<(), ReportError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        self.out.write_all(&line).map_err(ReportError::write)
    }

    pub fn flush(&mut self) -> Result<(), ReportError> {
        self.out.flush().map_err(ReportError::write)
    }
}
