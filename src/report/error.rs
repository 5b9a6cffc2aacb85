use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("cannot open {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("write failed")]
    Write {
        #[source]
        source: io::Error,
    },
    #[error("rename {from} -> {to} failed")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("JSON encoding failed")]
    Json(#[from] serde_json::Error),
    #[cfg(feature = "with-csv")]
    #[error("CSV encoding failed")]
    Csv(#[from] csv::Error),
}

impl ReportError {
    pub(crate) fn open(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Open {
            path: path.into(),
            source,
        }
    }

    pub fn write(source: io::Error) -> Self {
        Self::Write { source }
    }
}
