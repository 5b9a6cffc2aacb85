use std::io;

use thiserror::Error;
use tokio::task::JoinError;

use crate::report::ReportError;

/// Conditions that abort a whole run. Per-address failures never surface
/// here; they become a `ValidationResult`.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("reading input failed")]
    Input {
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("result aggregation stopped unexpectedly")]
    Aggregator(#[from] JoinError),
}
