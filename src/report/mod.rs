//! Result stream writer and check log.

mod checklog;
mod error;
mod writer;

pub use checklog::{CheckLog, CheckRecord, DEFAULT_CHECK_LOG};
pub use error::ReportError;
pub use writer::{Destination, OrderedResults, OutputFormat, ResultSink, ResultWriter};
