//! DNS MX resolution for the probe pipeline.
//!
//! The public entry point is [`resolve_mx`], which performs a bounded async
//! lookup through any [`LookupMx`] implementation (the system resolver in
//! production, a stub in tests) and returns hosts in ascending priority.

mod error;
mod options;
mod resolver;
mod types;

pub use error::MxError;
pub use options::MxOptions;
pub use resolver::{LookupFailure, LookupMx, build_resolver, resolve_mx};
pub use types::MxRecord;
