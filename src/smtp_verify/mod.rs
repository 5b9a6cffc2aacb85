//! SMTP deliverability probing.
//!
//! The public entry point is [`probe_hosts`], which drives one minimal SMTP
//! dialogue (`EHLO`, `MAIL FROM`, `RCPT TO`, `QUIT`) per MX host, in
//! priority order, and reports the raw [`ProbeOutcome`] of the session that
//! decided the result. No message is ever transmitted.

mod error;
mod options;
mod probe;
mod session;
mod types;

pub use error::SessionError;
pub use options::ProbeOptions;
pub use probe::{probe_host, probe_hosts};
pub use types::{HostAttempt, ProbeOutcome, ProbeReport, SessionState, SmtpReply};

#[cfg(test)]
pub(crate) mod tests;
