//! Maps raw probe outcomes to the final [`ValidationStatus`].
//!
//! The mapping is total: syntax failures, resolution failures and every
//! [`ProbeOutcome`] variant land on exactly one status.

mod catchall;
mod types;

pub use catchall::CatchAllPolicy;
pub use types::{Classification, ValidationResult, ValidationStatus};

use crate::mx::MxError;
use crate::smtp_verify::{ProbeOutcome, SessionState};
use crate::validator::SyntaxError;

use ValidationStatus as Status;

/// Temporary-defer codes servers use for greylisting.
const GREYLIST_CODES: [u16; 3] = [450, 451, 452];

pub fn classify_syntax(err: &SyntaxError) -> Classification {
    Classification::new(Status::InvalidSyntax, format!("Invalid email format: {err}"))
}

/// A DNS timeout keeps its own status so it is never confused with a
/// missing MX; everything else means the domain cannot receive mail.
pub fn classify_resolution(err: &MxError) -> Classification {
    if err.is_timeout() {
        Classification::new(Status::Timeout, err.to_string())
    } else {
        Classification::new(
            Status::NoMx,
            format!("No MX records found for domain ({err})"),
        )
    }
}

/// Catch-all is only considered for an accepted recipient: a rejection,
/// timeout or refusal on a catch-all provider keeps its own status.
pub fn classify_probe(
    outcome: &ProbeOutcome,
    domain: &str,
    policy: &CatchAllPolicy,
) -> Classification {
    match outcome {
        ProbeOutcome::Accepted { .. } if policy.is_catch_all(domain) => Classification::new(
            Status::CatchAll,
            format!("Provider {domain} uses catch-all policy. Cannot verify existence."),
        ),
        ProbeOutcome::Accepted { reply } => Classification::new(
            Status::Valid,
            format!("Email accepted by server ({})", reply.code),
        ),
        ProbeOutcome::Rejected { reply } => Classification::new(
            Status::MailboxNotFound,
            format!("Server rejected (code {}): {}", reply.code, reply.text()),
        ),
        ProbeOutcome::Timeout { state } => Classification::new(
            Status::Timeout,
            match state {
                SessionState::Idle => {
                    "Connection timeout. Server may be blocking validation attempts.".to_string()
                }
                other => format!("Server stopped answering (state {other:?})"),
            },
        ),
        ProbeOutcome::ConnectionRefused { message } => Classification::new(
            Status::ConnectionRefused,
            format!("Port 25 blocked or host unreachable ({message}). Use a host with a clean IP."),
        ),
        ProbeOutcome::Transient {
            code: Some(code),
            message,
        } if GREYLIST_CODES.contains(code) => Classification::new(
            Status::Greylisted,
            format!("Server is greylisting (code {code}). Retry later. {message}")
                .trim_end()
                .to_string(),
        ),
        ProbeOutcome::Transient { code, message } => Classification::new(
            Status::ServerUnavailable,
            match code {
                Some(code) => format!("Unexpected SMTP code {code}: {message}"),
                None => message.clone(),
            },
        ),
    }
}
