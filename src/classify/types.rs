use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Final status of one address. Closed set: every classification path ends
/// in exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ValidationStatus {
    #[serde(rename = "Valid")]
    Valid,
    #[serde(rename = "Catch-all (Risky)")]
    CatchAll,
    #[serde(rename = "Invalid (Syntax)")]
    InvalidSyntax,
    #[serde(rename = "Invalid (No MX)")]
    NoMx,
    #[serde(rename = "Invalid (Mailbox Not Found)")]
    MailboxNotFound,
    #[serde(rename = "Timeout")]
    Timeout,
    #[serde(rename = "Connection Refused")]
    ConnectionRefused,
    #[serde(rename = "Greylisted")]
    Greylisted,
    #[serde(rename = "Server Unavailable")]
    ServerUnavailable,
}

impl ValidationStatus {
    pub const ALL: [Self; 9] = [
        Self::Valid,
        Self::CatchAll,
        Self::InvalidSyntax,
        Self::NoMx,
        Self::MailboxNotFound,
        Self::Timeout,
        Self::ConnectionRefused,
        Self::Greylisted,
        Self::ServerUnavailable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "Valid",
            Self::CatchAll => "Catch-all (Risky)",
            Self::InvalidSyntax => "Invalid (Syntax)",
            Self::NoMx => "Invalid (No MX)",
            Self::MailboxNotFound => "Invalid (Mailbox Not Found)",
            Self::Timeout => "Timeout",
            Self::ConnectionRefused => "Connection Refused",
            Self::Greylisted => "Greylisted",
            Self::ServerUnavailable => "Server Unavailable",
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Short tag for progress lines.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Valid => "[OK]",
            Self::CatchAll => "[RISKY]",
            Self::InvalidSyntax | Self::NoMx | Self::MailboxNotFound => "[INVALID]",
            Self::Timeout | Self::ConnectionRefused => "[UNREACHABLE]",
            Self::Greylisted | Self::ServerUnavailable => "[RETRY]",
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status plus the human-readable explanation that goes with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub status: ValidationStatus,
    pub detail: String,
}

impl Classification {
    pub fn new(status: ValidationStatus, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }
}

/// The record the rest of the system consumes: one per input address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub email: String,
    pub status: ValidationStatus,
    pub valid: bool,
    pub details: String,
    pub mx_host: String,
    pub attempts: u32,
    pub response_time_ms: f64,
}

impl ValidationResult {
    /// `valid` is derived from `status`, never set independently.
    pub fn new(
        email: impl Into<String>,
        classification: Classification,
        mx_host: impl Into<String>,
        attempts: u32,
        elapsed: Duration,
    ) -> Self {
        let Classification { status, detail } = classification;
        Self {
            email: email.into(),
            status,
            valid: status.is_valid(),
            details: detail,
            mx_host: mx_host.into(),
            attempts: attempts.max(1),
            response_time_ms: (elapsed.as_secs_f64() * 1000.0 * 100.0).round() / 100.0,
        }
    }
}
