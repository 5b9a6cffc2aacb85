use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where an SMTP session stands. States only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Connected,
    /// `EHLO` (or `HELO`) accepted.
    Greeted,
    /// `MAIL FROM` accepted.
    SenderOk,
    /// A reply to `RCPT TO` was received.
    RecipientChecked,
    Closed,
}

/// A raw SMTP reply, preserving the numeric status code and message text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpReply {
    pub code: u16,
    pub lines: Vec<String>,
}

impl SmtpReply {
    pub fn is_positive_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }

    pub fn is_permanent_failure(&self) -> bool {
        (500..600).contains(&self.code)
    }

    pub fn text(&self) -> String {
        self.lines.join(" ")
    }
}

impl fmt::Display for SmtpReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.text())
    }
}

/// Raw result of one SMTP session attempt, before classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeOutcome {
    Accepted { reply: SmtpReply },
    Rejected { reply: SmtpReply },
    Transient { code: Option<u16>, message: String },
    Timeout { state: SessionState },
    ConnectionRefused { message: String },
}

impl ProbeOutcome {
    /// Worth another fresh session. A rejection is a definitive answer.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Accepted { .. } | Self::Rejected { .. })
    }

    /// The server gave a verdict on the recipient.
    pub fn is_decisive(&self) -> bool {
        matches!(self, Self::Accepted { .. } | Self::Rejected { .. })
    }

    /// No SMTP conversation took place; the next MX host may do better.
    pub fn is_connect_failure(&self) -> bool {
        matches!(
            self,
            Self::ConnectionRefused { .. }
                | Self::Timeout {
                    state: SessionState::Idle
                }
        )
    }
}

/// One session against one MX host.
#[derive(Debug, Clone)]
pub struct HostAttempt {
    pub mx_host: String,
    pub outcome: ProbeOutcome,
    pub latency: Duration,
    /// Highest state reached before the session was closed.
    pub reached: SessionState,
    pub quit_sent: bool,
    pub transcript: Vec<String>,
}

/// Result of walking the MX list once.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub outcome: ProbeOutcome,
    /// Host whose session produced `outcome` (the last host tried).
    pub mx_host: String,
    pub hosts: Vec<HostAttempt>,
}
