use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    #[default]
    Strict,
    Relaxed,
}

/// A syntactically accepted address, split into its parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    /// Trimmed input with the domain lower-cased; this is the identity every
    /// result is tagged with.
    pub original: String,
    pub local: String,
    pub domain: String,
    pub ascii_domain: String,
}

impl EmailAddress {
    /// Address as it is sent in `RCPT TO:<...>`.
    pub fn rcpt_path(&self) -> String {
        format!("{}@{}", self.local, self.ascii_domain)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("empty address")]
    Empty,
    #[error("total length {len} > 254")]
    TooLong { len: usize },
    #[error("must contain exactly one '@'")]
    AtSign,
    #[error("local part length {len} invalid (1..=64)")]
    LocalLength { len: usize },
    #[error("invalid local part ({mode:?} rules)")]
    InvalidLocal { mode: ValidationMode },
    #[error("domain must contain at least one dot")]
    MissingDomainDot,
    #[error("domain punycode conversion failed")]
    Idna,
    #[error("{0}")]
    DomainLabel(String),
    #[error("top-level domain '{0}' is not valid")]
    TopLevelDomain(String),
}
