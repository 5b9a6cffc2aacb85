//! Syntax pre-check for candidate addresses.
//!
//! [`parse_address`] never touches the network; anything it rejects is
//! reported as `Invalid (Syntax)` without resolving or probing.

mod domain;
mod local;
mod types;

pub use types::{EmailAddress, SyntaxError, ValidationMode};

use domain::check_domain;
use local::{is_local_relaxed, is_local_strict};

/// Splits and checks `email` against a practical RFC 5322 subset.
pub fn parse_address(email: &str, mode: ValidationMode) -> Result<EmailAddress, SyntaxError> {
    let input = email.trim();

    if input.is_empty() {
        return Err(SyntaxError::Empty);
    }
    if input.len() > 254 {
        return Err(SyntaxError::TooLong { len: input.len() });
    }

    let mut parts = input.split('@');
    let (local, domain) = match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => (local, domain),
        _ => return Err(SyntaxError::AtSign),
    };

    if local.is_empty() || local.len() > 64 {
        return Err(SyntaxError::LocalLength { len: local.len() });
    }

    let local_ok = match mode {
        ValidationMode::Strict => is_local_strict(local),
        ValidationMode::Relaxed => is_local_relaxed(local),
    };
    if !local_ok {
        return Err(SyntaxError::InvalidLocal { mode });
    }

    let ascii_domain = check_domain(domain)?;
    let domain = domain.to_lowercase();

    Ok(EmailAddress {
        original: format!("{local}@{domain}"),
        local: local.to_string(),
        domain,
        ascii_domain,
    })
}
