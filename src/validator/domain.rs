use std::sync::LazyLock;

use regex::Regex;

use super::types::SyntaxError;

// TLD alphabétique (>= 2) ou A-label punycode
static TLD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[a-z]{2,63}|xn--[a-z0-9-]{1,59})$").expect("static TLD pattern")
});

/// Valide le domaine: conversion IDNA + checks de labels.
/// Retourne la forme ASCII (minuscules) du domaine.
pub(crate) fn check_domain(domain: &str) -> Result<String, SyntaxError> {
    let domain_ascii = idna::domain_to_ascii(domain).map_err(|_| SyntaxError::Idna)?;

    if domain_ascii.is_empty() {
        return Err(SyntaxError::DomainLabel(
            "domain empty after IDNA conversion".to_string(),
        ));
    }

    // au moins un point
    if !domain_ascii.contains('.') {
        return Err(SyntaxError::MissingDomainDot);
    }

    for label in domain_ascii.split('.') {
        if label.is_empty() {
            return Err(SyntaxError::DomainLabel("empty domain label".to_string()));
        }
        if label.len() > 63 {
            return Err(SyntaxError::DomainLabel(format!(
                "domain label '{}' length {} > 63",
                label,
                label.len()
            )));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(SyntaxError::DomainLabel(format!(
                "domain label '{label}' cannot start/end with '-'"
            )));
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(SyntaxError::DomainLabel(format!(
                "domain label '{label}' has invalid chars"
            )));
        }
    }

    if let Some(tld) = domain_ascii.rsplit('.').next() {
        if !TLD.is_match(tld) {
            return Err(SyntaxError::TopLevelDomain(tld.to_string()));
        }
    }

    Ok(domain_ascii)
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn basic_domain_ok() {
        assert_eq!(check_domain("Example.COM").as_deref(), Ok("example.com"));
    }

    #[test]
    fn label_too_long() {
        let long = "a".repeat(64);
        assert!(matches!(
            check_domain(&format!("{long}.com")),
            Err(SyntaxError::DomainLabel(_))
        ));
    }

    #[test]
    fn dotless_domain_rejected() {
        assert_eq!(check_domain("localhost"), Err(SyntaxError::MissingDomainDot));
    }

    #[test]
    fn numeric_tld_rejected() {
        assert!(matches!(
            check_domain("example.123"),
            Err(SyntaxError::TopLevelDomain(_))
        ));
    }

    #[test]
    fn idn_domain_converted() {
        let ascii = check_domain("exämple.com").expect("idn domain");
        assert!(ascii.starts_with("xn--"));
    }
}
