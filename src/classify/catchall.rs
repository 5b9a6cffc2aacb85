use std::collections::HashSet;

use phf::phf_set;

// Gros fournisseurs qui répondent 250 à tout RCPT TO (anti-énumération)
static KNOWN_CATCH_ALL: phf::Set<&'static str> = phf_set! {
    "gmail.com",
    "googlemail.com",
    "outlook.com",
    "hotmail.com",
    "live.com",
    "protonmail.com",
    "icloud.com",
    "me.com",
};

/// Domains on which an accepted `RCPT TO` proves nothing.
#[derive(Debug, Clone, Default)]
pub struct CatchAllPolicy {
    extra: HashSet<String>,
}

impl CatchAllPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds domains on top of the built-in provider table.
    pub fn with_domains<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extra = domains
            .into_iter()
            .map(|d| normalize(d.as_ref()))
            .filter(|d| !d.is_empty())
            .collect();
        Self { extra }
    }

    /// Matches the domain itself or any parent domain, so `mail.me.com`
    /// counts but `notme.com` does not.
    pub fn is_catch_all(&self, domain: &str) -> bool {
        let domain = normalize(domain);
        let mut candidate = domain.as_str();
        loop {
            if KNOWN_CATCH_ALL.contains(candidate) || self.extra.contains(candidate) {
                return true;
            }
            match candidate.split_once('.') {
                Some((_, parent)) if parent.contains('.') => candidate = parent,
                _ => return false,
            }
        }
    }
}

fn normalize(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_providers_match() {
        let policy = CatchAllPolicy::new();
        assert!(policy.is_catch_all("gmail.com"));
        assert!(policy.is_catch_all("Outlook.COM."));
        assert!(policy.is_catch_all("eu.mail.me.com"));
    }

    #[test]
    fn lookalikes_do_not_match() {
        let policy = CatchAllPolicy::new();
        assert!(!policy.is_catch_all("notme.com"));
        assert!(!policy.is_catch_all("gmail.co"));
        assert!(!policy.is_catch_all("com"));
    }

    #[test]
    fn extra_domains_extend_table() {
        let policy = CatchAllPolicy::with_domains(["Catchall.Example.org"]);
        assert!(policy.is_catch_all("catchall.example.org"));
        assert!(!policy.is_catch_all("example.org"));
    }
}
