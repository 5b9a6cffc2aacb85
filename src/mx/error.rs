use thiserror::Error;

#[derive(Debug, Error)]
pub enum MxError {
    #[error("domain is empty")]
    EmptyDomain,
    #[error("domain IDNA conversion failed")]
    IdnaConversion {
        #[source]
        source: idna::Errors,
    },
    #[error("resolver initialization failed: {source}")]
    ResolverInit {
        #[source]
        source: trust_dns_resolver::error::ResolveError,
    },
    #[error("no MX records found for {domain}")]
    NoMx { domain: String },
    #[error("DNS lookup for {domain} timed out after {attempts} attempt(s)")]
    Timeout { domain: String, attempts: u32 },
    #[error("MX lookup for {domain} failed: {message}")]
    Lookup { domain: String, message: String },
}

impl MxError {
    pub(crate) fn idna(source: idna::Errors) -> Self {
        Self::IdnaConversion { source }
    }

    pub(crate) fn resolver_init(source: trust_dns_resolver::error::ResolveError) -> Self {
        Self::ResolverInit { source }
    }

    pub(crate) fn no_mx(domain: &str) -> Self {
        Self::NoMx {
            domain: domain.to_string(),
        }
    }

    /// A DNS timeout is reported separately from an SMTP timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
