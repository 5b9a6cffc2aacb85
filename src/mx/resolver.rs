use std::collections::HashSet;
use std::future::Future;

use tracing::{debug, warn};
use trust_dns_resolver::TokioAsyncResolver;
use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};

use super::{MxError, MxOptions, MxRecord};

/// Why a single DNS query produced no answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupFailure {
    NotFound,
    Timeout,
    Other(String),
}

impl From<ResolveError> for LookupFailure {
    fn from(err: ResolveError) -> Self {
        match err.kind() {
            ResolveErrorKind::NoRecordsFound { .. } => Self::NotFound,
            ResolveErrorKind::Timeout => Self::Timeout,
            _ => Self::Other(err.to_string()),
        }
    }
}

pub trait LookupMx: Send + Sync {
    fn lookup_mx(
        &self,
        domain: &str,
    ) -> impl Future<Output = Result<Vec<MxRecord>, LookupFailure>> + Send;

    /// Whether `domain` has at least one A/AAAA record.
    fn lookup_host(&self, domain: &str) -> impl Future<Output = Result<bool, LookupFailure>> + Send;
}

impl LookupMx for TokioAsyncResolver {
    async fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, LookupFailure> {
        let lookup = self.mx_lookup(domain).await?;
        Ok(lookup
            .iter()
            .map(|mx| MxRecord::new(mx.preference(), normalize_exchange(mx.exchange().to_utf8())))
            .collect())
    }

    async fn lookup_host(&self, domain: &str) -> Result<bool, LookupFailure> {
        let lookup = self.lookup_ip(domain).await?;
        Ok(lookup.iter().next().is_some())
    }
}

/// System resolver; deadlines are applied per query by [`resolve_mx`].
pub fn build_resolver() -> Result<TokioAsyncResolver, MxError> {
    TokioAsyncResolver::tokio_from_system_conf().map_err(MxError::resolver_init)
}

/// Resolves `domain` to its mail hosts, ascending priority, deduplicated.
///
/// Each query is bounded by `options.timeout` and repeated up to
/// `options.attempts` times on timeouts and server failures. A null MX
/// (`MX 0 .`) means the domain accepts no mail and is never replaced by the
/// implicit A/AAAA fallback.
pub async fn resolve_mx<R>(
    resolver: &R,
    domain: &str,
    options: &MxOptions,
) -> Result<Vec<MxRecord>, MxError>
where
    R: LookupMx,
{
    let ascii = normalize_domain(domain)?;
    let attempts = options.attempts.max(1);

    let mut last_failure = LookupFailure::NotFound;
    for attempt in 1..=attempts {
        match bounded(options, resolver.lookup_mx(&ascii)).await {
            Ok(records) => {
                let null_mx = !records.is_empty() && records.iter().all(|r| r.host.is_empty());
                let mut records: Vec<MxRecord> =
                    records.into_iter().filter(|r| !r.host.is_empty()).collect();
                records.sort();
                // one entry per exchanger, at its best priority
                let mut seen = HashSet::new();
                records.retain(|r| seen.insert(r.host.clone()));
                debug!(
                    target: "mailprobe::mx",
                    domain = %ascii,
                    count = records.len(),
                    "MX lookup answered"
                );
                if !records.is_empty() {
                    return Ok(records);
                }
                if null_mx {
                    return Err(MxError::no_mx(&ascii));
                }
                return implicit_host(resolver, &ascii, options).await;
            }
            Err(LookupFailure::NotFound) => {
                debug!(target: "mailprobe::mx", domain = %ascii, "no MX records");
                return implicit_host(resolver, &ascii, options).await;
            }
            Err(failure) => {
                warn!(
                    target: "mailprobe::mx",
                    domain = %ascii,
                    attempt,
                    ?failure,
                    "MX lookup failed"
                );
                last_failure = failure;
            }
        }
    }

    match last_failure {
        LookupFailure::Timeout => Err(MxError::Timeout {
            domain: ascii,
            attempts,
        }),
        LookupFailure::Other(message) => Err(MxError::Lookup {
            domain: ascii,
            message,
        }),
        LookupFailure::NotFound => Err(MxError::no_mx(&ascii)),
    }
}

async fn implicit_host<R>(
    resolver: &R,
    ascii: &str,
    options: &MxOptions,
) -> Result<Vec<MxRecord>, MxError>
where
    R: LookupMx,
{
    if !options.implicit_mx {
        return Err(MxError::no_mx(ascii));
    }
    match bounded(options, resolver.lookup_host(ascii)).await {
        Ok(true) => {
            debug!(target: "mailprobe::mx", domain = %ascii, "using implicit MX");
            Ok(vec![MxRecord::new(0, ascii)])
        }
        Ok(false) | Err(_) => Err(MxError::no_mx(ascii)),
    }
}

async fn bounded<T, F>(options: &MxOptions, query: F) -> Result<T, LookupFailure>
where
    F: Future<Output = Result<T, LookupFailure>>,
{
    match tokio::time::timeout(options.timeout, query).await {
        Ok(result) => result,
        Err(_) => Err(LookupFailure::Timeout),
    }
}

pub(crate) fn normalize_domain(domain: &str) -> Result<String, MxError> {
    let trimmed = domain.trim();
    if trimmed.is_empty() {
        return Err(MxError::EmptyDomain);
    }
    idna::domain_to_ascii(trimmed).map_err(MxError::idna)
}

pub(crate) fn normalize_exchange(exchange: String) -> String {
    let trimmed = exchange.trim_end_matches('.');
    trimmed.to_ascii_lowercase()
}
