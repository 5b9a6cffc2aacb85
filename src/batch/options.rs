use std::time::Duration;

use crate::mx::MxOptions;
use crate::smtp_verify::ProbeOptions;
use crate::validator::ValidationMode;

pub const MAX_CONCURRENCY: usize = 200;

/// Run-level knobs. Per-session and per-lookup settings live in the nested
/// [`ProbeOptions`] and [`MxOptions`].
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOptions {
    /// Ceiling on probes holding a connection at the same time.
    pub concurrency: usize,
    /// Maximum SMTP attempts per address, first try included.
    pub max_retries: u32,
    /// Spacing between probe starts in sequential mode; divided by
    /// `concurrency` otherwise.
    pub rate_limit_delay: Duration,
    /// Base delay before retry `n`, multiplied by `n`.
    pub retry_backoff: Duration,
    pub mode: ValidationMode,
    /// Added to the built-in catch-all providers.
    pub catch_all_domains: Vec<String>,
    pub probe: ProbeOptions,
    pub mx: MxOptions,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: 50,
            max_retries: 3,
            rate_limit_delay: Duration::from_secs(2),
            retry_backoff: Duration::from_secs(1),
            mode: ValidationMode::Strict,
            catch_all_domains: Vec::new(),
            probe: ProbeOptions::default(),
            mx: MxOptions::default(),
        }
    }
}

impl BatchOptions {
    pub(crate) fn effective_concurrency(&self) -> usize {
        self.concurrency.clamp(1, MAX_CONCURRENCY)
    }

    /// Minimum spacing between two probe starts.
    pub(crate) fn pacing_interval(&self) -> Duration {
        // clamp keeps the divisor in 1..=200, so the cast is lossless
        self.rate_limit_delay / self.effective_concurrency() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let o = BatchOptions::default();
        assert_eq!(o.concurrency, 50);
        assert_eq!(o.max_retries, 3);
        assert_eq!(o.probe.step_timeout, Duration::from_secs(5));
        assert_eq!(o.mx.timeout, Duration::from_secs(3));
        assert!(!o.mx.implicit_mx);
    }

    #[test]
    fn pacing_relaxes_with_concurrency() {
        let mut o = BatchOptions {
            concurrency: 1,
            ..BatchOptions::default()
        };
        assert_eq!(o.pacing_interval(), Duration::from_secs(2));
        o.concurrency = 50;
        assert_eq!(o.pacing_interval(), Duration::from_millis(40));
        o.concurrency = 0;
        assert_eq!(o.effective_concurrency(), 1);
        o.concurrency = 10_000;
        assert_eq!(o.effective_concurrency(), MAX_CONCURRENCY);
    }
}
