use std::collections::BTreeMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::classify::{ValidationResult, ValidationStatus};

/// Per-MX-host tallies, fed by every session attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostTally {
    pub attempts: u64,
    pub successes: u64,
    pub total_latency_ms: f64,
}

impl HostTally {
    pub fn mean_latency_ms(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.total_latency_ms / self.attempts as f64
        }
    }
}

/// Counters for one run. Owned by the aggregator; probes never touch it
/// directly.
#[derive(Debug)]
pub struct RunState {
    started: Instant,
    total: u64,
    counts: BTreeMap<ValidationStatus, u64>,
    hosts: BTreeMap<String, HostTally>,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            total: 0,
            counts: ValidationStatus::ALL.iter().map(|s| (*s, 0)).collect(),
            hosts: BTreeMap::new(),
        }
    }

    pub fn record_result(&mut self, result: &ValidationResult) {
        self.total += 1;
        *self.counts.entry(result.status).or_default() += 1;
    }

    pub fn record_attempt(&mut self, mx_host: &str, success: bool, latency_ms: f64) {
        let tally = self.hosts.entry(mx_host.to_string()).or_default();
        tally.attempts += 1;
        if success {
            tally.successes += 1;
        }
        tally.total_latency_ms += latency_ms;
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn count(&self, status: ValidationStatus) -> u64 {
        self.counts.get(&status).copied().unwrap_or(0)
    }

    pub fn summary(&self, cancelled: bool) -> RunSummary {
        RunSummary {
            total: self.total,
            time_seconds: (self.started.elapsed().as_secs_f64() * 100.0).round() / 100.0,
            counts_by_status: self.counts.clone(),
            hosts: self.hosts.clone(),
            cancelled,
        }
    }
}

/// Final account of a run. `counts_by_status` always sums to `total`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: u64,
    pub time_seconds: f64,
    pub counts_by_status: BTreeMap<ValidationStatus, u64>,
    pub hosts: BTreeMap<String, HostTally>,
    pub cancelled: bool,
}
