//! Batch driver: admission, retries, aggregation.
//!
//! [`Validator::run`] reads addresses from an [`AddressSource`], checks
//! syntax inline, and hands every well-formed address to a bounded pool of
//! probe tasks gated by a [`Governor`]. Tasks report over a bounded channel
//! to a single aggregator that owns the [`RunState`], the result sink and
//! the check log, so none of them is shared between probes. The aggregator
//! runs on the blocking pool since every sink write is synchronous I/O.

mod error;
mod governor;
mod options;
mod retry;
mod source;
mod state;


pub use error::RunError;
pub use governor::Governor;
pub use options::{BatchOptions, MAX_CONCURRENCY};
pub use retry::{RetryPolicy, Retryable, Settled};
pub use source::{AddressSource, IterSource};
pub use state::{HostTally, RunState, RunSummary};

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use trust_dns_resolver::TokioAsyncResolver;

use crate::classify::{
    CatchAllPolicy, ValidationResult, classify_probe, classify_resolution, classify_syntax,
};
use crate::mx::{LookupMx, MxError, build_resolver, resolve_mx};
use crate::report::{CheckLog, CheckRecord, OrderedResults, ReportError, ResultSink};
use crate::smtp_verify::{HostAttempt, probe_hosts};
use crate::validator::{EmailAddress, parse_address};

enum RunEvent {
    Attempt(CheckRecord),
    Done {
        index: usize,
        result: ValidationResult,
    },
}

struct Shared<R> {
    resolver: R,
    options: BatchOptions,
    policy: CatchAllPolicy,
    retry: RetryPolicy,
}

pub struct Validator<R = TokioAsyncResolver> {
    shared: Arc<Shared<R>>,
    check_log: Option<Arc<Mutex<CheckLog>>>,
}

impl Validator<TokioAsyncResolver> {
    /// Uses the system resolver configuration.
    pub fn new(options: BatchOptions) -> Result<Self, MxError> {
        Ok(Self::with_resolver(build_resolver()?, options))
    }
}

impl<R> Validator<R>
where
    R: LookupMx + 'static,
{
    pub fn with_resolver(resolver: R, options: BatchOptions) -> Self {
        let policy = CatchAllPolicy::with_domains(options.catch_all_domains.iter().cloned());
        let retry = RetryPolicy::new(options.max_retries, options.retry_backoff);
        Self {
            shared: Arc::new(Shared {
                resolver,
                options,
                policy,
                retry,
            }),
            check_log: None,
        }
    }

    /// Every SMTP session attempt of subsequent runs is appended to `log`.
    pub fn with_check_log(mut self, log: CheckLog) -> Self {
        self.check_log = Some(Arc::new(Mutex::new(log)));
        self
    }

    pub fn options(&self) -> &BatchOptions {
        &self.shared.options
    }

    /// Checks a single address, without pacing and without touching the
    /// check log. `None` if `cancel` fired before the server answered.
    pub async fn validate_one(
        &self,
        email: &str,
        cancel: &CancellationToken,
    ) -> Option<ValidationResult> {
        let email = email.trim();
        match parse_address(email, self.shared.options.mode) {
            Ok(address) => self.shared.check(address, None, None, cancel).await,
            Err(err) => Some(syntax_result(email, &err)),
        }
    }

    /// Checks `emails` and returns one result per non-blank entry, in input
    /// order.
    pub async fn validate_list(
        &self,
        emails: Vec<String>,
    ) -> Result<Vec<ValidationResult>, RunError> {
        let (_, sink) = self
            .run(
                IterSource(emails.into_iter()),
                OrderedResults::new(),
                &CancellationToken::new(),
            )
            .await?;
        Ok(sink.into_vec())
    }

    /// Streams every address from `source` through the pipeline into
    /// `sink`, finishes the sink with the run summary and hands it back.
    ///
    /// Blank lines are skipped. Once `cancel` fires no new address is
    /// admitted; probes already running close their sessions, and an
    /// address whose check was interrupted before any server verdict is
    /// left out of the results.
    pub async fn run<A, S>(
        &self,
        mut source: A,
        sink: S,
        cancel: &CancellationToken,
    ) -> Result<(RunSummary, S), RunError>
    where
        A: AddressSource,
        S: ResultSink + Send + 'static,
    {
        let options = &self.shared.options;
        let governor = Arc::new(Governor::new(
            options.effective_concurrency(),
            options.pacing_interval(),
        ));
        info!(
            target: "mailprobe::batch",
            concurrency = governor.ceiling(),
            max_retries = options.max_retries,
            pacing = ?options.pacing_interval(),
            "run started"
        );

        let run_cancel = cancel.child_token();
        let (tx, rx) = mpsc::channel(governor.ceiling() * 2);
        let aggregator = tokio::task::spawn_blocking({
            let check_log = self.check_log.clone();
            let (run_cancel, cancel) = (run_cancel.clone(), cancel.clone());
            move || aggregate(rx, sink, check_log.as_deref(), &run_cancel, &cancel)
        });
        let dispatched = self.dispatch(&mut source, governor, tx, &run_cancel).await;
        let (summary, sink) = aggregator.await??;
        dispatched?;

        info!(
            target: "mailprobe::batch",
            total = summary.total,
            seconds = summary.time_seconds,
            cancelled = summary.cancelled,
            "run finished"
        );
        Ok((summary, sink))
    }

    async fn dispatch<A>(
        &self,
        source: &mut A,
        governor: Arc<Governor>,
        tx: mpsc::Sender<RunEvent>,
        cancel: &CancellationToken,
    ) -> Result<(), RunError>
    where
        A: AddressSource,
    {
        let mut tasks = JoinSet::new();
        let mut next_index = 0usize;
        let mut outcome = Ok(());

        loop {
            let line = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                line = source.next_address() => line,
            };
            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(err) => {
                    outcome = Err(RunError::Input { source: err });
                    break;
                }
            };
            let email = line.trim();
            if email.is_empty() {
                continue;
            }
            let index = next_index;
            next_index += 1;

            let address = match parse_address(email, self.shared.options.mode) {
                Ok(address) => address,
                Err(err) => {
                    let result = syntax_result(email, &err);
                    if tx.send(RunEvent::Done { index, result }).await.is_err() {
                        break;
                    }
                    continue;
                }
            };

            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                permit = governor.admit() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let shared = Arc::clone(&self.shared);
            let governor = Arc::clone(&governor);
            let tx = tx.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let result = shared
                    .check(address, Some(&governor), Some(&tx), &cancel)
                    .await;
                drop(permit);
                if let Some(result) = result {
                    let _ = tx.send(RunEvent::Done { index, result }).await;
                }
            });

            while let Some(joined) = tasks.try_join_next() {
                reap(joined);
            }
        }

        drop(tx);
        while let Some(joined) = tasks.join_next().await {
            reap(joined);
        }
        outcome
    }
}

/// Drains `rx` on a blocking thread. Records arriving together are written
/// as one burst, then the sink and the check log are flushed once.
fn aggregate<S>(
    mut rx: mpsc::Receiver<RunEvent>,
    mut sink: S,
    check_log: Option<&Mutex<CheckLog>>,
    run_cancel: &CancellationToken,
    cancel: &CancellationToken,
) -> Result<(RunSummary, S), ReportError>
where
    S: ResultSink,
{
    let mut state = RunState::new();
    let mut log = check_log.map(|log| log.lock().unwrap_or_else(PoisonError::into_inner));
    let mut failure: Option<ReportError> = None;

    while let Some(first) = rx.blocking_recv() {
        let mut next = Some(first);
        while let Some(event) = next.take().or_else(|| rx.try_recv().ok()) {
            let written = match event {
                RunEvent::Attempt(record) => {
                    state.record_attempt(&record.mx_host, record.success, record.latency_ms);
                    match log.as_mut() {
                        Some(log) if failure.is_none() => log.append(&record),
                        _ => Ok(()),
                    }
                }
                RunEvent::Done { index, result } => {
                    state.record_result(&result);
                    if failure.is_none() {
                        sink.accept(index, &result)
                    } else {
                        Ok(())
                    }
                }
            };
            if let Err(err) = written {
                stop(&mut failure, err, run_cancel);
            }
        }
        if failure.is_none() {
            let flushed = sink
                .flush()
                .and_then(|()| log.as_mut().map_or(Ok(()), |log| log.flush()));
            if let Err(err) = flushed {
                stop(&mut failure, err, run_cancel);
            }
        }
    }

    if let Some(err) = failure {
        return Err(err);
    }
    let summary = state.summary(cancel.is_cancelled());
    sink.finish(&summary)?;
    Ok((summary, sink))
}

fn stop(failure: &mut Option<ReportError>, err: ReportError, run_cancel: &CancellationToken) {
    warn!(target: "mailprobe::batch", error = %err, "output failed, stopping run");
    *failure = Some(err);
    run_cancel.cancel();
}

impl<R: LookupMx> Shared<R> {
    /// Resolution, then SMTP probing under the retry policy. Yields a
    /// result unless `cancel` fired before any server verdict.
    async fn check(
        &self,
        address: EmailAddress,
        governor: Option<&Governor>,
        events: Option<&mpsc::Sender<RunEvent>>,
        cancel: &CancellationToken,
    ) -> Option<ValidationResult> {
        let started = Instant::now();
        let lookup = resolve_mx(&self.resolver, &address.ascii_domain, &self.options.mx);
        let hosts = match lookup.await {
            Ok(hosts) => hosts,
            Err(err) => {
                debug!(
                    target: "mailprobe::mx",
                    domain = %address.domain,
                    error = %err,
                    "resolution failed"
                );
                return Some(ValidationResult::new(
                    &address.original,
                    classify_resolution(&err),
                    "",
                    1,
                    started.elapsed(),
                ));
            }
        };

        let (hosts, target) = (&hosts, &address);
        let settled = self
            .retry
            .run(cancel, move |attempt| async move {
                if let Some(governor) = governor {
                    if !governor.pace(cancel).await {
                        return None;
                    }
                }
                let report = probe_hosts(hosts, target, &self.options.probe, cancel).await?;
                debug!(
                    target: "mailprobe::batch",
                    email = %target.original,
                    attempt,
                    mx = %report.mx_host,
                    outcome = ?report.outcome,
                    "probe attempt finished"
                );
                if let Some(tx) = events {
                    for host in &report.hosts {
                        let _ = tx
                            .send(RunEvent::Attempt(self.check_record(host, &target.domain)))
                            .await;
                    }
                }
                Some(report)
            })
            .await;

        let Some(settled) = settled else {
            debug!(
                target: "mailprobe::batch",
                email = %address.original,
                "cancelled before any verdict, no result"
            );
            return None;
        };
        let classification = classify_probe(&settled.value.outcome, &address.domain, &self.policy);
        Some(ValidationResult::new(
            &address.original,
            classification,
            settled.value.mx_host,
            settled.attempts,
            started.elapsed(),
        ))
    }

    fn check_record(&self, host: &HostAttempt, domain: &str) -> CheckRecord {
        CheckRecord {
            mx_host: host.mx_host.clone(),
            timestamp: Utc::now(),
            success: host.outcome.is_decisive(),
            latency_ms: (host.latency.as_secs_f64() * 1000.0 * 100.0).round() / 100.0,
            status: classify_probe(&host.outcome, domain, &self.policy).status,
        }
    }
}

fn syntax_result(email: &str, err: &crate::validator::SyntaxError) -> ValidationResult {
    ValidationResult::new(email, classify_syntax(err), "", 1, Duration::ZERO)
}

fn reap(joined: Result<(), tokio::task::JoinError>) {
    if let Err(err) = joined {
        warn!(target: "mailprobe::batch", error = %err, "probe task failed");
    }
}
