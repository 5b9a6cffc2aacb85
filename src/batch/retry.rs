use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::smtp_verify::{ProbeOutcome, ProbeReport};

/// Outcomes that may be worth another fresh attempt.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for ProbeOutcome {
    fn is_retryable(&self) -> bool {
        ProbeOutcome::is_retryable(self)
    }
}

impl Retryable for ProbeReport {
    fn is_retryable(&self) -> bool {
        self.outcome.is_retryable()
    }
}

/// Terminal value of a retry loop plus the number of tries it took.
#[derive(Debug, Clone)]
pub struct Settled<T> {
    pub value: T,
    pub attempts: u32,
}

/// Bounded retry schedule: `max_attempts` tries in total, linear backoff
/// (`backoff * n` before try `n + 1`) with up to 25% random jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Pause after failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.backoff.saturating_mul(attempt);
        if base.is_zero() {
            return base;
        }
        let jitter = rand::thread_rng().gen_range(0.0..=0.25);
        base.saturating_add(base.mul_f64(jitter))
    }

    /// Runs `op` until it yields a non-retryable value, the attempt budget
    /// is spent or `cancel` fires. The last value is returned as is; there
    /// is no separate "gave up" result.
    ///
    /// `op` yields `None` when it was cancelled before producing a value;
    /// the previous attempt then stands, if there was one.
    pub async fn run<T, F, Fut>(&self, cancel: &CancellationToken, mut op: F) -> Option<Settled<T>>
    where
        T: Retryable,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        let mut previous: Option<Settled<T>> = None;
        let mut attempt = 1;
        loop {
            let Some(value) = op(attempt).await else {
                return previous;
            };
            let settled = Settled {
                value,
                attempts: attempt,
            };
            if !settled.value.is_retryable()
                || attempt >= self.max_attempts
                || cancel.is_cancelled()
            {
                return Some(settled);
            }

            let delay = self.delay_for(attempt);
            debug!(target: "mailprobe::batch", attempt, ?delay, "retrying");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => return Some(settled),
            }
            previous = Some(settled);
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smtp_verify::{SessionState, SmtpReply};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn timeout() -> ProbeOutcome {
        ProbeOutcome::Timeout {
            state: SessionState::Idle,
        }
    }

    fn rejected() -> ProbeOutcome {
        ProbeOutcome::Rejected {
            reply: SmtpReply {
                code: 550,
                lines: vec!["no such user".into()],
            },
        }
    }

    #[test]
    fn backoff_is_linear_with_bounded_jitter() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        for attempt in 1..=3u32 {
            let base = Duration::from_millis(100) * attempt;
            for _ in 0..50 {
                let d = policy.delay_for(attempt);
                assert!(d >= base, "{d:?} < {base:?}");
                assert!(d <= base.mul_f64(1.25), "{d:?} too large");
            }
        }
        assert_eq!(
            RetryPolicy::new(3, Duration::ZERO).delay_for(2),
            Duration::ZERO
        );
    }

    #[tokio::test]
    async fn retries_until_budget_is_spent() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let calls = AtomicU32::new(0);
        let settled = policy
            .run(&CancellationToken::new(), |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                assert_eq!(calls.load(Ordering::SeqCst), attempt);
                async { Some(timeout()) }
            })
            .await
            .expect("settled");
        assert_eq!(settled.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(settled.value, timeout());
    }

    #[tokio::test]
    async fn rejection_is_never_retried() {
        let policy = RetryPolicy::new(5, Duration::ZERO);
        let settled = policy
            .run(&CancellationToken::new(), |_| async { Some(rejected()) })
            .await
            .expect("settled");
        assert_eq!(settled.attempts, 1);
    }

    #[tokio::test]
    async fn stops_at_first_decisive_answer() {
        let policy = RetryPolicy::new(5, Duration::ZERO);
        let settled = policy
            .run(&CancellationToken::new(), |attempt| async move {
                Some(if attempt < 2 { timeout() } else { rejected() })
            })
            .await
            .expect("settled");
        assert_eq!(settled.attempts, 2);
        assert_eq!(settled.value, rejected());
    }

    #[tokio::test]
    async fn cancellation_interrupts_backoff() {
        let policy = RetryPolicy::new(3, Duration::from_secs(30));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });
        let started = std::time::Instant::now();
        let settled = policy
            .run(&cancel, |_| async { Some(timeout()) })
            .await
            .expect("first attempt stands");
        assert_eq!(settled.attempts, 1);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn cancelled_first_attempt_settles_nothing() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let settled: Option<Settled<ProbeOutcome>> = policy
            .run(&CancellationToken::new(), |_| async { None })
            .await;
        assert!(settled.is_none());
    }

    #[tokio::test]
    async fn cancelled_retry_keeps_previous_attempt() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let settled = policy
            .run(&CancellationToken::new(), |attempt| async move {
                (attempt == 1).then(timeout)
            })
            .await
            .expect("first attempt stands");
        assert_eq!(settled.attempts, 1);
        assert_eq!(settled.value, timeout());
    }
}
