use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{AcquireError, Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Admission gate shared by every probe of a run.
///
/// Two knobs: a ceiling on probes in flight (`admit`) and a minimum spacing
/// between probe starts (`pace`). Both queue waiters in FIFO order, so an
/// address waiting for admission is never starved by later ones.
#[derive(Debug)]
pub struct Governor {
    slots: Arc<Semaphore>,
    ceiling: usize,
    interval: Duration,
    next_start: Mutex<Option<Instant>>,
}

impl Governor {
    pub fn new(ceiling: usize, interval: Duration) -> Self {
        let ceiling = ceiling.max(1);
        Self {
            slots: Arc::new(Semaphore::new(ceiling)),
            ceiling,
            interval,
            next_start: Mutex::new(None),
        }
    }

    /// Waits for a free slot. The slot is held until the permit drops.
    pub async fn admit(&self) -> Result<OwnedSemaphorePermit, AcquireError> {
        self.slots.clone().acquire_owned().await
    }

    /// Waits until `interval` has passed since the previous start. Returns
    /// `false` if `cancel` fired first.
    pub async fn pace(&self, cancel: &CancellationToken) -> bool {
        if self.interval.is_zero() {
            return !cancel.is_cancelled();
        }
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = self.wait_turn() => true,
        }
    }

    async fn wait_turn(&self) {
        // the lock is held across the sleep so waiters start in queue order
        let mut next = self.next_start.lock().await;
        if let Some(at) = *next {
            tokio::time::sleep_until(at).await;
        }
        *next = Some(Instant::now() + self.interval);
    }

    pub fn in_flight(&self) -> usize {
        self.ceiling - self.slots.available_permits()
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }
}
