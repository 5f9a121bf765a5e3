//! Single-shot lease renewal timers.
//!
//! A [`RenewalTimer`] is a spawned task sleeping until renewal time plus a
//! small atomic slot that decides who wins the race between firing and
//! cancellation. Whoever moves the slot out of `ARMED` first wins, so a
//! canceled timer never fires and a fired timer can never be canceled.

use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;

const ARMED: u8 = 0;
const FIRED: u8 = 1;
const CANCELED: u8 = 2;

/// A pending renewal.
#[derive(Debug)]
pub(crate) struct RenewalTimer {
    slot: Arc<AtomicU8>,
    task: JoinHandle<()>,
}

impl RenewalTimer {
    /// Spawn a timer that runs `fire` after `delay` unless canceled first.
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn arm<F>(delay: Duration, fire: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let slot = Arc::new(AtomicU8::new(ARMED));
        let task_slot = slot.clone();

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if task_slot
                .compare_exchange(ARMED, FIRED, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                fire.await;
            }
        });

        Self { slot, task }
    }

    /// Cancel the timer if it has not fired yet.
    ///
    /// Returns `true` only if this call stopped a pending timer. Never
    /// blocks; a renewal that already started keeps running.
    pub(crate) fn cancel(&self) -> bool {
        let canceled = self
            .slot
            .compare_exchange(ARMED, CANCELED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();

        if canceled {
            // Only the sleep is left to abort
            self.task.abort();
        }
        canceled
    }

    /// Whether the timer is still waiting to fire.
    pub(crate) fn is_pending(&self) -> bool {
        self.slot.load(Ordering::Acquire) == ARMED
    }
}

impl Drop for RenewalTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// How long to wait before renewing a lease that expires at `lease_expiry`.
///
/// `fraction` of the time remaining, or zero if the lease already expired.
pub(crate) fn renewal_delay(lease_expiry: SystemTime, now: SystemTime, fraction: f64) -> Duration {
    let remaining = lease_expiry.duration_since(now).unwrap_or(Duration::ZERO);
    remaining.mul_f64(fraction.clamp(0.0, 1.0))
}
