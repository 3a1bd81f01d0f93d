//! Delayed delivery
//!
//! A timer owns a message until it fires, then hands it to the normal
//! mailbox path. Firing and cancelling race on removal from the pending
//! table, so exactly one of them wins.

use crate::metrics::RuntimeMetrics;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;
use types::TimerId;

#[derive(Debug)]
pub struct TimerService {
    next_id: AtomicU64,
    pending: Arc<Mutex<HashMap<TimerId, oneshot::Sender<()>>>>,
    metrics: Arc<RuntimeMetrics>,
}

impl TimerService {
    pub fn new(metrics: Arc<RuntimeMetrics>) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            pending: Arc::new(Mutex::new(HashMap::new())),
            metrics,
        }
    }

    /// Run `deliver` after `delay` unless the timer is cancelled first
    pub fn schedule<F>(&self, delay: Duration, deliver: F) -> TimerId
    where
        F: FnOnce() + Send + 'static,
    {
        let id = TimerId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.pending.lock().insert(id, cancel_tx);

        let pending = Arc::clone(&self.pending);
        let metrics = Arc::clone(&self.metrics);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    if pending.lock().remove(&id).is_some() {
                        debug!(timer_id = %id, "Timer fired");
                        metrics.record_timer(true);
                        deliver();
                    }
                }
                _ = cancel_rx => {}
            }
        });

        id
    }

    /// `true` only if the timer had neither fired nor been cancelled
    pub fn cancel(&self, id: TimerId) -> bool {
        match self.pending.lock().remove(&id) {
            Some(cancel) => {
                let _ = cancel.send(());
                debug!(timer_id = %id, "Timer cancelled");
                self.metrics.record_timer(false);
                true
            }
            None => false,
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }
}
