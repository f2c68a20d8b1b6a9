//! Background Sync Signal Implementation
//!
//! Desktop has no OS-level background-sync scheduler, so the signal source is
//! a timer loop in the host process: each registered tag gets a tokio task
//! that invokes the handler at a fixed period.

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    signal::{SyncSignal, SyncSignalHandler, SyncSignalSource},
};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

const DEFAULT_PERIOD: Duration = Duration::from_secs(15 * 60);

/// Timer-based sync signal source
pub struct IntervalSyncSignal {
    period: Duration,
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl IntervalSyncSignal {
    /// Create a signal source with the default 15-minute period
    pub fn new() -> Self {
        Self::with_period(DEFAULT_PERIOD)
    }

    /// Create a signal source with a custom period
    pub fn with_period(period: Duration) -> Self {
        Self {
            period,
            tasks: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for IntervalSyncSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SyncSignalSource for IntervalSyncSignal {
    async fn register(&self, signal: SyncSignal, handler: SyncSignalHandler) -> Result<()> {
        let period = self.period;
        let tag = signal.tag().to_string();
        debug!(tag = %tag, period_secs = period.as_secs(), "Registering interval sync signal");

        let task = tokio::spawn(async move {
            // First firing happens one full period from now, not immediately.
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                handler().await;
            }
        });

        if let Ok(mut tasks) = self.tasks.lock() {
            if let Some(previous) = tasks.insert(signal.0, task) {
                previous.abort();
            }
        }
        Ok(())
    }

    async fn unregister(&self, signal: &SyncSignal) -> Result<()> {
        if let Ok(mut tasks) = self.tasks.lock() {
            if let Some(task) = tasks.remove(signal.tag()) {
                task.abort();
                debug!(tag = %signal.tag(), "Unregistered interval sync signal");
            }
        }
        Ok(())
    }
}

impl Drop for IntervalSyncSignal {
    fn drop(&mut self) {
        if let Ok(tasks) = self.tasks.lock() {
            for task in tasks.values() {
                task.abort();
            }
        }
    }
}
