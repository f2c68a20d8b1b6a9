//! # Sync Trigger
//!
//! Decides *when* the [`SyncWorker`] runs; the worker decides *how*.
//!
//! Three sources can request a run:
//!
//! - **Reconnect**: the network monitor reports an offline-to-online
//!   transition.
//! - **Signal**: the platform background-sync mechanism fires.
//! - **Manual**: an explicit "sync now" from the user.
//!
//! Overlapping requests coalesce on a single run gate; at most one run is in
//! flight at any time, and a request arriving mid-run is dropped rather than
//! queued (the running drain already covers its records). Reconnect and
//! signal triggers are additionally debounced by a minimum spacing so flappy
//! connectivity cannot hammer the endpoint; a manual trigger bypasses the
//! spacing but still respects the gate.

use bridge_traits::network::NetworkMonitor;
use bridge_traits::signal::{SyncSignal, SyncSignalSource};
use bridge_traits::time::Clock;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::worker::{RunReport, SyncWorker};

/// Default minimum spacing between debounced runs.
pub const DEFAULT_MIN_RUN_SPACING: Duration = Duration::from_secs(5);

/// Default platform background-sync tag.
pub const DEFAULT_SIGNAL_TAG: &str = "sync-pending-submissions";

/// What asked for the sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    /// Offline-to-online transition
    Reconnect,
    /// Platform background-sync signal
    Signal,
    /// Explicit user request
    Manual,
}

impl TriggerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reconnect => "reconnect",
            Self::Signal => "signal",
            Self::Manual => "manual",
        }
    }

    /// Whether the minimum run spacing applies to this source.
    fn debounced(&self) -> bool {
        !matches!(self, Self::Manual)
    }
}

/// Trigger configuration
#[derive(Debug, Clone)]
pub struct TriggerConfig {
    /// Minimum spacing between debounced runs
    pub min_run_spacing: Duration,

    /// Tag registered with the platform background-sync source
    pub signal_tag: String,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            min_run_spacing: DEFAULT_MIN_RUN_SPACING,
            signal_tag: DEFAULT_SIGNAL_TAG.to_string(),
        }
    }
}

/// Coalesces sync requests from all sources onto single worker runs.
pub struct SyncTrigger {
    worker: Arc<SyncWorker>,
    clock: Arc<dyn Clock>,
    config: TriggerConfig,
    /// Held for the duration of a run; `try_lock` failure means a run is
    /// already in flight.
    run_gate: tokio::sync::Mutex<()>,
    /// Completion time of the last run, epoch millis.
    last_run_ms: Mutex<Option<i64>>,
}

impl SyncTrigger {
    pub fn new(worker: Arc<SyncWorker>, clock: Arc<dyn Clock>, config: TriggerConfig) -> Self {
        Self {
            worker,
            clock,
            config,
            run_gate: tokio::sync::Mutex::new(()),
            last_run_ms: Mutex::new(None),
        }
    }

    /// Request a sync run.
    ///
    /// Returns `Ok(None)` when the request was dropped: a run is already in
    /// flight, or a debounced source fired inside the minimum spacing window.
    /// The queue loses nothing either way; dropped requests are covered by
    /// the in-flight run or the next trigger.
    pub async fn fire(&self, source: TriggerSource) -> Result<Option<RunReport>> {
        if source.debounced() && self.within_spacing_window() {
            debug!(source = source.as_str(), "Sync request debounced");
            return Ok(None);
        }

        let _gate = match self.run_gate.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!(source = source.as_str(), "Sync already in flight, request dropped");
                return Ok(None);
            }
        };

        info!(source = source.as_str(), "Sync run triggered");
        let report = self.worker.run().await?;

        if let Ok(mut last) = self.last_run_ms.lock() {
            *last = Some(self.clock.unix_timestamp_millis());
        }

        Ok(Some(report))
    }

    /// Explicit "sync now"; bypasses the spacing window.
    pub async fn trigger_now(&self) -> Result<Option<RunReport>> {
        self.fire(TriggerSource::Manual).await
    }

    fn within_spacing_window(&self) -> bool {
        let last = match self.last_run_ms.lock() {
            Ok(guard) => *guard,
            Err(_) => None,
        };
        match last {
            Some(last_ms) => {
                let elapsed = self.clock.unix_timestamp_millis().saturating_sub(last_ms);
                elapsed < self.config.min_run_spacing.as_millis() as i64
            }
            None => false,
        }
    }

    /// Watch the network monitor and fire a reconnect trigger on each
    /// offline-to-online transition. Runs until the change stream closes.
    pub async fn watch_network(
        self: &Arc<Self>,
        monitor: Arc<dyn NetworkMonitor>,
    ) -> Result<JoinHandle<()>> {
        let mut stream = monitor
            .subscribe_changes()
            .await
            .map_err(|e| crate::error::SyncError::Network(e.to_string()))?;

        let trigger = Arc::clone(self);
        Ok(tokio::spawn(async move {
            while let Some(info) = stream.next().await {
                if info.is_online() {
                    debug!("Network reconnected");
                    if let Err(e) = trigger.fire(TriggerSource::Reconnect).await {
                        warn!(error = %e, "Reconnect-triggered sync failed");
                    }
                }
            }
            debug!("Network change stream closed");
        }))
    }

    /// Register with the platform background-sync source, when available.
    ///
    /// Returns `false` when the platform has no background-sync capability;
    /// the reconnect and manual triggers remain sufficient.
    pub async fn register_signal(
        self: &Arc<Self>,
        source: Arc<dyn SyncSignalSource>,
    ) -> bridge_traits::error::Result<bool> {
        if !source.is_available().await {
            info!("Background sync signal not available on this platform");
            return Ok(false);
        }

        let trigger = Arc::clone(self);
        source
            .register(
                SyncSignal::new(self.config.signal_tag.clone()),
                Arc::new(move || {
                    let trigger = Arc::clone(&trigger);
                    Box::pin(async move {
                        if let Err(e) = trigger.fire(TriggerSource::Signal).await {
                            warn!(error = %e, "Signal-triggered sync failed");
                        }
                    })
                }),
            )
            .await?;

        info!(tag = %self.config.signal_tag, "Background sync signal registered");
        Ok(true)
    }
}
