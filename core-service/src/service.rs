//! # Survey Service
//!
//! The façade a host application talks to. Wires the queue store, the sync
//! worker, and the trigger together from a [`CoreConfig`] and exposes the
//! submission lifecycle:
//!
//! - [`SurveyService::submit`] tries the network first when the monitor says
//!   the device is online, and falls back to the durable queue on any
//!   transient failure. The caller always gets an immediate, honest outcome.
//! - [`SurveyService::sync_now`] is the user-facing "sync now" button.
//! - [`SurveyService::subscribe`] hands out an event receiver so a UI can
//!   refresh its pending list when background sync resolves records.

use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, QueueEvent, Receiver};
use core_sync::record::{FieldValue, SubmissionBody, SubmissionId, SubmissionStatus};
use core_sync::scheduler::{SyncTrigger, TriggerConfig};
use core_sync::store::{SqliteSubmissionStore, SubmissionStore};
use core_sync::worker::{RunReport, SyncConfig, SyncWorker};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::error::Result;

/// Outcome of a submit call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Delivered to the server directly
    Submitted,
    /// Persisted to the queue for background delivery
    Queued(SubmissionId),
}

/// Queue row shape for list screens; no attachment bytes, just what the UI
/// renders.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSummary {
    pub id: SubmissionId,
    /// Farmer name when recorded, or a placeholder
    pub label: String,
    /// Captured boundary points
    pub point_count: usize,
    pub status: SubmissionStatus,
    pub attempt_count: u32,
}

/// The assembled survey core.
pub struct SurveyService {
    config: CoreConfig,
    store: Arc<SqliteSubmissionStore>,
    worker: Arc<SyncWorker>,
    trigger: Arc<SyncTrigger>,
    events: EventBus,
}

impl SurveyService {
    /// Open the queue database and assemble the sync pipeline.
    ///
    /// Performs crash recovery as part of opening the store: records left
    /// `syncing` by a previous process return to `pending`.
    pub async fn new(config: CoreConfig, sync_config: SyncConfig) -> Result<Self> {
        // One connection: SQLite serializes writers anyway, and it keeps
        // in-memory databases coherent across queries.
        let options = SqliteConnectOptions::new()
            .filename(&config.database_path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = Arc::new(SqliteSubmissionStore::new(pool, config.clock.clone()));
        store.initialize().await?;

        let events = EventBus::new(config.event_buffer_size);
        let worker = Arc::new(SyncWorker::new(
            store.clone(),
            config.http_client.clone(),
            events.clone(),
            sync_config,
        ));
        let trigger = Arc::new(SyncTrigger::new(
            worker.clone(),
            config.clock.clone(),
            TriggerConfig::default(),
        ));

        info!(database = %config.database_path.display(), "Survey core initialized");

        Ok(Self {
            config,
            store,
            worker,
            trigger,
            events,
        })
    }

    /// Attach the configured triggers: the network watcher when a monitor was
    /// provided, the platform background-sync signal when a source was.
    ///
    /// Returns the network watcher task handle, if one was spawned. Safe to
    /// call on a config without either capability; manual sync still works.
    pub async fn start(&self) -> Result<Option<JoinHandle<()>>> {
        let mut watcher = None;

        if let Some(monitor) = &self.config.network_monitor {
            watcher = Some(self.trigger.watch_network(monitor.clone()).await?);
        }

        if let Some(signal) = &self.config.sync_signal {
            self.trigger.register_signal(signal.clone()).await?;
        }

        Ok(watcher)
    }

    /// Submit a completed form.
    ///
    /// Online first: when the network monitor reports a connection (or no
    /// monitor is configured), try to deliver immediately. A transient
    /// delivery failure, or being offline, persists the submission instead;
    /// nothing typed into the form is ever lost to a failed request.
    #[instrument(skip(self, body))]
    pub async fn submit(&self, body: SubmissionBody) -> Result<SubmitOutcome> {
        let try_online = match &self.config.network_monitor {
            Some(monitor) => monitor.is_connected().await,
            None => true,
        };

        if try_online {
            match self.worker.deliver(&body).await {
                Ok(()) => {
                    info!("Submission delivered directly");
                    return Ok(SubmitOutcome::Submitted);
                }
                Err(e) if e.is_transient() => {
                    warn!(error = %e, "Direct delivery failed, queueing submission");
                }
                Err(e) => return Err(e.into()),
            }
        }

        let record = self.store.enqueue(body).await?;
        info!(submission_id = %record.id, "Submission queued for background sync");
        self.events
            .emit(CoreEvent::Queue(QueueEvent::Enqueued {
                id: record.id.to_string(),
            }))
            .ok();
        Ok(SubmitOutcome::Queued(record.id))
    }

    /// Pending queue, oldest first, shaped for a list screen.
    pub async fn list_pending_for_display(&self) -> Result<Vec<PendingSummary>> {
        let records = self.store.list_pending().await?;
        Ok(records
            .into_iter()
            .map(|record| PendingSummary {
                id: record.id,
                label: match record.body.fields.get("farmerName") {
                    Some(FieldValue::Text(name)) if !name.is_empty() => name.clone(),
                    Some(value) => value.to_wire(),
                    None => "Unnamed submission".to_string(),
                },
                point_count: record.body.geo_points.len(),
                status: record.status,
                attempt_count: record.attempt_count,
            })
            .collect())
    }

    /// Number of records waiting to sync.
    pub async fn pending_count(&self) -> Result<u64> {
        Ok(self.store.count_pending().await?)
    }

    /// Discard a queued submission without sending it.
    ///
    /// Returns `false` when the record no longer exists, which includes the
    /// benign race where background sync delivered it first.
    pub async fn discard(&self, id: &SubmissionId) -> Result<bool> {
        let removed = self.store.delete(id).await?;
        if removed {
            info!(submission_id = %id, "Queued submission discarded");
            self.events
                .emit(CoreEvent::Queue(QueueEvent::Discarded {
                    id: id.to_string(),
                }))
                .ok();
        }
        Ok(removed)
    }

    /// User-initiated sync. `None` means a run was already in flight.
    pub async fn sync_now(&self) -> Result<Option<RunReport>> {
        Ok(self.trigger.trigger_now().await?)
    }

    /// Subscribe to queue and sync events.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.events.subscribe()
    }

    /// The shared event bus, for hosts that bridge events elsewhere.
    pub fn events(&self) -> &EventBus {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
    use bridge_traits::network::{NetworkChangeStream, NetworkInfo, NetworkMonitor};
    use bytes::Bytes;
    use core_runtime::events::SyncEvent;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
    use std::sync::Mutex;

    /// Endpoint whose response status the test can change at will.
    struct SwitchableEndpoint {
        status: AtomicU16,
        bodies: Mutex<Vec<Bytes>>,
    }

    impl SwitchableEndpoint {
        fn new(status: u16) -> Arc<Self> {
            Arc::new(Self {
                status: AtomicU16::new(status),
                bodies: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl HttpClient for SwitchableEndpoint {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
            self.bodies
                .lock()
                .unwrap()
                .push(request.body.unwrap_or_default());
            Ok(HttpResponse {
                status: self.status.load(Ordering::SeqCst),
                headers: HashMap::new(),
                body: Bytes::new(),
            })
        }
    }

    /// Monitor the test toggles between offline and online.
    struct ToggleMonitor {
        online: AtomicBool,
    }

    impl ToggleMonitor {
        fn offline() -> Arc<Self> {
            Arc::new(Self {
                online: AtomicBool::new(false),
            })
        }
    }

    struct ClosedStream;

    #[async_trait]
    impl NetworkChangeStream for ClosedStream {
        async fn next(&mut self) -> Option<NetworkInfo> {
            None
        }
    }

    #[async_trait]
    impl NetworkMonitor for ToggleMonitor {
        async fn get_network_info(&self) -> BridgeResult<NetworkInfo> {
            Ok(if self.online.load(Ordering::SeqCst) {
                NetworkInfo::connected()
            } else {
                NetworkInfo::disconnected()
            })
        }

        async fn subscribe_changes(&self) -> BridgeResult<Box<dyn NetworkChangeStream>> {
            Ok(Box::new(ClosedStream))
        }
    }

    async fn service(
        http: Arc<SwitchableEndpoint>,
        monitor: Option<Arc<ToggleMonitor>>,
    ) -> SurveyService {
        let mut builder = CoreConfig::builder()
            .database_path(":memory:")
            .http_client(http);
        if let Some(monitor) = monitor {
            builder = builder.network_monitor(monitor);
        }
        let config = builder.build().unwrap();
        SurveyService::new(config, SyncConfig::new("https://api.example.com/api/submit"))
            .await
            .unwrap()
    }

    fn survey_body(name: &str) -> SubmissionBody {
        // Closed polygon: last point returns to the first.
        SubmissionBody::new()
            .field("farmerName", name)
            .field("village", "Kothapalli")
            .geo_point(17.38, 78.48)
            .geo_point(17.39, 78.49)
            .geo_point(17.40, 78.47)
            .geo_point(17.38, 78.48)
    }

    #[tokio::test]
    async fn test_online_submit_delivers_directly() {
        let http = SwitchableEndpoint::new(200);
        let service = service(http.clone(), None).await;

        let outcome = service.submit(survey_body("Ravi")).await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Submitted);
        assert_eq!(service.pending_count().await.unwrap(), 0);
        assert_eq!(http.bodies.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_offline_submit_queues_without_touching_network() {
        let http = SwitchableEndpoint::new(200);
        let monitor = ToggleMonitor::offline();
        let service = service(http.clone(), Some(monitor)).await;

        let outcome = service.submit(survey_body("Ravi")).await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Queued(_)));
        assert_eq!(service.pending_count().await.unwrap(), 1);
        assert!(http.bodies.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_direct_delivery_falls_back_to_queue() {
        let http = SwitchableEndpoint::new(503);
        let service = service(http.clone(), None).await;

        let outcome = service.submit(survey_body("Ravi")).await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Queued(_)));
        assert_eq!(service.pending_count().await.unwrap(), 1);

        // The queued record keeps a zero attempt count; the failed direct
        // try predates its queue life.
        let pending = service.list_pending_for_display().await.unwrap();
        assert_eq!(pending[0].attempt_count, 0);
    }

    #[tokio::test]
    async fn test_offline_capture_then_reconnect_sync() {
        let http = SwitchableEndpoint::new(200);
        let monitor = ToggleMonitor::offline();
        let service = service(http.clone(), Some(monitor.clone())).await;
        let mut rx = service.subscribe();

        // In the field, no signal: the submission lands in the queue.
        let outcome = service.submit(survey_body("Ravi")).await.unwrap();
        let queued_id = match outcome {
            SubmitOutcome::Queued(id) => id,
            other => panic!("expected queued, got {other:?}"),
        };
        let pending = service.list_pending_for_display().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].label, "Ravi");
        assert_eq!(pending[0].point_count, 4);

        // Back in town: sync drains the queue.
        monitor.online.store(true, Ordering::SeqCst);
        let report = service.sync_now().await.unwrap().unwrap();
        assert_eq!(report.synced, 1);
        assert_eq!(service.pending_count().await.unwrap(), 0);

        let mut saw_synced = false;
        while let Ok(event) = rx.try_recv() {
            if let CoreEvent::Sync(SyncEvent::RecordSynced { id }) = event {
                assert_eq!(id, queued_id.to_string());
                saw_synced = true;
            }
        }
        assert!(saw_synced);
    }

    #[tokio::test]
    async fn test_discard_removes_record_and_reports_missing_ids() {
        let http = SwitchableEndpoint::new(200);
        let monitor = ToggleMonitor::offline();
        let service = service(http, Some(monitor)).await;

        let id = match service.submit(survey_body("Ravi")).await.unwrap() {
            SubmitOutcome::Queued(id) => id,
            other => panic!("expected queued, got {other:?}"),
        };

        assert!(service.discard(&id).await.unwrap());
        assert_eq!(service.pending_count().await.unwrap(), 0);
        // Second discard: already gone.
        assert!(!service.discard(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_label_falls_back_when_name_missing() {
        let http = SwitchableEndpoint::new(200);
        let monitor = ToggleMonitor::offline();
        let service = service(http, Some(monitor)).await;

        service
            .submit(SubmissionBody::new().field("village", "Kothapalli"))
            .await
            .unwrap();
        let pending = service.list_pending_for_display().await.unwrap();
        assert_eq!(pending[0].label, "Unnamed submission");
    }

    #[tokio::test]
    async fn test_start_without_optional_bridges() {
        let http = SwitchableEndpoint::new(200);
        let service = service(http, None).await;
        assert!(service.start().await.unwrap().is_none());
    }
}
