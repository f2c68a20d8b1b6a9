//! # Sync Worker
//!
//! Drains the submission queue against the remote endpoint.
//!
//! ## Overview
//!
//! One run: `Idle -> Draining -> (per-record send)* -> Idle`.
//!
//! - Snapshot the pending records; an empty queue is a successful no-op.
//! - Strictly sequential per record, oldest first: encode, claim, send.
//!   Sequential processing bounds load on the endpoint and keeps the
//!   in-run ordering guarantee trivial.
//! - 2xx: remove the record and emit a success event. Anything else
//!   (network error, timeout, non-2xx): record the failed attempt, requeue,
//!   and continue. One record's failure never aborts the batch.
//! - A record that fails to encode is reported and left untouched:
//!   `attempt_count` counts actual sends, and re-running cannot fix it.
//!   Discarding it from the pending list is the remedy.
//! - No in-run retry or backoff; retry timing belongs to the trigger.
//!
//! Safe under concurrent invocation from multiple trigger sources: the
//! store's claim is the lock. A record already claimed by another pass is
//! skipped. Losing the race both ways costs at most a duplicate submission,
//! never data loss.

use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::encoder::{encode, WireContract, WirePayload};
use crate::error::{Result, SyncError};
use crate::record::SubmissionBody;
use crate::store::SubmissionStore;

/// Sync worker configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Remote submission endpoint
    pub endpoint_url: String,

    /// Per-record send timeout; a hung request counts as a failure
    pub send_timeout: Duration,

    /// The fixed wire contract shared with the foreground send path
    pub contract: WireContract,
}

impl SyncConfig {
    pub fn new(endpoint_url: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            send_timeout: Duration::from_secs(20),
            contract: WireContract::v1(),
        }
    }
}

/// Outcome of one sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Records in the snapshot this run attempted
    pub attempted: u64,
    /// Records delivered and removed
    pub synced: u64,
    /// Records that failed and remain queued
    pub failed: u64,
    /// Records skipped because another pass held the claim
    pub skipped: u64,
}

impl RunReport {
    pub fn drained(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }
}

/// Background worker that flushes the queue to the server.
pub struct SyncWorker {
    store: Arc<dyn SubmissionStore>,
    http: Arc<dyn HttpClient>,
    events: EventBus,
    config: SyncConfig,
}

impl SyncWorker {
    pub fn new(
        store: Arc<dyn SubmissionStore>,
        http: Arc<dyn HttpClient>,
        events: EventBus,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            http,
            events,
            config,
        }
    }

    /// Deliver a single submission body to the endpoint.
    ///
    /// This is the only send path in the workspace; the foreground
    /// try-online-first submit uses it too, so both paths share one encoder
    /// and one contract.
    pub async fn deliver(&self, body: &SubmissionBody) -> Result<()> {
        let payload = encode(body, &self.config.contract)?;
        self.send(payload).await
    }

    async fn send(&self, payload: WirePayload) -> Result<()> {
        let request = HttpRequest::new(HttpMethod::Post, &self.config.endpoint_url)
            .content_type(payload.content_type)
            .body(payload.body)
            .timeout(self.config.send_timeout);

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;

        if response.is_success() {
            Ok(())
        } else {
            Err(SyncError::Server {
                status: response.status,
            })
        }
    }

    /// Drain the current pending snapshot.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<RunReport> {
        let snapshot = self.store.list_pending().await?;
        if snapshot.is_empty() {
            debug!("Queue empty, nothing to sync");
            return Ok(RunReport::default());
        }

        let mut report = RunReport {
            attempted: snapshot.len() as u64,
            ..RunReport::default()
        };

        self.events
            .emit(CoreEvent::Sync(SyncEvent::RunStarted {
                pending: report.attempted,
            }))
            .ok();

        for record in snapshot {
            // Encode before claiming. A record that cannot encode is a bug
            // signal from the form layer; it is left untouched so
            // attempt_count keeps reflecting actual sends, and the user's
            // remedy is discarding it from the pending list.
            let payload = match encode(&record.body, &self.config.contract) {
                Ok(payload) => payload,
                Err(e) => {
                    error!(submission_id = %record.id, error = %e, "Submission failed to encode");
                    report.failed += 1;
                    self.events
                        .emit(CoreEvent::Sync(SyncEvent::RecordFailed {
                            id: record.id.to_string(),
                            message: e.to_string(),
                            attempt_count: record.attempt_count,
                        }))
                        .ok();
                    continue;
                }
            };

            if !self.store.mark_syncing(&record.id).await? {
                report.skipped += 1;
                continue;
            }

            match self.send(payload).await {
                Ok(()) => {
                    self.store.mark_synced(&record.id).await?;
                    report.synced += 1;
                    info!(submission_id = %record.id, "Submission synced");
                    self.events
                        .emit(CoreEvent::Sync(SyncEvent::RecordSynced {
                            id: record.id.to_string(),
                        }))
                        .ok();
                }
                Err(e) if e.is_transient() => {
                    let attempt_count = self.store.mark_failed(&record.id).await?;
                    report.failed += 1;
                    warn!(
                        submission_id = %record.id,
                        attempt_count = attempt_count,
                        error = %e,
                        "Send failed, submission stays queued"
                    );
                    self.events
                        .emit(CoreEvent::Sync(SyncEvent::RecordFailed {
                            id: record.id.to_string(),
                            message: e.to_string(),
                            attempt_count,
                        }))
                        .ok();
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            attempted = report.attempted,
            synced = report.synced,
            failed = report.failed,
            skipped = report.skipped,
            "Sync run completed"
        );

        self.events
            .emit(CoreEvent::Sync(SyncEvent::RunCompleted {
                synced: report.synced,
                failed: report.failed,
            }))
            .ok();

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{PendingSubmission, SubmissionBody, SubmissionId, SubmissionStatus};
    use crate::store::{SqliteSubmissionStore, SubmissionStore};
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::http::HttpResponse;
    use bridge_traits::SystemClock;
    use bytes::Bytes;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted endpoint: pops one status (or error) per request, records
    /// the bodies it saw.
    struct ScriptedEndpoint {
        script: Mutex<Vec<BridgeResult<u16>>>,
        seen: Mutex<Vec<Bytes>>,
    }

    impl ScriptedEndpoint {
        fn new(script: Vec<BridgeResult<u16>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn always_ok() -> Arc<Self> {
            Self::new(vec![])
        }

        fn requests_seen(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl HttpClient for ScriptedEndpoint {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
            self.seen
                .lock()
                .unwrap()
                .push(request.body.unwrap_or_default());
            let next = {
                let mut script = self.script.lock().unwrap();
                if script.is_empty() {
                    Ok(200)
                } else {
                    script.remove(0)
                }
            };
            next.map(|status| HttpResponse {
                status,
                headers: HashMap::new(),
                body: Bytes::new(),
            })
        }
    }

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .unwrap()
    }

    async fn open_store(pool: &SqlitePool) -> Arc<SqliteSubmissionStore> {
        let store = SqliteSubmissionStore::new(pool.clone(), Arc::new(SystemClock));
        store.initialize().await.unwrap();
        Arc::new(store)
    }

    fn worker(
        store: Arc<SqliteSubmissionStore>,
        http: Arc<ScriptedEndpoint>,
        events: EventBus,
    ) -> SyncWorker {
        SyncWorker::new(
            store,
            http,
            events,
            SyncConfig::new("https://api.example.com/api/submit"),
        )
    }

    fn sample_body(name: &str) -> SubmissionBody {
        SubmissionBody::new()
            .field("farmerName", name)
            .geo_point(20.1, 78.9)
    }

    #[tokio::test]
    async fn test_empty_queue_is_a_noop() {
        let pool = memory_pool().await;
        let store = open_store(&pool).await;
        let worker = worker(store, ScriptedEndpoint::always_ok(), EventBus::new(16));

        let report = worker.run().await.unwrap();
        assert_eq!(report, RunReport::default());
    }

    #[tokio::test]
    async fn test_success_drains_queue_with_one_event_per_record() {
        let pool = memory_pool().await;
        let store = open_store(&pool).await;
        let a = store.enqueue(sample_body("Ravi")).await.unwrap();
        let b = store.enqueue(sample_body("Meera")).await.unwrap();

        let events = EventBus::new(16);
        let mut rx = events.subscribe();
        let worker = worker(store.clone(), ScriptedEndpoint::always_ok(), events);

        let report = worker.run().await.unwrap();
        assert_eq!(report.attempted, 2);
        assert_eq!(report.synced, 2);
        assert!(report.drained());
        assert_eq!(store.count_pending().await.unwrap(), 0);

        let mut synced_ids = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let CoreEvent::Sync(SyncEvent::RecordSynced { id }) = event {
                synced_ids.push(id);
            }
        }
        assert_eq!(synced_ids, vec![a.id.to_string(), b.id.to_string()]);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_abort_the_batch() {
        let pool = memory_pool().await;
        let store = open_store(&pool).await;
        let a = store.enqueue(sample_body("Ravi")).await.unwrap();
        let b = store.enqueue(sample_body("Meera")).await.unwrap();

        // A gets a server error, B succeeds.
        let http = ScriptedEndpoint::new(vec![Ok(503), Ok(200)]);
        let worker = worker(store.clone(), http, EventBus::new(16));

        let report = worker.run().await.unwrap();
        assert_eq!(report.synced, 1);
        assert_eq!(report.failed, 1);

        let remaining = store.list_pending().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, a.id);
        assert_eq!(remaining[0].attempt_count, 1);
        assert_eq!(remaining[0].status, SubmissionStatus::Pending);
        assert!(store.get(&b.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_network_error_keeps_record_queued() {
        let pool = memory_pool().await;
        let store = open_store(&pool).await;
        let record = store.enqueue(sample_body("Ravi")).await.unwrap();

        let http = ScriptedEndpoint::new(vec![Err(BridgeError::OperationFailed(
            "connection refused".to_string(),
        ))]);
        let events = EventBus::new(16);
        let mut rx = events.subscribe();
        let worker = worker(store.clone(), http, events);

        let report = worker.run().await.unwrap();
        assert_eq!(report.failed, 1);

        let found = store.get(&record.id).await.unwrap().unwrap();
        assert_eq!(found.attempt_count, 1);

        let mut saw_failure = false;
        while let Ok(event) = rx.try_recv() {
            if let CoreEvent::Sync(SyncEvent::RecordFailed {
                id, attempt_count, ..
            }) = event
            {
                assert_eq!(id, record.id.to_string());
                assert_eq!(attempt_count, 1);
                saw_failure = true;
            }
        }
        assert!(saw_failure);
    }

    #[tokio::test]
    async fn test_no_in_run_retry_after_failure() {
        let pool = memory_pool().await;
        let store = open_store(&pool).await;
        store.enqueue(sample_body("Ravi")).await.unwrap();

        let http = ScriptedEndpoint::new(vec![Ok(500)]);
        let worker = worker(store.clone(), http.clone(), EventBus::new(16));

        worker.run().await.unwrap();
        // Exactly one request: the failed record waits for the next trigger.
        assert_eq!(http.requests_seen(), 1);
    }

    /// Store stub serving one fixed record; counts every mutating call.
    struct FrozenStore {
        record: PendingSubmission,
        mutations: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl SubmissionStore for FrozenStore {
        async fn enqueue(&self, _body: SubmissionBody) -> Result<PendingSubmission> {
            unreachable!("worker never enqueues")
        }

        async fn list_pending(&self) -> Result<Vec<PendingSubmission>> {
            Ok(vec![self.record.clone()])
        }

        async fn mark_syncing(&self, _id: &SubmissionId) -> Result<bool> {
            self.mutations.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }

        async fn mark_synced(&self, _id: &SubmissionId) -> Result<()> {
            self.mutations.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn mark_failed(&self, _id: &SubmissionId) -> Result<u32> {
            self.mutations.fetch_add(1, Ordering::SeqCst);
            Ok(self.record.attempt_count + 1)
        }

        async fn get(&self, _id: &SubmissionId) -> Result<Option<PendingSubmission>> {
            Ok(Some(self.record.clone()))
        }

        async fn delete(&self, _id: &SubmissionId) -> Result<bool> {
            self.mutations.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }

        async fn count_pending(&self) -> Result<u64> {
            Ok(1)
        }
    }

    #[tokio::test]
    async fn test_unencodable_record_reported_without_state_change() {
        let record = PendingSubmission {
            id: SubmissionId::new(),
            seq: 1,
            body: SubmissionBody::new()
                .field("farmerName", "Ravi")
                .geo_point(f64::NAN, 78.9),
            status: SubmissionStatus::Pending,
            created_at: 1_700_000_000_000,
            attempt_count: 0,
        };
        let store = Arc::new(FrozenStore {
            record: record.clone(),
            mutations: AtomicUsize::new(0),
        });
        let http = ScriptedEndpoint::always_ok();
        let events = EventBus::new(16);
        let mut rx = events.subscribe();
        let worker = SyncWorker::new(
            store.clone(),
            http.clone(),
            events,
            SyncConfig::new("https://api.example.com/api/submit"),
        );

        let report = worker.run().await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.synced, 0);
        // No claim, no send, no attempt counted: re-running cannot fix the
        // record, so its state must not churn.
        assert_eq!(store.mutations.load(Ordering::SeqCst), 0);
        assert_eq!(http.requests_seen(), 0);

        let mut saw_failure = false;
        while let Ok(event) = rx.try_recv() {
            if let CoreEvent::Sync(SyncEvent::RecordFailed {
                id, attempt_count, ..
            }) = event
            {
                assert_eq!(id, record.id.to_string());
                assert_eq!(attempt_count, 0);
                saw_failure = true;
            }
        }
        assert!(saw_failure);
    }

    #[tokio::test]
    async fn test_claimed_records_are_skipped() {
        let pool = memory_pool().await;
        let store = open_store(&pool).await;
        let record = store.enqueue(sample_body("Ravi")).await.unwrap();

        // Simulate another pass holding the claim over the same snapshot.
        let snapshot = store.list_pending().await.unwrap();
        assert!(store.mark_syncing(&record.id).await.unwrap());
        assert_eq!(snapshot.len(), 1);

        let http = ScriptedEndpoint::always_ok();
        let worker = worker(store.clone(), http.clone(), EventBus::new(16));
        let report = worker.run().await.unwrap();

        // list_pending no longer returns the claimed record.
        assert_eq!(report, RunReport::default());
        assert_eq!(http.requests_seen(), 0);
    }

    #[tokio::test]
    async fn test_worker_sends_contract_payload() {
        let pool = memory_pool().await;
        let store = open_store(&pool).await;
        store.enqueue(sample_body("Ravi")).await.unwrap();

        let http = ScriptedEndpoint::always_ok();
        let worker = worker(store, http.clone(), EventBus::new(16));
        worker.run().await.unwrap();

        let seen = http.seen.lock().unwrap();
        let text = String::from_utf8(seen[0].to_vec()).unwrap();
        assert!(text.contains("name=\"farmerName\"\r\n\r\nRavi\r\n"));
        assert!(text.contains("name=\"latitude[]\"\r\n\r\n20.1\r\n"));
    }
}
