//! # Durable Submission Queue
//!
//! Persistent, keyed table of pending submissions surviving process restart.
//!
//! ## Overview
//!
//! The store is the only shared mutable resource in the sync pipeline. Every
//! mutation is a single SQL statement, so a concurrent reader never observes
//! a half-updated record, and a crash between statements leaves each record
//! in a consistent state.
//!
//! ## Crash recovery
//!
//! `syncing` is an in-flight claim, not durable state. On open,
//! [`SqliteSubmissionStore::initialize`] resets any `syncing` row left behind
//! by a prior run to `pending`, so an interrupted send is retried rather than
//! orphaned.
//!
//! ## Usage
//!
//! ```ignore
//! use core_sync::{SqliteSubmissionStore, SubmissionBody, SubmissionStore};
//!
//! # async fn example(pool: sqlx::SqlitePool, clock: std::sync::Arc<dyn bridge_traits::time::Clock>) -> core_sync::Result<()> {
//! let store = SqliteSubmissionStore::new(pool, clock);
//! store.initialize().await?;
//!
//! let record = store
//!     .enqueue(SubmissionBody::new().field("farmerName", "Ravi"))
//!     .await?;
//! assert_eq!(store.list_pending().await?.len(), 1);
//! store.mark_synced(&record.id).await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use bridge_traits::time::Clock;
use bytes::Bytes;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};
use crate::record::{
    Attachments, DerivedGeometry, FieldValue, GeoPoint, PendingSubmission, SubmissionBody,
    SubmissionId, SubmissionStatus,
};

/// Durable queue store contract.
///
/// All mutating operations are atomic with respect to concurrent readers.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Insert a submission with `status = pending`, `created_at = now`,
    /// `attempt_count = 0`.
    ///
    /// Fails with [`SyncError::Storage`] when the persistence layer is
    /// unavailable or full; callers must surface this so the loss is visible.
    async fn enqueue(&self, body: SubmissionBody) -> Result<PendingSubmission>;

    /// Snapshot of all queued records in ascending `(created_at, seq)` order.
    async fn list_pending(&self) -> Result<Vec<PendingSubmission>>;

    /// Atomically claim a record for sending.
    ///
    /// Succeeds only from `pending`; returns whether the claim was won. A
    /// concurrent pass that loses the claim skips the record.
    async fn mark_syncing(&self, id: &SubmissionId) -> Result<bool>;

    /// Remove a record after server acknowledgement.
    ///
    /// Deleting an already-removed record is not an error; a duplicate
    /// delivery may have won the race.
    async fn mark_synced(&self, id: &SubmissionId) -> Result<()>;

    /// Record a failed send attempt: increments `attempt_count` and reverts
    /// the record to `pending`. Returns the new attempt count.
    async fn mark_failed(&self, id: &SubmissionId) -> Result<u32>;

    /// Fetch a record by ID.
    async fn get(&self, id: &SubmissionId) -> Result<Option<PendingSubmission>>;

    /// Delete a record by ID (user-initiated discard). Returns whether a
    /// record was removed.
    async fn delete(&self, id: &SubmissionId) -> Result<bool>;

    /// Number of queued records.
    async fn count_pending(&self) -> Result<u64>;
}

/// SQLite implementation of the submission queue.
pub struct SqliteSubmissionStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqliteSubmissionStore {
    /// Create a new store over an injected pool. Call
    /// [`initialize`](Self::initialize) before first use.
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    /// Create schema if needed and run crash recovery.
    pub async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pending_submissions (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                fields TEXT NOT NULL,
                photo BLOB,
                id_document BLOB,
                agreement BLOB,
                geo_points TEXT NOT NULL,
                derived TEXT,
                status TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                attempt_count INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| SyncError::Storage(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_pending_submissions_status
            ON pending_submissions(status, created_at ASC, seq ASC)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| SyncError::Storage(e.to_string()))?;

        // The in-flight claim is not durable state. Anything still marked
        // syncing belonged to a run that died mid-send.
        let recovered = sqlx::query(
            "UPDATE pending_submissions SET status = 'pending' WHERE status = 'syncing'",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| SyncError::Storage(e.to_string()))?
        .rows_affected();

        if recovered > 0 {
            warn!(
                recovered = recovered,
                "Reset submissions orphaned in syncing state"
            );
        }

        Ok(())
    }

    fn map_row(row: &SqliteRow) -> Result<PendingSubmission> {
        let fields: BTreeMap<String, FieldValue> =
            serde_json::from_str(&row.get::<String, _>("fields"))
                .map_err(|e| SyncError::Storage(format!("Corrupt fields column: {e}")))?;
        let geo_points: Vec<GeoPoint> = serde_json::from_str(&row.get::<String, _>("geo_points"))
            .map_err(|e| SyncError::Storage(format!("Corrupt geo_points column: {e}")))?;
        let derived: Option<DerivedGeometry> = match row.get::<Option<String>, _>("derived") {
            Some(json) => Some(
                serde_json::from_str(&json)
                    .map_err(|e| SyncError::Storage(format!("Corrupt derived column: {e}")))?,
            ),
            None => None,
        };

        Ok(PendingSubmission {
            id: SubmissionId::from_string(&row.get::<String, _>("id"))?,
            seq: row.get("seq"),
            body: SubmissionBody {
                fields,
                attachments: Attachments {
                    photo: row.get::<Option<Vec<u8>>, _>("photo").map(Bytes::from),
                    id_document: row
                        .get::<Option<Vec<u8>>, _>("id_document")
                        .map(Bytes::from),
                    agreement: row.get::<Option<Vec<u8>>, _>("agreement").map(Bytes::from),
                },
                geo_points,
                derived,
            },
            status: row.get::<String, _>("status").parse()?,
            created_at: row.get("created_at"),
            attempt_count: row.get::<i64, _>("attempt_count") as u32,
        })
    }
}

#[async_trait]
impl SubmissionStore for SqliteSubmissionStore {
    async fn enqueue(&self, body: SubmissionBody) -> Result<PendingSubmission> {
        let id = SubmissionId::new();
        let created_at = self.clock.unix_timestamp_millis();

        let fields = serde_json::to_string(&body.fields)
            .map_err(|e| SyncError::Storage(e.to_string()))?;
        let geo_points = serde_json::to_string(&body.geo_points)
            .map_err(|e| SyncError::Storage(e.to_string()))?;
        let derived = body
            .derived
            .map(|d| serde_json::to_string(&d))
            .transpose()
            .map_err(|e| SyncError::Storage(e.to_string()))?;

        let result = sqlx::query(
            r#"
            INSERT INTO pending_submissions (
                id, fields, photo, id_document, agreement,
                geo_points, derived, status, created_at, attempt_count
            ) VALUES (?, ?, ?, ?, ?, ?, ?, 'pending', ?, 0)
            "#,
        )
        .bind(id.to_string())
        .bind(&fields)
        .bind(body.attachments.photo.as_ref().map(|b| b.to_vec()))
        .bind(body.attachments.id_document.as_ref().map(|b| b.to_vec()))
        .bind(body.attachments.agreement.as_ref().map(|b| b.to_vec()))
        .bind(&geo_points)
        .bind(derived.as_deref())
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| SyncError::Storage(e.to_string()))?;

        let record = PendingSubmission {
            id,
            seq: result.last_insert_rowid(),
            body,
            status: SubmissionStatus::Pending,
            created_at,
            attempt_count: 0,
        };

        info!(
            submission_id = %record.id,
            seq = record.seq,
            point_count = record.body.geo_points.len(),
            "Enqueued submission"
        );

        Ok(record)
    }

    async fn list_pending(&self) -> Result<Vec<PendingSubmission>> {
        let rows = sqlx::query(
            r#"
            SELECT seq, id, fields, photo, id_document, agreement,
                   geo_points, derived, status, created_at, attempt_count
            FROM pending_submissions
            WHERE status = 'pending'
            ORDER BY created_at ASC, seq ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SyncError::Storage(e.to_string()))?;

        rows.iter().map(Self::map_row).collect()
    }

    async fn mark_syncing(&self, id: &SubmissionId) -> Result<bool> {
        let claimed = sqlx::query(
            "UPDATE pending_submissions SET status = 'syncing' WHERE id = ? AND status = 'pending'",
        )
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| SyncError::Storage(e.to_string()))?
        .rows_affected()
            == 1;

        if !claimed {
            debug!(submission_id = %id, "Claim lost, record not pending");
        }

        Ok(claimed)
    }

    async fn mark_synced(&self, id: &SubmissionId) -> Result<()> {
        let removed = sqlx::query("DELETE FROM pending_submissions WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| SyncError::Storage(e.to_string()))?
            .rows_affected();

        if removed == 0 {
            debug!(submission_id = %id, "Synced record already removed");
        } else {
            info!(submission_id = %id, "Submission acknowledged and removed");
        }

        Ok(())
    }

    async fn mark_failed(&self, id: &SubmissionId) -> Result<u32> {
        let row = sqlx::query(
            r#"
            UPDATE pending_submissions
            SET status = 'pending', attempt_count = attempt_count + 1
            WHERE id = ?
            RETURNING attempt_count
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SyncError::Storage(e.to_string()))?
        .ok_or_else(|| SyncError::NotFound { id: id.to_string() })?;

        Ok(row.get::<i64, _>(0) as u32)
    }

    async fn get(&self, id: &SubmissionId) -> Result<Option<PendingSubmission>> {
        let row = sqlx::query(
            r#"
            SELECT seq, id, fields, photo, id_document, agreement,
                   geo_points, derived, status, created_at, attempt_count
            FROM pending_submissions
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SyncError::Storage(e.to_string()))?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn delete(&self, id: &SubmissionId) -> Result<bool> {
        let removed = sqlx::query("DELETE FROM pending_submissions WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| SyncError::Storage(e.to_string()))?
            .rows_affected();

        Ok(removed == 1)
    }

    async fn count_pending(&self) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM pending_submissions WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| SyncError::Storage(e.to_string()))?;

        Ok(count as u64)
    }
}
