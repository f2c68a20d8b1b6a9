//! Submission record model.
//!
//! A [`SubmissionBody`] is what the form layer hands over: scalar fields,
//! optional binary attachments, and the captured boundary points. A
//! [`PendingSubmission`] is a body that has been persisted to the queue with
//! identity, status, and retry bookkeeping attached.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::{Result, SyncError};

/// Type-safe submission identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubmissionId(Uuid);

impl SubmissionId {
    /// Create a new random submission ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a submission ID from a string
    pub fn from_string(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| SyncError::InvalidId(e.to_string()))
    }
}

impl Default for SubmissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Submission status
///
/// `Syncing` is a transient claim held only while a send is in flight; the
/// store resets it to `Pending` on open, so it is never observable as durable
/// state after a crash. `Synced` records are deleted rather than retained, so
/// the variant only appears in in-memory reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionStatus {
    /// Queued and waiting to be sent
    Pending,
    /// Claimed by a sync run, send in flight
    Syncing,
    /// Accepted by the server (record removed from the queue)
    Synced,
    /// Last send attempt failed (reverted to pending immediately)
    Failed,
}

impl SubmissionStatus {
    /// Convert status to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for SubmissionStatus {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "syncing" => Ok(Self::Syncing),
            "synced" => Ok(Self::Synced),
            "failed" => Ok(Self::Failed),
            _ => Err(SyncError::InvalidStatus(s.to_string())),
        }
    }
}

/// Scalar form field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(f64),
}

impl FieldValue {
    /// Wire representation of the value.
    ///
    /// Numbers use Rust's shortest round-trip formatting so repeated
    /// encodings are identical.
    pub fn to_wire(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Number(n) => format!("{n}"),
        }
    }

    /// Whether the value is structurally sound for encoding.
    pub fn is_well_formed(&self) -> bool {
        match self {
            FieldValue::Text(_) => true,
            FieldValue::Number(n) => n.is_finite(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

/// One captured boundary point. Order within [`SubmissionBody::geo_points`]
/// matters; it defines the polygon path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_well_formed(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

/// Precomputed geometry supplied by the map layer. Not transmitted; kept for
/// display and review.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedGeometry {
    /// Polygon area in the map layer's unit
    pub area: f64,
    /// Whether the captured path closes back on its first point
    pub polygon_closed: bool,
}

/// Named binary attachment slots.
///
/// Slots are fixed by the wire contract; attachments are immutable once the
/// record is stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attachments {
    pub photo: Option<bytes::Bytes>,
    pub id_document: Option<bytes::Bytes>,
    pub agreement: Option<bytes::Bytes>,
}

impl Attachments {
    pub fn is_empty(&self) -> bool {
        self.photo.is_none() && self.id_document.is_none() && self.agreement.is_none()
    }
}

/// The wire-facing content of a submission, shared between the foreground
/// "send now" path and queued records so both encode identically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmissionBody {
    /// Scalar field name -> value; insertion order is irrelevant
    pub fields: BTreeMap<String, FieldValue>,
    /// Binary attachment slots
    pub attachments: Attachments,
    /// Ordered polygon/breadcrumb path
    pub geo_points: Vec<GeoPoint>,
    /// Optional precomputed geometry
    pub derived: Option<DerivedGeometry>,
}

impl SubmissionBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn geo_point(mut self, lat: f64, lng: f64) -> Self {
        self.geo_points.push(GeoPoint::new(lat, lng));
        self
    }
}

/// One row of the durable queue: an unsent submission with identity and
/// retry bookkeeping.
#[derive(Debug, Clone)]
pub struct PendingSubmission {
    /// Unique identifier, never reused
    pub id: SubmissionId,
    /// Store-assigned monotonic sequence; creation-order tiebreaker for
    /// records sharing a `created_at` millisecond
    pub seq: i64,
    /// Wire-facing content
    pub body: SubmissionBody,
    /// Current status
    pub status: SubmissionStatus,
    /// Epoch milliseconds at enqueue time, immutable
    pub created_at: i64,
    /// Failed send attempts so far
    pub attempt_count: u32,
}
