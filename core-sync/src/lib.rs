//! # Offline Sync Module
//!
//! Durable queue and background synchronization for survey submissions.
//!
//! ## Overview
//!
//! This crate owns the offline delivery pipeline:
//! - Persisting completed submissions that could not be sent immediately
//! - Draining the queue against the remote endpoint when connectivity returns
//! - At-least-once delivery with crash-safe state transitions
//!
//! ## Components
//!
//! - **Submission Model** (`record`): the queued record and its wire-facing body
//! - **Queue Store** (`store`): durable, keyed SQLite table with atomic state transitions
//! - **Encoder** (`encoder`): deterministic multipart encoding shared by every send path
//! - **Sync Worker** (`worker`): sequential queue drain with per-record outcomes
//! - **Sync Trigger** (`scheduler`): reconnect/signal/manual firing with debounce

pub mod encoder;
pub mod error;
pub mod record;
pub mod scheduler;
pub mod store;
pub mod worker;

pub use encoder::{encode, GeoEncoding, WireContract, WirePayload};
pub use error::{Result, SyncError};
pub use record::{
    Attachments, DerivedGeometry, FieldValue, GeoPoint, PendingSubmission, SubmissionBody,
    SubmissionId, SubmissionStatus,
};
pub use scheduler::{SyncTrigger, TriggerConfig, TriggerSource};
pub use store::{SqliteSubmissionStore, SubmissionStore};
pub use worker::{RunReport, SyncConfig, SyncWorker};
