//! # Survey Core Service
//!
//! The host-facing assembly of the survey core: configuration in, a working
//! offline-capable submission pipeline out.
//!
//! ## Overview
//!
//! A host (desktop daemon, mobile shell) builds a
//! [`CoreConfig`](core_runtime::config::CoreConfig) with its platform
//! bridges, constructs a [`SurveyService`], and calls
//! [`SurveyService::start`] to attach the reconnect and background-sync
//! triggers. From then on [`SurveyService::submit`] is safe to call with or
//! without connectivity.

pub mod error;
pub mod service;

pub use error::{CoreError, Result};
pub use service::{PendingSummary, SubmitOutcome, SurveyService};
