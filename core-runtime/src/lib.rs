//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the survey core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the other modules depend on. It
//! establishes the logging conventions and the event broadcasting mechanism
//! used to notify foreground contexts about sync outcomes.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder};
pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus, QueueEvent, SyncEvent};
