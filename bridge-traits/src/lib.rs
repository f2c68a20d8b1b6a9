//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the survey core and platform-specific
//! implementations. Each trait represents a capability the core requires but that
//! is provided differently per host (desktop daemon, mobile shell, web client).
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations for submission delivery
//! - [`NetworkMonitor`](network::NetworkMonitor) - Connectivity detection and change streams
//! - [`SyncSignalSource`](signal::SyncSignalSource) - Platform background-sync signal
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with descriptive errors when a required capability is
//! missing; optional capabilities (notably [`SyncSignalSource`]) degrade to the
//! remaining triggers rather than erroring.
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Platform
//! implementations should convert host-specific errors into `BridgeError` with
//! actionable messages.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so implementations can be shared
//! across async tasks behind `Arc`.

pub mod error;
pub mod http;
pub mod network;
pub mod signal;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use network::{NetworkChangeStream, NetworkInfo, NetworkMonitor, NetworkStatus};
pub use signal::{SyncSignal, SyncSignalSource};
pub use time::{Clock, SystemClock};
