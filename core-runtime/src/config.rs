//! # Core Configuration Module
//!
//! Configuration management for the survey core.
//!
//! ## Overview
//!
//! The configuration system uses a builder to construct a [`CoreConfig`] that
//! holds the bridge dependencies and settings the core needs. It enforces
//! fail-fast validation so a missing required capability surfaces at startup
//! with an actionable message instead of as a runtime surprise.
//!
//! ## Required Dependencies
//!
//! - `HttpClient` - submission delivery
//!
//! ## Optional Dependencies
//!
//! - `NetworkMonitor` - online-first submit and reconnect trigger; without it
//!   the core always attempts online first and relies on manual/signal
//!   triggers
//! - `SyncSignalSource` - platform background-sync signal; its absence leaves
//!   the reconnect and manual triggers as fallbacks
//! - `Clock` - defaults to the system clock
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/data/survey.db")
//!     .http_client(Arc::new(MyHttpClient))
//!     .network_monitor(Arc::new(MyNetworkMonitor))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{
    http::HttpClient, network::NetworkMonitor, signal::SyncSignalSource, time::Clock,
    time::SystemClock,
};
use std::path::PathBuf;
use std::sync::Arc;

use crate::events::DEFAULT_EVENT_BUFFER_SIZE;

/// Core configuration for the survey core.
///
/// Use [`CoreConfig::builder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Path to the SQLite database file holding the submission queue
    pub database_path: PathBuf,

    /// Event bus buffer size
    pub event_buffer_size: usize,

    /// HTTP client for submission delivery (required)
    pub http_client: Arc<dyn HttpClient>,

    /// Network connectivity monitor (optional)
    pub network_monitor: Option<Arc<dyn NetworkMonitor>>,

    /// Platform background-sync signal source (optional)
    pub sync_signal: Option<Arc<dyn SyncSignalSource>>,

    /// Time source
    pub clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("database_path", &self.database_path)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish_non_exhaustive()
    }
}

impl CoreConfig {
    /// Create a new configuration builder.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    event_buffer_size: Option<usize>,
    http_client: Option<Arc<dyn HttpClient>>,
    network_monitor: Option<Arc<dyn NetworkMonitor>>,
    sync_signal: Option<Arc<dyn SyncSignalSource>>,
    clock: Option<Arc<dyn Clock>>,
}

impl CoreConfigBuilder {
    /// Set the SQLite database path (required).
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Override the event bus buffer size.
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Set the HTTP client (required).
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Set the network monitor.
    pub fn network_monitor(mut self, monitor: Arc<dyn NetworkMonitor>) -> Self {
        self.network_monitor = Some(monitor);
        self
    }

    /// Set the background-sync signal source.
    pub fn sync_signal(mut self, signal: Arc<dyn SyncSignalSource>) -> Self {
        self.sync_signal = Some(signal);
        self
    }

    /// Set a custom time source.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the database path is missing and
    /// [`Error::CapabilityMissing`] when a required bridge was not provided.
    pub fn build(self) -> Result<CoreConfig> {
        let database_path = self
            .database_path
            .ok_or_else(|| Error::Config("database_path is required".to_string()))?;

        let http_client = self.http_client.ok_or_else(|| Error::CapabilityMissing {
            capability: "HttpClient".to_string(),
            message: "No HTTP client implementation provided. \
                      Desktop hosts: use bridge_desktop::ReqwestHttpClient. \
                      Other hosts: inject a platform-native adapter."
                .to_string(),
        })?;

        Ok(CoreConfig {
            database_path,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            http_client,
            network_monitor: self.network_monitor,
            sync_signal: self.sync_signal,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::{HttpRequest, HttpResponse};

    struct NoopHttpClient;

    #[async_trait]
    impl HttpClient for NoopHttpClient {
        async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
            Ok(HttpResponse {
                status: 200,
                headers: Default::default(),
                body: Default::default(),
            })
        }
    }

    #[test]
    fn test_build_minimal_config() {
        let config = CoreConfig::builder()
            .database_path("/tmp/survey.db")
            .http_client(Arc::new(NoopHttpClient))
            .build()
            .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/survey.db"));
        assert!(config.network_monitor.is_none());
        assert!(config.sync_signal.is_none());
        assert_eq!(config.event_buffer_size, DEFAULT_EVENT_BUFFER_SIZE);
    }

    #[test]
    fn test_missing_database_path() {
        let err = CoreConfig::builder()
            .http_client(Arc::new(NoopHttpClient))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_missing_http_client() {
        let err = CoreConfig::builder()
            .database_path("/tmp/survey.db")
            .build()
            .unwrap_err();
        match err {
            Error::CapabilityMissing { capability, .. } => assert_eq!(capability, "HttpClient"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
