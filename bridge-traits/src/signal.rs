//! Background Sync Signal Abstraction
//!
//! Abstracts the platform mechanism that wakes the sync worker outside of
//! any foreground context:
//!
//! - **Web**: SyncManager background-sync events delivered to a service worker
//! - **Android**: WorkManager periodic work
//! - **iOS**: BGAppRefreshTask
//! - **Desktop**: a timer loop in the host process
//!
//! Absence of the capability is not an error; the reconnect and manual
//! triggers remain sufficient fallbacks.

use futures_util::future::BoxFuture;
use std::sync::Arc;

use crate::error::Result;

/// Handler invoked each time the platform sync signal fires.
pub type SyncSignalHandler = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// A registered sync signal, identified by its tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SyncSignal(pub String);

impl SyncSignal {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn tag(&self) -> &str {
        &self.0
    }
}

/// Source of platform background-sync signals.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::signal::{SyncSignal, SyncSignalSource};
/// use std::sync::Arc;
///
/// async fn wire(source: &dyn SyncSignalSource) -> bridge_traits::error::Result<()> {
///     if source.is_available().await {
///         source
///             .register(
///                 SyncSignal::new("sync-pending-submissions"),
///                 Arc::new(|| Box::pin(async { /* run the worker */ })),
///             )
///             .await?;
///     }
///     Ok(())
/// }
/// ```
#[async_trait::async_trait]
pub trait SyncSignalSource: Send + Sync {
    /// Register a handler for the given signal tag.
    ///
    /// Registering the same tag again replaces the previous handler.
    async fn register(&self, signal: SyncSignal, handler: SyncSignalHandler) -> Result<()>;

    /// Remove a previously registered handler.
    async fn unregister(&self, signal: &SyncSignal) -> Result<()>;

    /// Check whether the platform provides background sync at all.
    async fn is_available(&self) -> bool {
        true
    }
}
