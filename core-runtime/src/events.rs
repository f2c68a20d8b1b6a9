//! # Event Bus System
//!
//! Event-driven notification channel built on `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The event bus carries sync outcome events from the background worker's
//! execution context to any currently active foreground context so the UI can
//! refresh its pending list. Delivery is best-effort and non-durable: if no
//! subscriber is listening when an event fires, the event is lost. The queue
//! store is the source of truth; foreground contexts reconcile by re-reading
//! the pending list on (re)activation rather than relying solely on events.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let bus = EventBus::new(100);
//! let mut subscriber = bus.subscribe();
//!
//! bus.emit(CoreEvent::Sync(SyncEvent::RecordSynced {
//!     id: "a2f1…".to_string(),
//! }))
//! .ok();
//!
//! let event = subscriber.recv().await.unwrap();
//! assert!(matches!(event, CoreEvent::Sync(SyncEvent::RecordSynced { .. })));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! `tokio::sync::broadcast` produces two receiver errors:
//!
//! - `RecvError::Lagged(n)`: the subscriber missed `n` events. Non-fatal; the
//!   correct reaction is to re-read the pending list and continue.
//! - `RecvError::Closed`: all senders dropped, shutdown signal.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Queue-related events
    Queue(QueueEvent),
    /// Sync-related events
    Sync(SyncEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Queue(e) => e.description(),
            CoreEvent::Sync(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Sync(SyncEvent::RecordFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Sync(SyncEvent::RecordSynced { .. }) => EventSeverity::Info,
            CoreEvent::Queue(QueueEvent::Enqueued { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Queue Events
// ============================================================================

/// Events related to the durable submission queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum QueueEvent {
    /// A submission was persisted for later delivery.
    Enqueued {
        /// The queued submission ID.
        id: String,
    },
    /// A queued submission was discarded by the user.
    Discarded {
        /// The discarded submission ID.
        id: String,
    },
}

impl QueueEvent {
    fn description(&self) -> &str {
        match self {
            QueueEvent::Enqueued { .. } => "Submission saved offline",
            QueueEvent::Discarded { .. } => "Queued submission discarded",
        }
    }
}

// ============================================================================
// Sync Events
// ============================================================================

/// Events related to background synchronization of queued submissions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// A sync run started draining the queue.
    RunStarted {
        /// Number of records in the snapshot being drained.
        pending: u64,
    },
    /// A queued submission was accepted by the server and removed.
    RecordSynced {
        /// The submission ID.
        id: String,
    },
    /// A send attempt failed; the record stays queued for the next run.
    RecordFailed {
        /// The submission ID.
        id: String,
        /// Human-readable failure message.
        message: String,
        /// Total failed attempts so far, including this one.
        attempt_count: u32,
    },
    /// A sync run finished.
    RunCompleted {
        /// Records delivered during this run.
        synced: u64,
        /// Records that failed and remain queued.
        failed: u64,
    },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::RunStarted { .. } => "Sync run started",
            SyncEvent::RecordSynced { .. } => "Submission synced",
            SyncEvent::RecordFailed { .. } => "Submission send failed, will retry",
            SyncEvent::RunCompleted { .. } => "Sync run completed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Uses `tokio::sync::broadcast` internally, which provides:
/// - Multiple producers (clone the `EventBus`)
/// - Multiple consumers (each `subscribe()` creates a new receiver)
/// - Non-blocking sends (events are cloned per subscriber)
/// - Lagging detection (slow subscribers get `RecvError::Lagged`)
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// `capacity` is the number of events buffered per subscriber before the
    /// subscriber starts lagging.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// when there are none. Both outcomes are acceptable to emitters: the
    /// state change the event reports has already been persisted.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Each call creates an independent receiver that sees all future events;
    /// past events are not replayed. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_reaches_all_subscribers() {
        let bus = EventBus::new(16);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        let event = CoreEvent::Sync(SyncEvent::RecordSynced {
            id: "abc".to_string(),
        });
        let delivered = bus.emit(event.clone()).unwrap();
        assert_eq!(delivered, 2);

        assert_eq!(a.recv().await.unwrap(), event);
        assert_eq!(b.recv().await.unwrap(), event);
    }

    #[test]
    fn test_emit_without_subscribers_is_lossy() {
        let bus = EventBus::new(16);
        let result = bus.emit(CoreEvent::Queue(QueueEvent::Enqueued {
            id: "abc".to_string(),
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_severity_mapping() {
        let failed = CoreEvent::Sync(SyncEvent::RecordFailed {
            id: "abc".to_string(),
            message: "HTTP 503".to_string(),
            attempt_count: 1,
        });
        assert_eq!(failed.severity(), EventSeverity::Warning);

        let synced = CoreEvent::Sync(SyncEvent::RecordSynced {
            id: "abc".to_string(),
        });
        assert_eq!(synced.severity(), EventSeverity::Info);
    }

    #[test]
    fn test_subscriber_count() {
        let bus = EventBus::new(16);
        assert_eq!(bus.subscriber_count(), 0);
        let rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        drop(rx);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
