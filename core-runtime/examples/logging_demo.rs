//! Demonstrates the logging stack and the event bus together.
//!
//! Run with:
//!
//! ```sh
//! cargo run -p core-runtime --example logging_demo
//! RUST_LOG=debug cargo run -p core-runtime --example logging_demo
//! ```

use core_runtime::events::{CoreEvent, EventBus, QueueEvent, SyncEvent};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use tracing::{info, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_logging(
        LoggingConfig::default()
            .with_format(LogFormat::Compact)
            .with_filter("debug"),
    )
    .expect("Failed to initialize logging");

    let bus = EventBus::new(16);
    let mut subscriber = bus.subscribe();

    bus.emit(CoreEvent::Queue(QueueEvent::Enqueued {
        id: "6c9f8a3e-demo".to_string(),
    }))
    .ok();
    bus.emit(CoreEvent::Sync(SyncEvent::RecordFailed {
        id: "6c9f8a3e-demo".to_string(),
        message: "HTTP 503".to_string(),
        attempt_count: 1,
    }))
    .ok();
    bus.emit(CoreEvent::Sync(SyncEvent::RecordSynced {
        id: "6c9f8a3e-demo".to_string(),
    }))
    .ok();
    drop(bus);

    while let Ok(event) = subscriber.recv().await {
        match event {
            CoreEvent::Sync(SyncEvent::RecordFailed { ref message, .. }) => {
                warn!(detail = %message, "{}", event.description());
            }
            _ => info!(severity = ?event.severity(), "{}", event.description()),
        }
    }

    info!("Event stream closed, demo complete");
}
