//! # Desktop Bridge Implementations
//!
//! Desktop host implementations of the bridge traits:
//!
//! - [`ReqwestHttpClient`] - HTTP delivery over reqwest with TLS and pooling
//! - [`DesktopNetworkMonitor`] - TCP-probe connectivity detection with a
//!   polling change stream
//! - [`IntervalSyncSignal`] - timer-loop stand-in for platform background
//!   sync

pub mod http;
pub mod network;
pub mod signal;

pub use http::ReqwestHttpClient;
pub use network::DesktopNetworkMonitor;
pub use signal::IntervalSyncSignal;
