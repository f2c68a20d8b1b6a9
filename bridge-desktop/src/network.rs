//! Network Monitoring Implementation

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    network::{NetworkChangeStream, NetworkInfo, NetworkMonitor, NetworkStatus},
};
use std::time::Duration;
use tracing::debug;

const PROBE_ADDR: &str = "8.8.8.8:53";
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Desktop network monitor implementation
///
/// Probes a well-known public DNS endpoint over TCP to decide connectivity.
///
/// Note: Platform-specific implementations (Linux netlink, macOS
/// SystemConfiguration, Windows WinAPI) would be more robust but require
/// additional dependencies.
pub struct DesktopNetworkMonitor {
    poll_interval: Duration,
}

impl DesktopNetworkMonitor {
    /// Create a new network monitor
    pub fn new() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Override how often the change stream re-probes
    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    async fn check_connectivity() -> NetworkStatus {
        match tokio::time::timeout(PROBE_TIMEOUT, tokio::net::TcpStream::connect(PROBE_ADDR)).await
        {
            Ok(Ok(_)) => NetworkStatus::Connected,
            Ok(Err(_)) => NetworkStatus::Disconnected,
            Err(_) => NetworkStatus::Disconnected,
        }
    }
}

impl Default for DesktopNetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkMonitor for DesktopNetworkMonitor {
    async fn get_network_info(&self) -> Result<NetworkInfo> {
        let status = Self::check_connectivity().await;
        debug!(status = ?status, "Network probe completed");
        Ok(NetworkInfo { status })
    }

    async fn subscribe_changes(&self) -> Result<Box<dyn NetworkChangeStream>> {
        // Polling implementation; each probe that differs from the previous
        // status is emitted as a change.
        Ok(Box::new(PollingChangeStream {
            poll_interval: self.poll_interval,
            last_status: None,
        }))
    }
}

/// Network change stream that polls for changes
struct PollingChangeStream {
    poll_interval: Duration,
    last_status: Option<NetworkStatus>,
}

#[async_trait]
impl NetworkChangeStream for PollingChangeStream {
    async fn next(&mut self) -> Option<NetworkInfo> {
        loop {
            tokio::time::sleep(self.poll_interval).await;

            let status = DesktopNetworkMonitor::check_connectivity().await;
            if self.last_status != Some(status) {
                self.last_status = Some(status);
                return Some(NetworkInfo { status });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_network_info() {
        let monitor = DesktopNetworkMonitor::new();
        let info = monitor.get_network_info().await.unwrap();

        assert!(matches!(
            info.status,
            NetworkStatus::Connected | NetworkStatus::Disconnected
        ));
    }

    #[tokio::test]
    async fn test_is_connected_does_not_panic() {
        let monitor = DesktopNetworkMonitor::new();
        let _ = monitor.is_connected().await;
    }
}
