//! Bluetooth device discovery for finding the hub

use anyhow::Result;
use bluer::{Adapter, AdapterEvent, Device};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info};

/// Configuration for hub discovery
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Advertised name fragment to match
    pub name_fragment: String,
    /// How long to scan for devices
    pub scan_timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            name_fragment: crate::protocol::DEVICE_NAME.into(),
            scan_timeout: Duration::from_secs(10),
        }
    }
}

/// Bluetooth discovery service
pub struct HubDiscovery {
    config: DiscoveryConfig,
}

impl HubDiscovery {
    /// Create a new discovery service
    pub fn new(config: DiscoveryConfig) -> Self {
        Self { config }
    }

    /// Get the default Bluetooth adapter
    pub async fn get_adapter() -> Result<Adapter> {
        let session = bluer::Session::new().await?;
        let adapter = session.default_adapter().await?;
        adapter.set_powered(true).await?;
        Ok(adapter)
    }

    /// Find the first device matching the configured name fragment
    ///
    /// Returns `Ok(None)` when the scan window elapses without a match.
    pub async fn find_hub(&self, adapter: &Adapter) -> Result<Option<Device>> {
        // Devices BlueZ already knows about don't show up as DeviceAdded
        // events, so check those first
        for addr in adapter.device_addresses().await.unwrap_or_default() {
            if let Ok(device) = adapter.device(addr) {
                if self.matches_name(&device).await {
                    info!("[BT] Found known device at {}", addr);
                    return Ok(Some(device));
                }
            }
        }

        let discover = adapter.discover_devices().await?;
        tokio::pin!(discover);

        let scan_result = timeout(self.config.scan_timeout, async {
            use futures::StreamExt;
            while let Some(evt) = discover.next().await {
                if let AdapterEvent::DeviceAdded(addr) = evt {
                    if let Ok(device) = adapter.device(addr) {
                        if self.matches_name(&device).await {
                            info!("[BT] Found device at {}", addr);
                            return Some(device);
                        }
                        debug!("[BT] Ignoring device at {}", addr);
                    }
                }
            }
            None
        })
        .await;

        match scan_result {
            Ok(device) => Ok(device),
            Err(_) => {
                // Timeout is expected, not an error
                info!("[BT] Discovery scan completed without a match");
                Ok(None)
            }
        }
    }

    /// Check whether a device advertises the configured name fragment
    async fn matches_name(&self, device: &Device) -> bool {
        match device.name().await {
            Ok(Some(name)) => name.contains(&self.config.name_fragment),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DiscoveryConfig::default();
        assert_eq!(config.name_fragment, "Technic Move");
        assert_eq!(config.scan_timeout, Duration::from_secs(10));
    }
}
