//! GATT transport backed by BlueZ

use crate::protocol::COMMAND_CHARACTERISTIC;
use crate::transport::discovery::{DiscoveryConfig, HubDiscovery};
use crate::transport::traits::BleTransport;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bluer::gatt::remote::Characteristic;
use bluer::Device;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};
use uuid::Uuid;

/// How long to wait for BlueZ to resolve GATT services after connecting
const RESOLVE_TIMEOUT: Duration = Duration::from_secs(10);
/// Poll interval while waiting for service resolution
const RESOLVE_POLL: Duration = Duration::from_millis(250);

/// An open GATT session with the command characteristic resolved
pub struct GattConnection {
    device: Device,
    characteristic: Characteristic,
}

/// Production transport speaking GATT through BlueZ
#[derive(Debug, Clone)]
pub struct GattTransport {
    char_uuid: Uuid,
}

impl GattTransport {
    /// Create a transport targeting the hub command characteristic
    pub fn new() -> Self {
        Self {
            char_uuid: COMMAND_CHARACTERISTIC,
        }
    }

    /// Create a transport targeting a custom characteristic
    pub fn with_characteristic(char_uuid: Uuid) -> Self {
        Self { char_uuid }
    }

    /// Wait for service resolution and locate the command characteristic
    async fn resolve_characteristic(&self, device: &Device) -> Result<Characteristic> {
        let mut waited = Duration::ZERO;
        while !device.is_services_resolved().await.unwrap_or(false) {
            if waited >= RESOLVE_TIMEOUT {
                return Err(anyhow!(
                    "GATT services not resolved within {:?}",
                    RESOLVE_TIMEOUT
                ));
            }
            sleep(RESOLVE_POLL).await;
            waited += RESOLVE_POLL;
        }

        for service in device.services().await? {
            for characteristic in service.characteristics().await? {
                if characteristic.uuid().await? == self.char_uuid {
                    return Ok(characteristic);
                }
            }
        }

        Err(anyhow!("command characteristic {} not found", self.char_uuid))
    }
}

impl Default for GattTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BleTransport for GattTransport {
    type Device = Device;
    type Conn = GattConnection;

    async fn discover(&self, name: &str, timeout: Duration) -> Result<Option<Device>> {
        let adapter = HubDiscovery::get_adapter().await?;
        let discovery = HubDiscovery::new(DiscoveryConfig {
            name_fragment: name.to_owned(),
            scan_timeout: timeout,
        });
        discovery.find_hub(&adapter).await
    }

    async fn open(&self, device: Device) -> Result<GattConnection> {
        let addr = device.address();
        info!("[BT] Connecting to {}", addr);
        device
            .connect()
            .await
            .map_err(|e| anyhow!("GATT connect failed: {}", e))?;

        match self.resolve_characteristic(&device).await {
            Ok(characteristic) => {
                info!("[BT] Connected to {}", addr);
                Ok(GattConnection {
                    device,
                    characteristic,
                })
            }
            Err(e) => {
                // Leave no half-open session behind
                let _ = device.disconnect().await;
                Err(e)
            }
        }
    }

    async fn is_open(&self, conn: &GattConnection) -> bool {
        conn.device.is_connected().await.unwrap_or(false)
    }

    async fn write(&self, conn: &GattConnection, payload: &[u8]) -> Result<()> {
        conn.characteristic.write(payload).await?;
        Ok(())
    }

    async fn close(&self, conn: GattConnection) -> Result<()> {
        debug!("[BT] Disconnecting from {}", conn.device.address());
        conn.device.disconnect().await?;
        Ok(())
    }
}
