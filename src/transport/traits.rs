//! Transport trait abstraction for pluggable BLE backends

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// The transport primitives the driver needs from a BLE stack
///
/// Implementations own every GATT detail; the connection manager only sees
/// opaque device and connection handles and is the sole caller of these
/// methods.
#[async_trait]
pub trait BleTransport: Send + Sync + 'static {
    /// Handle to a discovered but not yet connected device
    type Device: Send;
    /// Handle to an open session with the hub
    type Conn: Send;

    /// Scan for a device whose advertised name contains `name`
    ///
    /// `Ok(None)` means the scan window elapsed without a match; that is a
    /// normal outcome, not an error.
    async fn discover(&self, name: &str, timeout: Duration) -> Result<Option<Self::Device>>;

    /// Open a connection to a discovered device
    async fn open(&self, device: Self::Device) -> Result<Self::Conn>;

    /// Whether the connection is still live
    async fn is_open(&self, conn: &Self::Conn) -> bool;

    /// Write one command frame to the hub
    async fn write(&self, conn: &Self::Conn, payload: &[u8]) -> Result<()>;

    /// Close the connection gracefully
    async fn close(&self, conn: Self::Conn) -> Result<()>;
}
