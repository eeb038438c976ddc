//! Synchronous facade for driving the hub
//!
//! Composes the command codec with the background connection manager into
//! the public API: connect, disconnect, LED, motors and raw frames. Every
//! method blocks until its operation has completed on the BLE worker.

use crate::connection::{ConnectOutcome, ConnectionManager};
use crate::error::HubError;
use crate::protocol;
use crate::transport::{BleTransport, GattTransport};
use bytes::Bytes;
use std::time::Duration;
use tracing::{error, info, warn};

/// Configuration for the hub facade
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Advertised name fragment to connect to
    pub device_name: String,
    /// Apply the motor A sign inversion
    ///
    /// The stock hub wires motor A with reversed polarity; leave this on
    /// unless yours does not.
    pub invert_motor_a: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            device_name: protocol::DEVICE_NAME.into(),
            invert_motor_a: true,
        }
    }
}

/// Connection state of the facade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubState {
    /// No connection has been attempted yet
    Uninitialized,
    /// A link to the hub is up
    Connected,
    /// No link; connecting again is allowed
    Disconnected,
}

/// Driver for a single Technic Move hub
///
/// One instance drives one hub. Commands are issued one at a time; each
/// call returns only after the hub write has completed or failed.
pub struct MoveHub<T: BleTransport + Clone = GattTransport> {
    transport: T,
    config: HubConfig,
    manager: Option<ConnectionManager>,
    state: HubState,
}

impl MoveHub {
    /// Create a hub driver using the BlueZ GATT transport
    pub fn new() -> Self {
        Self::with_transport(GattTransport::new(), HubConfig::default())
    }
}

impl Default for MoveHub {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: BleTransport + Clone> MoveHub<T> {
    /// Create a hub driver over a custom transport
    pub fn with_transport(transport: T, config: HubConfig) -> Self {
        Self {
            transport,
            config,
            manager: None,
            state: HubState::Uninitialized,
        }
    }

    /// Current connection state
    pub fn state(&self) -> HubState {
        self.state
    }

    /// Connect to the configured hub, scanning for up to `timeout`
    ///
    /// Starts the BLE worker on first use. [`HubError::DeviceNotFound`] and
    /// [`HubError::ConnectFailed`] are recoverable; the caller may retry.
    pub fn connect(&mut self, timeout: Duration) -> Result<(), HubError> {
        let device_name = self.config.device_name.clone();
        self.connect_to(timeout, &device_name)
    }

    /// Connect to a hub advertising a custom name
    pub fn connect_to(&mut self, timeout: Duration, device_name: &str) -> Result<(), HubError> {
        info!(
            "Attempting to connect to '{}' (timeout: {:?})",
            device_name, timeout
        );

        if self.manager.is_none() {
            self.manager = Some(ConnectionManager::start(self.transport.clone())?);
        }
        let manager = self.manager()?;

        match manager.connect(device_name, timeout) {
            Ok(ConnectOutcome::Connected) => {
                self.state = HubState::Connected;
                Ok(())
            }
            Ok(ConnectOutcome::DeviceNotFound) => {
                self.state = HubState::Disconnected;
                Err(HubError::DeviceNotFound(device_name.to_owned()))
            }
            Err(e) => {
                self.state = HubState::Disconnected;
                if e.is_fatal() {
                    // A dead worker cannot be reused; drop it so the next
                    // connect starts a fresh one
                    self.disconnect();
                }
                Err(e)
            }
        }
    }

    /// Set the status light color
    pub fn set_led(&mut self, color: &str) -> Result<(), HubError> {
        let frame = protocol::encode_led(color)?;
        self.write_frame(frame.to_bytes())
    }

    /// Drive a motor channel
    ///
    /// `channel` is one of "motor_a", "motor_b", "motor_c" (case and spaces
    /// ignored), `mode` is "power" or "speed", `value` runs from -100 (full
    /// reverse) through 0 (stop) to 100 (full forward).
    pub fn set_motor(&mut self, channel: &str, mode: &str, value: i32) -> Result<(), HubError> {
        let frame = protocol::encode_motor_with_polarity(
            channel,
            mode,
            value,
            self.config.invert_motor_a,
        )?;
        self.write_frame(frame.to_bytes())
    }

    /// Write an arbitrary frame, bypassing validation
    ///
    /// Escape hatch for hub commands the typed API does not cover.
    pub fn send_raw(&mut self, payload: impl Into<Bytes>) -> Result<(), HubError> {
        self.write_frame(payload.into())
    }

    /// Tear down the hub link and stop the BLE worker
    ///
    /// Always safe to call, including before any connect and repeatedly.
    pub fn disconnect(&mut self) {
        match self.manager.take() {
            Some(mut manager) => {
                if let Err(e) = manager.disconnect() {
                    warn!("Error during disconnect: {}", e);
                }
                manager.stop();
            }
            None => {
                info!("No hub connected and no worker running, nothing to disconnect");
            }
        }
        self.state = HubState::Disconnected;
    }

    fn manager(&self) -> Result<&ConnectionManager, HubError> {
        self.manager.as_ref().ok_or(HubError::NotConnected)
    }

    /// Send an encoded frame through the bridge
    ///
    /// A fatal error means the link is gone; the worker is torn down so a
    /// later `connect` starts clean, and the error is handed to the caller
    /// to act on.
    fn write_frame(&mut self, payload: Bytes) -> Result<(), HubError> {
        let result = match (&self.manager, self.state) {
            (Some(manager), HubState::Connected) => manager.write(payload),
            _ => Err(HubError::NotConnected),
        };

        if let Err(ref e) = result {
            if e.is_fatal() {
                error!("Hub is not connected");
                self.disconnect();
            }
        }
        result
    }
}

impl<T: BleTransport + Clone> Drop for MoveHub<T> {
    fn drop(&mut self) {
        if self.manager.is_some() {
            self.disconnect();
        }
    }
}
