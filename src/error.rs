//! Error taxonomy for the hub driver

use crate::protocol::CodecError;
use thiserror::Error;

/// Errors surfaced by the public hub API
#[derive(Error, Debug)]
pub enum HubError {
    /// Input validation failed; the transport was never contacted
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The scan window elapsed without a matching device advertising
    #[error("no device named '{0}' found within the scan window")]
    DeviceNotFound(String),

    /// Discovery or the transport-level connect failed
    #[error("failed to connect to hub: {0}")]
    ConnectFailed(String),

    /// A command was attempted with no live connection
    #[error("hub is not connected")]
    NotConnected,

    /// A characteristic write failed on a connection believed live
    #[error("characteristic write failed: {0}")]
    WriteFailed(String),

    /// The background worker did not come up in time
    #[error("failed to start BLE worker: {0}")]
    WorkerStartup(String),

    /// The background worker is gone; no further operations are possible
    #[error("BLE worker is no longer running")]
    WorkerGone,
}

impl HubError {
    /// Whether the host application must stop driving the hub
    ///
    /// Losing the connection mid-command could leave a motor running; the
    /// caller is expected to treat this as a hard stop rather than retry.
    pub fn is_fatal(&self) -> bool {
        matches!(self, HubError::NotConnected | HubError::WorkerGone)
    }
}
