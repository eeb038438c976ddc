//! Synchronous BLE driver for the LEGO Technic Move hub
//!
//! The hub is controlled by writing fixed 8-byte command frames to a single
//! GATT characteristic. This crate keeps all BLE I/O on one dedicated
//! background worker and exposes a blocking, one-call-at-a-time API on top
//! of it: callers never see the async transport underneath.
//!
//! ```no_run
//! use movehub::MoveHub;
//! use std::time::Duration;
//!
//! let mut hub = MoveHub::new();
//! hub.connect(Duration::from_secs(10))?;
//! hub.set_led("red")?;
//! hub.set_motor("motor A", "power", 50)?;
//! hub.set_motor("motor A", "power", 0)?;
//! hub.disconnect();
//! # Ok::<(), movehub::HubError>(())
//! ```

pub mod connection;
pub mod error;
pub mod hub;
pub mod protocol;
pub mod transport;

pub use error::HubError;
pub use hub::{HubConfig, HubState, MoveHub};
pub use protocol::{
    encode_led, encode_motor, CodecError, Color, Frame, MotorChannel, MotorMode,
};
