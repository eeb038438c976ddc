//! Background execution context for BLE I/O
//!
//! This module handles:
//! - The dedicated worker thread that owns the hub link
//! - Marshalling operations onto the worker and blocking for results
//! - Bounded startup and shutdown of the worker

mod manager;

pub use manager::{ConnectOutcome, ConnectionManager, SHUTDOWN_TIMEOUT, STARTUP_TIMEOUT};
