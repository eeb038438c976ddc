//! In-memory transport for exercising the worker without hardware

use crate::transport::traits::BleTransport;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Behavior knobs and call records, shared across clones
#[derive(Debug, Default)]
pub struct MockState {
    /// Whether discovery finds a device
    pub device_present: bool,
    /// Fail the next and all following opens
    pub fail_open: bool,
    /// Fail the next and all following writes
    pub fail_write: bool,
    /// Simulate the hub silently dropping the link
    pub link_dropped: bool,
    /// Payloads written so far
    pub writes: Vec<Vec<u8>>,
    pub opens: usize,
    pub closes: usize,
}

/// Scriptable [`BleTransport`] backed by shared state
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// A transport with a discoverable, connectable hub
    pub fn with_device() -> Self {
        let mock = Self::default();
        mock.lock().device_present = true;
        mock
    }

    pub fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl BleTransport for MockTransport {
    type Device = ();
    type Conn = ();

    async fn discover(&self, _name: &str, _timeout: Duration) -> Result<Option<()>> {
        if self.lock().device_present {
            Ok(Some(()))
        } else {
            Ok(None)
        }
    }

    async fn open(&self, _device: ()) -> Result<()> {
        let mut state = self.lock();
        if state.fail_open {
            return Err(anyhow!("mock open failure"));
        }
        state.opens += 1;
        Ok(())
    }

    async fn is_open(&self, _conn: &()) -> bool {
        !self.lock().link_dropped
    }

    async fn write(&self, _conn: &(), payload: &[u8]) -> Result<()> {
        let mut state = self.lock();
        if state.fail_write {
            return Err(anyhow!("mock write failure"));
        }
        state.writes.push(payload.to_vec());
        Ok(())
    }

    async fn close(&self, _conn: ()) -> Result<()> {
        self.lock().closes += 1;
        Ok(())
    }
}
