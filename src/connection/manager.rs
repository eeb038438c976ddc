//! Connection manager owning the BLE worker and the live hub link
//!
//! All transport I/O happens on one dedicated worker thread running a
//! current-thread Tokio runtime. Callers hand operations over a bounded
//! channel and block on a oneshot reply, so the public surface stays fully
//! synchronous while the BLE stack underneath remains async.

use crate::error::HubError;
use crate::transport::BleTransport;
use bytes::Bytes;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Bound on waiting for the worker runtime to come up
pub const STARTUP_TIMEOUT: Duration = Duration::from_secs(5);
/// Bound on waiting for the worker to drain and exit
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of a connect operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// A hub was found and the link is up
    Connected,
    /// The scan window elapsed without a matching device
    DeviceNotFound,
}

/// One operation for the worker; the result flows back over the oneshot
enum Operation {
    Connect {
        device_name: String,
        timeout: Duration,
        reply: oneshot::Sender<Result<ConnectOutcome, HubError>>,
    },
    Disconnect {
        reply: oneshot::Sender<Result<(), HubError>>,
    },
    Write {
        payload: Bytes,
        reply: oneshot::Sender<Result<(), HubError>>,
    },
}

/// Owns the worker thread and provides the blocking call bridge
///
/// The worker exclusively owns the transport connection; nothing outside
/// the command loop ever touches it. Operations are serialized by an
/// internal lock, so at most one is in flight at a time.
pub struct ConnectionManager {
    op_tx: Option<mpsc::Sender<Operation>>,
    /// Serializes `run` across caller threads
    run_lock: Mutex<()>,
    /// Signaled by the worker thread right before it exits
    done_rx: std::sync::mpsc::Receiver<()>,
    worker: Option<thread::JoinHandle<()>>,
}

impl ConnectionManager {
    /// Spawn the worker thread and wait for its runtime to come up
    pub fn start<T: BleTransport>(transport: T) -> Result<Self, HubError> {
        let (op_tx, op_rx) = mpsc::channel::<Operation>(1);
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<(), String>>();
        let (done_tx, done_rx) = std::sync::mpsc::channel::<()>();

        let worker = thread::Builder::new()
            .name("movehub-ble".into())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                runtime.block_on(command_loop(transport, op_rx));
                let _ = done_tx.send(());
            })
            .map_err(|e| HubError::WorkerStartup(e.to_string()))?;

        match ready_rx.recv_timeout(STARTUP_TIMEOUT) {
            Ok(Ok(())) => {
                debug!("BLE worker started");
                Ok(Self {
                    op_tx: Some(op_tx),
                    run_lock: Mutex::new(()),
                    done_rx,
                    worker: Some(worker),
                })
            }
            Ok(Err(e)) => Err(HubError::WorkerStartup(e)),
            Err(_) => Err(HubError::WorkerStartup(
                "worker did not signal readiness in time".into(),
            )),
        }
    }

    /// Discover and connect to the hub, bounded by `timeout`
    pub fn connect(&self, device_name: &str, timeout: Duration) -> Result<ConnectOutcome, HubError> {
        let device_name = device_name.to_owned();
        self.run(move |reply| Operation::Connect {
            device_name,
            timeout,
            reply,
        })
    }

    /// Close the hub link; succeeds even when nothing is connected
    pub fn disconnect(&self) -> Result<(), HubError> {
        self.run(|reply| Operation::Disconnect { reply })
    }

    /// Write one command frame to the hub
    pub fn write(&self, payload: Bytes) -> Result<(), HubError> {
        self.run(move |reply| Operation::Write { payload, reply })
    }

    /// Submit one operation and block until the worker replies
    fn run<R>(
        &self,
        op: impl FnOnce(oneshot::Sender<Result<R, HubError>>) -> Operation,
    ) -> Result<R, HubError> {
        let _guard = self.run_lock.lock().unwrap_or_else(|e| e.into_inner());

        let op_tx = self.op_tx.as_ref().ok_or(HubError::WorkerGone)?;
        let (reply_tx, reply_rx) = oneshot::channel();
        op_tx
            .blocking_send(op(reply_tx))
            .map_err(|_| HubError::WorkerGone)?;
        reply_rx.blocking_recv().map_err(|_| HubError::WorkerGone)?
    }

    /// Request shutdown and wait, bounded, for the worker to exit
    ///
    /// On timeout the worker thread is detached; shutdown never hangs the
    /// calling program.
    pub fn stop(&mut self) {
        if self.op_tx.take().is_none() {
            return;
        }

        // With the channel closed the loop drains, drops any live link and
        // exits on its own
        match self.done_rx.recv_timeout(SHUTDOWN_TIMEOUT) {
            Ok(()) => {
                if let Some(worker) = self.worker.take() {
                    let _ = worker.join();
                }
                info!("BLE worker stopped");
            }
            Err(_) => {
                warn!(
                    "BLE worker did not terminate within {:?}, detaching",
                    SHUTDOWN_TIMEOUT
                );
                self.worker.take();
            }
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Worker loop; the single owner of the transport connection
async fn command_loop<T: BleTransport>(transport: T, mut op_rx: mpsc::Receiver<Operation>) {
    let mut connection: Option<T::Conn> = None;

    while let Some(op) = op_rx.recv().await {
        match op {
            Operation::Connect {
                device_name,
                timeout,
                reply,
            } => {
                let result =
                    handle_connect(&transport, &mut connection, &device_name, timeout).await;
                let _ = reply.send(result);
            }
            Operation::Disconnect { reply } => {
                let result = handle_disconnect(&transport, &mut connection).await;
                let _ = reply.send(result);
            }
            Operation::Write { payload, reply } => {
                let result = handle_write(&transport, &mut connection, &payload).await;
                let _ = reply.send(result);
            }
        }
    }

    // Channel closed; drop any live link before the runtime goes away
    if let Some(conn) = connection.take() {
        if let Err(e) = transport.close(conn).await {
            warn!("Error closing link during shutdown: {}", e);
        }
    }
}

async fn handle_connect<T: BleTransport>(
    transport: &T,
    connection: &mut Option<T::Conn>,
    device_name: &str,
    timeout: Duration,
) -> Result<ConnectOutcome, HubError> {
    // Reuse a live link; silently drop a stale one and reconnect
    let stale = match connection.as_ref() {
        Some(conn) => {
            if transport.is_open(conn).await {
                info!("Already connected");
                return Ok(ConnectOutcome::Connected);
            }
            true
        }
        None => false,
    };
    if stale {
        if let Some(conn) = connection.take() {
            let _ = transport.close(conn).await;
        }
    }

    let device = transport
        .discover(device_name, timeout)
        .await
        .map_err(|e| HubError::ConnectFailed(e.to_string()))?;

    let device = match device {
        Some(device) => device,
        None => {
            warn!("No device named '{}' found within {:?}", device_name, timeout);
            return Ok(ConnectOutcome::DeviceNotFound);
        }
    };

    match transport.open(device).await {
        Ok(conn) => {
            info!("Connected to '{}'", device_name);
            *connection = Some(conn);
            Ok(ConnectOutcome::Connected)
        }
        Err(e) => Err(HubError::ConnectFailed(e.to_string())),
    }
}

async fn handle_disconnect<T: BleTransport>(
    transport: &T,
    connection: &mut Option<T::Conn>,
) -> Result<(), HubError> {
    match connection.take() {
        Some(conn) => {
            if let Err(e) = transport.close(conn).await {
                warn!("Error during disconnect: {}", e);
            } else {
                info!("Disconnected from hub");
            }
            Ok(())
        }
        None => {
            debug!("No active connection to disconnect");
            Ok(())
        }
    }
}

async fn handle_write<T: BleTransport>(
    transport: &T,
    connection: &mut Option<T::Conn>,
    payload: &[u8],
) -> Result<(), HubError> {
    // A link the hub has dropped counts as no link at all
    let live = match connection.as_ref() {
        Some(conn) => transport.is_open(conn).await,
        None => false,
    };
    if !live {
        if let Some(conn) = connection.take() {
            let _ = transport.close(conn).await;
        }
        return Err(HubError::NotConnected);
    }

    let conn = match connection.as_ref() {
        Some(conn) => conn,
        None => return Err(HubError::NotConnected),
    };

    match transport.write(conn, payload).await {
        Ok(()) => {
            info!("Sent: {}", hex_frame(payload));
            Ok(())
        }
        Err(e) => Err(HubError::WriteFailed(e.to_string())),
    }
}

/// Space-separated hex rendering of an outgoing frame
fn hex_frame(payload: &[u8]) -> String {
    payload
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;

    #[test]
    fn test_connect_reports_device_not_found() {
        let manager = ConnectionManager::start(MockTransport::default()).expect("start failed");
        let outcome = manager
            .connect("Technic Move", Duration::from_millis(10))
            .expect("connect errored");
        assert_eq!(outcome, ConnectOutcome::DeviceNotFound);
    }

    #[test]
    fn test_connect_failure_is_reported() {
        let transport = MockTransport::with_device();
        transport.lock().fail_open = true;

        let manager = ConnectionManager::start(transport).expect("start failed");
        let err = manager
            .connect("Technic Move", Duration::from_millis(10))
            .unwrap_err();
        assert!(matches!(err, HubError::ConnectFailed(_)));
    }

    #[test]
    fn test_connect_write_disconnect_roundtrip() {
        let transport = MockTransport::with_device();
        let manager = ConnectionManager::start(transport.clone()).expect("start failed");

        let outcome = manager
            .connect("Technic Move", Duration::from_millis(10))
            .expect("connect errored");
        assert_eq!(outcome, ConnectOutcome::Connected);

        manager
            .write(Bytes::from_static(&[0x08, 0x00, 0x81, 0x3f, 0x11, 0x51, 0x00, 0x09]))
            .expect("write failed");
        assert_eq!(
            transport.lock().writes,
            vec![vec![0x08, 0x00, 0x81, 0x3f, 0x11, 0x51, 0x00, 0x09]]
        );

        manager.disconnect().expect("disconnect failed");
        assert_eq!(transport.lock().closes, 1);
    }

    #[test]
    fn test_connect_twice_reuses_link() {
        let transport = MockTransport::with_device();
        let manager = ConnectionManager::start(transport.clone()).expect("start failed");

        manager
            .connect("Technic Move", Duration::from_millis(10))
            .expect("first connect errored");
        manager
            .connect("Technic Move", Duration::from_millis(10))
            .expect("second connect errored");
        assert_eq!(transport.lock().opens, 1);
    }

    #[test]
    fn test_write_without_connection_is_not_connected() {
        let manager =
            ConnectionManager::start(MockTransport::with_device()).expect("start failed");
        let err = manager.write(Bytes::from_static(&[0x01])).unwrap_err();
        assert!(matches!(err, HubError::NotConnected));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_write_on_dropped_link_is_not_connected() {
        let transport = MockTransport::with_device();
        let manager = ConnectionManager::start(transport.clone()).expect("start failed");
        manager
            .connect("Technic Move", Duration::from_millis(10))
            .expect("connect errored");

        transport.lock().link_dropped = true;
        let err = manager.write(Bytes::from_static(&[0x01])).unwrap_err();
        assert!(matches!(err, HubError::NotConnected));
        // The dead link was released
        assert_eq!(transport.lock().closes, 1);
    }

    #[test]
    fn test_write_failure_keeps_link() {
        let transport = MockTransport::with_device();
        let manager = ConnectionManager::start(transport.clone()).expect("start failed");
        manager
            .connect("Technic Move", Duration::from_millis(10))
            .expect("connect errored");

        transport.lock().fail_write = true;
        let err = manager.write(Bytes::from_static(&[0x01])).unwrap_err();
        assert!(matches!(err, HubError::WriteFailed(_)));
        assert!(!err.is_fatal());

        // Link survives and the next write goes through
        transport.lock().fail_write = false;
        manager
            .write(Bytes::from_static(&[0x02]))
            .expect("write failed after recovery");
        assert_eq!(transport.lock().writes, vec![vec![0x02]]);
    }

    #[test]
    fn test_disconnect_without_connection_is_noop() {
        let manager =
            ConnectionManager::start(MockTransport::with_device()).expect("start failed");
        manager.disconnect().expect("first disconnect failed");
        manager.disconnect().expect("second disconnect failed");
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut manager =
            ConnectionManager::start(MockTransport::with_device()).expect("start failed");
        manager.stop();
        manager.stop();
        assert!(matches!(
            manager.disconnect().unwrap_err(),
            HubError::WorkerGone
        ));
    }

    #[test]
    fn test_stop_closes_live_link() {
        let transport = MockTransport::with_device();
        let mut manager = ConnectionManager::start(transport.clone()).expect("start failed");
        manager
            .connect("Technic Move", Duration::from_millis(10))
            .expect("connect errored");

        manager.stop();
        assert_eq!(transport.lock().closes, 1);
    }
}
