//! Device transport and exclusive access
//!
//! There is one physical device per application. `SharedDevice` wraps the
//! transport in an async mutex; a signing session takes a `DeviceLease`
//! for its whole duration and hands it back through `release`, which also
//! disconnects. A lease dropped without `release` still frees the device.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Transport failures reported by the Bluetooth/USB layer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Device not found")]
    NotFound,

    #[error("Could not connect to device: {0}")]
    ConnectFailed(String),

    #[error("Device disconnected: {0}")]
    Disconnected(String),

    #[error("Transport error: {0}")]
    Io(String),
}

/// Frame-level access to a hardware signer. Reconnect logic, scanning and
/// pairing live behind this trait.
#[async_trait]
pub trait DeviceTransport: Send + 'static {
    /// Discover and open a connection
    async fn connect(&mut self) -> Result<(), TransportError>;

    async fn send_frame(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    /// Wait for the next response frame. May take as long as the user
    /// needs to confirm on the device.
    async fn receive_frame(&mut self) -> Result<Vec<u8>, TransportError>;

    /// Close the connection and stop any scan. Must be safe to call when
    /// not connected.
    async fn disconnect(&mut self);
}

/// The application's single hardware transport
pub struct SharedDevice<T> {
    inner: Arc<Mutex<T>>,
}

impl<T> Clone for SharedDevice<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: DeviceTransport> SharedDevice<T> {
    pub fn new(transport: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(transport)),
        }
    }

    /// Wait for exclusive use of the device
    pub async fn acquire(&self) -> DeviceLease<T> {
        DeviceLease {
            guard: Arc::clone(&self.inner).lock_owned().await,
        }
    }

    pub fn try_acquire(&self) -> Option<DeviceLease<T>> {
        Arc::clone(&self.inner)
            .try_lock_owned()
            .ok()
            .map(|guard| DeviceLease { guard })
    }

    /// Whether no session currently holds the device
    pub fn is_available(&self) -> bool {
        self.inner.try_lock().is_ok()
    }
}

/// Exclusive use of the device for one session
pub struct DeviceLease<T> {
    guard: OwnedMutexGuard<T>,
}

impl<T: DeviceTransport> DeviceLease<T> {
    pub fn transport(&mut self) -> &mut T {
        &mut self.guard
    }

    /// Disconnect and give the device back
    pub async fn release(mut self) {
        self.guard.disconnect().await;
    }
}
