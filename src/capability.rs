//! Boundary to the platform's device layer.
//!
//! The crate never talks to an OS Bluetooth stack directly. Scanning and
//! per-device I/O arrive through these traits; the platform integration (or
//! a test double) implements them. Commands are submitted here and their
//! completions come back asynchronously as stream items or state events.

use crate::error::{LinkError, ScanError};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// A discovered wireless device. Identity is the address; the name is
/// display-only.
#[derive(Debug, Clone)]
pub struct Device {
    pub name: String,
    pub address: String,
}

impl Device {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for Device {}

impl std::hash::Hash for Device {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}

/// One raw notification payload with the time it was received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNotification {
    pub bytes: Vec<u8>,
    pub arrival_ms: u64,
}

/// Device discovery capability.
#[async_trait]
pub trait ScanSource: Send + Sync {
    /// Begins a scan and returns the stream of discovered devices. The
    /// stream may repeat devices; de-duplication is the caller's policy.
    async fn start_scan(&self) -> Result<mpsc::Receiver<Device>, ScanError>;

    async fn stop_scan(&self);
}

/// Connection capability: produces one peripheral handle per device.
#[async_trait]
pub trait HrCentral: Send + Sync {
    async fn connect(&self, address: &str) -> Result<Box<dyn HrPeripheral>, LinkError>;
}

/// An open device handle progressing through service discovery and
/// subscription. Dropping the handle releases the underlying device.
#[async_trait]
pub trait HrPeripheral: Send {
    /// Locates the heart-rate service and measurement characteristic.
    async fn discover_hr_service(&mut self) -> Result<(), LinkError>;

    /// Enables notifications and returns the raw payload stream. The stream
    /// closes when the device drops the connection.
    async fn subscribe_hr(&mut self) -> Result<mpsc::Receiver<RawNotification>, LinkError>;

    async fn disconnect(&mut self);
}
