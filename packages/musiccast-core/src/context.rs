//! Shared per-device context.
//!
//! [`DeviceContext`] bundles the immutable facts every zone of a device needs
//! to talk to it. Zones hold an `Arc<DeviceContext>`; the context never holds
//! zones, so there is no ownership cycle between a device and its zones.

use std::sync::Arc;

use crate::api::traits::McTransport;

/// Identity and transport of one device, shared by its zones.
#[derive(Clone)]
pub struct DeviceContext {
    /// Host or IP the device answers on.
    pub address: String,
    /// Stable identifier from `getDeviceInfo`.
    pub device_id: String,
    pub transport: Arc<dyn McTransport>,
}

impl DeviceContext {
    #[must_use]
    pub fn new(
        address: impl Into<String>,
        device_id: impl Into<String>,
        transport: Arc<dyn McTransport>,
    ) -> Self {
        Self {
            address: address.into(),
            device_id: device_id.into(),
            transport,
        }
    }

    /// Borrows the transport as a trait object.
    pub fn transport(&self) -> &dyn McTransport {
        self.transport.as_ref()
    }
}

impl std::fmt::Debug for DeviceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceContext")
            .field("address", &self.address)
            .field("device_id", &self.device_id)
            .finish_non_exhaustive()
    }
}
