//! MusicCast Core - controller library for Yamaha MusicCast receivers.
//!
//! This crate keeps a local model of each receiver's zones in sync with the
//! device (pushed UDP events plus periodic polling) and links receivers into
//! synchronized distribution groups. It is used by the `musiccast` CLI and
//! can be embedded by any host that supplies a [`HostNotifier`].
//!
//! # Architecture
//!
//! - [`api`]: HTTP transport, endpoints and typed responses
//! - [`events`]: UDP listener, bounded queue and dispatcher
//! - [`zone`]: per-zone status reconciliation and controls
//! - [`media_status`]: now-playing snapshot with drift-tolerant equality
//! - [`link`]: group ids, registry and the linking protocol
//! - [`device`]: per-device coordinator owning zones and background tasks
//! - [`bootstrap`]: the [`Controller`] composition root
//! - [`error`]: centralized error types
//!
//! # Abstraction Traits
//!
//! - [`McTransport`](api::McTransport): request/response exchange with a device
//! - [`HostNotifier`](notify::HostNotifier): "state changed" callback
//! - [`EventSink`](events::EventSink): consumer of decoded push events
//! - [`Pollable`](keepalive::Pollable): target of the keepalive task

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod context;
pub mod device;
pub mod error;
pub mod events;
pub mod keepalive;
pub mod link;
pub mod media_status;
pub mod notify;
pub mod protocol_constants;
pub mod zone;

#[cfg(test)]
pub(crate) mod test_fixtures;

// Re-export commonly used types at the crate root
pub use api::{
    DeviceInfo, DistributionInfo, Features, GroupRole, HttpTransport, LocationInfo, McTransport,
    NetworkStatus,
};
pub use bootstrap::{Controller, TransportFactory};
pub use config::{ControllerConfig, DeviceConfig, LinkConfig};
pub use context::DeviceContext;
pub use device::Device;
pub use error::{ErrorCode, MusicCastError, MusicCastResult};
pub use events::{EventSink, IngestSnapshot};
pub use link::{DistributionGroup, GroupId, GroupLinker, GroupMember, GroupRegistry, LinkError, LinkStep};
pub use media_status::{media_status_equals, MediaStatus};
pub use notify::{FnNotifier, HostNotifier, LoggingNotifier, NotifyError};
pub use zone::{MergeOutcome, PowerState, ReconcileState, Zone, ZoneAttributes, ZoneStatus};
