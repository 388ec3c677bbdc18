//! Yamaha Extended Control API access.
//!
//! This module provides the request/response layer every other component
//! builds on:
//!
//! - [`endpoints`]: endpoint catalog and URL building
//! - [`transport`]: HTTP transport and request type
//! - [`traits`]: the [`McTransport`] seam for dependency injection
//! - [`commands`]: typed helpers that check `response_code`
//! - [`types`]: typed views of responses

pub mod commands;
pub mod endpoints;
pub mod traits;
pub mod transport;
pub mod types;

pub use endpoints::Endpoint;
pub use traits::McTransport;
pub use transport::{ApiRequest, HttpTransport, Method, TransportError, TransportResult};
pub use types::{
    DeviceInfo, DistributionInfo, Features, GroupRole, LocationInfo, NetworkStatus, PlayInfo,
    PlaybackState, ZoneFeature,
};
