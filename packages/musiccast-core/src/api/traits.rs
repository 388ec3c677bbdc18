//! Trait abstractions for device API access.
//!
//! These traits enable dependency injection for testability. The reconciler,
//! the dispatcher and the linking protocol depend on [`McTransport`] rather
//! than on the concrete HTTP client.

use async_trait::async_trait;
use serde_json::Value;

use super::transport::{ApiRequest, TransportResult};

/// Stateless request/response access to the vendor API.
///
/// Implementations apply a bounded timeout and never retry. A well-formed
/// device error (non-zero `response_code`) is returned as `Ok`; only
/// transport-level failures are `Err`.
#[async_trait]
pub trait McTransport: Send + Sync {
    /// Performs one request and returns the decoded JSON object.
    async fn call(&self, request: ApiRequest) -> TransportResult<Value>;
}
