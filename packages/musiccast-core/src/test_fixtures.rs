//! Shared test doubles for modules that talk to devices.
//!
//! [`MockTransport`] records every request and answers from a table of canned
//! responses keyed by endpoint and device address. Endpoints without a
//! canned response answer `{"response_code": 0}`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::api::endpoints::Endpoint;
use crate::api::traits::McTransport;
use crate::api::transport::{ApiRequest, TransportError, TransportResult};

#[derive(Clone)]
enum Reply {
    Value(Value),
    Fail,
}

/// Recording transport with per-endpoint canned responses.
#[derive(Default)]
pub struct MockTransport {
    replies: Mutex<HashMap<(Endpoint, String), Reply>>,
    delays: Mutex<HashMap<Endpoint, Duration>>,
    calls: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers `endpoint` on `address` with `value`.
    pub fn respond(&self, endpoint: Endpoint, address: &str, value: Value) {
        self.replies
            .lock()
            .insert((endpoint, address.to_string()), Reply::Value(value));
    }

    /// Makes `endpoint` on `address` fail at the transport level.
    pub fn fail(&self, endpoint: Endpoint, address: &str) {
        self.replies
            .lock()
            .insert((endpoint, address.to_string()), Reply::Fail);
    }

    /// Holds every `endpoint` reply back for `delay` (tokio time).
    pub fn delay(&self, endpoint: Endpoint, delay: Duration) {
        self.delays.lock().insert(endpoint, delay);
    }

    /// Returns every recorded request in call order.
    pub fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().clone()
    }

    pub fn calls_to(&self, endpoint: Endpoint) -> Vec<ApiRequest> {
        self.calls
            .lock()
            .iter()
            .filter(|r| r.endpoint == endpoint)
            .cloned()
            .collect()
    }

    pub fn call_count(&self, endpoint: Endpoint) -> usize {
        self.calls_to(endpoint).len()
    }

    /// Returns the number of state-changing requests sent so far.
    pub fn mutating_calls(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|r| r.endpoint.is_mutating())
            .count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }
}

#[async_trait]
impl McTransport for MockTransport {
    async fn call(&self, request: ApiRequest) -> TransportResult<Value> {
        let reply = self
            .replies
            .lock()
            .get(&(request.endpoint, request.address.clone()))
            .cloned();
        let delay = self.delays.lock().get(&request.endpoint).copied();
        self.calls.lock().push(request);

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match reply {
            Some(Reply::Value(value)) => Ok(value),
            Some(Reply::Fail) => Err(TransportError::HttpStatus(503)),
            None => Ok(json!({ "response_code": 0 })),
        }
    }
}

/// `getFeatures` body for a device with the given distribution versions.
pub fn features_body(zones: &[&str], version: f64, compatible: &[u32]) -> Value {
    let zone: Vec<Value> = zones
        .iter()
        .map(|id| json!({ "id": id, "input_list": ["net_radio", "spotify", "mc_link"] }))
        .collect();
    json!({
        "response_code": 0,
        "zone": zone,
        "distribution": {
            "version": version,
            "compatible_client": compatible,
            "client_max": 9
        }
    })
}

/// `getDeviceInfo` body.
pub fn device_info_body(device_id: &str) -> Value {
    json!({
        "response_code": 0,
        "model_name": "RX-V481",
        "device_id": device_id,
        "system_version": 1.7,
        "api_version": 2.09
    })
}
