//! Typed command helpers over the transport.
//!
//! Queries decode their response into the types in `types.rs`. Control
//! commands turn a non-zero `response_code` into
//! [`MusicCastError::ProtocolRejection`].

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

use super::endpoints::Endpoint;
use super::traits::McTransport;
use super::transport::ApiRequest;
use super::types::{DeviceInfo, DistributionInfo, Features, LocationInfo, NetworkStatus, PlayInfo};
use crate::error::{MusicCastError, MusicCastResult};
use crate::link::group_id::GroupId;
use crate::protocol_constants::RESPONSE_CODE_OK;

/// Reads `response_code` from a response object.
pub fn response_code(response: &Value) -> Option<i64> {
    response.get("response_code").and_then(Value::as_i64)
}

/// Fails unless the response carries `response_code == 0`.
pub fn check_response(endpoint: Endpoint, response: &Value) -> MusicCastResult<()> {
    match response_code(response) {
        Some(RESPONSE_CODE_OK) => Ok(()),
        Some(code) => Err(MusicCastError::ProtocolRejection {
            operation: endpoint.name(),
            code,
        }),
        None => Err(MusicCastError::Decode(format!(
            "{} response is missing response_code",
            endpoint.name()
        ))),
    }
}

/// Sends a control request and checks its response code.
pub async fn execute(transport: &dyn McTransport, request: ApiRequest) -> MusicCastResult<()> {
    let endpoint = request.endpoint;
    let response = transport.call(request).await?;
    check_response(endpoint, &response)
}

/// Sends a query and decodes the response into `T`.
///
/// A non-zero response code is reported as a rejection before decoding.
async fn query<T: DeserializeOwned>(
    transport: &dyn McTransport,
    request: ApiRequest,
) -> MusicCastResult<T> {
    let endpoint = request.endpoint;
    let response = transport.call(request).await?;
    check_response(endpoint, &response)?;
    Ok(serde_json::from_value(response)?)
}

// ─────────────────────────────────────────────────────────────────────────────
// System
// ─────────────────────────────────────────────────────────────────────────────

pub async fn get_device_info(
    transport: &dyn McTransport,
    address: &str,
) -> MusicCastResult<DeviceInfo> {
    query(transport, ApiRequest::get(Endpoint::GetDeviceInfo, address)).await
}

pub async fn get_features(transport: &dyn McTransport, address: &str) -> MusicCastResult<Features> {
    query(transport, ApiRequest::get(Endpoint::GetFeatures, address)).await
}

pub async fn get_location_info(
    transport: &dyn McTransport,
    address: &str,
) -> MusicCastResult<LocationInfo> {
    query(transport, ApiRequest::get(Endpoint::GetLocationInfo, address)).await
}

pub async fn get_network_status(
    transport: &dyn McTransport,
    address: &str,
) -> MusicCastResult<NetworkStatus> {
    query(transport, ApiRequest::get(Endpoint::GetNetworkStatus, address)).await
}

// ─────────────────────────────────────────────────────────────────────────────
// Zone
// ─────────────────────────────────────────────────────────────────────────────

/// Fetches a zone's full status as a field map, without `response_code`.
pub async fn get_status(
    transport: &dyn McTransport,
    address: &str,
    zone: &str,
) -> MusicCastResult<Map<String, Value>> {
    let request = ApiRequest::get(Endpoint::GetStatus, address).zone(zone);
    let response = transport.call(request).await?;
    check_response(Endpoint::GetStatus, &response)?;
    match response {
        Value::Object(mut map) => {
            map.remove("response_code");
            Ok(map)
        }
        other => Err(MusicCastError::Decode(format!(
            "getStatus returned a non-object: {}",
            other
        ))),
    }
}

pub async fn set_power(
    transport: &dyn McTransport,
    address: &str,
    zone: &str,
    on: bool,
) -> MusicCastResult<()> {
    let request = ApiRequest::get(Endpoint::SetPower, address)
        .zone(zone)
        .param("power", if on { "on" } else { "standby" });
    execute(transport, request).await
}

pub async fn set_mute(
    transport: &dyn McTransport,
    address: &str,
    zone: &str,
    mute: bool,
) -> MusicCastResult<()> {
    let request = ApiRequest::get(Endpoint::SetMute, address)
        .zone(zone)
        .param("enable", mute);
    execute(transport, request).await
}

/// Sets the raw volume step of a zone.
pub async fn set_volume(
    transport: &dyn McTransport,
    address: &str,
    zone: &str,
    volume: u32,
) -> MusicCastResult<()> {
    let request = ApiRequest::get(Endpoint::SetVolume, address)
        .zone(zone)
        .param("volume", volume);
    execute(transport, request).await
}

pub async fn set_input(
    transport: &dyn McTransport,
    address: &str,
    zone: &str,
    input: &str,
) -> MusicCastResult<()> {
    let request = ApiRequest::get(Endpoint::SetInput, address)
        .zone(zone)
        .param("input", input);
    execute(transport, request).await
}

pub async fn set_sound_program(
    transport: &dyn McTransport,
    address: &str,
    zone: &str,
    program: &str,
) -> MusicCastResult<()> {
    let request = ApiRequest::get(Endpoint::SetSoundProgram, address)
        .zone(zone)
        .param("program", program);
    execute(transport, request).await
}

// ─────────────────────────────────────────────────────────────────────────────
// Net/USB
// ─────────────────────────────────────────────────────────────────────────────

pub async fn get_play_info(transport: &dyn McTransport, address: &str) -> MusicCastResult<PlayInfo> {
    query(transport, ApiRequest::get(Endpoint::GetPlayInfo, address)).await
}

/// Sends a playback command (`play`, `stop`, `pause`, `next`, `previous`, ...).
pub async fn set_playback(
    transport: &dyn McTransport,
    address: &str,
    playback: &str,
) -> MusicCastResult<()> {
    let request = ApiRequest::get(Endpoint::SetPlayback, address).param("playback", playback);
    execute(transport, request).await
}

// ─────────────────────────────────────────────────────────────────────────────
// Distribution
// ─────────────────────────────────────────────────────────────────────────────

pub async fn get_distribution_info(
    transport: &dyn McTransport,
    address: &str,
) -> MusicCastResult<DistributionInfo> {
    query(transport, ApiRequest::get(Endpoint::GetDistributionInfo, address)).await
}

/// Registers (or with `None`, clears) a client's group membership.
pub async fn set_client_info(
    transport: &dyn McTransport,
    client: &str,
    group_id: Option<GroupId>,
    server_address: &str,
    zone: &str,
) -> MusicCastResult<()> {
    let body = json!({
        "group_id": group_id.map(|g| g.to_string()).unwrap_or_default(),
        "server_ip_address": server_address,
        "zone": [zone],
    });
    execute(transport, ApiRequest::post(Endpoint::SetClientInfo, client, body)).await
}

/// Updates the master's client list with `action` (`add` / `remove`).
pub async fn set_server_info(
    transport: &dyn McTransport,
    master: &str,
    group_id: GroupId,
    action: &str,
    zone: &str,
    clients: &[String],
) -> MusicCastResult<()> {
    let body = json!({
        "group_id": group_id.to_string(),
        "type": action,
        "zone": zone,
        "client_list": clients,
    });
    execute(transport, ApiRequest::post(Endpoint::SetServerInfo, master, body)).await
}

/// Clears the master's server registration.
pub async fn clear_server_info(transport: &dyn McTransport, master: &str) -> MusicCastResult<()> {
    let body = json!({ "group_id": "" });
    execute(transport, ApiRequest::post(Endpoint::SetServerInfo, master, body)).await
}

pub async fn set_group_name(
    transport: &dyn McTransport,
    master: &str,
    name: &str,
) -> MusicCastResult<()> {
    let body = json!({ "name": name });
    execute(transport, ApiRequest::post(Endpoint::SetGroupName, master, body)).await
}

/// Starts serving the group. `num` disambiguates concurrent groups.
pub async fn start_distribution(
    transport: &dyn McTransport,
    master: &str,
    num: usize,
) -> MusicCastResult<()> {
    let request = ApiRequest::get(Endpoint::StartDistribution, master).param("num", num);
    execute(transport, request).await
}

pub async fn stop_distribution(transport: &dyn McTransport, master: &str) -> MusicCastResult<()> {
    execute(transport, ApiRequest::get(Endpoint::StopDistribution, master)).await
}
