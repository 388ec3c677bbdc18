//! Typed views of API responses.
//!
//! Each struct is an explicit allow-list: every recognized field has a
//! declared type and default, and unrecognized inbound fields are ignored.

use serde::{Deserialize, Serialize};

use crate::link::group_id::GroupId;

/// Response of `system/getDeviceInfo`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceInfo {
    pub device_id: String,
    pub model_name: String,
    pub destination: String,
    pub system_version: f64,
    pub api_version: f64,
    pub netmodule_version: String,
}

/// Response of `system/getFeatures`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Features {
    pub zone: Vec<ZoneFeature>,
    pub distribution: Option<DistributionFeature>,
}

impl Features {
    /// Returns the feature block of a zone.
    #[must_use]
    pub fn zone(&self, zone_id: &str) -> Option<&ZoneFeature> {
        self.zone.iter().find(|z| z.id == zone_id)
    }

    /// Returns the zone identifiers the device reports, in device order.
    #[must_use]
    pub fn zone_ids(&self) -> Vec<String> {
        self.zone.iter().map(|z| z.id.clone()).collect()
    }
}

/// Per-zone capabilities from `getFeatures`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ZoneFeature {
    pub id: String,
    pub input_list: Vec<String>,
    pub sound_program_list: Vec<String>,
}

/// Distribution capabilities from `getFeatures`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DistributionFeature {
    /// Protocol version of this device (reported as a number, e.g. `2.0`).
    pub version: f64,
    /// Client protocol versions this device can serve as master.
    pub compatible_client: Vec<u32>,
    pub client_max: u32,
}

impl DistributionFeature {
    /// Returns the integral protocol version used for compatibility checks.
    #[must_use]
    pub fn version_number(&self) -> u32 {
        self.version.max(0.0) as u32
    }

    /// Returns true if a client speaking `version` can join this master.
    #[must_use]
    pub fn accepts_client(&self, version: u32) -> bool {
        self.compatible_client.contains(&version)
    }
}

/// Role a device reports in its distribution info.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupRole {
    Server,
    Client,
    #[default]
    #[serde(other)]
    None,
}

/// Client entry of a server's distribution info.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DistributionClient {
    pub ip_address: String,
    pub data_type: Option<String>,
}

/// Response of `dist/getDistributionInfo`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DistributionInfo {
    pub group_id: String,
    pub group_name: String,
    pub role: GroupRole,
    pub server_zone: Option<String>,
    pub client_list: Vec<DistributionClient>,
}

impl DistributionInfo {
    /// Returns the group id, treating empty or invalid values as "no group".
    #[must_use]
    pub fn group_id(&self) -> GroupId {
        GroupId::parse(&self.group_id).unwrap_or(GroupId::NULL)
    }

    /// Returns true if the device serves an actual group.
    #[must_use]
    pub fn is_server(&self) -> bool {
        self.role == GroupRole::Server && !self.group_id().is_null()
    }

    /// Returns the client addresses when acting as server, else nothing.
    #[must_use]
    pub fn client_addresses(&self) -> Vec<String> {
        if !self.is_server() {
            return Vec::new();
        }
        self.client_list
            .iter()
            .map(|c| c.ip_address.clone())
            .filter(|ip| !ip.is_empty())
            .collect()
    }
}

/// Response of `netusb/getPlayInfo`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PlayInfo {
    pub input: String,
    pub playback: String,
    pub repeat: String,
    pub shuffle: String,
    pub play_time: i64,
    pub total_time: i64,
    pub artist: String,
    pub album: String,
    pub track: String,
    pub albumart_url: String,
}

/// Response of `system/getLocationInfo`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LocationInfo {
    pub id: String,
    pub name: String,
}

/// Response of `system/getNetworkStatus`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkStatus {
    pub network_name: String,
    pub connection: String,
    pub ip_address: String,
    pub mac_address: Option<serde_json::Value>,
}

/// Playback state of the network/USB source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Playing,
    Paused,
    Idle,
    #[default]
    Unknown,
}

impl PlaybackState {
    /// Maps the device's `playback` field.
    #[must_use]
    pub fn from_device(playback: &str) -> Self {
        match playback {
            "play" => Self::Playing,
            "pause" => Self::Paused,
            "stop" => Self::Idle,
            _ => Self::Unknown,
        }
    }
}
