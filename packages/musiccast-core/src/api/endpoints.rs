//! Yamaha Extended Control endpoint catalog.
//!
//! Single source of truth for the URL path of every API operation used by the
//! reconciler, the command helpers and the linking protocol.

use serde::Serialize;

use crate::protocol_constants::{API_BASE_PATH, DEFAULT_ZONE_ID};

/// Logical API operations exposed by a MusicCast device.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Endpoint {
    GetDeviceInfo,
    GetFeatures,
    GetLocationInfo,
    GetNetworkStatus,
    /// Zone status (power, input, volume, mute, sound program).
    GetStatus,
    SetPower,
    SetInput,
    SetVolume,
    SetMute,
    SetSoundProgram,
    /// Now-playing metadata of the network/USB source.
    GetPlayInfo,
    SetPlayback,
    GetDistributionInfo,
    SetClientInfo,
    SetServerInfo,
    SetGroupName,
    StartDistribution,
    StopDistribution,
}

impl Endpoint {
    /// Returns the path below the API base. Zoned paths contain `{zone}`.
    #[must_use]
    pub fn path_template(&self) -> &'static str {
        match self {
            Self::GetDeviceInfo => "system/getDeviceInfo",
            Self::GetFeatures => "system/getFeatures",
            Self::GetLocationInfo => "system/getLocationInfo",
            Self::GetNetworkStatus => "system/getNetworkStatus",
            Self::GetStatus => "{zone}/getStatus",
            Self::SetPower => "{zone}/setPower",
            Self::SetInput => "{zone}/setInput",
            Self::SetVolume => "{zone}/setVolume",
            Self::SetMute => "{zone}/setMute",
            Self::SetSoundProgram => "{zone}/setSoundProgram",
            Self::GetPlayInfo => "netusb/getPlayInfo",
            Self::SetPlayback => "netusb/setPlayback",
            Self::GetDistributionInfo => "dist/getDistributionInfo",
            Self::SetClientInfo => "dist/setClientInfo",
            Self::SetServerInfo => "dist/setServerInfo",
            Self::SetGroupName => "dist/setGroupName",
            Self::StartDistribution => "dist/startDistribution",
            Self::StopDistribution => "dist/stopDistribution",
        }
    }

    /// Returns true if the path is parameterized by a zone.
    #[must_use]
    pub fn is_zoned(&self) -> bool {
        self.path_template().starts_with("{zone}")
    }

    /// Returns true if the operation changes device state.
    #[must_use]
    pub fn is_mutating(&self) -> bool {
        !matches!(
            self,
            Self::GetDeviceInfo
                | Self::GetFeatures
                | Self::GetLocationInfo
                | Self::GetNetworkStatus
                | Self::GetStatus
                | Self::GetPlayInfo
                | Self::GetDistributionInfo
        )
    }

    /// Returns the vendor name of this operation (used in logs and errors).
    #[must_use]
    pub fn name(&self) -> &'static str {
        let template = self.path_template();
        template.rsplit('/').next().unwrap_or(template)
    }

    /// Builds the full request URL for a device and optional zone.
    ///
    /// Zoned endpoints fall back to the main zone; the zone is ignored for
    /// device-wide endpoints.
    #[must_use]
    pub fn url(&self, address: &str, zone: Option<&str>) -> String {
        let path = if self.is_zoned() {
            self.path_template()
                .replace("{zone}", zone.unwrap_or(DEFAULT_ZONE_ID))
        } else {
            self.path_template().to_string()
        };
        format!("http://{}{}/{}", address, API_BASE_PATH, path)
    }
}
