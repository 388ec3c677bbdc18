//! Controller, device and linking configuration.
//!
//! All fields have defaults, so a partial YAML/JSON document deserializes
//! into a usable configuration. Call `validate()` before use.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::protocol_constants::{
    DEFAULT_GROUP_NAME, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_UDP_PORT, DEFAULT_ZONE_ID,
    EVENT_QUEUE_CAPACITY, HTTP_TIMEOUT_SECS, LINK_INPUT,
};

/// Per-device runtime settings.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DeviceConfig {
    /// Local UDP port the device pushes events to (advertised via `X-AppPort`).
    ///
    /// Each device of one controller needs its own port.
    pub udp_port: u16,

    /// Seconds between keepalive polls. The device drops the push
    /// subscription after roughly ten minutes without one.
    pub poll_interval_secs: u64,

    /// Capacity of the raw event queue. The oldest message is dropped on overflow.
    pub queue_capacity: usize,
}

impl DeviceConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.poll_interval_secs == 0 {
            return Err("poll_interval_secs must be >= 1".to_string());
        }
        if self.queue_capacity == 0 {
            return Err("queue_capacity must be >= 1".to_string());
        }
        Ok(())
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Returns a copy listening on `port`.
    #[must_use]
    pub fn with_udp_port(&self, port: u16) -> Self {
        Self {
            udp_port: port,
            ..self.clone()
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            udp_port: DEFAULT_UDP_PORT,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            queue_capacity: EVENT_QUEUE_CAPACITY,
        }
    }
}

/// Settings of the group linking protocol.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LinkConfig {
    /// Input a client selects to follow its master.
    pub link_input: String,
    /// Label set on the master once a group is linked.
    pub group_name: String,
    /// Zone used on master and clients.
    pub zone: String,
}

impl LinkConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.link_input.is_empty() {
            return Err("link_input must not be empty".to_string());
        }
        if self.zone.is_empty() {
            return Err("zone must not be empty".to_string());
        }
        Ok(())
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            link_input: LINK_INPUT.to_string(),
            group_name: DEFAULT_GROUP_NAME.to_string(),
            zone: DEFAULT_ZONE_ID.to_string(),
        }
    }
}

/// Top-level configuration of a [`Controller`](crate::bootstrap::Controller).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ControllerConfig {
    /// Per-request HTTP timeout (seconds).
    pub http_timeout_secs: u64,
    /// Defaults for every device added to the controller.
    pub device: DeviceConfig,
    pub link: LinkConfig,
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.http_timeout_secs == 0 {
            return Err("http_timeout_secs must be >= 1".to_string());
        }
        self.device.validate()?;
        self.link.validate()
    }

    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: HTTP_TIMEOUT_SECS,
            device: DeviceConfig::default(),
            link: LinkConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol() {
        let config = ControllerConfig::default();
        assert_eq!(config.device.udp_port, 5005);
        assert_eq!(config.device.poll_interval(), Duration::from_secs(480));
        assert_eq!(config.http_timeout(), Duration::from_secs(10));
        assert_eq!(config.link.link_input, "mc_link");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_document_fills_defaults() {
        let config: ControllerConfig =
            serde_json::from_str(r#"{ "device": { "udp_port": 41100 } }"#).unwrap();
        assert_eq!(config.device.udp_port, 41100);
        assert_eq!(config.device.queue_capacity, 256);
        assert_eq!(config.link.zone, "main");
    }

    #[test]
    fn validate_rejects_zero_values() {
        let mut config = ControllerConfig::default();
        config.device.queue_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = ControllerConfig::default();
        config.http_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = ControllerConfig::default();
        config.link.link_input.clear();
        assert!(config.validate().is_err());
    }
}
