//! CLI configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::path::Path;

use anyhow::{Context, Result};
use musiccast_core::{ControllerConfig, DeviceConfig, LinkConfig};
use serde::Deserialize;

/// CLI configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// First local UDP port devices push events to.
    /// Override: `MUSICCAST_UDP_PORT`
    pub udp_port: u16,

    /// Seconds between keepalive polls.
    /// Override: `MUSICCAST_POLL_INTERVAL`
    pub poll_interval: u64,

    /// Per-request HTTP timeout in seconds.
    /// Override: `MUSICCAST_HTTP_TIMEOUT`
    pub http_timeout: u64,

    /// Capacity of each device's event queue.
    pub queue_capacity: usize,

    /// Input clients switch to when linked.
    pub link_input: String,

    /// Name given to linked groups.
    pub group_name: String,

    /// Zone used for linking.
    pub zone: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        let device = DeviceConfig::default();
        let link = LinkConfig::default();
        Self {
            udp_port: device.udp_port,
            poll_interval: device.poll_interval_secs,
            http_timeout: ControllerConfig::default().http_timeout_secs,
            queue_capacity: device.queue_capacity,
            link_input: link.link_input,
            group_name: link.group_name,
            zone: link.zone,
        }
    }
}

impl CliConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn from_file(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MUSICCAST_UDP_PORT") {
            if let Ok(port) = val.parse() {
                self.udp_port = port;
            }
        }

        if let Ok(val) = std::env::var("MUSICCAST_POLL_INTERVAL") {
            if let Ok(interval) = val.parse() {
                self.poll_interval = interval;
            }
        }

        if let Ok(val) = std::env::var("MUSICCAST_HTTP_TIMEOUT") {
            if let Ok(timeout) = val.parse() {
                self.http_timeout = timeout;
            }
        }
    }

    /// Converts to musiccast-core's controller configuration.
    pub fn to_core_config(&self) -> ControllerConfig {
        ControllerConfig {
            http_timeout_secs: self.http_timeout,
            device: DeviceConfig {
                udp_port: self.udp_port,
                poll_interval_secs: self.poll_interval,
                queue_capacity: self.queue_capacity,
            },
            link: LinkConfig {
                link_input: self.link_input.clone(),
                group_name: self.group_name.clone(),
                zone: self.zone.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_path_gives_defaults() {
        let config = CliConfig::from_file(None).unwrap();
        assert_eq!(config.udp_port, 5005);
        assert_eq!(config.poll_interval, 480);
        assert_eq!(config.to_core_config(), ControllerConfig::default());
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "udp_port: 41100\nzone: zone2").unwrap();

        let config = CliConfig::from_file(Some(file.path())).unwrap();
        assert_eq!(config.udp_port, 41100);
        assert_eq!(config.zone, "zone2");
        assert_eq!(config.link_input, "mc_link");

        let core = config.to_core_config();
        assert_eq!(core.device.udp_port, 41100);
        assert_eq!(core.link.zone, "zone2");
        assert!(core.validate().is_ok());
    }

    #[test]
    fn unreadable_or_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CliConfig::from_file(Some(&dir.path().join("absent.yaml"))).is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "udp_port: [not, a, port]").unwrap();
        assert!(CliConfig::from_file(Some(file.path())).is_err());
    }
}
