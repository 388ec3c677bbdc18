//! Application bootstrap and dependency wiring.
//!
//! [`Controller`] is the composition root: it owns the HTTP client, the
//! process-wide [`GroupRegistry`], the [`GroupLinker`] and every connected
//! [`Device`]. Front ends (the CLI, a host application) talk to the
//! controller rather than wiring these pieces themselves.

use std::sync::Arc;

use dashmap::DashMap;
use reqwest::Client;

use crate::api::traits::McTransport;
use crate::api::transport::{HttpTransport, TransportError};
use crate::config::ControllerConfig;
use crate::device::Device;
use crate::error::{MusicCastError, MusicCastResult};
use crate::link::{DistributionGroup, GroupId, GroupLinker, GroupRegistry, LinkError};

/// Builds a transport. `Some(port)` is the UDP event port a device advertises
/// in `X-AppPort`; `None` builds one that subscribes nothing, used by the
/// linker to talk to every group member.
pub type TransportFactory = Arc<dyn Fn(Option<u16>) -> Arc<dyn McTransport> + Send + Sync>;

/// Owns devices, the group registry and the linker.
pub struct Controller {
    config: ControllerConfig,
    transport_for: TransportFactory,
    registry: Arc<GroupRegistry>,
    linker: Arc<GroupLinker>,
    devices: DashMap<String, Arc<Device>>,
}

impl Controller {
    /// Creates a controller talking HTTP with the configured timeout.
    ///
    /// Each device gets its own transport advertising that device's UDP port.
    /// The linker's transport advertises none.
    pub fn new(config: ControllerConfig) -> MusicCastResult<Self> {
        config.validate().map_err(MusicCastError::Config)?;
        let timeout = config.http_timeout();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(TransportError::from)?;

        let factory: TransportFactory = Arc::new(move |port| {
            let transport = HttpTransport::new(client.clone(), timeout);
            let transport = match port {
                Some(port) => transport.with_app_port(port),
                None => transport,
            };
            Arc::new(transport) as Arc<dyn McTransport>
        });
        Self::with_transport_factory(config, factory)
    }

    /// Creates a controller with a custom transport factory.
    pub fn with_transport_factory(
        config: ControllerConfig,
        transport_for: TransportFactory,
    ) -> MusicCastResult<Self> {
        config.validate().map_err(MusicCastError::Config)?;
        let registry = Arc::new(GroupRegistry::new());
        let linker = Arc::new(GroupLinker::new(
            transport_for(None),
            Arc::clone(&registry),
            config.link.clone(),
        ));
        Ok(Self {
            config,
            transport_for,
            registry,
            linker,
            devices: DashMap::new(),
        })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<GroupRegistry> {
        &self.registry
    }

    pub fn linker(&self) -> &Arc<GroupLinker> {
        &self.linker
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Devices
    // ─────────────────────────────────────────────────────────────────────────

    /// Connects a device and starts its event pipeline.
    ///
    /// With no explicit `udp_port`, devices take consecutive ports starting at
    /// the configured one (port 0 stays 0, letting the OS choose). Adding an
    /// address twice returns the device already running.
    pub async fn add_device(
        &self,
        address: &str,
        udp_port: Option<u16>,
    ) -> MusicCastResult<Arc<Device>> {
        if let Some(existing) = self.device(address) {
            return Ok(existing);
        }

        let port = udp_port.unwrap_or_else(|| self.next_port());
        let config = self.config.device.with_udp_port(port);
        let device = Device::connect(
            address,
            (self.transport_for)(Some(port)),
            config,
            Some(Arc::clone(&self.linker)),
        )
        .await?;
        device.start()?;

        let device = Arc::new(device);
        self.devices.insert(address.to_string(), Arc::clone(&device));
        Ok(device)
    }

    /// Stops a device and forgets it.
    pub async fn remove_device(&self, address: &str) -> bool {
        match self.devices.remove(address) {
            Some((_, device)) => {
                device.shutdown().await;
                true
            }
            None => false,
        }
    }

    pub fn device(&self, address: &str) -> Option<Arc<Device>> {
        self.devices.get(address).map(|r| Arc::clone(r.value()))
    }

    /// Addresses of connected devices, sorted.
    pub fn device_addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self.devices.iter().map(|r| r.key().clone()).collect();
        addresses.sort();
        addresses
    }

    fn next_port(&self) -> u16 {
        let base = self.config.device.udp_port;
        if base == 0 {
            return 0;
        }
        let taken: Vec<u16> = self.devices.iter().map(|r| r.value().udp_port()).collect();
        (base..=u16::MAX)
            .find(|p| !taken.contains(p))
            .unwrap_or(0)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Groups
    // ─────────────────────────────────────────────────────────────────────────

    /// Links `clients` to `master`.
    pub async fn link(
        &self,
        master: &str,
        clients: &[String],
    ) -> Result<DistributionGroup, LinkError> {
        self.linker.link(master, clients).await
    }

    /// Tears down a tracked group. Returns false if the id is unknown or any
    /// sub-step failed.
    pub async fn unlink(&self, id: &GroupId) -> bool {
        match self.registry.get(id) {
            Some(group) => self.linker.unlink(&group).await,
            None => {
                log::warn!("[Controller] Unlink of unknown group {}", id);
                false
            }
        }
    }

    /// Links `members` to `master`, ignoring the master itself and duplicates.
    pub async fn join(
        &self,
        master: &str,
        members: &[String],
    ) -> Result<DistributionGroup, LinkError> {
        let mut clients: Vec<String> = Vec::with_capacity(members.len());
        for member in members {
            if member != master && !clients.contains(member) {
                clients.push(member.clone());
            }
        }
        log::info!("[Controller] Join {:?} to {}", clients, master);
        self.linker.link(master, &clients).await
    }

    /// Takes `address` out of its group.
    ///
    /// A master dissolves its group. A client is removed; when it was the last
    /// one, the group is dissolved. Returns false if the address is in no
    /// tracked group or a sub-step failed.
    pub async fn unjoin(&self, address: &str) -> bool {
        let Some(group) = self.registry.find_by_member(address) else {
            log::warn!("[Controller] {} is not in a tracked group", address);
            return false;
        };

        if group.master.address == address {
            log::info!("[Controller] {} is master, dissolving group {}", address, group.id);
            return self.linker.unlink(&group).await;
        }

        if group.clients.len() <= 1 {
            log::info!("[Controller] Last client {} left, dissolving group {}", address, group.id);
            return self.linker.unlink(&group).await;
        }
        self.linker.remove_client(&group, address).await
    }

    pub fn groups(&self) -> Vec<DistributionGroup> {
        self.registry.groups()
    }

    /// Stops every device.
    pub async fn shutdown(&self) {
        log::info!("[Controller] Shutting down {} device(s)", self.devices.len());
        let devices: Vec<Arc<Device>> = self.devices.iter().map(|r| Arc::clone(r.value())).collect();
        self.devices.clear();
        for device in devices {
            device.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::api::endpoints::Endpoint;
    use crate::config::DeviceConfig;
    use crate::test_fixtures::{device_info_body, features_body, MockTransport};

    const MASTER: &str = "10.0.0.1";
    const C1: &str = "10.0.0.2";
    const C2: &str = "10.0.0.3";

    fn controller(mock: &Arc<MockTransport>, config: ControllerConfig) -> Controller {
        let shared = Arc::clone(mock);
        Controller::with_transport_factory(
            config,
            Arc::new(move |_| Arc::clone(&shared) as Arc<dyn McTransport>),
        )
        .unwrap()
    }

    fn compatible(mock: &MockTransport) {
        for host in [MASTER, C1, C2] {
            mock.respond(Endpoint::GetFeatures, host, features_body(&["main"], 2.0, &[2]));
        }
    }

    fn local_config() -> ControllerConfig {
        ControllerConfig {
            device: DeviceConfig {
                udp_port: 0,
                ..DeviceConfig::default()
            },
            ..ControllerConfig::default()
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = ControllerConfig {
            http_timeout_secs: 0,
            ..ControllerConfig::default()
        };
        assert!(matches!(
            Controller::new(config).err(),
            Some(MusicCastError::Config(_))
        ));
    }

    #[tokio::test]
    async fn join_drops_master_and_duplicates() {
        let mock = Arc::new(MockTransport::new());
        compatible(&mock);
        let controller = controller(&mock, local_config());

        let members = vec![
            MASTER.to_string(),
            C1.to_string(),
            C2.to_string(),
            C1.to_string(),
        ];
        let group = controller.join(MASTER, &members).await.unwrap();

        assert_eq!(group.client_addresses(), vec![C1, C2]);
        assert_eq!(mock.call_count(Endpoint::SetClientInfo), 2);
        assert_eq!(controller.groups().len(), 1);
    }

    #[tokio::test]
    async fn unjoin_master_dissolves_group() {
        let mock = Arc::new(MockTransport::new());
        compatible(&mock);
        let controller = controller(&mock, local_config());
        controller
            .join(MASTER, &[C1.to_string(), C2.to_string()])
            .await
            .unwrap();
        mock.clear_calls();

        assert!(controller.unjoin(MASTER).await);
        assert!(controller.groups().is_empty());
        assert_eq!(mock.call_count(Endpoint::StopDistribution), 1);
    }

    #[tokio::test]
    async fn unjoin_client_keeps_group_until_last() {
        let mock = Arc::new(MockTransport::new());
        compatible(&mock);
        let controller = controller(&mock, local_config());
        let group = controller
            .join(MASTER, &[C1.to_string(), C2.to_string()])
            .await
            .unwrap();
        mock.clear_calls();

        assert!(controller.unjoin(C1).await);
        let remaining = controller.registry().get(&group.id).unwrap();
        assert_eq!(remaining.client_addresses(), vec![C2]);
        assert_eq!(mock.call_count(Endpoint::StopDistribution), 0);

        assert!(controller.unjoin(C2).await);
        assert!(controller.groups().is_empty());
        assert_eq!(mock.call_count(Endpoint::StopDistribution), 1);

        assert!(!controller.unjoin(C2).await);
    }

    #[tokio::test]
    async fn unlink_unknown_group_is_false() {
        let mock = Arc::new(MockTransport::new());
        let controller = controller(&mock, local_config());
        assert!(!controller.unlink(&GroupId::generate()).await);
        assert_eq!(mock.mutating_calls(), 0);
    }

    #[tokio::test]
    async fn add_device_is_idempotent_and_shutdown_clears() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(Endpoint::GetDeviceInfo, MASTER, device_info_body("DEV1"));
        compatible(&mock);
        let controller = controller(&mock, local_config());

        let first = controller.add_device(MASTER, None).await.unwrap();
        let second = controller.add_device(MASTER, None).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(mock.call_count(Endpoint::GetDeviceInfo), 1);
        assert_eq!(controller.device_addresses(), vec![MASTER]);

        controller.shutdown().await;
        assert!(controller.device(MASTER).is_none());
    }

    #[tokio::test]
    async fn only_device_transports_carry_an_event_port() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(Endpoint::GetDeviceInfo, MASTER, device_info_body("DEV1"));
        compatible(&mock);
        let requested: Arc<parking_lot::Mutex<Vec<Option<u16>>>> = Arc::default();
        let shared = Arc::clone(&mock);
        let seen = Arc::clone(&requested);
        let controller = Controller::with_transport_factory(
            local_config(),
            Arc::new(move |port| {
                seen.lock().push(port);
                Arc::clone(&shared) as Arc<dyn McTransport>
            }),
        )
        .unwrap();

        // the linker's transport is built first and advertises nothing
        assert_eq!(*requested.lock(), vec![None]);

        let device = controller.add_device(MASTER, None).await.unwrap();
        assert_eq!(*requested.lock(), vec![None, Some(device.udp_port())]);
        controller.shutdown().await;
    }

    #[tokio::test]
    async fn failed_device_is_not_registered() {
        let mock = Arc::new(MockTransport::new());
        mock.fail(Endpoint::GetDeviceInfo, MASTER);
        let controller = controller(&mock, local_config());

        let err = controller.add_device(MASTER, None).await.err().unwrap();
        assert!(matches!(err, MusicCastError::Initialization { .. }));
        assert!(controller.device(MASTER).is_none());
    }
}
