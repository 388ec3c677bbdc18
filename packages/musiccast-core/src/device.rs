//! Device coordinator.
//!
//! A [`Device`] owns its zones, the event ingestion pipeline and the
//! keepalive task. Construction ([`Device::connect`]) only talks HTTP;
//! [`Device::start`] binds the UDP socket and spawns the background tasks.
//!
//! # Task layout
//!
//! ```text
//! listener  --bytes-->  EventQueue  -->  dispatcher --> DeviceInner (EventSink)
//! keepalive --------------------------------------------> DeviceInner (Pollable)
//! ```
//!
//! All three tasks share one `CancellationToken`; [`Device::shutdown`] fires
//! it and waits for them to exit.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::commands;
use crate::api::traits::McTransport;
use crate::api::types::{DeviceInfo, DistributionInfo, Features, LocationInfo, NetworkStatus};
use crate::config::DeviceConfig;
use crate::context::DeviceContext;
use crate::error::{MusicCastError, MusicCastResult};
use crate::events::{
    bind_event_socket, run_dispatcher, run_listener, EventQueue, EventSink, IngestSnapshot,
    IngestStats,
};
use crate::keepalive::{run_keepalive, Pollable};
use crate::link::GroupLinker;
use crate::media_status::MediaStatus;
use crate::notify::HostNotifier;
use crate::protocol_constants::DEFAULT_ZONE_ID;
use crate::zone::{Zone, ZoneStatus};

/// State shared between the device handle and its background tasks.
pub struct DeviceInner {
    context: Arc<DeviceContext>,
    info: DeviceInfo,
    zones: HashMap<String, Arc<Zone>>,
    features: RwLock<Option<Features>>,
    linker: Option<Arc<GroupLinker>>,
    stats: Arc<IngestStats>,
}

impl DeviceInner {
    pub fn address(&self) -> &str {
        &self.context.address
    }

    pub fn zone(&self, id: &str) -> Option<Arc<Zone>> {
        self.zones.get(id).cloned()
    }

    /// Returns the cached features, fetching them once if missing.
    async fn ensure_features(&self) -> Option<Features> {
        let cached = self.features.read().clone();
        if cached.is_some() {
            return cached;
        }
        match commands::get_features(self.context.transport(), self.address()).await {
            Ok(features) => {
                for zone in self.zones.values() {
                    if let Some(feature) = features.zone(zone.id()) {
                        zone.apply_features(feature).await;
                    }
                }
                *self.features.write() = Some(features.clone());
                Some(features)
            }
            Err(e) => {
                log::warn!("[Device] {}: failed to fetch features: {}", self.address(), e);
                None
            }
        }
    }

    /// Fetches play info and hands the snapshot to the zones playing its
    /// input, or to `main` when no zone has that input selected.
    pub async fn refresh_play_info(&self) -> MusicCastResult<()> {
        let info = commands::get_play_info(self.context.transport(), self.address()).await?;
        let status = MediaStatus::new(info, self.address());

        let mut targets = Vec::new();
        for zone in self.zones.values() {
            if zone.attributes().await.input.as_deref() == Some(status.input()) {
                targets.push(Arc::clone(zone));
            }
        }
        if targets.is_empty() {
            targets.extend(self.zone(DEFAULT_ZONE_ID));
        }

        for zone in targets {
            zone.apply_media_status(status.clone()).await;
        }
        Ok(())
    }

    /// Fetches distribution info, stores it on every zone and, when serving
    /// a group, verifies the group's clients.
    pub async fn refresh_dist_info(&self) -> MusicCastResult<DistributionInfo> {
        let info =
            commands::get_distribution_info(self.context.transport(), self.address()).await?;
        for zone in self.zones.values() {
            zone.apply_dist_info(info.clone()).await;
        }
        if let Some(linker) = self.linker.as_ref() {
            if info.is_server() {
                let check = linker.reconcile_server(self.address(), &info).await;
                if !check.removed.is_empty() {
                    log::info!(
                        "[Device] {}: removed clients {:?} (dissolved: {})",
                        self.address(),
                        check.removed,
                        check.dissolved
                    );
                }
            }
        }
        Ok(info)
    }
}

#[async_trait]
impl EventSink for DeviceInner {
    fn device_id(&self) -> &str {
        &self.context.device_id
    }

    async fn on_zone_update(&self, zone: &str, fragment: ZoneStatus) {
        match self.zones.get(zone) {
            Some(z) => {
                z.update_status(Some(fragment)).await;
            }
            None => log::debug!("[Device] {}: no zone {}, ignoring", self.address(), zone),
        }
    }

    async fn on_play_info_updated(&self) {
        if let Err(e) = self.refresh_play_info().await {
            log::warn!("[Device] {}: play info refresh failed: {}", self.address(), e);
        }
    }

    async fn on_dist_info_updated(&self) {
        if let Err(e) = self.refresh_dist_info().await {
            log::warn!("[Device] {}: distribution refresh failed: {}", self.address(), e);
        }
    }
}

#[async_trait]
impl Pollable for DeviceInner {
    fn label(&self) -> &str {
        self.address()
    }

    async fn poll(&self) {
        self.ensure_features().await;
        for zone in self.zones.values() {
            zone.refresh().await;
        }
    }
}

/// One connected receiver and its zones.
pub struct Device {
    inner: Arc<DeviceInner>,
    config: DeviceConfig,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Device {
    /// Identifies the device and builds its zones.
    ///
    /// Fails with [`MusicCastError::Initialization`] if the device does not
    /// answer `getDeviceInfo` or reports no identifier. Zones come from the
    /// feature list, falling back to `main` alone when features are
    /// unavailable.
    pub async fn connect(
        address: &str,
        transport: Arc<dyn McTransport>,
        config: DeviceConfig,
        linker: Option<Arc<GroupLinker>>,
    ) -> MusicCastResult<Self> {
        config.validate().map_err(MusicCastError::Config)?;

        let info = commands::get_device_info(transport.as_ref(), address)
            .await
            .map_err(|e| MusicCastError::Initialization {
                address: address.to_string(),
                reason: e.to_string(),
            })?;
        if info.device_id.is_empty() {
            return Err(MusicCastError::Initialization {
                address: address.to_string(),
                reason: "device reported no device_id".to_string(),
            });
        }
        log::info!(
            "[Device] Connected to {} ({}, id {})",
            address,
            info.model_name,
            info.device_id
        );

        let features = match commands::get_features(transport.as_ref(), address).await {
            Ok(f) => Some(f),
            Err(e) => {
                log::warn!("[Device] {}: features unavailable, assuming main zone: {}", address, e);
                None
            }
        };
        let zone_ids = features
            .as_ref()
            .map(Features::zone_ids)
            .filter(|ids| !ids.is_empty())
            .unwrap_or_else(|| vec![DEFAULT_ZONE_ID.to_string()]);

        let context = Arc::new(DeviceContext::new(address, info.device_id.clone(), transport));
        let mut zones = HashMap::new();
        for id in zone_ids {
            let zone = Arc::new(Zone::new(id.clone(), Arc::clone(&context)));
            if let Some(feature) = features.as_ref().and_then(|f| f.zone(&id)) {
                zone.apply_features(feature).await;
            }
            zones.insert(id, zone);
        }

        Ok(Self {
            inner: Arc::new(DeviceInner {
                context,
                info,
                zones,
                features: RwLock::new(features),
                linker,
                stats: Arc::new(IngestStats::new()),
            }),
            config,
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Binds the event socket and spawns listener, dispatcher and keepalive.
    ///
    /// Returns the bound socket address.
    pub fn start(&self) -> MusicCastResult<SocketAddr> {
        let socket = bind_event_socket(self.config.udp_port)?;
        let local = socket.local_addr()?;
        let queue = Arc::new(EventQueue::new(
            self.config.queue_capacity,
            Arc::clone(&self.inner.stats),
        ));

        let sink: Arc<dyn EventSink> = self.inner.clone();
        let target: Arc<dyn Pollable> = self.inner.clone();
        let mut tasks = self.tasks.lock();
        tasks.push(tokio::spawn(run_listener(
            socket,
            Arc::clone(&queue),
            self.cancel.clone(),
        )));
        tasks.push(tokio::spawn(run_dispatcher(queue, sink, self.cancel.clone())));
        tasks.push(tokio::spawn(run_keepalive(
            target,
            self.config.poll_interval(),
            self.cancel.clone(),
        )));

        log::info!(
            "[Device] {}: started (events on {}, poll every {}s)",
            self.address(),
            local,
            self.config.poll_interval_secs
        );
        Ok(local)
    }

    /// Cancels the background tasks and waits for them to exit.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                log::warn!("[Device] {}: task ended abnormally: {}", self.address(), e);
            }
        }
        log::info!("[Device] {}: shut down", self.address());
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn address(&self) -> &str {
        self.inner.address()
    }

    pub fn device_id(&self) -> &str {
        &self.inner.context.device_id
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.inner.info
    }

    pub fn udp_port(&self) -> u16 {
        self.config.udp_port
    }

    pub fn features(&self) -> Option<Features> {
        self.inner.features.read().clone()
    }

    pub fn zone(&self, id: &str) -> Option<Arc<Zone>> {
        self.inner.zone(id)
    }

    /// Zone identifiers, sorted.
    pub fn zone_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.zones.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn stats(&self) -> IngestSnapshot {
        self.inner.stats.snapshot()
    }

    /// Registers the same host notifier on every zone.
    pub async fn set_notifier(&self, notifier: Arc<dyn HostNotifier>) {
        for zone in self.inner.zones.values() {
            zone.set_notifier(Arc::clone(&notifier)).await;
        }
    }

    /// Runs one keepalive cycle immediately.
    pub async fn poll(&self) {
        self.inner.poll().await;
    }

    pub async fn refresh_play_info(&self) -> MusicCastResult<()> {
        self.inner.refresh_play_info().await
    }

    pub async fn location_info(&self) -> MusicCastResult<LocationInfo> {
        commands::get_location_info(self.inner.context.transport(), self.address()).await
    }

    pub async fn network_status(&self) -> MusicCastResult<NetworkStatus> {
        commands::get_network_status(self.inner.context.transport(), self.address()).await
    }

    pub async fn refresh_dist_info(&self) -> MusicCastResult<DistributionInfo> {
        self.inner.refresh_dist_info().await
    }

    /// Internals, for tests that drive the sink directly.
    #[cfg(test)]
    pub(crate) fn inner(&self) -> &Arc<DeviceInner> {
        &self.inner
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
