//! Per-zone status reconciliation.
//!
//! A [`Zone`] merges two partially overlapping sources of truth, the polled
//! `getStatus` snapshot and pushed UDP fragments, into one status map, and
//! decides when the host must be told about it.
//!
//! # State machine
//!
//! ```text
//! Uninitialized --merge(change)--> Dirty --flush(ok)--> Synced
//!                                    ^                    |
//!                                    +---merge(change)----+
//! ```
//!
//! A failed or missing host notifier leaves the zone `Dirty`; the next
//! reconciliation cycle retries the notification.
//!
//! All mutable state sits behind one `tokio::sync::Mutex` that is held for the
//! whole merge, baseline fetch included, so push, poll and linking never
//! interleave on the same zone.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::api::commands;
use crate::api::types::{DistributionInfo, GroupRole, PlaybackState, ZoneFeature};
use crate::context::DeviceContext;
use crate::error::{MusicCastError, MusicCastResult};
use crate::link::group_id::GroupId;
use crate::media_status::{media_status_equals, MediaStatus};
use crate::notify::HostNotifier;

/// Field map of a zone's status as reported by the device.
pub type ZoneStatus = Map<String, Value>;

/// Reconciliation state of a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileState {
    /// No status fetched yet.
    Uninitialized,
    /// Status present and delivered to the host.
    Synced,
    /// Status changed since the last successful notification.
    Dirty,
}

/// Power state derived from the `power` field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerState {
    On,
    Standby,
    #[default]
    Unknown,
}

impl PowerState {
    #[must_use]
    pub fn from_device(power: &str) -> Self {
        match power {
            "on" => Self::On,
            "standby" => Self::Standby,
            _ => Self::Unknown,
        }
    }
}

/// Result of one [`Zone::update_status`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Status present and nothing new to merge; no request was made.
    Healthy,
    /// Merge produced the same status as before.
    Unchanged,
    /// Status changed and the zone became dirty.
    Changed,
    /// Baseline fetch failed with nothing to merge; state untouched.
    Skipped,
}

/// Values derived from the merged status and the device's features.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ZoneAttributes {
    pub power: PowerState,
    pub input: Option<String>,
    pub sound_program: Option<String>,
    pub mute: Option<bool>,
    pub volume: Option<u32>,
    pub max_volume: Option<u32>,
    /// `volume / max_volume`, absent while the maximum is unknown or zero.
    pub volume_fraction: Option<f64>,
    /// Inputs of this zone, the selected one first.
    pub source_list: Vec<String>,
    pub sound_program_list: Vec<String>,
    pub playback: PlaybackState,
}

struct ZoneInner {
    status: Option<ZoneStatus>,
    attributes: ZoneAttributes,
    inputs: Vec<String>,
    dist_info: Option<DistributionInfo>,
    media_status: Option<MediaStatus>,
    state: ReconcileState,
    refresh_requested: bool,
    notifier: Option<Arc<dyn HostNotifier>>,
}

impl ZoneInner {
    fn new() -> Self {
        Self {
            status: None,
            attributes: ZoneAttributes::default(),
            inputs: Vec::new(),
            dist_info: None,
            media_status: None,
            state: ReconcileState::Uninitialized,
            refresh_requested: false,
            notifier: None,
        }
    }

    fn rederive(&mut self) {
        let empty = ZoneStatus::new();
        let status = self.status.as_ref().unwrap_or(&empty);
        self.attributes = derive_attributes(status, &self.attributes, &self.inputs);
    }
}

/// One independently controllable output of a device.
pub struct Zone {
    id: String,
    context: Arc<DeviceContext>,
    inner: Mutex<ZoneInner>,
}

impl Zone {
    #[must_use]
    pub fn new(id: impl Into<String>, context: Arc<DeviceContext>) -> Self {
        Self {
            id: id.into(),
            context,
            inner: Mutex::new(ZoneInner::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn address(&self) -> &str {
        &self.context.address
    }

    fn label(&self) -> String {
        format!("{}/{}", self.context.address, self.id)
    }

    /// Registers the host callback. Replaces any previous one.
    pub async fn set_notifier(&self, notifier: Arc<dyn HostNotifier>) {
        self.inner.lock().await.notifier = Some(notifier);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reconciliation
    // ─────────────────────────────────────────────────────────────────────────

    /// Merges a pushed fragment (or, with `None`, re-checks health) and flushes.
    ///
    /// With a status present and no refresh requested, `None` is a no-op
    /// health check. Otherwise the full status is fetched as the baseline and
    /// `partial` is overlaid on top. If that fetch fails, `partial` alone is
    /// merged; without a partial the cycle is skipped.
    pub async fn update_status(&self, partial: Option<ZoneStatus>) -> MergeOutcome {
        let mut inner = self.inner.lock().await;
        let outcome = self.merge_locked(&mut inner, partial).await;
        self.flush_locked(&mut inner);
        outcome
    }

    /// Forces a full `getStatus` round-trip regardless of health.
    pub async fn refresh(&self) -> MergeOutcome {
        let mut inner = self.inner.lock().await;
        inner.refresh_requested = true;
        let outcome = self.merge_locked(&mut inner, None).await;
        self.flush_locked(&mut inner);
        outcome
    }

    /// Makes the next health check fetch the full status.
    pub async fn request_refresh(&self) {
        self.inner.lock().await.refresh_requested = true;
    }

    /// Delivers a pending notification. Returns the resulting state.
    pub async fn flush(&self) -> ReconcileState {
        let mut inner = self.inner.lock().await;
        self.flush_locked(&mut inner)
    }

    async fn merge_locked(&self, inner: &mut ZoneInner, partial: Option<ZoneStatus>) -> MergeOutcome {
        let needs_fetch = inner.status.is_none() || inner.refresh_requested;
        if partial.is_none() && !needs_fetch {
            log::trace!("[Zone] {}: healthy", self.label());
            return MergeOutcome::Healthy;
        }

        let previous = inner.status.clone().unwrap_or_default();
        let mut merged = previous.clone();

        if needs_fetch {
            match commands::get_status(self.context.transport(), &self.context.address, &self.id)
                .await
            {
                Ok(baseline) => {
                    inner.refresh_requested = false;
                    overlay(&mut merged, baseline);
                }
                Err(e) if partial.is_some() => {
                    log::warn!(
                        "[Zone] {}: baseline fetch failed, merging pushed fields only: {}",
                        self.label(),
                        e
                    );
                }
                Err(e) => {
                    log::warn!("[Zone] {}: status fetch failed, skipping: {}", self.label(), e);
                    return MergeOutcome::Skipped;
                }
            }
        }

        if let Some(partial) = partial {
            overlay(&mut merged, partial);
        }

        if merged == previous {
            log::trace!("[Zone] {}: status unchanged", self.label());
            return MergeOutcome::Unchanged;
        }

        log::debug!("[Zone] {}: status changed: {:?}", self.label(), merged);
        inner.status = Some(merged);
        inner.rederive();
        inner.state = ReconcileState::Dirty;
        MergeOutcome::Changed
    }

    fn flush_locked(&self, inner: &mut ZoneInner) -> ReconcileState {
        if inner.state != ReconcileState::Dirty {
            return inner.state;
        }
        match inner.notifier.as_ref() {
            None => {
                log::trace!("[Zone] {}: no notifier registered, staying dirty", self.label());
            }
            Some(notifier) => match notifier.notify() {
                Ok(()) => inner.state = ReconcileState::Synced,
                Err(e) => {
                    log::warn!("[Zone] {}: {}; will retry", self.label(), e);
                }
            },
        }
        inner.state
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Media, distribution and features
    // ─────────────────────────────────────────────────────────────────────────

    /// Replaces the now-playing snapshot; dirty only when it really changed.
    pub async fn apply_media_status(&self, status: MediaStatus) -> ReconcileState {
        let mut inner = self.inner.lock().await;
        if !media_status_equals(inner.media_status.as_ref(), Some(&status)) {
            log::debug!(
                "[Zone] {}: media changed: {} - {}",
                self.label(),
                status.artist(),
                status.track()
            );
            inner.attributes.playback = status.playback();
            inner.state = ReconcileState::Dirty;
        }
        inner.media_status = Some(status);
        self.flush_locked(&mut inner)
    }

    /// Stores fresh distribution info; dirty when it differs.
    pub async fn apply_dist_info(&self, info: DistributionInfo) -> ReconcileState {
        let mut inner = self.inner.lock().await;
        if inner.dist_info.as_ref() != Some(&info) {
            log::debug!(
                "[Zone] {}: distribution info changed: role={:?} group={}",
                self.label(),
                info.role,
                info.group_id()
            );
            inner.dist_info = Some(info);
            inner.state = ReconcileState::Dirty;
        }
        self.flush_locked(&mut inner)
    }

    /// Applies this zone's capabilities from `getFeatures`.
    ///
    /// Before the first status merge the capabilities are only stored; the
    /// zone stays `Uninitialized` and the host hears nothing until there is a
    /// status to report.
    pub async fn apply_features(&self, feature: &ZoneFeature) -> ReconcileState {
        let mut inner = self.inner.lock().await;
        let before = inner.attributes.clone();
        inner.inputs = feature.input_list.clone();
        inner.attributes.sound_program_list = feature.sound_program_list.clone();
        inner.rederive();
        if inner.state != ReconcileState::Uninitialized && inner.attributes != before {
            inner.state = ReconcileState::Dirty;
        }
        self.flush_locked(&mut inner)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn status(&self) -> Option<ZoneStatus> {
        self.inner.lock().await.status.clone()
    }

    pub async fn attributes(&self) -> ZoneAttributes {
        self.inner.lock().await.attributes.clone()
    }

    pub async fn state(&self) -> ReconcileState {
        self.inner.lock().await.state
    }

    pub async fn media_status(&self) -> Option<MediaStatus> {
        self.inner.lock().await.media_status.clone()
    }

    pub async fn dist_info(&self) -> Option<DistributionInfo> {
        self.inner.lock().await.dist_info.clone()
    }

    /// Group this zone's device reports, or [`GroupId::NULL`].
    pub async fn group_id(&self) -> GroupId {
        self.inner
            .lock()
            .await
            .dist_info
            .as_ref()
            .map(DistributionInfo::group_id)
            .unwrap_or(GroupId::NULL)
    }

    pub async fn group_role(&self) -> GroupRole {
        self.inner
            .lock()
            .await
            .dist_info
            .as_ref()
            .map(|d| d.role)
            .unwrap_or_default()
    }

    /// True if the device serves a non-null group.
    pub async fn is_group_server(&self) -> bool {
        self.inner
            .lock()
            .await
            .dist_info
            .as_ref()
            .is_some_and(DistributionInfo::is_server)
    }

    /// Client addresses while serving a group, else empty.
    pub async fn group_clients(&self) -> Vec<String> {
        self.inner
            .lock()
            .await
            .dist_info
            .as_ref()
            .map(DistributionInfo::client_addresses)
            .unwrap_or_default()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Control
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn set_power(&self, on: bool) -> MusicCastResult<()> {
        commands::set_power(self.context.transport(), &self.context.address, &self.id, on).await
    }

    pub async fn set_mute(&self, mute: bool) -> MusicCastResult<()> {
        commands::set_mute(self.context.transport(), &self.context.address, &self.id, mute).await
    }

    /// Sets the raw volume step.
    pub async fn set_volume(&self, volume: u32) -> MusicCastResult<()> {
        commands::set_volume(self.context.transport(), &self.context.address, &self.id, volume)
            .await
    }

    /// Sets the volume as a fraction of the zone's maximum, clamped to `0..=1`.
    pub async fn set_volume_fraction(&self, fraction: f64) -> MusicCastResult<()> {
        let max = self
            .attributes()
            .await
            .max_volume
            .ok_or_else(|| MusicCastError::Decode(format!("{}: max_volume unknown", self.label())))?;
        let raw = (fraction.clamp(0.0, 1.0) * f64::from(max)).round() as u32;
        self.set_volume(raw).await
    }

    pub async fn set_input(&self, input: &str) -> MusicCastResult<()> {
        commands::set_input(self.context.transport(), &self.context.address, &self.id, input).await
    }

    pub async fn set_sound_program(&self, program: &str) -> MusicCastResult<()> {
        commands::set_sound_program(
            self.context.transport(),
            &self.context.address,
            &self.id,
            program,
        )
        .await
    }

    /// Sends a net/USB playback command. Device-wide, not zone-scoped.
    pub async fn set_playback(&self, playback: &str) -> MusicCastResult<()> {
        commands::set_playback(self.context.transport(), &self.context.address, playback).await
    }
}

/// Copies every field of `update` into `status`, overwriting existing ones.
fn overlay(status: &mut ZoneStatus, update: ZoneStatus) {
    for (key, value) in update {
        status.insert(key, value);
    }
}

fn derive_attributes(
    status: &ZoneStatus,
    previous: &ZoneAttributes,
    inputs: &[String],
) -> ZoneAttributes {
    let text = |key: &str| status.get(key).and_then(Value::as_str).map(str::to_string);
    let number = |key: &str| {
        status
            .get(key)
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
    };

    let volume = number("volume");
    // a zero maximum would divide by zero; keep the last usable one
    let max_volume = number("max_volume")
        .filter(|m| *m > 0)
        .or(previous.max_volume);
    let volume_fraction = match (volume, max_volume) {
        (Some(v), Some(m)) => Some(f64::from(v) / f64::from(m)),
        _ => None,
    };
    let input = text("input");

    ZoneAttributes {
        power: status
            .get("power")
            .and_then(Value::as_str)
            .map(PowerState::from_device)
            .unwrap_or_default(),
        source_list: order_sources(inputs, input.as_deref()),
        input,
        sound_program: text("sound_program"),
        mute: status.get("mute").and_then(Value::as_bool),
        volume,
        max_volume,
        volume_fraction,
        sound_program_list: previous.sound_program_list.clone(),
        playback: previous.playback,
    }
}

/// Puts the selected input first, keeping the device order otherwise.
fn order_sources(inputs: &[String], selected: Option<&str>) -> Vec<String> {
    match selected {
        Some(sel) if inputs.iter().any(|i| i == sel) => std::iter::once(sel.to_string())
            .chain(inputs.iter().filter(|i| *i != sel).cloned())
            .collect(),
        _ => inputs.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Instant;

    use serde_json::json;

    use crate::api::endpoints::Endpoint;
    use crate::api::types::PlayInfo;
    use crate::notify::{FnNotifier, NotifyError};
    use crate::test_fixtures::MockTransport;

    const HOST: &str = "192.168.1.20";

    fn zone_with(mock: &Arc<MockTransport>) -> Zone {
        let transport: Arc<dyn crate::api::traits::McTransport> = mock.clone();
        Zone::new("main", Arc::new(DeviceContext::new(HOST, "AC44F2850", transport)))
    }

    fn counting_notifier() -> (Arc<dyn HostNotifier>, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let notifier = FnNotifier::shared(move || {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        (notifier, count)
    }

    fn fragment(value: Value) -> ZoneStatus {
        match value {
            Value::Object(map) => map,
            _ => panic!("fragment must be an object"),
        }
    }

    #[tokio::test]
    async fn pushed_fragment_derives_fraction_and_notifies_once() {
        let mock = Arc::new(MockTransport::new());
        let zone = zone_with(&mock);
        let (notifier, count) = counting_notifier();
        zone.set_notifier(notifier).await;

        let push = fragment(json!({ "power": "on", "volume": 10, "max_volume": 60 }));
        assert_eq!(zone.update_status(Some(push.clone())).await, MergeOutcome::Changed);
        assert_eq!(zone.update_status(Some(push)).await, MergeOutcome::Unchanged);

        let status = zone.status().await.unwrap();
        assert_eq!(
            Value::Object(status),
            json!({ "power": "on", "volume": 10, "max_volume": 60 })
        );
        let attrs = zone.attributes().await;
        assert_eq!(attrs.power, PowerState::On);
        assert!((attrs.volume_fraction.unwrap() - 10.0 / 60.0).abs() < 1e-4);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(zone.state().await, ReconcileState::Synced);
    }

    #[tokio::test]
    async fn merges_fold_left_to_right() {
        let mock = Arc::new(MockTransport::new());
        let zone = zone_with(&mock);

        let updates = vec![
            json!({ "power": "standby", "volume": 5 }),
            json!({ "input": "spotify" }),
            json!({ "volume": 30, "mute": true }),
            json!({ "power": "on", "input": "net_radio" }),
            json!({ "mute": false }),
        ];

        let mut expected = ZoneStatus::new();
        for update in &updates {
            overlay(&mut expected, fragment(update.clone()));
            zone.update_status(Some(fragment(update.clone()))).await;
        }

        assert_eq!(zone.status().await, Some(expected));
        // only the first merge needed a baseline
        assert_eq!(mock.call_count(Endpoint::GetStatus), 1);
    }

    #[tokio::test]
    async fn healthy_zone_does_not_fetch() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(
            Endpoint::GetStatus,
            HOST,
            json!({ "response_code": 0, "power": "on", "volume": 20, "max_volume": 100 }),
        );
        let zone = zone_with(&mock);

        assert_eq!(zone.update_status(None).await, MergeOutcome::Changed);
        assert_eq!(zone.update_status(None).await, MergeOutcome::Healthy);
        assert_eq!(mock.call_count(Endpoint::GetStatus), 1);
    }

    #[tokio::test]
    async fn refresh_always_round_trips() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(
            Endpoint::GetStatus,
            HOST,
            json!({ "response_code": 0, "power": "on" }),
        );
        let zone = zone_with(&mock);
        zone.update_status(None).await;

        assert_eq!(zone.refresh().await, MergeOutcome::Unchanged);
        assert_eq!(mock.call_count(Endpoint::GetStatus), 2);

        zone.request_refresh().await;
        zone.update_status(None).await;
        assert_eq!(mock.call_count(Endpoint::GetStatus), 3);
        assert_eq!(zone.update_status(None).await, MergeOutcome::Healthy);
    }

    #[tokio::test]
    async fn refetch_never_deletes_pushed_fields() {
        let mock = Arc::new(MockTransport::new());
        let zone = zone_with(&mock);
        zone.update_status(Some(fragment(json!({ "sound_program": "straight" }))))
            .await;

        mock.respond(
            Endpoint::GetStatus,
            HOST,
            json!({ "response_code": 0, "power": "on" }),
        );
        zone.refresh().await;

        let status = zone.status().await.unwrap();
        assert_eq!(status.get("sound_program"), Some(&json!("straight")));
        assert_eq!(status.get("power"), Some(&json!("on")));
    }

    #[tokio::test]
    async fn failed_baseline_with_fragment_merges_fragment() {
        let mock = Arc::new(MockTransport::new());
        mock.fail(Endpoint::GetStatus, HOST);
        let zone = zone_with(&mock);

        let outcome = zone
            .update_status(Some(fragment(json!({ "volume": 12 }))))
            .await;
        assert_eq!(outcome, MergeOutcome::Changed);
        assert_eq!(
            zone.status().await.map(Value::Object),
            Some(json!({ "volume": 12 }))
        );
    }

    #[tokio::test]
    async fn failed_poll_leaves_state_untouched() {
        let mock = Arc::new(MockTransport::new());
        mock.fail(Endpoint::GetStatus, HOST);
        let zone = zone_with(&mock);

        assert_eq!(zone.update_status(None).await, MergeOutcome::Skipped);
        assert_eq!(zone.status().await, None);
        assert_eq!(zone.state().await, ReconcileState::Uninitialized);
    }

    #[tokio::test]
    async fn zero_max_volume_keeps_previous_maximum() {
        let mock = Arc::new(MockTransport::new());
        let zone = zone_with(&mock);

        zone.update_status(Some(fragment(json!({ "volume": 0, "max_volume": 0 }))))
            .await;
        assert_eq!(zone.attributes().await.volume_fraction, None);

        zone.update_status(Some(fragment(json!({ "volume": 40, "max_volume": 80 }))))
            .await;
        zone.update_status(Some(fragment(json!({ "volume": 20, "max_volume": 0 }))))
            .await;
        let attrs = zone.attributes().await;
        assert_eq!(attrs.max_volume, Some(80));
        assert_eq!(attrs.volume_fraction, Some(0.25));
    }

    #[tokio::test]
    async fn failing_notifier_keeps_zone_dirty_until_it_recovers() {
        let mock = Arc::new(MockTransport::new());
        let zone = zone_with(&mock);
        let ready = Arc::new(AtomicBool::new(false));
        let calls = Arc::new(AtomicUsize::new(0));
        let (r, c) = (Arc::clone(&ready), Arc::clone(&calls));
        zone.set_notifier(FnNotifier::shared(move || {
            c.fetch_add(1, Ordering::SeqCst);
            if r.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(NotifyError::new("host not ready"))
            }
        }))
        .await;

        zone.update_status(Some(fragment(json!({ "power": "on" }))))
            .await;
        assert_eq!(zone.state().await, ReconcileState::Dirty);

        ready.store(true, Ordering::SeqCst);
        // a health check with no change still retries the notification
        assert_eq!(zone.update_status(None).await, MergeOutcome::Healthy);
        assert_eq!(zone.state().await, ReconcileState::Synced);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn without_notifier_zone_stays_dirty() {
        let mock = Arc::new(MockTransport::new());
        let zone = zone_with(&mock);
        zone.update_status(Some(fragment(json!({ "power": "on" }))))
            .await;
        assert_eq!(zone.flush().await, ReconcileState::Dirty);
    }

    #[tokio::test]
    async fn media_progress_does_not_notify() {
        let mock = Arc::new(MockTransport::new());
        let zone = zone_with(&mock);
        let (notifier, count) = counting_notifier();
        zone.set_notifier(notifier).await;

        let t0 = Instant::now();
        let info = |play_time| PlayInfo {
            playback: "play".to_string(),
            track: "Roygbiv".to_string(),
            play_time,
            ..Default::default()
        };
        zone.apply_media_status(MediaStatus::captured_at(info(10), HOST, t0))
            .await;
        zone.apply_media_status(MediaStatus::captured_at(
            info(15),
            HOST,
            t0 + std::time::Duration::from_secs(5),
        ))
        .await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(zone.attributes().await.playback, PlaybackState::Playing);

        // a seek shows up as drift
        zone.apply_media_status(MediaStatus::captured_at(
            info(120),
            HOST,
            t0 + std::time::Duration::from_secs(6),
        ))
        .await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn dist_info_accessors() {
        let mock = Arc::new(MockTransport::new());
        let zone = zone_with(&mock);
        assert!(zone.group_id().await.is_null());
        assert_eq!(zone.group_role().await, GroupRole::None);

        let info: DistributionInfo = serde_json::from_value(json!({
            "group_id": "0123456789abcdef0123456789abcdef",
            "role": "server",
            "client_list": [{ "ip_address": "192.168.1.21" }]
        }))
        .unwrap();
        assert_eq!(zone.apply_dist_info(info.clone()).await, ReconcileState::Dirty);

        assert!(zone.is_group_server().await);
        assert_eq!(zone.group_clients().await, vec!["192.168.1.21"]);
        assert_eq!(
            zone.group_id().await.to_string(),
            "0123456789abcdef0123456789abcdef"
        );
    }

    #[tokio::test]
    async fn features_order_sources_with_selected_first() {
        let mock = Arc::new(MockTransport::new());
        let zone = zone_with(&mock);
        zone.update_status(Some(fragment(json!({ "input": "spotify" }))))
            .await;

        zone.apply_features(&ZoneFeature {
            id: "main".to_string(),
            input_list: vec!["net_radio".into(), "spotify".into(), "mc_link".into()],
            sound_program_list: vec!["straight".into()],
        })
        .await;

        let attrs = zone.attributes().await;
        assert_eq!(attrs.source_list, vec!["spotify", "net_radio", "mc_link"]);
        assert_eq!(attrs.sound_program_list, vec!["straight"]);
    }

    #[tokio::test]
    async fn features_before_first_status_do_not_notify() {
        let mock = Arc::new(MockTransport::new());
        let zone = zone_with(&mock);
        let (notifier, count) = counting_notifier();
        zone.set_notifier(notifier).await;

        let feature = ZoneFeature {
            id: "main".to_string(),
            input_list: vec!["net_radio".into(), "spotify".into()],
            sound_program_list: vec!["straight".into()],
        };
        assert_eq!(zone.apply_features(&feature).await, ReconcileState::Uninitialized);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(zone.attributes().await.source_list, vec!["net_radio", "spotify"]);

        // the first merge reports status and capabilities together
        zone.update_status(Some(fragment(json!({ "input": "spotify" }))))
            .await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(zone.attributes().await.source_list, vec!["spotify", "net_radio"]);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_pushes_wait_for_the_baseline_fetch() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(
            Endpoint::GetStatus,
            HOST,
            json!({ "response_code": 0, "power": "on", "volume": 5 }),
        );
        mock.delay(Endpoint::GetStatus, std::time::Duration::from_millis(50));
        let zone = Arc::new(zone_with(&mock));

        let first = {
            let zone = Arc::clone(&zone);
            tokio::spawn(async move {
                zone.update_status(Some(fragment(json!({ "volume": 10 }))))
                    .await
            })
        };
        // lands while the first merge is still fetching
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        let second = zone
            .update_status(Some(fragment(json!({ "volume": 20 }))))
            .await;

        assert_eq!(first.await.unwrap(), MergeOutcome::Changed);
        assert_eq!(second, MergeOutcome::Changed);
        assert_eq!(
            zone.status().await.map(Value::Object),
            Some(json!({ "power": "on", "volume": 20 }))
        );
        assert_eq!(mock.call_count(Endpoint::GetStatus), 1);
    }

    #[tokio::test]
    async fn volume_fraction_is_scaled_by_maximum() {
        let mock = Arc::new(MockTransport::new());
        let zone = zone_with(&mock);

        assert!(zone.set_volume_fraction(0.5).await.is_err());

        zone.update_status(Some(fragment(json!({ "volume": 0, "max_volume": 161 }))))
            .await;
        zone.set_volume_fraction(0.5).await.unwrap();

        let calls = mock.calls_to(Endpoint::SetVolume);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].query_value("volume"), Some("81"));
        assert_eq!(calls[0].zone.as_deref(), Some("main"));
    }
}
