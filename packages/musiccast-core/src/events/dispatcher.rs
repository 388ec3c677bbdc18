//! Dispatcher loop: decode, validate identity, route.
//!
//! Messages are handled one at a time in arrival order. Within one message
//! the categories are routed zones first, then now-playing, then
//! distribution. A bad message is counted and dropped; the loop never exits
//! because of one.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::message::PushEvent;
use super::queue::{EventQueue, IngestStats};
use crate::error::{MusicCastError, MusicCastResult};
use crate::zone::ZoneStatus;

/// Receiver of routed push events, implemented by the device coordinator.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Identifier messages must carry to be accepted.
    fn device_id(&self) -> &str;

    /// A zone object was pushed.
    async fn on_zone_update(&self, zone: &str, fragment: ZoneStatus);

    /// `netusb.play_info_updated` was signalled.
    async fn on_play_info_updated(&self);

    /// `dist.dist_info_updated` was signalled.
    async fn on_dist_info_updated(&self);
}

/// What happened to one raw message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Dispatched,
    Malformed,
    Foreign,
}

/// Decodes and routes one raw message.
pub async fn dispatch_message(
    sink: &dyn EventSink,
    raw: &[u8],
    stats: &IngestStats,
) -> DispatchOutcome {
    let event = match PushEvent::decode(raw) {
        Ok(event) => event,
        Err(e) => {
            stats.record_malformed();
            log::warn!(
                "[Dispatcher] Dropping malformed message ({}): {}",
                e,
                String::from_utf8_lossy(raw)
            );
            return DispatchOutcome::Malformed;
        }
    };

    if let Err(e) = check_identity(sink.device_id(), &event) {
        stats.record_foreign();
        log::debug!("[Dispatcher] Dropping message: {}", e);
        return DispatchOutcome::Foreign;
    }

    for (zone, fragment) in event.zones {
        sink.on_zone_update(&zone, fragment).await;
    }
    if event.play_info_updated {
        sink.on_play_info_updated().await;
    }
    if event.dist_info_updated {
        sink.on_dist_info_updated().await;
    }

    stats.record_dispatched();
    DispatchOutcome::Dispatched
}

/// Accepts only messages stamped with the listening device's id.
fn check_identity(expected: &str, event: &PushEvent) -> MusicCastResult<()> {
    if event.device_id == expected {
        return Ok(());
    }
    Err(MusicCastError::IdentityMismatch {
        expected: expected.to_string(),
        actual: event.device_id.clone(),
    })
}

/// Drains the queue until cancelled.
pub async fn run_dispatcher(
    queue: Arc<EventQueue>,
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
) {
    log::debug!("[Dispatcher] Started for device {}", sink.device_id());
    loop {
        let raw = tokio::select! {
            _ = cancel.cancelled() => break,
            raw = queue.pop() => raw,
        };
        dispatch_message(sink.as_ref(), &raw, queue.stats()).await;
    }
    log::debug!("[Dispatcher] Stopped for device {}", sink.device_id());
}
