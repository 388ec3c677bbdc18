//! Recurring keepalive poll.
//!
//! One task per device: sleep the interval, poll, repeat. The task re-arms
//! after every poll, failed ones included, and exits only on cancellation.
//! The poll renews the device's UDP push subscription, which lapses after
//! about ten minutes without an `X-AppPort` request.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Something the keepalive task polls.
#[async_trait]
pub trait Pollable: Send + Sync {
    /// Name used in logs.
    fn label(&self) -> &str;

    /// Runs one poll cycle. Failures are handled (and logged) inside.
    async fn poll(&self);
}

/// Polls `target` every `interval` until cancelled.
pub async fn run_keepalive(
    target: Arc<dyn Pollable>,
    interval: Duration,
    cancel: CancellationToken,
) {
    log::debug!(
        "[Keepalive] {}: polling every {:?}",
        target.label(),
        interval
    );
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
        log::debug!("[Keepalive] {}: poll", target.label());
        target.poll().await;
    }
    log::debug!("[Keepalive] {}: stopped", target.label());
}
