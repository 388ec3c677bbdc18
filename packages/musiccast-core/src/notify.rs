//! Host notification abstraction.
//!
//! Zones depend on the [`HostNotifier`] trait rather than on a concrete host
//! model. The host re-reads whatever state it needs when notified.

use std::sync::Arc;

use thiserror::Error;

/// Failure reported by a host callback.
///
/// The zone stays dirty and retries on its next reconciliation cycle.
#[derive(Debug, Error)]
#[error("host notification failed: {0}")]
pub struct NotifyError(pub String);

impl NotifyError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Zero-argument trigger invoked when a zone's visible state changed.
///
/// # Example
///
/// ```ignore
/// struct Entity { dirty: AtomicBool }
///
/// impl HostNotifier for Entity {
///     fn notify(&self) -> Result<(), NotifyError> {
///         self.dirty.store(true, Ordering::SeqCst);
///         Ok(())
///     }
/// }
/// ```
pub trait HostNotifier: Send + Sync {
    fn notify(&self) -> Result<(), NotifyError>;
}

/// Logging notifier for debugging and headless use.
///
/// Always succeeds.
pub struct LoggingNotifier {
    label: String,
}

impl LoggingNotifier {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl HostNotifier for LoggingNotifier {
    fn notify(&self) -> Result<(), NotifyError> {
        tracing::debug!(label = %self.label, "zone_state_changed");
        Ok(())
    }
}

/// Adapts a closure into a [`HostNotifier`].
pub struct FnNotifier<F>(F);

impl<F> FnNotifier<F>
where
    F: Fn() -> Result<(), NotifyError> + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }

    /// Wraps the closure for sharing with zones.
    pub fn shared(f: F) -> Arc<dyn HostNotifier> {
        Arc::new(Self(f))
    }
}

impl<F> HostNotifier for FnNotifier<F>
where
    F: Fn() -> Result<(), NotifyError> + Send + Sync,
{
    fn notify(&self) -> Result<(), NotifyError> {
        (self.0)()
    }
}
