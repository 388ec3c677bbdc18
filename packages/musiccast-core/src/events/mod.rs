//! UDP event ingestion pipeline.
//!
//! Listener -> [`EventQueue`] -> dispatcher -> [`EventSink`]. One pipeline
//! runs per device; both tasks stop when the device's cancellation token
//! fires.

pub mod dispatcher;
pub mod listener;
pub mod message;
pub mod queue;

pub use dispatcher::{dispatch_message, run_dispatcher, DispatchOutcome, EventSink};
pub use listener::{bind_event_socket, run_listener};
pub use message::PushEvent;
pub use queue::{EventQueue, IngestSnapshot, IngestStats};
