//! Fixed protocol constants that should NOT be changed.
//!
//! These values are defined by the Yamaha Extended Control API and the
//! MusicCast distribution protocol. Changing them would break compatibility
//! with device firmware.

// ─────────────────────────────────────────────────────────────────────────────
// HTTP API
// ─────────────────────────────────────────────────────────────────────────────

/// Path prefix shared by every Yamaha Extended Control endpoint.
pub const API_BASE_PATH: &str = "/YamahaExtendedControl/v1";

/// Default timeout for HTTP requests to a device (seconds).
///
/// 10 seconds is reasonable for LAN operations.
pub const HTTP_TIMEOUT_SECS: u64 = 10;

/// `response_code` value signalling success on every API response.
pub const RESPONSE_CODE_OK: i64 = 0;

/// Header naming the controlling application. Required for event registration.
pub const HEADER_APP_NAME: &str = "X-AppName";

/// Header carrying the UDP port the device should push events to.
pub const HEADER_APP_PORT: &str = "X-AppPort";

/// Application name sent in the `X-AppName` header.
pub const APP_NAME: &str = concat!("MusicCast/", env!("CARGO_PKG_VERSION"), "(musiccast-core)");

// ─────────────────────────────────────────────────────────────────────────────
// UDP Events
// ─────────────────────────────────────────────────────────────────────────────

/// Default UDP port for receiving pushed events.
pub const DEFAULT_UDP_PORT: u16 = 5005;

/// Receive buffer size for a single event datagram (bytes).
pub const MAX_DATAGRAM_SIZE: usize = 4096;

/// Default capacity of the raw event queue (datagrams).
pub const EVENT_QUEUE_CAPACITY: usize = 256;

/// Default keepalive polling interval (seconds).
///
/// Devices stop pushing events roughly 10 minutes after the last request
/// carrying `X-AppPort`, so this must stay below 600.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 480;

/// Zone identifiers a device may report at the top level of an event.
pub const KNOWN_ZONE_IDS: [&str; 4] = ["main", "zone2", "zone3", "zone4"];

/// Zone used when none is given.
pub const DEFAULT_ZONE_ID: &str = "main";

// ─────────────────────────────────────────────────────────────────────────────
// Media Status
// ─────────────────────────────────────────────────────────────────────────────

/// Tolerated drift between wall-clock and playback progress (seconds).
pub const MEDIA_DRIFT_TOLERANCE_SECS: f64 = 10.0;

// ─────────────────────────────────────────────────────────────────────────────
// Distribution
// ─────────────────────────────────────────────────────────────────────────────

/// Input a client must select to receive audio from a group master.
pub const LINK_INPUT: &str = "mc_link";

/// Default human-readable group name set on the master.
pub const DEFAULT_GROUP_NAME: &str = "musiccast-core";

/// `setServerInfo` action adding clients to a group.
pub const SERVER_ACTION_ADD: &str = "add";

/// `setServerInfo` action removing clients from a group.
pub const SERVER_ACTION_REMOVE: &str = "remove";
