//! Decoding of UDP push messages.
//!
//! A push message is a JSON object with a top-level `device_id`, optional
//! zone objects (`main`, `zone2`, ...), and optional `netusb` / `dist`
//! category objects carrying "updated" flags.

use serde_json::Value;

use crate::error::{MusicCastError, MusicCastResult};
use crate::protocol_constants::KNOWN_ZONE_IDS;
use crate::zone::ZoneStatus;

/// One decoded push message.
#[derive(Debug, Clone, PartialEq)]
pub struct PushEvent {
    pub device_id: String,
    /// Zone fragments in zone order (`main` first).
    pub zones: Vec<(String, ZoneStatus)>,
    /// `netusb.play_info_updated` was signalled.
    pub play_info_updated: bool,
    /// `dist.dist_info_updated` was signalled.
    pub dist_info_updated: bool,
}

impl PushEvent {
    /// Decodes a raw datagram.
    ///
    /// Fails on invalid JSON, a non-object payload, or a missing `device_id`.
    pub fn decode(raw: &[u8]) -> MusicCastResult<Self> {
        let value: Value = serde_json::from_slice(raw)?;
        let Value::Object(mut root) = value else {
            return Err(MusicCastError::Decode("push message is not an object".into()));
        };

        let device_id = match root.remove("device_id") {
            Some(Value::String(id)) if !id.is_empty() => id,
            _ => return Err(MusicCastError::Decode("push message has no device_id".into())),
        };

        let zones = KNOWN_ZONE_IDS
            .iter()
            .filter_map(|zone| match root.remove(*zone) {
                Some(Value::Object(fragment)) => Some((zone.to_string(), fragment)),
                Some(other) => {
                    log::debug!("[Dispatcher] Ignoring non-object zone {}: {}", zone, other);
                    None
                }
                None => None,
            })
            .collect();

        Ok(Self {
            device_id,
            zones,
            play_info_updated: flag(root.get("netusb"), "play_info_updated"),
            dist_info_updated: flag(root.get("dist"), "dist_info_updated"),
        })
    }

    /// Returns true if the message carries nothing to act on.
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty() && !self.play_info_updated && !self.dist_info_updated
    }
}

/// A flag counts as set when present and not `false`.
fn flag(category: Option<&Value>, key: &str) -> bool {
    category
        .and_then(|c| c.get(key))
        .is_some_and(|v| *v != Value::Bool(false))
}
