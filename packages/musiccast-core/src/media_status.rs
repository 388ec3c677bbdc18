//! Now-playing snapshot with jitter-tolerant equality.
//!
//! A [`MediaStatus`] is built from one `getPlayInfo` response and never
//! mutated; the next fetch supersedes it wholesale. Two snapshots taken
//! during continuous playback compare equal as long as the elapsed wall-clock
//! time explains the change in play position, so plain playback progress does
//! not wake the host.

use std::time::{Duration, Instant};

use serde_json::Value;

use crate::api::types::{PlayInfo, PlaybackState};
use crate::error::MusicCastResult;
use crate::protocol_constants::MEDIA_DRIFT_TOLERANCE_SECS;

/// Immutable now-playing snapshot of a device's network/USB source.
#[derive(Debug, Clone)]
pub struct MediaStatus {
    host: String,
    input: String,
    playback: PlaybackState,
    artist: String,
    album: String,
    track: String,
    total_time: i64,
    play_time: i64,
    albumart_url: String,
    captured_at: Instant,
}

impl MediaStatus {
    /// Builds a snapshot captured now.
    #[must_use]
    pub fn new(info: PlayInfo, host: impl Into<String>) -> Self {
        Self::captured_at(info, host, Instant::now())
    }

    /// Builds a snapshot with an explicit capture instant.
    #[must_use]
    pub fn captured_at(info: PlayInfo, host: impl Into<String>, at: Instant) -> Self {
        Self {
            host: host.into(),
            playback: PlaybackState::from_device(&info.playback),
            input: info.input,
            artist: info.artist,
            album: info.album,
            track: info.track,
            total_time: info.total_time,
            play_time: info.play_time,
            albumart_url: info.albumart_url,
            captured_at: at,
        }
    }

    /// Hydrates a snapshot from a raw play-info object.
    ///
    /// Only recognized fields are read; anything else is ignored.
    pub fn from_json(value: Value, host: impl Into<String>) -> MusicCastResult<Self> {
        let info: PlayInfo = serde_json::from_value(value)?;
        Ok(Self::new(info, host))
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn album(&self) -> &str {
        &self.album
    }

    /// Track title. Doubles as the media title.
    pub fn track(&self) -> &str {
        &self.track
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn playback(&self) -> PlaybackState {
        self.playback
    }

    /// Track duration.
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.total_time.max(0) as u64)
    }

    /// Elapsed play position.
    pub fn position(&self) -> Duration {
        Duration::from_secs(self.play_time.max(0) as u64)
    }

    pub fn captured(&self) -> Instant {
        self.captured_at
    }

    /// Absolute album-art URL, if the device reported one.
    #[must_use]
    pub fn image_url(&self) -> Option<String> {
        if self.albumart_url.is_empty() {
            return None;
        }
        Some(format!("http://{}{}", self.host, self.albumart_url))
    }

    /// Returns true if every field other than position and capture time matches.
    fn same_content(&self, other: &MediaStatus) -> bool {
        self.host == other.host
            && self.input == other.input
            && self.playback == other.playback
            && self.artist == other.artist
            && self.album == other.album
            && self.track == other.track
            && self.total_time == other.total_time
            && self.albumart_url == other.albumart_url
    }

    /// Returns the mismatch between wall-clock and playback progress, in seconds.
    fn drift_secs(&self, later: &MediaStatus) -> f64 {
        let wall = signed_secs_between(self.captured_at, later.captured_at);
        let playback = (later.play_time - self.play_time) as f64;
        (wall - playback).abs()
    }
}

/// Fuzzy snapshot equality.
///
/// False if either side is absent. Otherwise true iff all non-position fields
/// match and the position delta is within the drift tolerance of the
/// wall-clock delta between captures.
#[must_use]
pub fn media_status_equals(a: Option<&MediaStatus>, b: Option<&MediaStatus>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => {
            a.same_content(b) && a.drift_secs(b) <= MEDIA_DRIFT_TOLERANCE_SECS
        }
        _ => false,
    }
}

impl PartialEq for MediaStatus {
    fn eq(&self, other: &Self) -> bool {
        media_status_equals(Some(self), Some(other))
    }
}

/// `to - from` in seconds, negative when `to` precedes `from`.
fn signed_secs_between(from: Instant, to: Instant) -> f64 {
    match to.checked_duration_since(from) {
        Some(forward) => forward.as_secs_f64(),
        None => -from.duration_since(to).as_secs_f64(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn info(play_time: i64) -> PlayInfo {
        PlayInfo {
            input: "spotify".to_string(),
            playback: "play".to_string(),
            artist: "Boards of Canada".to_string(),
            album: "Geogaddi".to_string(),
            track: "Music Is Math".to_string(),
            total_time: 321,
            play_time,
            albumart_url: "/YamahaRemoteControl/AlbumART/AlbumART1.jpg".to_string(),
            ..Default::default()
        }
    }

    fn snapshot(play_time: i64, at: Instant) -> MediaStatus {
        MediaStatus::captured_at(info(play_time), "192.168.1.20", at)
    }

    #[test]
    fn absent_snapshots_are_never_equal() {
        let a = snapshot(10, Instant::now());
        assert!(!media_status_equals(None, None));
        assert!(!media_status_equals(Some(&a), None));
        assert!(!media_status_equals(None, Some(&a)));
    }

    #[test]
    fn reflexive() {
        let a = snapshot(42, Instant::now());
        assert!(media_status_equals(Some(&a), Some(&a)));
    }

    #[test]
    fn continued_playback_is_equal_both_ways() {
        let t0 = Instant::now();
        let a = snapshot(100, t0);
        let b = snapshot(130, t0 + Duration::from_secs(30));
        assert!(media_status_equals(Some(&a), Some(&b)));
        assert!(media_status_equals(Some(&b), Some(&a)));
    }

    #[test]
    fn drift_within_ten_seconds_is_equal() {
        let t0 = Instant::now();
        let a = snapshot(100, t0);
        for delta in [-10, -5, 0, 5, 10] {
            let b = snapshot(100 + delta, t0);
            assert!(media_status_equals(Some(&a), Some(&b)), "delta {delta}");
            assert!(media_status_equals(Some(&b), Some(&a)), "delta {delta}");
        }
    }

    #[test]
    fn drift_of_eleven_seconds_is_not_equal() {
        let t0 = Instant::now();
        let a = snapshot(100, t0);
        let b = snapshot(111, t0);
        assert!(!media_status_equals(Some(&a), Some(&b)));
        assert!(!media_status_equals(Some(&b), Some(&a)));

        // paused for 20 s while the clock moved on
        let c = snapshot(100, t0 + Duration::from_secs(20));
        assert!(!media_status_equals(Some(&a), Some(&c)));
    }

    #[test]
    fn different_track_is_not_equal() {
        let t0 = Instant::now();
        let a = snapshot(100, t0);
        let mut other = info(100);
        other.track = "Dawn Chorus".to_string();
        let b = MediaStatus::captured_at(other, "192.168.1.20", t0);
        assert!(!media_status_equals(Some(&a), Some(&b)));
    }

    #[test]
    fn hydration_ignores_unknown_fields() {
        let status = MediaStatus::from_json(
            json!({
                "response_code": 0,
                "artist": "Autechre",
                "play_time": 12,
                "total_time": 300,
                "playback": "pause",
                "unexpected": { "nested": true }
            }),
            "10.0.0.1",
        )
        .unwrap();

        assert_eq!(status.artist(), "Autechre");
        assert_eq!(status.album(), "");
        assert_eq!(status.position(), Duration::from_secs(12));
        assert_eq!(status.duration(), Duration::from_secs(300));
        assert_eq!(status.playback(), PlaybackState::Paused);
        assert_eq!(status.image_url(), None);
    }

    #[test]
    fn image_url_is_absolute() {
        let status = snapshot(0, Instant::now());
        assert_eq!(
            status.image_url().as_deref(),
            Some("http://192.168.1.20/YamahaRemoteControl/AlbumART/AlbumART1.jpg")
        );
    }
}
