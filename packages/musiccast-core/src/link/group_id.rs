//! Distribution group identity type

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Identifier of a distribution group.
///
/// Rendered on the wire as 32 lowercase hex characters. The all-zero value
/// is reserved and means "no group".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(u128);

impl GroupId {
    /// The reserved "no group" identifier.
    pub const NULL: GroupId = GroupId(0);

    /// Generates a fresh random identifier.
    ///
    /// Backed by a v4 UUID, whose version bits are never all zero, so the
    /// result can never collide with [`GroupId::NULL`].
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().as_u128())
    }

    /// Parses a wire identifier. An empty string is the null group.
    ///
    /// Upper-case hex is accepted and normalized.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Some(Self::NULL);
        }
        if s.len() != 32 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        u128::from_str_radix(s, 16).ok().map(Self)
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl Serialize for GroupId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for GroupId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        GroupId::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid group id: {s}")))
    }
}
