//! Identity types owned by the protocol layer.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A short human-typable room code.
///
/// Players share this out of band ("join room 4217"), so it stays a
/// 4-digit string rather than an opaque id. `#[serde(transparent)]`
/// keeps the wire form a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(pub String);

impl RoomCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
