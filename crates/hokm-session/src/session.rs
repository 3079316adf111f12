//! Session types: the durable record of a player's identity.
//!
//! A session is what survives a dropped socket. It records who the
//! player is, which room they belong to, and when they were last heard
//! from. The live socket itself is tracked separately, in the
//! [`ConnectionRegistry`](crate::ConnectionRegistry).

use serde::{Deserialize, Serialize};

use hokm_engine::PlayerId;
use hokm_protocol::RoomCode;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Timeouts governing session lifetime and reconnection.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Store TTL for a session record, in seconds. A session untouched
    /// for this long disappears outright. Default: 1 hour.
    pub ttl_secs: u64,

    /// Heartbeat staleness threshold, in seconds. Reconnections are
    /// classified against this: within one threshold is a fresh resume,
    /// within two is a recovery, older is refused and the session
    /// deleted. Default: 30 seconds.
    pub heartbeat_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            heartbeat_timeout_secs: 30,
        }
    }
}

impl SessionConfig {
    /// The outer reconnection bound: twice the heartbeat timeout.
    pub fn recovery_window_secs(&self) -> u64 {
        self.heartbeat_timeout_secs * 2
    }
}

// ---------------------------------------------------------------------------
// SessionRecord
// ---------------------------------------------------------------------------

/// The persisted form of one player's session.
///
/// Serialized as JSON into the store under [`SessionRecord::key`]. The
/// heartbeat is a unix-epoch timestamp rather than a process-local
/// instant so records stay meaningful across restarts of a persistent
/// backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub player_id: PlayerId,
    pub room_code: RoomCode,
    pub username: String,
    /// Whether a live socket currently claims this identity.
    pub connected: bool,
    /// Unix milliseconds of the last heartbeat or (re)connection.
    pub last_heartbeat_ms: u64,
}

impl SessionRecord {
    /// The store key for a player's session.
    pub fn key(player_id: &PlayerId) -> String {
        format!("session:{player_id}")
    }

    /// Milliseconds elapsed since the last heartbeat, saturating at
    /// zero if clocks disagree.
    pub fn heartbeat_age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_heartbeat_ms)
    }
}

// ---------------------------------------------------------------------------
// SessionFreshness
// ---------------------------------------------------------------------------

/// How stale a session was at the moment of a successful reconnection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionFreshness {
    /// The last heartbeat is within one timeout: the client barely
    /// missed a beat.
    Fresh,
    /// Between one and two timeouts: the session lapsed but falls
    /// inside the recovery window.
    Recovered,
}
