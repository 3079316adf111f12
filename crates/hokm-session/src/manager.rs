//! The session manager: the write path for every session record.
//!
//! All session mutations go through here so the store only ever sees
//! well-formed records with their TTLs refreshed consistently. The
//! manager holds no state of its own — clone it freely; every clone
//! shares the same backing store.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use hokm_engine::PlayerId;
use hokm_protocol::RoomCode;

use crate::error::SessionError;
use crate::session::{SessionConfig, SessionFreshness, SessionRecord};
use crate::store::Store;

/// Manages session records in a [`Store`].
#[derive(Clone)]
pub struct SessionManager<S: Store> {
    store: S,
    config: SessionConfig,
}

impl<S: Store> SessionManager<S> {
    pub fn new(store: S, config: SessionConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> SessionConfig {
        self.config
    }

    /// Creates a session for a newly joined player.
    ///
    /// # Errors
    /// Returns [`SessionError::AlreadyConnected`] if a live connection
    /// already claims this identity. A lingering disconnected record is
    /// silently replaced.
    pub async fn create(
        &self,
        player_id: PlayerId,
        room_code: RoomCode,
        username: String,
    ) -> Result<SessionRecord, SessionError> {
        if let Some(existing) = self.get(&player_id).await? {
            if existing.connected {
                return Err(SessionError::AlreadyConnected(player_id));
            }
        }

        let record = SessionRecord {
            player_id: player_id.clone(),
            room_code,
            username,
            connected: true,
            last_heartbeat_ms: now_ms(),
        };
        self.save(&record).await?;

        tracing::info!(%player_id, "session created");
        Ok(record)
    }

    /// Refreshes the heartbeat timestamp and the record's TTL.
    pub async fn heartbeat(
        &self,
        player_id: &PlayerId,
    ) -> Result<(), SessionError> {
        let mut record = self.require(player_id).await?;
        record.last_heartbeat_ms = now_ms();
        self.save(&record).await
    }

    /// Records that the player's socket dropped. The heartbeat is
    /// stamped too, so the reconnection windows measure from the moment
    /// of disconnection.
    pub async fn mark_disconnected(
        &self,
        player_id: &PlayerId,
    ) -> Result<(), SessionError> {
        let mut record = self.require(player_id).await?;
        record.connected = false;
        record.last_heartbeat_ms = now_ms();
        self.save(&record).await?;

        tracing::info!(%player_id, "session marked disconnected");
        Ok(())
    }

    /// Validates a reconnection attempt and, on success, reclaims the
    /// session for the new socket.
    ///
    /// # Errors
    /// - [`SessionError::NotFound`] — no record, or the room code
    ///   doesn't match the one on record
    /// - [`SessionError::AlreadyConnected`] — another socket holds it
    /// - [`SessionError::SessionExpired`] — past the recovery window;
    ///   the record is deleted before returning
    pub async fn validate_reconnect(
        &self,
        player_id: &PlayerId,
        room_code: &RoomCode,
    ) -> Result<(SessionRecord, SessionFreshness), SessionError> {
        self.validate_reconnect_at(player_id, room_code, now_ms())
            .await
    }

    /// [`validate_reconnect`](Self::validate_reconnect) against an
    /// explicit clock, so the window boundaries are testable without
    /// sleeping.
    pub async fn validate_reconnect_at(
        &self,
        player_id: &PlayerId,
        room_code: &RoomCode,
        now_ms: u64,
    ) -> Result<(SessionRecord, SessionFreshness), SessionError> {
        let mut record = self.require(player_id).await?;

        if record.room_code != *room_code {
            return Err(SessionError::NotFound(player_id.clone()));
        }
        if record.connected {
            return Err(SessionError::AlreadyConnected(player_id.clone()));
        }

        let age_ms = record.heartbeat_age_ms(now_ms);
        let timeout_ms = self.config.heartbeat_timeout_secs * 1000;
        let freshness = if age_ms <= timeout_ms {
            SessionFreshness::Fresh
        } else if age_ms <= timeout_ms * 2 {
            SessionFreshness::Recovered
        } else {
            self.delete(player_id).await?;
            tracing::info!(
                %player_id,
                age_ms,
                "reconnect refused, session past recovery window"
            );
            return Err(SessionError::SessionExpired(player_id.clone()));
        };

        record.connected = true;
        record.last_heartbeat_ms = now_ms;
        self.save(&record).await?;

        tracing::info!(%player_id, ?freshness, "session reclaimed");
        Ok((record, freshness))
    }

    /// Looks up a session. Returns `None` for absent or expired keys.
    pub async fn get(
        &self,
        player_id: &PlayerId,
    ) -> Result<Option<SessionRecord>, SessionError> {
        let key = SessionRecord::key(player_id);
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(_) => {
                // An unparseable record is useless; drop it rather than
                // poisoning every later lookup.
                self.store.delete(&key).await?;
                Err(SessionError::Corrupt(player_id.clone()))
            }
        }
    }

    /// Removes a session outright.
    pub async fn delete(
        &self,
        player_id: &PlayerId,
    ) -> Result<(), SessionError> {
        self.store
            .delete(&SessionRecord::key(player_id))
            .await?;
        Ok(())
    }

    async fn require(
        &self,
        player_id: &PlayerId,
    ) -> Result<SessionRecord, SessionError> {
        self.get(player_id)
            .await?
            .ok_or_else(|| SessionError::NotFound(player_id.clone()))
    }

    async fn save(
        &self,
        record: &SessionRecord,
    ) -> Result<(), SessionError> {
        let raw = serde_json::to_string(record)
            .map_err(|_| SessionError::Corrupt(record.player_id.clone()))?;
        self.store
            .put(
                &SessionRecord::key(&record.player_id),
                raw,
                Some(Duration::from_secs(self.config.ttl_secs)),
            )
            .await?;
        Ok(())
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

// =========================================================================
// Tests
// =========================================================================
