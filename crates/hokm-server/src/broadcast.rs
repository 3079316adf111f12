//! The state broadcaster: per-player delivery with snapshot persistence.
//!
//! Every player sees a different game — their own hand, everyone else's
//! card counts. The broadcaster owns that fan-out, and it persists each
//! player's redacted snapshot to the store *before* delivering it, so a
//! reconnecting client can always be brought current even if the room
//! has since moved on.

use std::time::Duration;

use hokm_engine::{MatchState, PlayerId, PlayerView};
use hokm_protocol::{RoomCode, ServerMessage};
use hokm_session::{ConnectionRegistry, Store};

/// How long a persisted snapshot stays retrievable.
const SNAPSHOT_TTL: Duration = Duration::from_secs(300);

/// Fans server messages out to a room's players and keeps their
/// reconnection snapshots current.
#[derive(Clone)]
pub struct Broadcaster<S: Store> {
    room_code: RoomCode,
    connections: ConnectionRegistry,
    store: S,
}

impl<S: Store> Broadcaster<S> {
    pub fn new(
        room_code: RoomCode,
        connections: ConnectionRegistry,
        store: S,
    ) -> Self {
        Self {
            room_code,
            connections,
            store,
        }
    }

    /// The store key for one player's snapshot in one room.
    pub fn snapshot_key(room_code: &RoomCode, player_id: &PlayerId) -> String {
        format!("state:{room_code}:{player_id}")
    }

    /// Sends to a single player. Undeliverable messages are dropped;
    /// the session layer deals with absent players.
    pub async fn send(&self, player_id: &PlayerId, message: ServerMessage) {
        self.connections.send(player_id, message).await;
    }

    /// Sends the same message to every listed player.
    pub async fn broadcast(
        &self,
        players: &[PlayerId],
        message: ServerMessage,
    ) {
        for player in players {
            self.connections.send(player, message.clone()).await;
        }
    }

    /// Sends to every listed player except one.
    pub async fn broadcast_except(
        &self,
        players: &[PlayerId],
        except: &PlayerId,
        message: ServerMessage,
    ) {
        for player in players.iter().filter(|p| *p != except) {
            self.connections.send(player, message.clone()).await;
        }
    }

    /// Projects and persists every player's redacted snapshot. Called
    /// after each state mutation; a store failure loses nothing but the
    /// snapshot, so it is logged and swallowed.
    pub async fn sync(&self, state: &MatchState) {
        for player in state.players() {
            let view = PlayerView::project(state, player);
            self.persist(player, &view).await;
        }
    }

    /// Persists and then delivers one player's full snapshot. Used to
    /// bring a reconnecting client current.
    pub async fn send_snapshot(
        &self,
        state: &MatchState,
        player_id: &PlayerId,
    ) {
        let view = PlayerView::project(state, player_id);
        self.persist(player_id, &view).await;
        self.send(player_id, ServerMessage::GameState { view }).await;
    }

    /// How many of the given players currently hold live connections.
    pub async fn connected_count(&self, players: &[PlayerId]) -> usize {
        self.connections.connected_count(players).await
    }

    async fn persist(&self, player_id: &PlayerId, view: &PlayerView) {
        let key = Self::snapshot_key(&self.room_code, player_id);
        let raw = match serde_json::to_string(view) {
            Ok(raw) => raw,
            Err(error) => {
                tracing::warn!(%player_id, %error, "snapshot serialize failed");
                return;
            }
        };
        if let Err(error) =
            self.store.put(&key, raw, Some(SNAPSHOT_TTL)).await
        {
            tracing::warn!(%player_id, %error, "snapshot persist failed");
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
