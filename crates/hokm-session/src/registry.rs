//! The connection registry: who has a live socket right now.
//!
//! Deliberately dumb: a map from player to the outbound channel of
//! their current socket. Durable identity lives in the session store;
//! this is only the delivery table, rebuilt entry by entry as sockets
//! come and go.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc::UnboundedSender};

use hokm_engine::PlayerId;
use hokm_protocol::ServerMessage;

/// Maps connected players to their outbound message channels.
///
/// Cloning shares the same table. Senders are unbounded because frames
/// are small and the writer task drains them immediately; a slow client
/// is disconnected by the transport layer, not throttled here.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<Mutex<HashMap<PlayerId, UnboundedSender<ServerMessage>>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a player's outbound channel, replacing any previous
    /// one. Returns `true` if an old channel was replaced.
    pub async fn register(
        &self,
        player_id: PlayerId,
        sender: UnboundedSender<ServerMessage>,
    ) -> bool {
        self.connections
            .lock()
            .await
            .insert(player_id, sender)
            .is_some()
    }

    /// Drops a player's channel. Returns `true` if one was present.
    pub async fn unregister(&self, player_id: &PlayerId) -> bool {
        self.connections.lock().await.remove(player_id).is_some()
    }

    /// Sends a message to one player. Returns `false` if the player has
    /// no live connection or their channel has closed — never an error;
    /// absent recipients are normal during disconnection windows.
    pub async fn send(
        &self,
        player_id: &PlayerId,
        message: ServerMessage,
    ) -> bool {
        match self.connections.lock().await.get(player_id) {
            Some(sender) => sender.send(message).is_ok(),
            None => false,
        }
    }

    /// Whether the player currently has a live channel.
    pub async fn is_connected(&self, player_id: &PlayerId) -> bool {
        self.connections.lock().await.contains_key(player_id)
    }

    /// How many of the given players currently have live channels.
    pub async fn connected_count(&self, players: &[PlayerId]) -> usize {
        let connections = self.connections.lock().await;
        players
            .iter()
            .filter(|p| connections.contains_key(*p))
            .count()
    }
}

// =========================================================================
// Tests
// =========================================================================
