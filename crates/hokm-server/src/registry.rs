//! Match registry: creates rooms and routes players to them by code.

use std::collections::HashMap;

use rand::Rng;

use hokm_engine::MatchConfig;
use hokm_protocol::RoomCode;
use hokm_session::{ConnectionRegistry, Store};

use crate::broadcast::Broadcaster;
use crate::room::{spawn_room, RoomHandle};

/// Tracks every live room, keyed by its 4-digit code.
///
/// Held behind a mutex in the server state; the registry itself is
/// plain — room actors do their own work on their own tasks, so the
/// lock is only held for map operations. Rooms whose actor has stopped
/// (shut down, or the match completed) are pruned on lookup and on the
/// next room creation, so the map does not grow without bound.
pub struct MatchRegistry<S: Store> {
    rooms: HashMap<RoomCode, RoomHandle>,
    connections: ConnectionRegistry,
    store: S,
    config: MatchConfig,
}

impl<S: Store> MatchRegistry<S> {
    pub fn new(connections: ConnectionRegistry, store: S) -> Self {
        Self::with_config(connections, store, MatchConfig::default())
    }

    /// A registry whose rooms play to a non-default threshold.
    pub fn with_config(
        connections: ConnectionRegistry,
        store: S,
        config: MatchConfig,
    ) -> Self {
        Self {
            rooms: HashMap::new(),
            connections,
            store,
            config,
        }
    }

    /// Spawns a new room under a fresh code and returns its handle.
    pub fn create_room(&mut self) -> RoomHandle {
        self.rooms.retain(|_, handle| !handle.is_closed());

        let room_code = self.unused_code();
        let broadcaster = Broadcaster::new(
            room_code.clone(),
            self.connections.clone(),
            self.store.clone(),
        );
        let handle =
            spawn_room(room_code.clone(), broadcaster, self.config);
        self.rooms.insert(room_code.clone(), handle.clone());

        tracing::info!(%room_code, rooms = self.rooms.len(), "room created");
        handle
    }

    /// Looks up a room by code. A room whose actor has stopped reads as
    /// absent and is dropped from the map.
    pub fn get(&mut self, room_code: &RoomCode) -> Option<RoomHandle> {
        match self.rooms.get(room_code) {
            Some(handle) if handle.is_closed() => {
                self.rooms.remove(room_code);
                tracing::info!(%room_code, "stopped room reclaimed");
                None
            }
            Some(handle) => Some(handle.clone()),
            None => None,
        }
    }

    /// Removes a room from the registry. The caller is responsible for
    /// telling the actor to shut down.
    pub fn remove(&mut self, room_code: &RoomCode) -> Option<RoomHandle> {
        let handle = self.rooms.remove(room_code);
        if handle.is_some() {
            tracing::info!(%room_code, rooms = self.rooms.len(), "room removed");
        }
        handle
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Draws 4-digit codes until one is free. With a 10k code space and
    /// room counts in the dozens, this terminates almost immediately.
    fn unused_code(&self) -> RoomCode {
        let mut rng = rand::rng();
        loop {
            let code =
                RoomCode::new(format!("{:04}", rng.random_range(0..10_000)));
            if !self.rooms.contains_key(&code) {
                return code;
            }
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
