//! Room registry
//!
//! Concurrent map from room id to the room's handle.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::room::RoomHandle;
use crate::config::ServerConfig;

#[derive(Debug, Clone, Default)]
pub struct RoomRegistry {
    rooms: Arc<RwLock<HashMap<String, RoomHandle>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a room configured by `config` and register it
    pub fn create_room(&self, config: &ServerConfig) -> RoomHandle {
        RoomHandle::spawn(
            config.room_capacity,
            config.idle_timeout(),
            Some(self.clone()),
        )
    }

    pub fn add(&self, room: RoomHandle) {
        debug!("{} added to registry", room);
        self.rooms.write().insert(room.id().to_string(), room);
    }

    pub fn get(&self, id: &str) -> Option<RoomHandle> {
        self.rooms.read().get(id).cloned()
    }

    pub fn remove(&self, id: &str) -> Option<RoomHandle> {
        let removed = self.rooms.write().remove(id);
        if removed.is_some() {
            debug!("{} removed from registry", id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.rooms.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.read().is_empty()
    }

    /// Ids of every registered room
    pub fn ids(&self) -> Vec<String> {
        self.rooms.read().keys().cloned().collect()
    }
}
