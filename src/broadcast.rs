//! Per-room connection registry and fanout.
//!
//! The registry maps room id → live connections, each represented by an
//! unbounded channel sender; the WebSocket layer owns the receiving half
//! and forwards frames onto the socket. Joins, leaves, and broadcasts all
//! happen concurrently, so the map lives behind a `tokio::sync::RwLock`
//! and is constructed explicitly — there is no process-wide singleton.
//!
//! Delivery contract: a broadcast reaches every connection registered to
//! that room at send time and no connection in any other room. A failed
//! send (receiver dropped) evicts that one connection without affecting
//! the rest of the fanout.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::RwLock;

/// Opaque handle identifying one live connection within its room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

#[derive(Default)]
pub struct RoomBroadcaster {
    rooms: RwLock<HashMap<i64, HashMap<ConnectionId, UnboundedSender<String>>>>,
    next_id: AtomicU64,
}

impl RoomBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection with a room. The returned receiver yields
    /// every frame broadcast to that room until `disconnect` (or a failed
    /// send) removes the connection.
    pub async fn connect(&self, room_id: i64) -> (ConnectionId, UnboundedReceiver<String>) {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = unbounded_channel();

        let mut rooms = self.rooms.write().await;
        rooms.entry(room_id).or_default().insert(id, tx);

        (id, rx)
    }

    /// Remove a connection. Idempotent; empty rooms are dropped from the map.
    pub async fn disconnect(&self, room_id: i64, id: ConnectionId) {
        let mut rooms = self.rooms.write().await;
        if let Some(connections) = rooms.get_mut(&room_id) {
            connections.remove(&id);
            if connections.is_empty() {
                rooms.remove(&room_id);
            }
        }
    }

    /// Deliver `frame` to every current connection of `room_id`.
    ///
    /// Connections whose receiver is gone are evicted; their failure never
    /// blocks or fails delivery to the others.
    pub async fn broadcast(&self, room_id: i64, frame: &str) {
        let targets: Vec<(ConnectionId, UnboundedSender<String>)> = {
            let rooms = self.rooms.read().await;
            match rooms.get(&room_id) {
                Some(connections) => connections
                    .iter()
                    .map(|(id, tx)| (*id, tx.clone()))
                    .collect(),
                None => return,
            }
        };

        let mut dead = Vec::new();
        for (id, tx) in targets {
            if tx.send(frame.to_string()).is_err() {
                dead.push(id);
            }
        }

        if !dead.is_empty() {
            tracing::debug!(room_id, evicted = dead.len(), "pruning dead connections");
            let mut rooms = self.rooms.write().await;
            if let Some(connections) = rooms.get_mut(&room_id) {
                for id in dead {
                    connections.remove(&id);
                }
                if connections.is_empty() {
                    rooms.remove(&room_id);
                }
            }
        }
    }

    /// Number of live connections in a room.
    pub async fn room_size(&self, room_id: i64) -> usize {
        self.rooms
            .read()
            .await
            .get(&room_id)
            .map_or(0, HashMap::len)
    }
}
