//! Per-room broadcast groups.
//!
//! Each room with at least one connected session owns a
//! `tokio::sync::broadcast` channel. Channels are created on first subscribe
//! and removed when the last subscription drops. Slow receivers that fall
//! behind skip events (`RecvError::Lagged`).

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{broadcast, Mutex};

use crate::error::RoomError;

use super::events::ServerEvent;

struct RoomChannel {
    sender: broadcast::Sender<Arc<ServerEvent>>,
    /// Held from a write's commit until its event is sent, so subscribers
    /// observe events in commit order.
    commit_order: Arc<Mutex<()>>,
}

/// Registry of room broadcast groups. Shared through `AppState`.
pub struct RoomBroadcast {
    rooms: DashMap<String, RoomChannel>,
    capacity: usize,
}

/// A session's membership in one room's group. Dropping it unsubscribes.
pub struct RoomSubscription {
    room_id: String,
    receiver: broadcast::Receiver<Arc<ServerEvent>>,
    hub: Arc<RoomBroadcast>,
}

impl RoomBroadcast {
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            capacity,
        }
    }

    pub fn subscribe(self: &Arc<Self>, room_id: &str) -> RoomSubscription {
        let receiver = self
            .rooms
            .entry(room_id.to_string())
            .or_insert_with(|| RoomChannel {
                sender: broadcast::channel(self.capacity).0,
                commit_order: Arc::new(Mutex::new(())),
            })
            .sender
            .subscribe();

        RoomSubscription {
            room_id: room_id.to_string(),
            receiver,
            hub: Arc::clone(self),
        }
    }

    /// Send an event to every current subscriber of `room_id`. Returns how
    /// many receivers it reached; zero when nobody is connected.
    pub fn publish(&self, room_id: &str, event: ServerEvent) -> usize {
        match self.rooms.get(room_id) {
            Some(channel) => channel.sender.send(Arc::new(event)).unwrap_or(0),
            None => 0,
        }
    }

    /// Run a write and publish the event it produced, serialized against
    /// other writes to the same room so publish order matches commit order.
    ///
    /// Nothing is published if the write fails.
    pub async fn commit_then_publish<T, F>(&self, room_id: &str, commit: F) -> Result<T, RoomError>
    where
        F: Future<Output = Result<(T, ServerEvent), RoomError>>,
    {
        let order = self
            .rooms
            .get(room_id)
            .map(|channel| Arc::clone(&channel.commit_order));
        let _turn = match order {
            Some(lock) => Some(lock.lock_owned().await),
            None => None,
        };

        let (value, event) = commit.await?;
        let delivered = self.publish(room_id, event);
        tracing::debug!(room_id, delivered, "room event published");
        Ok(value)
    }

    pub fn subscriber_count(&self, room_id: &str) -> usize {
        self.rooms
            .get(room_id)
            .map(|channel| channel.sender.receiver_count())
            .unwrap_or(0)
    }

    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }
}

impl RoomSubscription {
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub async fn recv(&mut self) -> Result<Arc<ServerEvent>, broadcast::error::RecvError> {
        self.receiver.recv().await
    }
}

impl Drop for RoomSubscription {
    fn drop(&mut self) {
        // Our own receiver is still alive here, so "only us" means a count of 1.
        let removed = self
            .hub
            .rooms
            .remove_if(&self.room_id, |_, channel| channel.sender.receiver_count() <= 1);
        if removed.is_some() {
            tracing::debug!(room_id = %self.room_id, "room broadcast group closed");
        }
    }
}
