//! Live notification connection registry.
//!
//! Maps a user to every open SSE stream of theirs (phone and browser at
//! once is normal). Lives in one process; cross-process fan-out comes from
//! the Postgres listener feeding every instance's hub.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::notification::Notification;

pub type NotificationSender = mpsc::Sender<Notification>;

/// Notifications buffered per stream before a slow client is dropped. A
/// dropped client reconnects and catches up from the inbox.
pub const STREAM_BUFFER: usize = 64;

pub type ConnectionId = u64;

/// Thread-safe registry of live notification streams.
pub struct NotificationHub {
    connections: DashMap<Uuid, Vec<(ConnectionId, NotificationSender)>>,
    next_conn_id: AtomicU64,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            next_conn_id: AtomicU64::new(1),
        }
    }

    /// Register a stream for `user_id` and return its id.
    pub fn add_connection(&self, user_id: Uuid, tx: NotificationSender) -> ConnectionId {
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);

        self.connections
            .entry(user_id)
            .or_default()
            .push((conn_id, tx));

        tracing::debug!(%user_id, conn_id, "Notification stream opened");

        conn_id
    }

    /// Forget a stream. Empty user entries are dropped.
    pub fn remove_connection(&self, user_id: Uuid, conn_id: ConnectionId) {
        let now_empty = match self.connections.get_mut(&user_id) {
            Some(mut senders) => {
                senders.retain(|(id, _)| *id != conn_id);
                senders.is_empty()
            }
            None => false,
        };

        if now_empty {
            self.connections
                .remove_if(&user_id, |_, senders| senders.is_empty());
        }

        tracing::debug!(%user_id, conn_id, "Notification stream closed");
    }

    /// Push to every stream of the notification's owner.
    ///
    /// Returns how many streams accepted it. Streams whose receiver is gone
    /// or whose buffer is full are pruned on the way.
    pub fn send_to_user(&self, notification: &Notification) -> usize {
        let user_id = notification.user_id;
        let Some(mut senders) = self.connections.get_mut(&user_id) else {
            return 0;
        };

        senders.retain(|(conn_id, tx)| match tx.try_send(notification.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(%user_id, conn_id, "Notification stream lagging, dropping it");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
        let delivered = senders.len();
        let now_empty = senders.is_empty();
        drop(senders);

        if now_empty {
            self.connections
                .remove_if(&user_id, |_, senders| senders.is_empty());
        }

        delivered
    }

    /// (users with a stream, total streams)
    pub fn stats(&self) -> (usize, usize) {
        let users = self.connections.len();
        let streams = self
            .connections
            .iter()
            .map(|entry| entry.value().len())
            .sum();
        (users, streams)
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Removes its connection from the hub when dropped.
///
/// Owned by the SSE stream, so a client disconnect cleans up the registry.
pub struct ConnectionGuard {
    hub: std::sync::Arc<NotificationHub>,
    user_id: Uuid,
    conn_id: ConnectionId,
}

impl ConnectionGuard {
    pub fn new(hub: std::sync::Arc<NotificationHub>, user_id: Uuid, conn_id: ConnectionId) -> Self {
        Self {
            hub,
            user_id,
            conn_id,
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.hub.remove_connection(self.user_id, self.conn_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;

    fn notification_for(user_id: Uuid) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            user_id,
            kind: "commission".to_string(),
            title: "Commission credited".to_string(),
            body: "Rs 50.00".to_string(),
            is_read: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_delivers_to_every_stream_of_user() {
        let hub = NotificationHub::new();
        let user = Uuid::new_v4();
        let (tx1, mut rx1) = mpsc::channel(STREAM_BUFFER);
        let (tx2, mut rx2) = mpsc::channel(STREAM_BUFFER);
        hub.add_connection(user, tx1);
        hub.add_connection(user, tx2);

        let n = notification_for(user);
        assert_eq!(hub.send_to_user(&n), 2);

        assert_eq!(rx1.recv().await.unwrap(), n);
        assert_eq!(rx2.recv().await.unwrap(), n);
    }

    #[test]
    fn test_other_users_receive_nothing() {
        let hub = NotificationHub::new();
        let (tx, mut rx) = mpsc::channel(STREAM_BUFFER);
        hub.add_connection(Uuid::new_v4(), tx);

        assert_eq!(hub.send_to_user(&notification_for(Uuid::new_v4())), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_streams_are_pruned() {
        let hub = NotificationHub::new();
        let user = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        hub.add_connection(user, tx);
        drop(rx);

        assert_eq!(hub.send_to_user(&notification_for(user)), 0);
        assert_eq!(hub.stats(), (0, 0));
    }

    #[tokio::test]
    async fn test_full_streams_are_pruned() {
        let hub = NotificationHub::new();
        let user = Uuid::new_v4();
        let (tx, mut rx) = mpsc::channel(2);
        hub.add_connection(user, tx);

        let n = notification_for(user);
        assert_eq!(hub.send_to_user(&n), 1);
        assert_eq!(hub.send_to_user(&n), 1);
        assert_eq!(hub.send_to_user(&n), 0);
        assert_eq!(hub.stats(), (0, 0));

        // What was buffered still drains, then the stream ends.
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_guard_removes_connection_on_drop() {
        let hub = Arc::new(NotificationHub::new());
        let user = Uuid::new_v4();
        let (tx, _rx) = mpsc::channel(STREAM_BUFFER);
        let conn_id = hub.add_connection(user, tx);
        assert_eq!(hub.stats(), (1, 1));

        drop(ConnectionGuard::new(hub.clone(), user, conn_id));
        assert_eq!(hub.stats(), (0, 0));
    }
}
