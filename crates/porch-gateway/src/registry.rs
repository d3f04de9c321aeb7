use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};
use uuid::Uuid;

use porch_types::events::GatewayEvent;

pub type ConnectionId = Uuid;

/// A live connection's outbound queue.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    tx: mpsc::UnboundedSender<GatewayEvent>,
}

impl Connection {
    /// Queue an event. Fails only if the connection loop has already exited.
    pub fn send(&self, event: GatewayEvent) -> Result<(), GatewayEvent> {
        self.tx.send(event).map_err(|e| e.0)
    }
}

/// Tracks every open connection per user.
///
/// Both maps are sharded, so connects and disconnects for unrelated users
/// never wait on each other. Presence for a user is announced while that
/// user's entry is still locked, so subscribers see changes in the order
/// they happened.
#[derive(Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    /// user_id -> (conn_id -> outbound queue)
    by_user: DashMap<Uuid, HashMap<ConnectionId, mpsc::UnboundedSender<GatewayEvent>>>,

    /// conn_id -> user_id, so a connection can be dropped knowing only its id
    by_conn: DashMap<ConnectionId, Uuid>,

    /// Presence changes, fanned out to every connection loop
    presence_tx: broadcast::Sender<GatewayEvent>,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        let (presence_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(RegistryInner {
                by_user: DashMap::new(),
                by_conn: DashMap::new(),
                presence_tx,
            }),
        }
    }

    /// Presence updates for all users.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.presence_tx.subscribe()
    }

    /// Subscribe, then list who is online. Any change the snapshot misses
    /// is already queued on the receiver.
    pub fn watch_presence(&self) -> (Vec<Uuid>, broadcast::Receiver<GatewayEvent>) {
        let rx = self.subscribe();
        (self.online_users(), rx)
    }

    /// Add a connection for `user_id` and announce the user as online.
    ///
    /// Registering a known `conn_id` again replaces its previous mapping.
    pub fn register(
        &self,
        user_id: Uuid,
        conn_id: ConnectionId,
        tx: mpsc::UnboundedSender<GatewayEvent>,
    ) {
        if let Some(previous) = self.inner.by_conn.insert(conn_id, user_id) {
            if previous != user_id {
                self.detach(previous, conn_id);
            }
        }

        let count = {
            let mut conns = self.inner.by_user.entry(user_id).or_default();
            conns.insert(conn_id, tx);
            self.announce(user_id, true);
            conns.len()
        };
        info!("{} registered connection {} ({} open)", user_id, conn_id, count);
    }

    /// Drop a connection. The user goes offline only when this was their last one.
    pub fn unregister(&self, conn_id: ConnectionId) {
        let Some((_, user_id)) = self.inner.by_conn.remove(&conn_id) else {
            debug!("Unregister of unknown connection {}", conn_id);
            return;
        };
        self.detach(user_id, conn_id);
        info!("{} closed connection {}", user_id, conn_id);
    }

    /// Every open connection for `user_id`; empty when offline.
    pub fn connections_for(&self, user_id: Uuid) -> Vec<Connection> {
        self.inner
            .by_user
            .get(&user_id)
            .map(|conns| {
                conns
                    .iter()
                    .map(|(id, tx)| Connection {
                        id: *id,
                        tx: tx.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_online(&self, user_id: Uuid) -> bool {
        self.inner.by_user.contains_key(&user_id)
    }

    pub fn online_users(&self) -> Vec<Uuid> {
        self.inner.by_user.iter().map(|entry| *entry.key()).collect()
    }

    fn detach(&self, user_id: Uuid, conn_id: ConnectionId) {
        if let Entry::Occupied(mut entry) = self.inner.by_user.entry(user_id) {
            entry.get_mut().remove(&conn_id);
            if entry.get().is_empty() {
                self.announce(user_id, false);
                entry.remove();
            }
        }
    }

    fn announce(&self, user_id: Uuid, online: bool) {
        // No receivers just means nobody is connected to hear it
        let _ = self
            .inner
            .presence_tx
            .send(GatewayEvent::PresenceUpdate { user_id, online });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn presence(rx: &mut broadcast::Receiver<GatewayEvent>) -> Vec<(Uuid, bool)> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let GatewayEvent::PresenceUpdate { user_id, online } = event {
                out.push((user_id, online));
            }
        }
        out
    }

    #[test]
    fn offline_only_after_last_connection() {
        let registry = ConnectionRegistry::new();
        let mut rx = registry.subscribe();
        let user = Uuid::new_v4();
        let (phone, laptop) = (Uuid::new_v4(), Uuid::new_v4());

        registry.register(user, phone, mpsc::unbounded_channel().0);
        registry.register(user, laptop, mpsc::unbounded_channel().0);
        assert_eq!(registry.connections_for(user).len(), 2);

        registry.unregister(phone);
        assert!(registry.is_online(user));
        registry.unregister(laptop);
        assert!(!registry.is_online(user));

        assert_eq!(
            presence(&mut rx),
            vec![(user, true), (user, true), (user, false)]
        );
    }

    #[test]
    fn last_announcement_matches_final_state() {
        let registry = ConnectionRegistry::new();
        let mut rx = registry.subscribe();
        let user = Uuid::new_v4();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let conn = Uuid::new_v4();
                        registry.register(user, conn, mpsc::unbounded_channel().0);
                        registry.unregister(conn);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert!(!registry.is_online(user));
        assert_eq!(presence(&mut rx).last(), Some(&(user, false)));
    }

    #[test]
    fn watch_presence_misses_nothing_after_snapshot() {
        let registry = ConnectionRegistry::new();
        let (early, late) = (Uuid::new_v4(), Uuid::new_v4());
        let early_conn = Uuid::new_v4();
        registry.register(early, early_conn, mpsc::unbounded_channel().0);

        let (online, mut rx) = registry.watch_presence();
        assert_eq!(online, vec![early]);

        registry.register(late, Uuid::new_v4(), mpsc::unbounded_channel().0);
        registry.unregister(early_conn);
        assert_eq!(presence(&mut rx), vec![(late, true), (early, false)]);
    }

    #[test]
    fn unknown_unregister_is_noop() {
        let registry = ConnectionRegistry::new();
        let mut rx = registry.subscribe();
        registry.unregister(Uuid::new_v4());
        assert!(presence(&mut rx).is_empty());
        assert!(registry.online_users().is_empty());
    }

    #[test]
    fn re_register_replaces_mapping() {
        let registry = ConnectionRegistry::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let conn = Uuid::new_v4();
        let (old_tx, mut old_rx) = mpsc::unbounded_channel();
        let (new_tx, mut new_rx) = mpsc::unbounded_channel();

        registry.register(a, conn, old_tx);
        registry.register(a, conn, new_tx);
        let conns = registry.connections_for(a);
        assert_eq!(conns.len(), 1);
        conns[0].send(GatewayEvent::Ready { user_id: a }).unwrap();
        assert!(new_rx.try_recv().is_ok());
        assert!(old_rx.try_recv().is_err());

        // Same connection id now claimed by another user
        registry.register(b, conn, mpsc::unbounded_channel().0);
        assert!(!registry.is_online(a));
        assert_eq!(registry.online_users(), vec![b]);

        registry.unregister(conn);
        assert!(registry.online_users().is_empty());
    }

    #[test]
    fn send_to_closed_connection_fails_quietly() {
        let registry = ConnectionRegistry::new();
        let user = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        registry.register(user, Uuid::new_v4(), tx);
        drop(rx);

        let conns = registry.connections_for(user);
        assert!(conns[0].send(GatewayEvent::Ready { user_id: user }).is_err());
    }
}
