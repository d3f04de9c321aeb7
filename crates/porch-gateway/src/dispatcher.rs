use std::sync::Arc;

use tracing::{debug, trace, warn};
use uuid::Uuid;

use porch_social::events::{DomainEvent, EventSink};
use porch_social::lock::StripedLock;
use porch_social::store::{NotificationStore, with_retry};
use porch_social::SocialResult;
use porch_types::events::GatewayEvent;
use porch_types::models::Notification;

use crate::registry::ConnectionRegistry;

/// Turns committed domain events into durable notifications and live pushes.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    registry: ConnectionRegistry,
    store: Arc<dyn NotificationStore>,

    /// Serialises record + push per recipient
    recipients: StripedLock,
}

impl Dispatcher {
    pub fn new(registry: ConnectionRegistry, store: Arc<dyn NotificationStore>) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                registry,
                store,
                recipients: StripedLock::default(),
            }),
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.inner.registry
    }

    /// Best-effort push to every connection `user_id` has open. Returns how
    /// many connections accepted the event.
    pub fn push(&self, user_id: Uuid, event: GatewayEvent) -> usize {
        let conns = self.inner.registry.connections_for(user_id);
        let mut delivered = 0;
        for conn in &conns {
            match conn.send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => warn!("Dropped push to closed connection {} of {}", conn.id, user_id),
            }
        }
        trace!("Pushed to {}/{} connections of {}", delivered, conns.len(), user_id);
        delivered
    }
}

impl EventSink for Dispatcher {
    fn dispatch(&self, event: DomainEvent) -> SocialResult<Option<Notification>> {
        if event.is_self_triggered() {
            debug!("Suppressed self-triggered {:?} for {}", event.kind(), event.actor());
            return Ok(None);
        }

        let recipient = event.recipient();
        let record = event.to_notification();

        let _guard = self.inner.recipients.lock(&recipient);
        let notification = with_retry("insert notification", || {
            self.inner.store.insert_notification(&record)
        })?;

        if let DomainEvent::MessageSent { message } = event {
            self.push(recipient, GatewayEvent::MessageCreate { message });
        }
        let delivered = self.push(
            recipient,
            GatewayEvent::Notification {
                notification: notification.clone(),
            },
        );
        debug!(
            "Notification {} ({}) for {} pushed live to {} connections",
            notification.id,
            notification.kind.as_str(),
            recipient,
            delivered
        );

        Ok(Some(notification))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use porch_social::memory::{Fault, FaultPoint, MemoryStore};
    use porch_social::SocialError;
    use tokio::sync::mpsc;

    fn setup() -> (Arc<MemoryStore>, Dispatcher) {
        let store = Arc::new(MemoryStore::new());
        let dispatcher = Dispatcher::new(ConnectionRegistry::new(), store.clone());
        (store, dispatcher)
    }

    #[test]
    fn self_like_creates_nothing() {
        let (store, dispatcher) = setup();
        let me = Uuid::new_v4();
        let out = dispatcher
            .dispatch(DomainEvent::Liked {
                actor: me,
                recipient: me,
                post_id: 1,
            })
            .unwrap();
        assert!(out.is_none());
        assert!(store.notifications_for(me).is_empty());
    }

    #[test]
    fn offline_recipient_still_gets_record() {
        let (store, dispatcher) = setup();
        let (actor, recipient) = (Uuid::new_v4(), Uuid::new_v4());
        let n = dispatcher
            .dispatch(DomainEvent::Followed { actor, recipient })
            .unwrap()
            .unwrap();
        assert!(!n.read);
        assert_eq!(store.notifications_for(recipient), vec![n]);
    }

    #[test]
    fn pushes_to_every_connection_in_order() {
        let (_store, dispatcher) = setup();
        let (actor, recipient) = (Uuid::new_v4(), Uuid::new_v4());
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        dispatcher.registry().register(recipient, Uuid::new_v4(), tx1);
        dispatcher.registry().register(recipient, Uuid::new_v4(), tx2);

        for post_id in [1, 2, 3] {
            dispatcher
                .dispatch(DomainEvent::Liked { actor, recipient, post_id })
                .unwrap();
        }

        for rx in [&mut rx1, &mut rx2] {
            let mut seen = Vec::new();
            while let Ok(GatewayEvent::Notification { notification }) = rx.try_recv() {
                seen.push(notification.entity_id);
            }
            assert_eq!(seen, vec![Some(1), Some(2), Some(3)]);
        }
    }

    #[test]
    fn unavailable_store_is_reported_and_nothing_pushed() {
        let (store, dispatcher) = setup();
        let (actor, recipient) = (Uuid::new_v4(), Uuid::new_v4());
        let (tx, mut rx) = mpsc::unbounded_channel();
        dispatcher.registry().register(recipient, Uuid::new_v4(), tx);
        store.inject(FaultPoint::InsertNotification, Fault::Transient);
        store.inject(FaultPoint::InsertNotification, Fault::Transient);

        let err = dispatcher
            .dispatch(DomainEvent::Followed { actor, recipient })
            .unwrap_err();
        assert!(matches!(err, SocialError::Unavailable(_)));
        assert!(rx.try_recv().is_err());
    }
}
