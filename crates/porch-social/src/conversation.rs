//! Append-only direct message threads.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use porch_types::models::Message;

use crate::error::{SocialError, SocialResult};
use crate::events::{DomainEvent, EventSink};
use crate::lock::StripedLock;
use crate::store::{AppendOutcome, MessageStore, UserStore, with_retry};

pub const MAX_MESSAGE_LEN: usize = 4_000;
pub const MAX_NONCE_LEN: usize = 64;

/// Unordered pair key: (a, b) and (b, a) map to the same thread.
pub fn pair_key(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b { (a, b) } else { (b, a) }
}

#[derive(Clone)]
pub struct ConversationLog {
    users: Arc<dyn UserStore>,
    store: Arc<dyn MessageStore>,
    events: Arc<dyn EventSink>,
    pairs: Arc<StripedLock>,
}

impl ConversationLog {
    pub fn new(
        users: Arc<dyn UserStore>,
        store: Arc<dyn MessageStore>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            users,
            store,
            events,
            pairs: Arc::new(StripedLock::default()),
        }
    }

    /// Store a message and hand it to the dispatcher.
    ///
    /// Appends for one pair are serialised together with their dispatch, so
    /// the recipient is pushed messages in the order they were stored. A
    /// `nonce` repeated by the same sender to the same recipient returns the
    /// stored message and dispatches nothing.
    pub fn append(
        &self,
        sender: Uuid,
        recipient: Uuid,
        text: &str,
        nonce: Option<&str>,
    ) -> SocialResult<Message> {
        if sender == recipient {
            return Err(SocialError::InvalidInput("cannot message yourself".into()));
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(SocialError::InvalidInput("message is empty".into()));
        }
        if text.chars().count() > MAX_MESSAGE_LEN {
            return Err(SocialError::InvalidInput(format!(
                "message is longer than {} characters",
                MAX_MESSAGE_LEN
            )));
        }
        if nonce.is_some_and(|n| n.is_empty() || n.len() > MAX_NONCE_LEN) {
            return Err(SocialError::InvalidInput("bad nonce".into()));
        }
        if with_retry("load user", || self.users.get_user(recipient))?.is_none() {
            return Err(SocialError::NotFound("user"));
        }

        let _guard = self.pairs.lock(&pair_key(sender, recipient));
        let outcome = with_retry("append message", || {
            self.store.append_message(sender, recipient, text, nonce)
        })?;

        match outcome {
            AppendOutcome::Created(message) => {
                debug!("Message {} {} -> {}", message.id, sender, recipient);
                self.events.dispatch(DomainEvent::MessageSent {
                    message: message.clone(),
                })?;
                Ok(message)
            }
            AppendOutcome::Duplicate(message) => {
                debug!("Duplicate nonce from {}, returning message {}", sender, message.id);
                Ok(message)
            }
        }
    }

    /// The pair's history, oldest first. Argument order does not matter.
    pub fn thread(&self, a: Uuid, b: Uuid, after: Option<i64>) -> SocialResult<Vec<Message>> {
        let (lo, hi) = pair_key(a, b);
        with_retry("load thread", || self.store.thread(lo, hi, after))
    }

    pub fn mark_read(&self, reader: Uuid, peer: Uuid) -> SocialResult<usize> {
        with_retry("mark thread read", || self.store.mark_thread_read(reader, peer))
    }
}
