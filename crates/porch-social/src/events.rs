use uuid::Uuid;

use porch_types::models::{Message, NewNotification, Notification, NotificationKind};

use crate::error::SocialResult;

/// A committed mutation that someone other than the actor may want to hear about.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    Liked {
        actor: Uuid,
        recipient: Uuid,
        post_id: i64,
    },
    Commented {
        actor: Uuid,
        recipient: Uuid,
        post_id: i64,
        comment_id: i64,
    },
    Followed {
        actor: Uuid,
        recipient: Uuid,
    },
    MessageSent {
        message: Message,
    },
}

impl DomainEvent {
    pub fn actor(&self) -> Uuid {
        match self {
            Self::Liked { actor, .. }
            | Self::Commented { actor, .. }
            | Self::Followed { actor, .. } => *actor,
            Self::MessageSent { message } => message.sender_id,
        }
    }

    pub fn recipient(&self) -> Uuid {
        match self {
            Self::Liked { recipient, .. }
            | Self::Commented { recipient, .. }
            | Self::Followed { recipient, .. } => *recipient,
            Self::MessageSent { message } => message.recipient_id,
        }
    }

    pub fn kind(&self) -> NotificationKind {
        match self {
            Self::Liked { .. } => NotificationKind::Like,
            Self::Commented { .. } => NotificationKind::Comment,
            Self::Followed { .. } => NotificationKind::Follow,
            Self::MessageSent { .. } => NotificationKind::Message,
        }
    }

    /// Comments reference the post they were left on.
    pub fn entity_id(&self) -> Option<i64> {
        match self {
            Self::Liked { post_id, .. } | Self::Commented { post_id, .. } => Some(*post_id),
            Self::Followed { .. } => None,
            Self::MessageSent { message } => Some(message.id),
        }
    }

    pub fn is_self_triggered(&self) -> bool {
        self.actor() == self.recipient()
    }

    pub fn to_notification(&self) -> NewNotification {
        NewNotification {
            recipient_id: self.recipient(),
            kind: self.kind(),
            actor_id: self.actor(),
            entity_id: self.entity_id(),
        }
    }
}

/// Where committed mutations are handed off for notification and live push.
pub trait EventSink: Send + Sync {
    /// Returns once the durable notification exists. `None` means the event
    /// was suppressed and nothing was written.
    fn dispatch(&self, event: DomainEvent) -> SocialResult<Option<Notification>>;
}
