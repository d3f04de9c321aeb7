//! Database row types. These map directly to SQLite rows and are kept
//! apart from the porch-types models so the schema can move independently.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use porch_types::models::{
    Comment, Message, Notification, NotificationKind, Post, User, UserSummary,
};

pub struct UserRow {
    pub id: String,
    pub name: String,
    pub city: Option<String>,
    pub area: Option<String>,
    pub created_at: String,
}

impl UserRow {
    pub fn into_user(self) -> User {
        User {
            id: parse_uuid(&self.id, "user id"),
            created_at: parse_ts(&self.created_at, "user created_at"),
            name: self.name,
            city: self.city,
            area: self.area,
        }
    }

    pub fn into_summary(self) -> UserSummary {
        UserSummary {
            id: parse_uuid(&self.id, "user id"),
            name: self.name,
            city: self.city,
            area: self.area,
        }
    }
}

pub struct PostRow {
    pub id: i64,
    pub author_id: String,
    pub text: String,
    pub media_url: Option<String>,
    pub deleted_at: Option<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl PostRow {
    pub fn into_post(self, likes: Vec<Uuid>, comments: Vec<Comment>) -> Post {
        Post {
            id: self.id,
            author_id: parse_uuid(&self.author_id, "post author_id"),
            text: self.text,
            media_url: self.media_url,
            likes,
            comments,
            deleted_at: self.deleted_at.as_deref().map(|t| parse_ts(t, "post deleted_at")),
            created_at: parse_ts(&self.created_at, "post created_at"),
            updated_at: self.updated_at.as_deref().map(|t| parse_ts(t, "post updated_at")),
        }
    }
}

pub struct CommentRow {
    pub id: i64,
    pub post_id: i64,
    pub author_id: String,
    pub text: String,
    pub created_at: String,
}

impl CommentRow {
    pub fn into_comment(self) -> Comment {
        Comment {
            id: self.id,
            post_id: self.post_id,
            author_id: parse_uuid(&self.author_id, "comment author_id"),
            text: self.text,
            created_at: parse_ts(&self.created_at, "comment created_at"),
        }
    }
}

pub struct MessageRow {
    pub id: i64,
    pub sender_id: String,
    pub recipient_id: String,
    pub text: String,
    pub nonce: Option<String>,
    pub created_at: String,
    pub read_at: Option<String>,
}

impl MessageRow {
    pub fn into_message(self) -> Message {
        Message {
            id: self.id,
            sender_id: parse_uuid(&self.sender_id, "message sender_id"),
            recipient_id: parse_uuid(&self.recipient_id, "message recipient_id"),
            text: self.text,
            nonce: self.nonce,
            created_at: parse_ts(&self.created_at, "message created_at"),
            read_at: self.read_at.as_deref().map(|t| parse_ts(t, "message read_at")),
        }
    }
}

pub struct NotificationRow {
    pub id: i64,
    pub recipient_id: String,
    pub kind: String,
    pub actor_id: String,
    pub entity_id: Option<i64>,
    pub read: bool,
    pub created_at: String,
}

impl NotificationRow {
    /// `None` for a kind this build does not know about.
    pub fn into_notification(self) -> Option<Notification> {
        let Some(kind) = NotificationKind::parse(&self.kind) else {
            warn!("Unknown notification kind '{}' on notification {}", self.kind, self.id);
            return None;
        };
        Some(Notification {
            id: self.id,
            recipient_id: parse_uuid(&self.recipient_id, "notification recipient_id"),
            kind,
            actor_id: parse_uuid(&self.actor_id, "notification actor_id"),
            entity_id: self.entity_id,
            read: self.read,
            created_at: parse_ts(&self.created_at, "notification created_at"),
        })
    }
}

pub(crate) fn now() -> String {
    Utc::now().to_rfc3339()
}

pub(crate) fn parse_uuid(raw: &str, what: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, raw, e);
        Uuid::default()
    })
}

pub(crate) fn parse_ts(raw: &str, what: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Rows written by SQLite's datetime('now') have no timezone
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt {} '{}': {}", what, raw, e);
            DateTime::default()
        })
}
