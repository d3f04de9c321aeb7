//! Boundaries to the external document store.
//!
//! Every method is atomic on its own (one user document, one post, one
//! message). Nothing here spans two documents; callers that need that, like
//! follow/unfollow, build it out of single-document calls.

use std::collections::HashSet;

use tracing::warn;
use uuid::Uuid;

use porch_types::models::{
    Comment, Message, NewNotification, Notification, Post, User, UserSummary,
};

use crate::error::SocialResult;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Busy, locked, timed out. Worth one more try.
    #[error("transient: {0}")]
    Transient(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Which of a user's two edge sets an edge write touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeSide {
    /// `owner.following` contains `other`
    Following,
    /// `owner.followers` contains `other`
    Followers,
}

impl EdgeSide {
    pub fn mirror(self) -> Self {
        match self {
            Self::Following => Self::Followers,
            Self::Followers => Self::Following,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Edges {
    pub following: HashSet<Uuid>,
    pub followers: HashSet<Uuid>,
}

impl Edges {
    pub fn has(&self, side: EdgeSide, other: Uuid) -> bool {
        match side {
            EdgeSide::Following => self.following.contains(&other),
            EdgeSide::Followers => self.followers.contains(&other),
        }
    }
}

/// One side of an edge whose mirror is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DanglingEdge {
    pub side: EdgeSide,
    pub owner: Uuid,
    pub other: Uuid,
}

impl DanglingEdge {
    /// The edge as `(follower, followee)`, whichever side survived.
    pub fn pair(&self) -> (Uuid, Uuid) {
        match self.side {
            EdgeSide::Following => (self.owner, self.other),
            EdgeSide::Followers => (self.other, self.owner),
        }
    }
}

/// Result of appending a message with an idempotency key.
#[derive(Debug, Clone, PartialEq)]
pub enum AppendOutcome {
    Created(Message),
    /// The sender already stored a message to this recipient with this nonce.
    Duplicate(Message),
}

pub trait UserStore: Send + Sync {
    fn get_user(&self, id: Uuid) -> StoreResult<Option<User>>;

    fn upsert_user(&self, user: &User) -> StoreResult<()>;

    /// Users ordered by name, at most `limit`.
    fn list_users(&self, limit: usize) -> StoreResult<Vec<UserSummary>>;

    /// Summaries for the given ids; unknown ids are skipped.
    fn get_summaries(&self, ids: &[Uuid]) -> StoreResult<Vec<UserSummary>>;
}

pub trait GraphStore: Send + Sync {
    /// `None` when the user has never had an edge document created.
    fn get_edges(&self, user_id: Uuid) -> StoreResult<Option<Edges>>;

    /// Returns true if the edge was not already present.
    fn add_edge(&self, side: EdgeSide, owner: Uuid, other: Uuid) -> StoreResult<bool>;

    /// Returns true if the edge was present.
    fn remove_edge(&self, side: EdgeSide, owner: Uuid, other: Uuid) -> StoreResult<bool>;

    fn dangling_edges(&self) -> StoreResult<Vec<DanglingEdge>>;
}

pub trait PostStore: Send + Sync {
    fn insert_post(&self, author_id: Uuid, text: &str, media_url: Option<&str>) -> StoreResult<Post>;

    /// Includes soft-deleted posts.
    fn get_post(&self, id: i64) -> StoreResult<Option<Post>>;

    /// `None` leaves a field unchanged.
    fn update_post(
        &self,
        id: i64,
        text: Option<&str>,
        media_url: Option<&str>,
    ) -> StoreResult<Option<Post>>;

    fn soft_delete_post(&self, id: i64) -> StoreResult<bool>;

    /// Returns `(liked, like_count)` after the toggle, `None` if the post is missing.
    fn toggle_like(&self, post_id: i64, user_id: Uuid) -> StoreResult<Option<(bool, usize)>>;

    fn add_comment(&self, post_id: i64, author_id: Uuid, text: &str) -> StoreResult<Option<Comment>>;

    /// Live posts by any of `authors` with `id < cursor`, newest first.
    fn query_by_authors_before_id(
        &self,
        authors: &HashSet<Uuid>,
        cursor: Option<i64>,
        limit: usize,
    ) -> StoreResult<Vec<Post>>;
}

pub trait MessageStore: Send + Sync {
    fn append_message(
        &self,
        sender_id: Uuid,
        recipient_id: Uuid,
        text: &str,
        nonce: Option<&str>,
    ) -> StoreResult<AppendOutcome>;

    /// Both directions of the pair, oldest first, only ids greater than `after`.
    fn thread(&self, a: Uuid, b: Uuid, after: Option<i64>) -> StoreResult<Vec<Message>>;

    /// Marks messages from `peer` to `reader` as read. Returns how many changed.
    fn mark_thread_read(&self, reader: Uuid, peer: Uuid) -> StoreResult<usize>;
}

pub trait NotificationStore: Send + Sync {
    fn insert_notification(&self, notification: &NewNotification) -> StoreResult<Notification>;

    /// Newest first.
    fn list_by_recipient(&self, recipient: Uuid, limit: usize) -> StoreResult<Vec<Notification>>;

    fn mark_all_read(&self, recipient: Uuid) -> StoreResult<usize>;
}

/// Run a store call, retrying exactly once on a transient failure.
pub fn with_retry<T>(what: &str, mut op: impl FnMut() -> StoreResult<T>) -> SocialResult<T> {
    match op() {
        Err(StoreError::Transient(reason)) => {
            warn!("{}: transient store error ({}), retrying once", what, reason);
            op().map_err(Into::into)
        }
        other => other.map_err(Into::into),
    }
}
