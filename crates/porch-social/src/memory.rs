//! In-memory implementation of every store boundary, with fault injection.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use uuid::Uuid;

use porch_types::models::{
    Comment, Message, NewNotification, Notification, Post, User, UserSummary,
};

use crate::store::{
    AppendOutcome, DanglingEdge, EdgeSide, Edges, GraphStore, MessageStore, NotificationStore,
    PostStore, StoreError, StoreResult, UserStore,
};

/// Store operations that can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    AddEdge(EdgeSide),
    RemoveEdge(EdgeSide),
    InsertNotification,
    AppendMessage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Transient,
    Permanent,
}

#[derive(Default)]
struct State {
    users: BTreeMap<Uuid, User>,
    edges: HashMap<Uuid, Edges>,
    posts: BTreeMap<i64, Post>,
    messages: Vec<Message>,
    notifications: Vec<Notification>,
    next_id: i64,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    faults: Mutex<HashMap<FaultPoint, VecDeque<Fault>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `fault` for the next call at `point`. Queued faults fire in order.
    pub fn inject(&self, point: FaultPoint, fault: Fault) {
        lock(&self.faults).entry(point).or_default().push_back(fault);
    }

    /// Register a user with the given name and return its id.
    pub fn add_user(&self, name: &str) -> Uuid {
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            city: None,
            area: None,
            created_at: Utc::now(),
        };
        let id = user.id;
        lock(&self.state).users.insert(id, user);
        id
    }

    pub fn notifications_for(&self, recipient: Uuid) -> Vec<Notification> {
        lock(&self.state)
            .notifications
            .iter()
            .filter(|n| n.recipient_id == recipient)
            .cloned()
            .collect()
    }

    fn check(&self, point: FaultPoint) -> StoreResult<()> {
        let fault = lock(&self.faults).get_mut(&point).and_then(VecDeque::pop_front);
        match fault {
            Some(Fault::Transient) => Err(StoreError::Transient(format!("injected at {:?}", point))),
            Some(Fault::Permanent) => Err(StoreError::Backend(anyhow::anyhow!(
                "injected failure at {:?}",
                point
            ))),
            None => Ok(()),
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn summary(user: &User) -> UserSummary {
    UserSummary::from(user)
}

impl UserStore for MemoryStore {
    fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(lock(&self.state).users.get(&id).cloned())
    }

    fn upsert_user(&self, user: &User) -> StoreResult<()> {
        let mut state = lock(&self.state);
        match state.users.get_mut(&user.id) {
            Some(existing) => {
                existing.name = user.name.clone();
                existing.city = user.city.clone();
                existing.area = user.area.clone();
            }
            None => {
                state.users.insert(user.id, user.clone());
            }
        }
        Ok(())
    }

    fn list_users(&self, limit: usize) -> StoreResult<Vec<UserSummary>> {
        let state = lock(&self.state);
        let mut users: Vec<UserSummary> = state.users.values().map(summary).collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        users.truncate(limit);
        Ok(users)
    }

    fn get_summaries(&self, ids: &[Uuid]) -> StoreResult<Vec<UserSummary>> {
        let state = lock(&self.state);
        let mut users: Vec<UserSummary> = ids
            .iter()
            .filter_map(|id| state.users.get(id))
            .map(summary)
            .collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }
}

impl GraphStore for MemoryStore {
    fn get_edges(&self, user_id: Uuid) -> StoreResult<Option<Edges>> {
        Ok(lock(&self.state).edges.get(&user_id).cloned())
    }

    fn add_edge(&self, side: EdgeSide, owner: Uuid, other: Uuid) -> StoreResult<bool> {
        self.check(FaultPoint::AddEdge(side))?;
        let mut state = lock(&self.state);
        let edges = state.edges.entry(owner).or_default();
        let set = match side {
            EdgeSide::Following => &mut edges.following,
            EdgeSide::Followers => &mut edges.followers,
        };
        Ok(set.insert(other))
    }

    fn remove_edge(&self, side: EdgeSide, owner: Uuid, other: Uuid) -> StoreResult<bool> {
        self.check(FaultPoint::RemoveEdge(side))?;
        let mut state = lock(&self.state);
        let Some(edges) = state.edges.get_mut(&owner) else {
            return Ok(false);
        };
        let set = match side {
            EdgeSide::Following => &mut edges.following,
            EdgeSide::Followers => &mut edges.followers,
        };
        Ok(set.remove(&other))
    }

    fn dangling_edges(&self) -> StoreResult<Vec<DanglingEdge>> {
        let state = lock(&self.state);
        let has = |side: EdgeSide, owner: &Uuid, other: &Uuid| {
            state.edges.get(owner).is_some_and(|e| match side {
                EdgeSide::Following => e.following.contains(other),
                EdgeSide::Followers => e.followers.contains(other),
            })
        };
        let mut dangling = Vec::new();
        for (owner, edges) in &state.edges {
            for other in &edges.following {
                if !has(EdgeSide::Followers, other, owner) {
                    dangling.push(DanglingEdge { side: EdgeSide::Following, owner: *owner, other: *other });
                }
            }
            for other in &edges.followers {
                if !has(EdgeSide::Following, other, owner) {
                    dangling.push(DanglingEdge { side: EdgeSide::Followers, owner: *owner, other: *other });
                }
            }
        }
        Ok(dangling)
    }
}

impl PostStore for MemoryStore {
    fn insert_post(&self, author_id: Uuid, text: &str, media_url: Option<&str>) -> StoreResult<Post> {
        let mut state = lock(&self.state);
        let post = Post {
            id: state.next_id(),
            author_id,
            text: text.to_string(),
            media_url: media_url.map(str::to_string),
            likes: vec![],
            comments: vec![],
            deleted_at: None,
            created_at: Utc::now(),
            updated_at: None,
        };
        state.posts.insert(post.id, post.clone());
        Ok(post)
    }

    fn get_post(&self, id: i64) -> StoreResult<Option<Post>> {
        Ok(lock(&self.state).posts.get(&id).cloned())
    }

    fn update_post(
        &self,
        id: i64,
        text: Option<&str>,
        media_url: Option<&str>,
    ) -> StoreResult<Option<Post>> {
        let mut state = lock(&self.state);
        let Some(post) = state.posts.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(text) = text {
            post.text = text.to_string();
        }
        if let Some(url) = media_url {
            post.media_url = Some(url.to_string());
        }
        post.updated_at = Some(Utc::now());
        Ok(Some(post.clone()))
    }

    fn soft_delete_post(&self, id: i64) -> StoreResult<bool> {
        let mut state = lock(&self.state);
        match state.posts.get_mut(&id) {
            Some(post) if post.deleted_at.is_none() => {
                post.deleted_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn toggle_like(&self, post_id: i64, user_id: Uuid) -> StoreResult<Option<(bool, usize)>> {
        let mut state = lock(&self.state);
        let Some(post) = state.posts.get_mut(&post_id) else {
            return Ok(None);
        };
        let liked = if let Some(pos) = post.likes.iter().position(|u| *u == user_id) {
            post.likes.remove(pos);
            false
        } else {
            post.likes.push(user_id);
            true
        };
        Ok(Some((liked, post.likes.len())))
    }

    fn add_comment(&self, post_id: i64, author_id: Uuid, text: &str) -> StoreResult<Option<Comment>> {
        let mut state = lock(&self.state);
        if !state.posts.contains_key(&post_id) {
            return Ok(None);
        }
        let comment = Comment {
            id: state.next_id(),
            post_id,
            author_id,
            text: text.to_string(),
            created_at: Utc::now(),
        };
        if let Some(post) = state.posts.get_mut(&post_id) {
            post.comments.push(comment.clone());
        }
        Ok(Some(comment))
    }

    fn query_by_authors_before_id(
        &self,
        authors: &HashSet<Uuid>,
        cursor: Option<i64>,
        limit: usize,
    ) -> StoreResult<Vec<Post>> {
        let state = lock(&self.state);
        Ok(state
            .posts
            .values()
            .rev()
            .filter(|p| cursor.is_none_or(|c| p.id < c))
            .filter(|p| !p.is_deleted() && authors.contains(&p.author_id))
            .take(limit)
            .cloned()
            .collect())
    }
}

impl MessageStore for MemoryStore {
    fn append_message(
        &self,
        sender_id: Uuid,
        recipient_id: Uuid,
        text: &str,
        nonce: Option<&str>,
    ) -> StoreResult<AppendOutcome> {
        self.check(FaultPoint::AppendMessage)?;
        let mut state = lock(&self.state);
        if let Some(nonce) = nonce {
            if let Some(existing) = state
                .messages
                .iter()
                .find(|m| {
                    m.sender_id == sender_id
                        && m.recipient_id == recipient_id
                        && m.nonce.as_deref() == Some(nonce)
                })
            {
                return Ok(AppendOutcome::Duplicate(existing.clone()));
            }
        }
        let message = Message {
            id: state.next_id(),
            sender_id,
            recipient_id,
            text: text.to_string(),
            nonce: nonce.map(str::to_string),
            created_at: Utc::now(),
            read_at: None,
        };
        state.messages.push(message.clone());
        Ok(AppendOutcome::Created(message))
    }

    fn thread(&self, a: Uuid, b: Uuid, after: Option<i64>) -> StoreResult<Vec<Message>> {
        let state = lock(&self.state);
        Ok(state
            .messages
            .iter()
            .filter(|m| {
                (m.sender_id == a && m.recipient_id == b) || (m.sender_id == b && m.recipient_id == a)
            })
            .filter(|m| after.is_none_or(|after| m.id > after))
            .cloned()
            .collect())
    }

    fn mark_thread_read(&self, reader: Uuid, peer: Uuid) -> StoreResult<usize> {
        let mut state = lock(&self.state);
        let now = Utc::now();
        let mut updated = 0;
        for m in state.messages.iter_mut() {
            if m.sender_id == peer && m.recipient_id == reader && m.read_at.is_none() {
                m.read_at = Some(now);
                updated += 1;
            }
        }
        Ok(updated)
    }
}

impl NotificationStore for MemoryStore {
    fn insert_notification(&self, n: &NewNotification) -> StoreResult<Notification> {
        self.check(FaultPoint::InsertNotification)?;
        let mut state = lock(&self.state);
        let notification = Notification {
            id: state.next_id(),
            recipient_id: n.recipient_id,
            kind: n.kind,
            actor_id: n.actor_id,
            entity_id: n.entity_id,
            read: false,
            created_at: Utc::now(),
        };
        state.notifications.push(notification.clone());
        Ok(notification)
    }

    fn list_by_recipient(&self, recipient: Uuid, limit: usize) -> StoreResult<Vec<Notification>> {
        let state = lock(&self.state);
        Ok(state
            .notifications
            .iter()
            .rev()
            .filter(|n| n.recipient_id == recipient)
            .take(limit)
            .cloned()
            .collect())
    }

    fn mark_all_read(&self, recipient: Uuid) -> StoreResult<usize> {
        let mut state = lock(&self.state);
        let mut updated = 0;
        for n in state.notifications.iter_mut() {
            if n.recipient_id == recipient && !n.read {
                n.read = true;
                updated += 1;
            }
        }
        Ok(updated)
    }
}
