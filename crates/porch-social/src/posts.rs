use std::sync::LazyLock;

use tracing::info;
use uuid::Uuid;

use porch_types::api::LikeResponse;
use porch_types::models::{Comment, Post};

use crate::error::{SocialError, SocialResult};
use crate::events::{DomainEvent, EventSink};
use crate::lock::StripedLock;
use crate::store::{PostStore, UserStore, with_retry};

pub const MAX_POST_LEN: usize = 5_000;
pub const MAX_COMMENT_LEN: usize = 1_000;

/// Held per post author across a reaction's write and its dispatch, so the
/// author is notified in commit order.
static AUTHOR_LOCKS: LazyLock<StripedLock> = LazyLock::new(StripedLock::default);

pub fn create_post(
    users: &dyn UserStore,
    posts: &dyn PostStore,
    author: Uuid,
    text: &str,
    media_url: Option<&str>,
) -> SocialResult<Post> {
    let text = text.trim();
    let media_url = media_url.map(str::trim).filter(|url| !url.is_empty());
    if text.is_empty() && media_url.is_none() {
        return Err(SocialError::InvalidInput("post needs text or media".into()));
    }
    check_len(text, MAX_POST_LEN, "post")?;
    if with_retry("load user", || users.get_user(author))?.is_none() {
        return Err(SocialError::NotFound("user"));
    }

    let post = with_retry("insert post", || posts.insert_post(author, text, media_url))?;
    info!("{} created post {}", author, post.id);
    Ok(post)
}

/// A live (not soft-deleted) post.
pub fn get_post(posts: &dyn PostStore, id: i64) -> SocialResult<Post> {
    with_retry("load post", || posts.get_post(id))?
        .filter(|p| !p.is_deleted())
        .ok_or(SocialError::NotFound("post"))
}

pub fn update_post(
    posts: &dyn PostStore,
    actor: Uuid,
    id: i64,
    text: Option<&str>,
    media_url: Option<&str>,
) -> SocialResult<Post> {
    let post = get_post(posts, id)?;
    if post.author_id != actor {
        return Err(SocialError::Forbidden);
    }
    let text = text.map(str::trim);
    if let Some(text) = text {
        check_len(text, MAX_POST_LEN, "post")?;
    }

    with_retry("update post", || posts.update_post(id, text, media_url))?
        .ok_or(SocialError::NotFound("post"))
}

/// Soft delete: the row stays so ids, cursors and counts stay stable.
pub fn delete_post(posts: &dyn PostStore, actor: Uuid, id: i64) -> SocialResult<()> {
    let post = get_post(posts, id)?;
    if post.author_id != actor {
        return Err(SocialError::Forbidden);
    }
    with_retry("delete post", || posts.soft_delete_post(id))?;
    info!("{} deleted post {}", actor, id);
    Ok(())
}

/// Like or unlike. Only a new like notifies the author.
pub fn toggle_like(
    posts: &dyn PostStore,
    events: &dyn EventSink,
    actor: Uuid,
    id: i64,
) -> SocialResult<LikeResponse> {
    let post = get_post(posts, id)?;
    let _guard = AUTHOR_LOCKS.lock(&post.author_id);
    let (liked, likes) = with_retry("toggle like", || posts.toggle_like(id, actor))?
        .ok_or(SocialError::NotFound("post"))?;

    if liked {
        events.dispatch(DomainEvent::Liked {
            actor,
            recipient: post.author_id,
            post_id: id,
        })?;
    }

    Ok(LikeResponse { likes, liked })
}

pub fn add_comment(
    posts: &dyn PostStore,
    events: &dyn EventSink,
    actor: Uuid,
    id: i64,
    text: &str,
) -> SocialResult<Comment> {
    let text = text.trim();
    if text.is_empty() {
        return Err(SocialError::InvalidInput("comment is empty".into()));
    }
    check_len(text, MAX_COMMENT_LEN, "comment")?;

    let post = get_post(posts, id)?;
    let _guard = AUTHOR_LOCKS.lock(&post.author_id);
    let comment = with_retry("add comment", || posts.add_comment(id, actor, text))?
        .ok_or(SocialError::NotFound("post"))?;

    events.dispatch(DomainEvent::Commented {
        actor,
        recipient: post.author_id,
        post_id: id,
        comment_id: comment.id,
    })?;

    Ok(comment)
}

fn check_len(text: &str, max: usize, what: &str) -> SocialResult<()> {
    if text.chars().count() > max {
        return Err(SocialError::InvalidInput(format!(
            "{} is longer than {} characters",
            what, max
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use porch_types::models::Notification;

    use crate::memory::MemoryStore;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<DomainEvent>>);

    impl EventSink for Recorder {
        fn dispatch(&self, event: DomainEvent) -> SocialResult<Option<Notification>> {
            self.0.lock().unwrap().push(event);
            Ok(None)
        }
    }

    #[test]
    fn only_author_may_edit_or_delete() {
        let store = MemoryStore::new();
        let author = store.add_user("author");
        let other = store.add_user("other");
        let post = create_post(&store, &store, author, "hello street", None).unwrap();

        assert!(matches!(
            update_post(&store, other, post.id, Some("hijacked"), None),
            Err(SocialError::Forbidden)
        ));
        assert!(matches!(delete_post(&store, other, post.id), Err(SocialError::Forbidden)));

        let edited = update_post(&store, author, post.id, Some("hello road"), None).unwrap();
        assert_eq!(edited.text, "hello road");
        assert!(edited.updated_at.is_some());

        delete_post(&store, author, post.id).unwrap();
        assert!(matches!(get_post(&store, post.id), Err(SocialError::NotFound("post"))));
        // The row is kept
        assert!(store.get_post(post.id).unwrap().unwrap().is_deleted());
    }

    #[test]
    fn empty_post_is_rejected() {
        let store = MemoryStore::new();
        let author = store.add_user("author");
        assert!(matches!(
            create_post(&store, &store, author, "   ", None),
            Err(SocialError::InvalidInput(_))
        ));
        assert!(create_post(&store, &store, author, "", Some("https://cdn/img.jpg")).is_ok());
    }

    #[test]
    fn like_toggle_notifies_only_on_like() {
        let store = MemoryStore::new();
        let sink = Recorder::default();
        let author = store.add_user("author");
        let fan = store.add_user("fan");
        let post = create_post(&store, &store, author, "garage sale", None).unwrap();

        let res = toggle_like(&store, &sink, fan, post.id).unwrap();
        assert!(res.liked);
        assert_eq!(res.likes, 1);
        let res = toggle_like(&store, &sink, fan, post.id).unwrap();
        assert!(!res.liked);
        assert_eq!(res.likes, 0);

        let events = sink.0.lock().unwrap();
        assert_eq!(
            *events,
            vec![DomainEvent::Liked {
                actor: fan,
                recipient: author,
                post_id: post.id
            }]
        );
    }

    #[test]
    fn comment_is_appended_and_dispatched() {
        let store = MemoryStore::new();
        let sink = Recorder::default();
        let author = store.add_user("author");
        let neighbour = store.add_user("neighbour");
        let post = create_post(&store, &store, author, "lost cat", None).unwrap();

        let comment = add_comment(&store, &sink, neighbour, post.id, " seen on elm st ").unwrap();
        assert_eq!(comment.text, "seen on elm st");
        assert_eq!(get_post(&store, post.id).unwrap().comments.len(), 1);
        assert_eq!(sink.0.lock().unwrap().len(), 1);

        assert!(matches!(
            add_comment(&store, &sink, neighbour, 9_999, "hi"),
            Err(SocialError::NotFound("post"))
        ));
    }

    #[test]
    fn concurrent_comments_are_dispatched_in_commit_order() {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(Recorder::default());
        let author = store.add_user("author");
        let posts: Vec<i64> = (0..4)
            .map(|i| create_post(store.as_ref(), store.as_ref(), author, &format!("post {}", i), None).unwrap().id)
            .collect();

        let handles: Vec<_> = posts
            .into_iter()
            .map(|post_id| {
                let store = store.clone();
                let sink = sink.clone();
                let neighbour = store.add_user("neighbour");
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        add_comment(store.as_ref(), sink.as_ref(), neighbour, post_id, "+1").unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let ids: Vec<i64> = sink
            .0
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                DomainEvent::Commented { comment_id, .. } => Some(*comment_id),
                _ => None,
            })
            .collect();
        assert_eq!(ids.len(), 200);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }
}
