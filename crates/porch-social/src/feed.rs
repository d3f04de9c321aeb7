use tracing::debug;
use uuid::Uuid;

use porch_types::api::FeedPage;

use crate::error::SocialResult;
use crate::graph::derive_for;
use crate::store::{GraphStore, PostStore, with_retry};

pub const DEFAULT_FEED_LIMIT: usize = 10;
pub const MAX_FEED_LIMIT: usize = 50;

/// One page of posts by the viewer and their current friends, newest first.
///
/// `cursor` is the id of the last post on the previous page; this page
/// holds only strictly smaller ids, so posts created in between sort above
/// the cursor and never shift an earlier page. The friend set is derived
/// fresh on every call.
pub fn feed(
    graph: &dyn GraphStore,
    posts: &dyn PostStore,
    viewer: Uuid,
    cursor: Option<i64>,
    limit: Option<usize>,
) -> SocialResult<FeedPage> {
    let limit = limit.unwrap_or(DEFAULT_FEED_LIMIT).clamp(1, MAX_FEED_LIMIT);

    let mut authors = derive_for(graph, viewer)?.friends;
    authors.insert(viewer);

    let items = with_retry("query feed", || {
        posts.query_by_authors_before_id(&authors, cursor, limit)
    })?;
    debug!(
        "Feed for {}: {} authors, {} items before {:?}",
        viewer,
        authors.len(),
        items.len(),
        cursor
    );

    let next_cursor = if items.len() == limit {
        items.last().map(|p| p.id)
    } else {
        None
    };

    Ok(FeedPage { items, next_cursor })
}
