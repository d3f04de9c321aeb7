use uuid::Uuid;

use porch_types::models::Notification;

use crate::error::SocialResult;
use crate::store::{NotificationStore, with_retry};

pub const DEFAULT_NOTIFICATION_LIMIT: usize = 50;
pub const MAX_NOTIFICATION_LIMIT: usize = 200;

/// Pull the recipient's newest notifications. Also the polling fallback for
/// clients without a live connection.
pub fn list(
    store: &dyn NotificationStore,
    recipient: Uuid,
    limit: Option<usize>,
) -> SocialResult<Vec<Notification>> {
    let limit = limit
        .unwrap_or(DEFAULT_NOTIFICATION_LIMIT)
        .clamp(1, MAX_NOTIFICATION_LIMIT);
    with_retry("list notifications", || store.list_by_recipient(recipient, limit))
}

pub fn mark_all_read(store: &dyn NotificationStore, recipient: Uuid) -> SocialResult<usize> {
    with_retry("mark notifications read", || store.mark_all_read(recipient))
}
