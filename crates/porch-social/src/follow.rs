//! Follow / unfollow as a two-step saga over single-document edge writes.
//!
//! An edge lives twice: in the actor's `following` and in the target's
//! `followers`. The store can only update one of those atomically, so the
//! actor side is written first and the target side second. If the second
//! write fails the first one is reverted and the caller gets `Conflict`.
//! Accepting a request is just following back; there is no request record.
//!
//! Both writes for a pair run under one pair lock, which the reconciler
//! also takes before it touches a dangling side.

use std::sync::{LazyLock, MutexGuard};

use tracing::{debug, error, info};
use uuid::Uuid;

use porch_types::api::FollowResponse;

use crate::error::{SocialError, SocialResult};
use crate::events::{DomainEvent, EventSink};
use crate::graph::derive_for;
use crate::lock::StripedLock;
use crate::store::{EdgeSide, GraphStore, UserStore, with_retry};

static EDGE_LOCKS: LazyLock<StripedLock> = LazyLock::new(StripedLock::default);

/// Hold the lock for the edge `follower -> followee`.
pub(crate) fn lock_edge(follower: Uuid, followee: Uuid) -> MutexGuard<'static, ()> {
    EDGE_LOCKS.lock(&(follower, followee))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EdgeOp {
    Add,
    Remove,
}

impl EdgeOp {
    fn apply(self, graph: &dyn GraphStore, side: EdgeSide, owner: Uuid, other: Uuid) -> SocialResult<bool> {
        match self {
            Self::Add => with_retry("add edge", || graph.add_edge(side, owner, other)),
            Self::Remove => with_retry("remove edge", || graph.remove_edge(side, owner, other)),
        }
    }

    fn inverse(self) -> Self {
        match self {
            Self::Add => Self::Remove,
            Self::Remove => Self::Add,
        }
    }
}

pub fn follow(
    users: &dyn UserStore,
    graph: &dyn GraphStore,
    events: &dyn EventSink,
    actor: Uuid,
    target: Uuid,
) -> SocialResult<FollowResponse> {
    check_pair(users, actor, target)?;

    let res = apply_mirrored(graph, EdgeOp::Add, actor, target)?;
    if res.changed {
        info!("{} now follows {}", actor, target);
        events.dispatch(DomainEvent::Followed {
            actor,
            recipient: target,
        })?;
    } else {
        debug!("{} already follows {}", actor, target);
    }

    Ok(res)
}

pub fn unfollow(
    users: &dyn UserStore,
    graph: &dyn GraphStore,
    actor: Uuid,
    target: Uuid,
) -> SocialResult<FollowResponse> {
    check_pair(users, actor, target)?;

    let res = apply_mirrored(graph, EdgeOp::Remove, actor, target)?;
    if res.changed {
        info!("{} unfollowed {}", actor, target);
    }

    Ok(res)
}

/// Accept an incoming request from `sender` by following them back.
pub fn accept(
    users: &dyn UserStore,
    graph: &dyn GraphStore,
    events: &dyn EventSink,
    actor: Uuid,
    sender: Uuid,
) -> SocialResult<FollowResponse> {
    follow(users, graph, events, actor, sender)
}

fn check_pair(users: &dyn UserStore, actor: Uuid, target: Uuid) -> SocialResult<()> {
    if actor == target {
        return Err(SocialError::InvalidInput("cannot follow yourself".into()));
    }
    for id in [actor, target] {
        if with_retry("load user", || users.get_user(id))?.is_none() {
            return Err(SocialError::NotFound("user"));
        }
    }
    Ok(())
}

/// Apply `op` to `actor.following` then `target.followers`.
///
/// Reports whether either side changed, with the relationship read before
/// the pair lock is released. If the second side fails, the first is
/// reverted (only if it actually changed) and the whole call reports
/// `Conflict` so the client can re-issue it.
fn apply_mirrored(
    graph: &dyn GraphStore,
    op: EdgeOp,
    actor: Uuid,
    target: Uuid,
) -> SocialResult<FollowResponse> {
    let _guard = lock_edge(actor, target);
    let changed_actor = op.apply(graph, EdgeSide::Following, actor, target)?;

    match op.apply(graph, EdgeSide::Followers, target, actor) {
        Ok(changed_target) => Ok(FollowResponse {
            changed: changed_actor || changed_target,
            relationship: derive_for(graph, actor)?.classify(target),
        }),
        Err(err) => {
            if changed_actor {
                if let Err(revert_err) = op.inverse().apply(graph, EdgeSide::Following, actor, target) {
                    error!(
                        "Edge {} -> {} left half-applied ({:?} failed: {}, revert failed: {})",
                        actor, target, op, err, revert_err
                    );
                }
            }
            Err(SocialError::Conflict(format!(
                "{:?} {} -> {} did not complete: {}",
                op, actor, target, err
            )))
        }
    }
}
