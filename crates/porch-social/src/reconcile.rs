use tracing::{debug, info, warn};

use crate::error::SocialResult;
use crate::follow::lock_edge;
use crate::store::{DanglingEdge, GraphStore, with_retry};

/// Remove every edge side whose mirror is missing.
///
/// A half-applied edge only exists when a follow/unfollow saga failed and
/// its revert failed too. That caller was already told the operation did
/// not happen, so the dangling side is dropped rather than completed.
/// Each edge is re-checked under its pair lock, since a saga may have
/// finished it after the scan.
pub fn reconcile_edges(graph: &dyn GraphStore) -> SocialResult<usize> {
    let dangling = with_retry("scan dangling edges", || graph.dangling_edges())?;
    let mut repaired = 0;

    for edge in &dangling {
        let (follower, followee) = edge.pair();
        let _guard = lock_edge(follower, followee);
        if !still_dangling(graph, edge)? {
            debug!("Edge {} -> {} settled since the scan", follower, followee);
            continue;
        }

        warn!(
            "Dangling {:?} edge {} -> {}, removing",
            edge.side, edge.owner, edge.other
        );
        if with_retry("remove dangling edge", || {
            graph.remove_edge(edge.side, edge.owner, edge.other)
        })? {
            repaired += 1;
        }
    }

    if repaired > 0 {
        info!("Reconciliation removed {} dangling edges", repaired);
    }
    Ok(repaired)
}

fn still_dangling(graph: &dyn GraphStore, edge: &DanglingEdge) -> SocialResult<bool> {
    let present = with_retry("load edges", || graph.get_edges(edge.owner))?
        .is_some_and(|edges| edges.has(edge.side, edge.other));
    if !present {
        return Ok(false);
    }
    let mirrored = with_retry("load edges", || graph.get_edges(edge.other))?
        .is_some_and(|edges| edges.has(edge.side.mirror(), edge.owner));
    Ok(!mirrored)
}
