use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use porch_db::Database;
use porch_gateway::run_blocking;
use porch_social::reconcile::reconcile_edges;

/// Background task that repairs half-applied follow edges.
///
/// A failed saga whose revert also failed leaves one side of an edge
/// without its mirror. This pass finds those and removes the stray side.
pub async fn run_reconcile_loop(db: Arc<Database>, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        let db = db.clone();
        match run_blocking(move || reconcile_edges(db.as_ref())).await {
            Ok(0) => {}
            Ok(count) => info!("Reconcile: removed {} dangling edge sides", count),
            Err(e) => warn!("Reconcile error: {}", e),
        }
    }
}
