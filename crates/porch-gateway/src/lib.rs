//! Live delivery: who is connected, how domain events reach them, and the
//! WebSocket loop that carries both directions.

pub mod connection;
pub mod dispatcher;
pub mod registry;

pub use dispatcher::Dispatcher;
pub use registry::{ConnectionId, ConnectionRegistry};

use porch_social::{SocialError, SocialResult};
use tracing::error;

/// Run blocking store work off the async runtime.
pub async fn run_blocking<F, T>(f: F) -> SocialResult<T>
where
    F: FnOnce() -> SocialResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        SocialError::Internal("worker task failed".into())
    })?
}
