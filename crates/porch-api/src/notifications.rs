use axum::{
    Extension, Json,
    extract::{Query, State},
};
use serde::Deserialize;

use porch_gateway::run_blocking;
use porch_social::notifications;
use porch_types::api::MarkReadResponse;
use porch_types::models::Notification;

use crate::error::ApiResult;
use crate::middleware::Principal;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    pub limit: Option<usize>,
}

/// Pull path for notifications; also what polling clients use instead of
/// the gateway.
pub async fn list(
    State(state): State<AppState>,
    Extension(Principal(me)): Extension<Principal>,
    Query(query): Query<NotificationQuery>,
) -> ApiResult<Json<Vec<Notification>>> {
    let db = state.db.clone();
    let items = run_blocking(move || notifications::list(db.as_ref(), me, query.limit)).await?;
    Ok(Json(items))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(Principal(me)): Extension<Principal>,
) -> ApiResult<Json<MarkReadResponse>> {
    let db = state.db.clone();
    let updated = run_blocking(move || notifications::mark_all_read(db.as_ref(), me)).await?;
    Ok(Json(MarkReadResponse { updated }))
}
