use axum::{
    Extension, Json,
    extract::{Path, State},
};
use uuid::Uuid;

use porch_gateway::run_blocking;
use porch_social::graph::{self, Population};
use porch_social::store::{UserStore, with_retry};
use porch_social::{SocialError, follow as saga};
use porch_types::api::{FollowResponse, RelationshipView};
use porch_types::models::UserSummary;

use crate::error::ApiResult;
use crate::middleware::Principal;
use crate::state::AppState;

pub async fn relationships(
    State(state): State<AppState>,
    Extension(Principal(me)): Extension<Principal>,
) -> ApiResult<Json<RelationshipView>> {
    let db = state.db.clone();
    let view = run_blocking(move || {
        graph::relationships(db.as_ref(), db.as_ref(), me, &Population::All)
    })
    .await?;
    Ok(Json(view))
}

pub async fn friends_of(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<UserSummary>>> {
    Ok(Json(view_of(&state, user_id).await?.friends))
}

/// Pending requests are just the user's incoming set.
pub async fn friend_requests(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<UserSummary>>> {
    Ok(Json(view_of(&state, user_id).await?.incoming))
}

async fn view_of(state: &AppState, user_id: Uuid) -> ApiResult<RelationshipView> {
    let db = state.db.clone();
    let view = run_blocking(move || {
        if with_retry("load user", || db.get_user(user_id))?.is_none() {
            return Err(SocialError::NotFound("user"));
        }
        graph::relationships(db.as_ref(), db.as_ref(), user_id, &Population::All)
    })
    .await?;
    Ok(view)
}

pub async fn follow(
    State(state): State<AppState>,
    Extension(Principal(me)): Extension<Principal>,
    Path(target): Path<Uuid>,
) -> ApiResult<Json<FollowResponse>> {
    let db = state.db.clone();
    let events = state.dispatcher.clone();
    let res = run_blocking(move || saga::follow(db.as_ref(), db.as_ref(), &events, me, target)).await?;
    Ok(Json(res))
}

pub async fn unfollow(
    State(state): State<AppState>,
    Extension(Principal(me)): Extension<Principal>,
    Path(target): Path<Uuid>,
) -> ApiResult<Json<FollowResponse>> {
    let db = state.db.clone();
    let res = run_blocking(move || saga::unfollow(db.as_ref(), db.as_ref(), me, target)).await?;
    Ok(Json(res))
}

pub async fn accept(
    State(state): State<AppState>,
    Extension(Principal(me)): Extension<Principal>,
    Path(sender): Path<Uuid>,
) -> ApiResult<Json<FollowResponse>> {
    let db = state.db.clone();
    let events = state.dispatcher.clone();
    let res = run_blocking(move || saga::accept(db.as_ref(), db.as_ref(), &events, me, sender)).await?;
    Ok(Json(res))
}
