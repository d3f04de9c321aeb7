use axum::{
    Extension, Json,
    extract::State,
};

use porch_gateway::run_blocking;
use porch_social::{graph, profiles};
use porch_types::api::{DirectoryEntry, ProfileResponse, UpsertProfileRequest};

use crate::error::ApiResult;
use crate::middleware::Principal;
use crate::state::AppState;

pub async fn upsert_me(
    State(state): State<AppState>,
    Extension(Principal(me)): Extension<Principal>,
    Json(req): Json<UpsertProfileRequest>,
) -> ApiResult<Json<ProfileResponse>> {
    let db = state.db.clone();
    let res = run_blocking(move || {
        profiles::upsert_profile(
            db.as_ref(),
            db.as_ref(),
            me,
            &req.name,
            req.city.as_deref(),
            req.area.as_deref(),
        )
    })
    .await?;
    Ok(Json(res))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(Principal(me)): Extension<Principal>,
) -> ApiResult<Json<ProfileResponse>> {
    let db = state.db.clone();
    let res = run_blocking(move || profiles::profile(db.as_ref(), db.as_ref(), me)).await?;
    Ok(Json(res))
}

/// Everyone else, tagged with how they relate to the caller.
pub async fn directory(
    State(state): State<AppState>,
    Extension(Principal(me)): Extension<Principal>,
) -> ApiResult<Json<Vec<DirectoryEntry>>> {
    let db = state.db.clone();
    let entries = run_blocking(move || graph::directory(db.as_ref(), db.as_ref(), me)).await?;
    Ok(Json(entries))
}
