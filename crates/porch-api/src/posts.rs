use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use porch_gateway::run_blocking;
use porch_social::{feed as scoper, posts};
use porch_types::api::{
    CommentRequest, CreatePostRequest, FeedPage, LikeResponse, UpdatePostRequest,
};
use porch_types::models::{Comment, Post};

use crate::error::ApiResult;
use crate::middleware::Principal;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    /// Id of the last post on the previous page
    pub cursor: Option<i64>,
    pub limit: Option<usize>,
}

pub async fn feed(
    State(state): State<AppState>,
    Extension(Principal(me)): Extension<Principal>,
    Query(query): Query<FeedQuery>,
) -> ApiResult<Json<FeedPage>> {
    let db = state.db.clone();
    let page = run_blocking(move || {
        scoper::feed(db.as_ref(), db.as_ref(), me, query.cursor, query.limit)
    })
    .await?;
    Ok(Json(page))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(Principal(me)): Extension<Principal>,
    Json(req): Json<CreatePostRequest>,
) -> ApiResult<(StatusCode, Json<Post>)> {
    let db = state.db.clone();
    let post = run_blocking(move || {
        posts::create_post(db.as_ref(), db.as_ref(), me, &req.text, req.media_url.as_deref())
    })
    .await?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(Principal(me)): Extension<Principal>,
    Path(post_id): Path<i64>,
    Json(req): Json<UpdatePostRequest>,
) -> ApiResult<Json<Post>> {
    let db = state.db.clone();
    let post = run_blocking(move || {
        posts::update_post(
            db.as_ref(),
            me,
            post_id,
            req.text.as_deref(),
            req.media_url.as_deref(),
        )
    })
    .await?;
    Ok(Json(post))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(Principal(me)): Extension<Principal>,
    Path(post_id): Path<i64>,
) -> ApiResult<StatusCode> {
    let db = state.db.clone();
    run_blocking(move || posts::delete_post(db.as_ref(), me, post_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn like(
    State(state): State<AppState>,
    Extension(Principal(me)): Extension<Principal>,
    Path(post_id): Path<i64>,
) -> ApiResult<Json<LikeResponse>> {
    let db = state.db.clone();
    let events = state.dispatcher.clone();
    let res = run_blocking(move || posts::toggle_like(db.as_ref(), &events, me, post_id)).await?;
    Ok(Json(res))
}

pub async fn comment(
    State(state): State<AppState>,
    Extension(Principal(me)): Extension<Principal>,
    Path(post_id): Path<i64>,
    Json(req): Json<CommentRequest>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    let db = state.db.clone();
    let events = state.dispatcher.clone();
    let comment = run_blocking(move || {
        posts::add_comment(db.as_ref(), &events, me, post_id, &req.text)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}
