use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

use porch_gateway::run_blocking;
use porch_types::api::{MarkReadRequest, MarkReadResponse, SendMessageRequest};
use porch_types::models::Message;

use crate::error::ApiResult;
use crate::middleware::Principal;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ThreadQuery {
    pub with_user: Uuid,
    /// Only messages with a larger id, for catching up after a reconnect
    pub after: Option<i64>,
}

pub async fn thread(
    State(state): State<AppState>,
    Extension(Principal(me)): Extension<Principal>,
    Query(query): Query<ThreadQuery>,
) -> ApiResult<Json<Vec<Message>>> {
    let log = state.conversations.clone();
    let messages = run_blocking(move || log.thread(me, query.with_user, query.after)).await?;
    Ok(Json(messages))
}

pub async fn send(
    State(state): State<AppState>,
    Extension(Principal(me)): Extension<Principal>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<(StatusCode, Json<Message>)> {
    let log = state.conversations.clone();
    let message = run_blocking(move || {
        log.append(me, req.to, &req.text, req.nonce.as_deref())
    })
    .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(Principal(me)): Extension<Principal>,
    Json(req): Json<MarkReadRequest>,
) -> ApiResult<Json<MarkReadResponse>> {
    let log = state.conversations.clone();
    let updated = run_blocking(move || log.mark_read(me, req.with_user)).await?;
    Ok(Json(MarkReadResponse { updated }))
}
