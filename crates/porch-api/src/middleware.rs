use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use uuid::Uuid;

use porch_social::SocialError;
use porch_types::api::Claims;

use crate::error::ApiError;
use crate::state::AppState;

/// Resolve a bearer token to the user id it was issued for.
pub fn resolve_principal(secret: &str, token: &str) -> Result<Uuid, SocialError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims.sub)
    .map_err(|e| {
        tracing::debug!("Rejected token: {}", e);
        SocialError::Unauthenticated
    })
}

/// Extract and validate the JWT from the Authorization header, then attach
/// the claims to the request.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(SocialError::Unauthenticated)?;

    let sub = resolve_principal(&state.jwt_secret, token)?;

    req.extensions_mut().insert(Principal(sub));
    Ok(next.run(req).await)
}

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal(pub Uuid);
