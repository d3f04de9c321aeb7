pub mod error;
pub mod messages;
pub mod middleware;
pub mod notifications;
pub mod posts;
pub mod social;
pub mod state;
pub mod users;

use axum::{
    Json, Router,
    middleware::from_fn_with_state,
    routing::{get, patch, post},
};
use serde_json::{Value, json};

use crate::middleware::require_auth;
use crate::state::AppState;

/// Every REST route. The gateway upgrade is mounted by the server binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new().route("/health", get(health));

    let protected_routes = Router::new()
        .route("/users", get(users::directory))
        .route("/users/me", get(users::me).put(users::upsert_me))
        .route("/users/{id}/friends", get(social::friends_of))
        .route("/users/{id}/friend-requests", get(social::friend_requests))
        .route("/users/{id}/follow", post(social::follow))
        .route("/users/{id}/unfollow", post(social::unfollow))
        .route("/users/{id}/accept", post(social::accept))
        .route("/relationships", get(social::relationships))
        .route("/feed", get(posts::feed))
        .route("/posts", post(posts::create))
        .route("/posts/{id}", patch(posts::update).delete(posts::delete))
        .route("/posts/{id}/like", post(posts::like))
        .route("/posts/{id}/comments", post(posts::comment))
        .route("/messages", get(messages::thread).post(messages::send))
        .route("/messages/read", post(messages::mark_read))
        .route("/notifications", get(notifications::list))
        .route("/notifications/read", post(notifications::mark_read))
        .layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use jsonwebtoken::{EncodingKey, Header, encode};
    use porch_db::Database;
    use porch_types::api::Claims;
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::state::AppStateInner;

    const SECRET: &str = "test-secret";

    fn app() -> Router {
        let db = Arc::new(Database::open_in_memory().unwrap());
        router(AppStateInner::new(db, SECRET.into()))
    }

    fn bearer(user: Uuid) -> String {
        let exp = (chrono::Utc::now().timestamp() + 3600) as usize;
        let token = encode(
            &Header::default(),
            &Claims { sub: user, exp },
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        format!("Bearer {}", token)
    }

    async fn call(app: &Router, method: &str, uri: &str, user: Uuid, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, bearer(user));
        let body = match body {
            Some(json) => {
                req = req.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let res = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn register(app: &Router, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        let (status, _) = call(app, "PUT", "/users/me", id, Some(json!({ "name": name }))).await;
        assert_eq!(status, StatusCode::OK);
        id
    }

    #[tokio::test]
    async fn health_needs_no_token() {
        let res = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_or_bad_token_is_401() {
        let app = app();
        let res = app
            .clone()
            .oneshot(Request::get("/feed").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = app
            .oneshot(
                Request::get("/feed")
                    .header(header::AUTHORIZATION, "Bearer nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn follow_then_follow_back_makes_friends() {
        let app = app();
        let a = register(&app, "a").await;
        let b = register(&app, "b").await;

        let (status, body) = call(&app, "POST", &format!("/users/{}/follow", b), a, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["relationship"], "outgoing");

        let (_, requests) = call(&app, "GET", &format!("/users/{}/friend-requests", b), b, None).await;
        assert_eq!(requests[0]["id"], a.to_string());

        let (_, body) = call(&app, "POST", &format!("/users/{}/accept", a), b, None).await;
        assert_eq!(body["relationship"], "friend");

        let (_, view) = call(&app, "GET", "/relationships", a, None).await;
        assert_eq!(view["friends"][0]["id"], b.to_string());
        assert_eq!(view["incoming"].as_array().unwrap().len(), 0);

        let (_, notes) = call(&app, "GET", "/notifications", b, None).await;
        assert_eq!(notes[0]["kind"], "follow");
    }

    #[tokio::test]
    async fn follow_errors_map_to_status() {
        let app = app();
        let a = register(&app, "a").await;

        let (status, body) = call(&app, "POST", &format!("/users/{}/follow", a), a, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, _) =
            call(&app, "POST", &format!("/users/{}/follow", Uuid::new_v4()), a, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn posts_flow_through_feed() {
        let app = app();
        let a = register(&app, "a").await;
        let b = register(&app, "b").await;

        let (status, post) = call(&app, "POST", "/posts", a, Some(json!({ "text": "plant swap sunday" }))).await;
        assert_eq!(status, StatusCode::CREATED);
        let post_id = post["id"].as_i64().unwrap();

        let (_, feed) = call(&app, "GET", "/feed", b, None).await;
        assert_eq!(feed["items"].as_array().unwrap().len(), 0);

        call(&app, "POST", &format!("/users/{}/follow", a), b, None).await;
        call(&app, "POST", &format!("/users/{}/follow", b), a, None).await;
        let (_, feed) = call(&app, "GET", "/feed?limit=5", b, None).await;
        assert_eq!(feed["items"][0]["id"], post_id);
        assert!(feed["next_cursor"].is_null());

        let (status, _) = call(&app, "PATCH", &format!("/posts/{}", post_id), b, Some(json!({ "text": "mine" }))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_, like) = call(&app, "POST", &format!("/posts/{}/like", post_id), b, None).await;
        assert_eq!(like["liked"], true);

        let (status, _) = call(&app, "DELETE", &format!("/posts/{}", post_id), a, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, feed) = call(&app, "GET", "/feed", b, None).await;
        assert_eq!(feed["items"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn messages_are_idempotent_by_nonce() {
        let app = app();
        let a = register(&app, "a").await;
        let b = register(&app, "b").await;
        let msg = json!({ "to": b, "text": "bins tonight", "nonce": "n-1" });

        let (status, first) = call(&app, "POST", "/messages", a, Some(msg.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        let (_, second) = call(&app, "POST", "/messages", a, Some(msg)).await;
        assert_eq!(first["id"], second["id"]);

        let (_, thread) = call(&app, "GET", &format!("/messages?with_user={}", a), b, None).await;
        assert_eq!(thread.as_array().unwrap().len(), 1);

        let (_, read) = call(&app, "POST", "/messages/read", b, Some(json!({ "with_user": a }))).await;
        assert_eq!(read["updated"], 1);

        let (_, notes) = call(&app, "GET", "/notifications", b, None).await;
        assert_eq!(notes.as_array().unwrap().len(), 1);
        let (_, marked) = call(&app, "POST", "/notifications/read", b, None).await;
        assert_eq!(marked["updated"], 1);
    }
}
