use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Post, Relationship, User, UserSummary};

// -- JWT Claims --

/// Claims issued by the external identity provider. `sub` is the stable user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
}

// -- Profiles --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpsertProfileRequest {
    pub name: String,
    pub city: Option<String>,
    pub area: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: User,
    pub following_count: usize,
    pub followers_count: usize,
}

#[derive(Debug, Serialize)]
pub struct DirectoryEntry {
    pub user: UserSummary,
    pub relationship: Relationship,
}

// -- Social graph --

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RelationshipView {
    pub friends: Vec<UserSummary>,
    pub incoming: Vec<UserSummary>,
    pub outgoing: Vec<UserSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FollowResponse {
    /// False when the call was a no-op because the edge already matched.
    pub changed: bool,
    pub relationship: Relationship,
}

// -- Posts --

#[derive(Debug, Serialize)]
pub struct FeedPage {
    pub items: Vec<Post>,
    pub next_cursor: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePostRequest {
    #[serde(default)]
    pub text: String,
    pub media_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePostRequest {
    pub text: Option<String>,
    pub media_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LikeResponse {
    pub likes: usize,
    pub liked: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommentRequest {
    pub text: String,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub to: Uuid,
    pub text: String,
    pub nonce: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarkReadRequest {
    pub with_user: Uuid,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub updated: usize,
}
