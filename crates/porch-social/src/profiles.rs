use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use porch_types::api::ProfileResponse;
use porch_types::models::User;

use crate::error::{SocialError, SocialResult};
use crate::store::{GraphStore, UserStore, with_retry};

pub const MAX_NAME_LEN: usize = 64;
pub const MAX_PLACE_LEN: usize = 120;

/// Create or update the principal's profile. Edges are untouched, so a new
/// user starts with none.
pub fn upsert_profile(
    users: &dyn UserStore,
    graph: &dyn GraphStore,
    id: Uuid,
    name: &str,
    city: Option<&str>,
    area: Option<&str>,
) -> SocialResult<ProfileResponse> {
    let name = name.trim();
    if name.is_empty() {
        return Err(SocialError::InvalidInput("name is empty".into()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(SocialError::InvalidInput(format!(
            "name is longer than {} characters",
            MAX_NAME_LEN
        )));
    }
    let city = place(city, "city")?;
    let area = place(area, "area")?;

    let existing = with_retry("load user", || users.get_user(id))?;
    let user = User {
        id,
        name: name.to_string(),
        city,
        area,
        created_at: existing.as_ref().map_or_else(Utc::now, |u| u.created_at),
    };
    with_retry("upsert user", || users.upsert_user(&user))?;
    if existing.is_none() {
        info!("Registered profile {} ({})", user.name, id);
    }

    profile(users, graph, id)
}

pub fn profile(
    users: &dyn UserStore,
    graph: &dyn GraphStore,
    id: Uuid,
) -> SocialResult<ProfileResponse> {
    let user = with_retry("load user", || users.get_user(id))?.ok_or(SocialError::NotFound("user"))?;
    let edges = with_retry("load edges", || graph.get_edges(id))?.unwrap_or_default();

    Ok(ProfileResponse {
        following_count: edges.following.len(),
        followers_count: edges.followers.len(),
        user,
    })
}

fn place(value: Option<&str>, what: &str) -> SocialResult<Option<String>> {
    let value = value.map(str::trim).filter(|v| !v.is_empty());
    if value.is_some_and(|v| v.chars().count() > MAX_PLACE_LEN) {
        return Err(SocialError::InvalidInput(format!(
            "{} is longer than {} characters",
            what, MAX_PLACE_LEN
        )));
    }
    Ok(value.map(str::to_string))
}
