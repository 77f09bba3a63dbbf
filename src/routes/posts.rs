use axum::{
    extract::{State, Json, Path, Query},
    response::Json as ResponseJson,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use crate::{AppState, AppError, Result};
use crate::auth::middleware::AuthUser;
use crate::models::FeedQuery;
use crate::models::post::CreatePostRequest;

#[derive(Debug, Deserialize)]
pub struct FeedParams {
    #[serde(default = "default_limit")]
    pub limit: u32,
    pub category: Option<String>,
    pub author_id: Option<Uuid>,
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

// Validation constants
pub const MIN_LIMIT: u32 = 1;
pub const MAX_LIMIT: u32 = 50;
pub const DEFAULT_LIMIT: u32 = 20;

pub fn validate_limit(limit: u32) -> Result<u32> {
    if !(MIN_LIMIT..=MAX_LIMIT).contains(&limit) {
        return Err(AppError::ValidationError(format!(
            "Invalid limit. Must be between {} and {}", MIN_LIMIT, MAX_LIMIT
        )));
    }
    Ok(limit)
}

pub async fn get_posts(
    State(app_state): State<AppState>,
    Query(params): Query<FeedParams>,
) -> Result<ResponseJson<Value>> {
    let feed = FeedQuery {
        limit: validate_limit(params.limit)?,
        category: params.category.filter(|c| !c.trim().is_empty()),
        author_id: params.author_id,
    };

    let resolved = app_state.community_service.resolve_posts(&feed).await;

    Ok(ResponseJson(json!({
        "total": resolved.value.len(),
        "limit": feed.limit,
        "source": resolved.source,
        "posts": resolved.value,
    })))
}

pub async fn get_post(
    State(app_state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<ResponseJson<Value>> {
    let post = app_state.community_service.get_post(post_id).await?;

    Ok(ResponseJson(json!({
        "post": post
    })))
}

pub async fn create_post(
    State(app_state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CreatePostRequest>,
) -> Result<ResponseJson<Value>> {
    let post = app_state.community_service.create_post(auth.user_id, request).await?;

    Ok(ResponseJson(json!({
        "post": post,
        "message": "Post created successfully"
    })))
}

pub async fn like_post(
    State(app_state): State<AppState>,
    auth: AuthUser,
    Path(post_id): Path<Uuid>,
) -> Result<ResponseJson<Value>> {
    app_state.community_service.like_post(post_id, auth.user_id).await?;

    Ok(ResponseJson(json!({
        "post_id": post_id,
        "liked": true
    })))
}

pub async fn unlike_post(
    State(app_state): State<AppState>,
    auth: AuthUser,
    Path(post_id): Path<Uuid>,
) -> Result<ResponseJson<Value>> {
    app_state.community_service.unlike_post(post_id, auth.user_id).await?;

    Ok(ResponseJson(json!({
        "post_id": post_id,
        "liked": false
    })))
}
