/*!
 * Comment routes: the resilient comment listing and comment creation.
 */

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::middleware::AuthUser,
    models::comment::CreateCommentRequest,
    models::{Comment, Hydrated},
    routes::posts::{validate_limit, DEFAULT_LIMIT},
    AppState, Result,
};

/// Query parameters for comment listing
#[derive(Debug, Deserialize)]
pub struct CommentQuery {
    /// Maximum number of comments to return
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct CommentListResponse {
    pub comments: Vec<Hydrated<Comment>>,
    pub total: usize,
    pub source: Option<&'static str>,
}

/// Response for comment creation
#[derive(Debug, Serialize)]
pub struct CreateCommentResponse {
    pub success: bool,
    pub comment: Comment,
    pub message: String,
}

/// GET /api/v1/posts/{post_id}/comments
pub async fn get_post_comments(
    Path(post_id): Path<Uuid>,
    Query(query): Query<CommentQuery>,
    State(app_state): State<AppState>,
) -> Result<Json<CommentListResponse>> {
    let limit = validate_limit(query.limit.unwrap_or(DEFAULT_LIMIT))?;
    tracing::debug!("📝 Getting comments for post: {}", post_id);

    let resolved = app_state.community_service.resolve_comments(post_id, limit).await;

    Ok(Json(CommentListResponse {
        total: resolved.value.len(),
        source: resolved.source,
        comments: resolved.value,
    }))
}

/// POST /api/v1/posts/{post_id}/comments
pub async fn create_comment(
    Path(post_id): Path<Uuid>,
    State(app_state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CreateCommentRequest>,
) -> Result<Json<CreateCommentResponse>> {
    tracing::debug!("📝 Creating comment on post: {} by user: {}", post_id, auth.user_id);

    let comment = app_state
        .community_service
        .add_comment(post_id, auth.user_id, request)
        .await?;

    tracing::info!("✅ Created comment {} on post {} by user {}", comment.id, post_id, auth.user_id);

    Ok(Json(CreateCommentResponse {
        success: true,
        comment,
        message: "Comment created successfully".to_string(),
    }))
}
