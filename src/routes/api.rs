use axum::{extract::State, routing::{get, post}, Router, Json};
use serde_json::{json, Value};
use crate::AppState;
use crate::routes::{comments, posts, profiles};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(api_health))
        .route("/posts", get(posts::get_posts).post(posts::create_post))
        .route("/posts/:post_id", get(posts::get_post))
        .route("/posts/:post_id/like", post(posts::like_post).delete(posts::unlike_post))
        .route("/posts/:post_id/comments", get(comments::get_post_comments).post(comments::create_comment))
        .route("/profile/ensure", post(profiles::ensure_profile))
        .route("/profiles/:user_id", get(profiles::get_profile))
}

async fn api_health(State(app_state): State<AppState>) -> Json<Value> {
    let database = match app_state.db.health_check().await {
        Ok(()) => "reachable",
        Err(e) => {
            tracing::warn!("⚠️ HEALTH: Database check failed: {}", e);
            "unreachable"
        }
    };

    Json(json!({
        "status": "healthy",
        "service": "aethex_community",
        "version": env!("CARGO_PKG_VERSION"),
        "backend": app_state.db.backend,
        "database": database,
        "companion_api": app_state.companion.is_some()
    }))
}
