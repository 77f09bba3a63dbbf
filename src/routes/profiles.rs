use axum::{
    extract::{Json, Path, State},
    response::Json as ResponseJson,
};
use serde_json::{json, Value};
use uuid::Uuid;
use crate::{AppState, AppError, Result};
use crate::auth::middleware::AuthUser;
use crate::models::profile::EnsureProfileRequest;

/// Called by clients right after sign-in; creates the profile row on first use.
pub async fn ensure_profile(
    State(app_state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<EnsureProfileRequest>,
) -> Result<ResponseJson<Value>> {
    let seed = request.into_new_profile(auth.user_id, auth.claims.email.as_deref());
    let profile = app_state.profile_service.ensure_profile(seed).await?;

    Ok(ResponseJson(json!({
        "profile": profile
    })))
}

pub async fn get_profile(
    State(app_state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<ResponseJson<Value>> {
    match app_state.profile_service.get_profile(user_id).await? {
        Some(profile) => Ok(ResponseJson(json!({
            "profile": profile
        }))),
        None => Err(AppError::NotFound("Profile not found".to_string())),
    }
}
