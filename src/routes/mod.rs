pub mod api;
pub mod comments;
pub mod posts;
pub mod profiles;

use axum::Router;
use crate::AppState;

pub fn create_routes() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", api::routes())
}
