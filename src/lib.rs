// Library modules for the AeThex community backend
pub mod config;
pub mod models;
pub mod db;
pub mod routes;
pub mod services;
pub mod auth;
pub mod error;
pub mod utils;

use std::sync::Arc;

// Re-export commonly used types
pub use error::{AppError, Result};
pub use config::{AppConfig, DataBackend};

use db::companion::{CompanionApi, CompanionClient};
use utils::fallback::FallbackConfig;

// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: db::DatabaseClient,
    pub companion: Option<Arc<dyn CompanionApi>>,
    pub community_service: Arc<services::CommunityService>,
    pub profile_service: Arc<services::ProfileService>,
    pub auth_service: Arc<auth::AuthService>,
}

impl AppState {
    pub async fn new(config: AppConfig) -> Result<Self> {
        let db = db::DatabaseClient::new(&config).await?;

        let companion: Option<Arc<dyn CompanionApi>> = match &config.companion_api_url {
            Some(url) => {
                tracing::info!("🔗 COMPANION: Fallback API at {}", url);
                Some(Arc::new(CompanionClient::new(url, config.companion_timeout())?))
            }
            None => {
                tracing::info!("COMPANION: No companion API configured, feed fallback stops at the database");
                None
            }
        };

        Ok(Self::with_database(config, db, companion))
    }

    /// Wire services over an already-constructed store.
    pub fn with_database(config: AppConfig, db: db::DatabaseClient, companion: Option<Arc<dyn CompanionApi>>) -> Self {
        let fallback = FallbackConfig::from_millis(config.fallback_attempt_timeout_ms);

        let auth_service = Arc::new(auth::AuthService::new(config.jwt_secret.clone()));
        let community_service = Arc::new(services::CommunityService::new(
            db.post_repo.clone(),
            db.profile_repo.clone(),
            db.comment_repo.clone(),
            companion.clone(),
            fallback.clone(),
        ));
        let profile_service = Arc::new(services::ProfileService::new(
            db.profile_repo.clone(),
            companion.clone(),
            fallback.attempt_timeout,
        ));

        Self {
            config,
            db,
            companion,
            community_service,
            profile_service,
            auth_service,
        }
    }
}
