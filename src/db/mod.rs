pub mod companion;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod repository;
pub mod supabase;

// Database connection and state management
use std::sync::Arc;

use crate::config::{AppConfig, DataBackend};
use crate::db::query::ListQuery;
use crate::db::repository::{CommentRepository, PostRepository, ProfileRepository};
use crate::Result;

#[derive(Clone)]
pub struct DatabaseClient {
    pub backend: &'static str,
    pub post_repo: Arc<dyn PostRepository>,
    pub profile_repo: Arc<dyn ProfileRepository>,
    pub comment_repo: Arc<dyn CommentRepository>,
}

impl DatabaseClient {
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let attempt_timeout = std::time::Duration::from_millis(config.fallback_attempt_timeout_ms);

        match &config.data_backend {
            DataBackend::Postgres { database_url } => {
                let database = postgres::PostgresDatabase::new(database_url, attempt_timeout).await?;
                Ok(Self::from_repository(Arc::new(database.repository()), "postgres"))
            }
            DataBackend::Supabase { url, api_key } => {
                tracing::info!("🔗 DATABASE: Using Supabase REST interface at {}", url);
                let client = supabase::SupabaseClient::new(url, api_key, attempt_timeout)?;
                Ok(Self::from_repository(Arc::new(supabase::SupabaseRepository::new(client)), "supabase"))
            }
            DataBackend::Memory => {
                tracing::warn!("⚠️ DATABASE: No database configured, using in-memory store");
                Ok(Self::from_repository(Arc::new(memory::MemoryDatabase::new()), "memory"))
            }
        }
    }

    /// Wire one store implementing every repository trait.
    pub fn from_repository<R>(repo: Arc<R>, backend: &'static str) -> Self
    where
        R: PostRepository + ProfileRepository + CommentRepository + 'static,
    {
        Self {
            backend,
            post_repo: repo.clone(),
            profile_repo: repo.clone(),
            comment_repo: repo,
        }
    }

    pub async fn health_check(&self) -> Result<()> {
        self.post_repo.list_posts(&ListQuery::new().limit(1)).await?;
        Ok(())
    }
}
