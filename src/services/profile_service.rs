use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::db::companion::CompanionApi;
use crate::db::repository::ProfileRepository;
use crate::models::{NewProfile, Profile};
use crate::utils::fallback::with_deadline;
use crate::{AppError, Result};

pub struct ProfileService {
    profile_repo: Arc<dyn ProfileRepository>,
    companion: Option<Arc<dyn CompanionApi>>,
    timeout: Duration,
}

impl ProfileService {
    pub fn new(
        profile_repo: Arc<dyn ProfileRepository>,
        companion: Option<Arc<dyn CompanionApi>>,
        timeout: Duration,
    ) -> Self {
        Self { profile_repo, companion, timeout }
    }

    pub async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>> {
        with_deadline(self.timeout, "get_profile", self.profile_repo.get_profile(user_id)).await
    }

    /// Return the user's profile, creating it on first sign-in.
    pub async fn ensure_profile(&self, profile: NewProfile) -> Result<Profile> {
        match self.ensure_in_store(&profile).await {
            Ok(existing) => Ok(existing),
            Err(e) if e.is_transient() => match &self.companion {
                Some(companion) => {
                    tracing::warn!("⚠️ PROFILES: Store unavailable ({}), ensuring {} through companion API", e, profile.id);
                    with_deadline(self.timeout, "companion ensure_profile", companion.ensure_profile(&profile)).await
                }
                None => Err(e),
            },
            Err(e) => Err(e),
        }
    }

    async fn ensure_in_store(&self, profile: &NewProfile) -> Result<Profile> {
        if let Some(existing) = self.get_profile(profile.id).await? {
            return Ok(existing);
        }

        match with_deadline(self.timeout, "insert_profile", self.profile_repo.insert_profile(profile)).await {
            Ok(created) => {
                tracing::info!("👤 PROFILES: Created profile for {}", created.id);
                Ok(created)
            }
            // Another request created it between our read and insert
            Err(e) if e.is_conflict() => self
                .get_profile(profile.id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Profile {} vanished after conflict", profile.id))),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::{MemoryDatabase, Operation};

    fn new_profile(id: Uuid) -> NewProfile {
        NewProfile {
            id,
            username: Some("zoe".to_string()),
            full_name: Some("Zoe Williams".to_string()),
            avatar_url: None,
        }
    }

    #[tokio::test]
    async fn test_ensure_creates_once() {
        let db = Arc::new(MemoryDatabase::new());
        let service = ProfileService::new(db.clone(), None, Duration::from_secs(8));
        let id = Uuid::new_v4();

        let first = service.ensure_profile(new_profile(id)).await.unwrap();
        let second = service.ensure_profile(new_profile(id)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(db.calls(Operation::InsertProfile), 1);
    }

    #[tokio::test]
    async fn test_ensure_without_fallback_surfaces_store_error() {
        let db = Arc::new(MemoryDatabase::new());
        db.fail(Operation::GetProfile);
        let service = ProfileService::new(db.clone(), None, Duration::from_secs(8));

        let err = service.ensure_profile(new_profile(Uuid::new_v4())).await.unwrap_err();
        assert!(matches!(err, AppError::DatabaseError(_)));
    }
}
