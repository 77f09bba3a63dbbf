use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub user_type: Option<String>, // e.g. "game_developer", "client", "community_member"
    #[serde(default = "default_level")]
    pub level: i32,
    #[serde(default)]
    pub total_xp: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_level() -> i32 {
    1
}

/// Author fields copied onto posts and comments for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorSummary {
    pub id: Uuid,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl From<&Profile> for AuthorSummary {
    fn from(profile: &Profile) -> Self {
        Self {
            id: profile.id,
            username: profile.username.clone(),
            full_name: profile.full_name.clone(),
            avatar_url: profile.avatar_url.clone(),
        }
    }
}

/// Row inserted when a signed-in user has no profile yet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProfile {
    pub id: Uuid,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EnsureProfileRequest {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl EnsureProfileRequest {
    pub fn into_new_profile(self, user_id: Uuid, email: Option<&str>) -> NewProfile {
        // Fall back to the local part of the e-mail address for a username
        let username = self.username.or_else(|| {
            email.and_then(|e| e.split('@').next()).filter(|s| !s.is_empty()).map(str::to_string)
        });
        NewProfile {
            id: user_id,
            username,
            full_name: self.full_name,
            avatar_url: self.avatar_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_defaults_to_email_local_part() {
        let id = Uuid::new_v4();
        let profile = EnsureProfileRequest::default().into_new_profile(id, Some("mrpiglr@aethex.dev"));
        assert_eq!(profile.username.as_deref(), Some("mrpiglr"));

        let explicit = EnsureProfileRequest { username: Some("piglr".to_string()), ..Default::default() }
            .into_new_profile(id, Some("mrpiglr@aethex.dev"));
        assert_eq!(explicit.username.as_deref(), Some("piglr"));
    }

    #[test]
    fn test_profile_defaults_when_columns_missing() {
        let profile: Profile = serde_json::from_value(serde_json::json!({
            "id": "550e8400-e29b-41d4-a716-446655440001",
            "username": "alex",
            "full_name": null,
            "avatar_url": null,
            "bio": null,
            "user_type": null,
            "created_at": "2024-05-01T12:00:00Z",
            "updated_at": "2024-05-01T12:00:00Z"
        }))
        .unwrap();
        assert_eq!(profile.level, 1);
        assert_eq!(profile.total_xp, 0);
    }
}
