// Client for the project's own REST API (`/api/...`), used as the last read fallback
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Response;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use uuid::Uuid;

use crate::models::{Comment, Hydrated, NewPost, NewProfile, Post, Profile};
use crate::{AppError, Result};

#[async_trait]
pub trait CompanionApi: Send + Sync {
    async fn list_posts(&self, limit: u32) -> Result<Vec<Hydrated<Post>>>;
    async fn list_comments(&self, post_id: Uuid, limit: u32) -> Result<Vec<Hydrated<Comment>>>;
    async fn create_post(&self, post: &NewPost) -> Result<Post>;
    async fn ensure_profile(&self, profile: &NewProfile) -> Result<Profile>;
    async fn health(&self) -> Result<()>;
}

// List endpoints answer with a bare array or a wrapped one
#[derive(Deserialize)]
#[serde(untagged)]
enum ListBody<T> {
    Bare(Vec<T>),
    Posts { posts: Vec<T> },
    Comments { comments: Vec<T> },
}

impl<T> ListBody<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            ListBody::Bare(items) | ListBody::Posts { posts: items } | ListBody::Comments { comments: items } => items,
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

pub struct CompanionClient {
    http: reqwest::Client,
    base_url: String,
}

impl CompanionClient {
    /// `timeout` bounds every request on top of any caller-side deadline.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::InternalError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.error)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());

        Err(AppError::UpstreamError { status: status.as_u16(), message })
    }
}

#[async_trait]
impl CompanionApi for CompanionClient {
    async fn list_posts(&self, limit: u32) -> Result<Vec<Hydrated<Post>>> {
        let response = self
            .http
            .get(self.url("posts"))
            .query(&[("limit", limit)])
            .send()
            .await?;
        let body: ListBody<Hydrated<Post>> = Self::read_json(response).await?;
        Ok(body.into_vec())
    }

    async fn list_comments(&self, post_id: Uuid, limit: u32) -> Result<Vec<Hydrated<Comment>>> {
        let response = self
            .http
            .get(self.url(&format!("posts/{}/comments", post_id)))
            .query(&[("limit", limit)])
            .send()
            .await?;
        let body: ListBody<Hydrated<Comment>> = Self::read_json(response).await?;
        Ok(body.into_vec())
    }

    async fn create_post(&self, post: &NewPost) -> Result<Post> {
        let response = self.http.post(self.url("posts")).json(post).send().await?;
        Self::read_json(response).await
    }

    async fn ensure_profile(&self, profile: &NewProfile) -> Result<Profile> {
        let response = self.http.post(self.url("profile/ensure")).json(profile).send().await?;
        Self::read_json(response).await
    }

    async fn health(&self) -> Result<()> {
        let response = self.http.get(self.url("health")).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(AppError::UpstreamError {
                status: status.as_u16(),
                message: "health check failed".to_string(),
            })
        }
    }
}
