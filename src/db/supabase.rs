// Supabase repository implementations over the PostgREST interface
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::query::ListQuery;
use crate::db::repository::{
    CommentRepository, PostRepository, ProfileRepository, COMMENTS_TABLE, LIKES_TABLE, POSTS_TABLE, PROFILES_TABLE,
};
use crate::models::{Comment, Hydrated, NewComment, NewPost, NewProfile, Post, Profile};
use crate::{AppError, Result};

/// Embedded author resource, aliased so it deserializes straight into `Hydrated::author`.
pub const POST_WITH_AUTHOR_SELECT: &str =
    "*,author:user_profiles!community_posts_author_id_fkey(id,username,full_name,avatar_url)";
pub const COMMENT_WITH_AUTHOR_SELECT: &str =
    "*,author:user_profiles!community_comments_author_id_fkey(id,username,full_name,avatar_url)";

/// Thin PostgREST client: table-scoped select/insert/delete with filters.
#[derive(Clone)]
pub struct SupabaseClient {
    http: reqwest::Client,
    rest_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct PostgrestError {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
}

/// Map a PostgREST error body onto the application error classes.
pub fn classify_postgrest_error(status: u16, body: &str) -> AppError {
    let parsed: Option<PostgrestError> = serde_json::from_str(body).ok();
    let (code, message) = match parsed {
        Some(err) => {
            let message = match (err.message, err.details) {
                (Some(m), Some(d)) => format!("{} ({})", m, d),
                (Some(m), None) => m,
                (None, Some(d)) => d,
                (None, None) => body.to_string(),
            };
            (err.code, message)
        }
        None => (None, body.to_string()),
    };

    match code.as_deref() {
        Some("23505") => AppError::Conflict(message),
        Some("PGRST116") | Some("23503") => AppError::NotFound(message),
        _ if status == 404 => AppError::NotFound(message),
        _ if status == 408 || status == 504 => AppError::Timeout(message),
        _ => AppError::DatabaseError(format!("PostgREST {}: {}", status, message)),
    }
}

// "0-24/3573" or "*/0"
fn parse_content_range_total(value: &str) -> Option<i64> {
    value.rsplit('/').next()?.trim().parse().ok()
}

impl SupabaseClient {
    pub fn new(url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::InternalError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            rest_url: format!("{}/rest/v1", url.trim_end_matches('/')),
            api_key: api_key.to_string(),
        })
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/{}", self.rest_url, table))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_postgrest_error(status.as_u16(), &body))
    }

    async fn check_status(response: Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_postgrest_error(status.as_u16(), &body))
    }

    pub async fn select<T: DeserializeOwned>(&self, table: &str, columns: &str, query: &ListQuery) -> Result<Vec<T>> {
        let mut params = vec![("select".to_string(), columns.to_string())];
        params.extend(query.to_postgrest_params());

        let response = self.request(Method::GET, table).query(&params).send().await?;
        Self::read_json(response).await
    }

    pub async fn select_one<T: DeserializeOwned>(&self, table: &str, query: ListQuery) -> Result<Option<T>> {
        let rows: Vec<T> = self.select(table, "*", &query.limit(1)).await?;
        Ok(rows.into_iter().next())
    }

    /// Insert one row and return the stored representation.
    pub async fn insert<B: Serialize + ?Sized, T: DeserializeOwned>(&self, table: &str, body: &B) -> Result<T> {
        let response = self
            .request(Method::POST, table)
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;
        let rows: Vec<T> = Self::read_json(response).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| AppError::DatabaseError(format!("Insert into {} returned no rows", table)))
    }

    pub async fn insert_minimal<B: Serialize + ?Sized>(&self, table: &str, body: &B) -> Result<()> {
        let response = self
            .request(Method::POST, table)
            .header("Prefer", "return=minimal")
            .json(body)
            .send()
            .await?;
        Self::check_status(response).await
    }

    /// Exact row count for `query`, read from the `Content-Range` header of a HEAD request.
    pub async fn count(&self, table: &str, query: &ListQuery) -> Result<i64> {
        let response = self
            .request(Method::HEAD, table)
            .header("Prefer", "count=exact")
            .query(&query.to_postgrest_params())
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(classify_postgrest_error(status.as_u16(), ""));
        }

        response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
            .ok_or_else(|| AppError::DatabaseError(format!("Missing row count for {}", table)))
    }

    pub async fn update<B: Serialize + ?Sized>(&self, table: &str, query: &ListQuery, body: &B) -> Result<()> {
        let response = self
            .request(Method::PATCH, table)
            .header("Prefer", "return=minimal")
            .query(&query.to_postgrest_params())
            .json(body)
            .send()
            .await?;
        Self::check_status(response).await
    }

    pub async fn delete(&self, table: &str, query: &ListQuery) -> Result<()> {
        let response = self
            .request(Method::DELETE, table)
            .query(&query.to_postgrest_params())
            .send()
            .await?;
        Self::check_status(response).await
    }
}

pub struct SupabaseRepository {
    client: SupabaseClient,
}

impl SupabaseRepository {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }
}

#[derive(Serialize)]
struct LikeRow {
    post_id: Uuid,
    user_id: Uuid,
}

#[derive(Serialize)]
struct LikesCount {
    likes_count: i64,
}

#[derive(Serialize)]
struct CommentsCount {
    comments_count: i64,
}

impl SupabaseRepository {
    /// Recompute `community_posts.likes_count` from the likes table.
    async fn refresh_likes_count(&self, post_id: Uuid) -> Result<()> {
        let likes_count = self.client.count(LIKES_TABLE, &ListQuery::new().eq("post_id", post_id)).await?;
        self.client
            .update(POSTS_TABLE, &ListQuery::new().eq("id", post_id), &LikesCount { likes_count })
            .await
    }

    /// Recompute `community_posts.comments_count` from the comments table.
    async fn refresh_comments_count(&self, post_id: Uuid) -> Result<()> {
        let comments_count = self.client.count(COMMENTS_TABLE, &ListQuery::new().eq("post_id", post_id)).await?;
        self.client
            .update(POSTS_TABLE, &ListQuery::new().eq("id", post_id), &CommentsCount { comments_count })
            .await
    }

    // The row write already succeeded; a stale counter is healed by the next refresh
    fn refresh_or_warn(&self, what: &str, post_id: Uuid, refresh: Result<()>) {
        if let Err(e) = refresh {
            tracing::warn!("⚠️ SUPABASE: Failed to refresh {} for post {}: {}", what, post_id, e);
        }
    }
}

#[async_trait]
impl PostRepository for SupabaseRepository {
    async fn list_posts_with_authors(&self, query: &ListQuery) -> Result<Vec<Hydrated<Post>>> {
        self.client.select(POSTS_TABLE, POST_WITH_AUTHOR_SELECT, query).await
    }

    async fn list_posts(&self, query: &ListQuery) -> Result<Vec<Post>> {
        self.client.select(POSTS_TABLE, "*", query).await
    }

    async fn get_post(&self, id: Uuid) -> Result<Option<Post>> {
        self.client.select_one(POSTS_TABLE, ListQuery::new().eq("id", id)).await
    }

    async fn create_post(&self, post: &NewPost) -> Result<Post> {
        self.client.insert(POSTS_TABLE, post).await
    }

    async fn like_post(&self, post_id: Uuid, user_id: Uuid) -> Result<()> {
        self.client.insert_minimal(LIKES_TABLE, &LikeRow { post_id, user_id }).await?;
        let refresh = self.refresh_likes_count(post_id).await;
        self.refresh_or_warn("likes_count", post_id, refresh);
        Ok(())
    }

    async fn unlike_post(&self, post_id: Uuid, user_id: Uuid) -> Result<()> {
        let query = ListQuery::new().eq("post_id", post_id).eq("user_id", user_id);
        self.client.delete(LIKES_TABLE, &query).await?;
        let refresh = self.refresh_likes_count(post_id).await;
        self.refresh_or_warn("likes_count", post_id, refresh);
        Ok(())
    }
}

#[async_trait]
impl ProfileRepository for SupabaseRepository {
    async fn get_profiles_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Profile>> {
        let query = ListQuery::new().in_("id", ids.iter().copied());
        self.client.select(PROFILES_TABLE, "*", &query).await
    }

    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>> {
        self.client.select_one(PROFILES_TABLE, ListQuery::new().eq("id", id)).await
    }

    async fn insert_profile(&self, profile: &NewProfile) -> Result<Profile> {
        self.client.insert(PROFILES_TABLE, profile).await
    }
}

#[async_trait]
impl CommentRepository for SupabaseRepository {
    async fn list_comments_with_authors(&self, query: &ListQuery) -> Result<Vec<Hydrated<Comment>>> {
        self.client.select(COMMENTS_TABLE, COMMENT_WITH_AUTHOR_SELECT, query).await
    }

    async fn list_comments(&self, query: &ListQuery) -> Result<Vec<Comment>> {
        self.client.select(COMMENTS_TABLE, "*", query).await
    }

    async fn create_comment(&self, comment: &NewComment) -> Result<Comment> {
        let created: Comment = self.client.insert(COMMENTS_TABLE, comment).await?;
        let refresh = self.refresh_comments_count(created.post_id).await;
        self.refresh_or_warn("comments_count", created.post_id, refresh);
        Ok(created)
    }
}
