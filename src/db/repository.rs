// Repository trait abstractions for the community data store
use crate::db::query::ListQuery;
use crate::models::{Comment, Hydrated, NewComment, NewPost, NewProfile, Post, Profile};
use crate::Result;
use uuid::Uuid;
use async_trait::async_trait;

pub const POSTS_TABLE: &str = "community_posts";
pub const COMMENTS_TABLE: &str = "community_comments";
pub const LIKES_TABLE: &str = "community_post_likes";
pub const PROFILES_TABLE: &str = "user_profiles";

#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Posts with the author profile embedded by the store itself.
    async fn list_posts_with_authors(&self, query: &ListQuery) -> Result<Vec<Hydrated<Post>>>;
    async fn list_posts(&self, query: &ListQuery) -> Result<Vec<Post>>;
    async fn get_post(&self, id: Uuid) -> Result<Option<Post>>;
    async fn create_post(&self, post: &NewPost) -> Result<Post>;
    /// Fails with `AppError::Conflict` when the like already exists.
    async fn like_post(&self, post_id: Uuid, user_id: Uuid) -> Result<()>;
    async fn unlike_post(&self, post_id: Uuid, user_id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// One round trip for any number of ids. Unknown ids are simply absent.
    async fn get_profiles_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Profile>>;
    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>>;
    /// Fails with `AppError::Conflict` when the profile already exists.
    async fn insert_profile(&self, profile: &NewProfile) -> Result<Profile>;
}

#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn list_comments_with_authors(&self, query: &ListQuery) -> Result<Vec<Hydrated<Comment>>>;
    async fn list_comments(&self, query: &ListQuery) -> Result<Vec<Comment>>;
    async fn create_comment(&self, comment: &NewComment) -> Result<Comment>;
}
