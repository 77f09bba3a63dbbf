// In-process store for development without credentials, and for tests.
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::db::query::{FilterValue, Filterable, ListQuery};
use crate::db::repository::{CommentRepository, PostRepository, ProfileRepository};
use crate::models::{AuthorSummary, Comment, Hydrated, NewComment, NewPost, NewProfile, Post, Profile};
use crate::{AppError, Result};

/// Store operations, used to count calls and inject faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListPostsJoined,
    ListPosts,
    GetPost,
    CreatePost,
    LikePost,
    UnlikePost,
    GetProfilesByIds,
    GetProfile,
    InsertProfile,
    ListCommentsJoined,
    ListComments,
    CreateComment,
}

#[derive(Debug, Clone, Copy)]
enum Behavior {
    Fail,
    Stall,
}

#[derive(Default)]
pub struct MemoryDatabase {
    posts: Mutex<HashMap<Uuid, Post>>,
    profiles: Mutex<HashMap<Uuid, Profile>>,
    comments: Mutex<HashMap<Uuid, Comment>>,
    likes: Mutex<HashSet<(Uuid, Uuid)>>, // (post_id, user_id)
    calls: Mutex<HashMap<Operation, usize>>,
    behaviors: Mutex<HashMap<Operation, Behavior>>,
}

// A panicked test thread must not wedge every later call
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_profile(&self, profile: Profile) {
        lock(&self.profiles).insert(profile.id, profile);
    }

    pub fn seed_post(&self, post: Post) {
        lock(&self.posts).insert(post.id, post);
    }

    pub fn seed_comment(&self, comment: Comment) {
        lock(&self.comments).insert(comment.id, comment);
    }

    /// Make every subsequent call to `op` return a database error.
    pub fn fail(&self, op: Operation) {
        lock(&self.behaviors).insert(op, Behavior::Fail);
    }

    /// Make every subsequent call to `op` hang forever.
    pub fn stall(&self, op: Operation) {
        lock(&self.behaviors).insert(op, Behavior::Stall);
    }

    pub fn restore(&self, op: Operation) {
        lock(&self.behaviors).remove(&op);
    }

    pub fn calls(&self, op: Operation) -> usize {
        lock(&self.calls).get(&op).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        lock(&self.calls).values().sum()
    }

    async fn enter(&self, op: Operation) -> Result<()> {
        *lock(&self.calls).entry(op).or_insert(0) += 1;
        let behavior = lock(&self.behaviors).get(&op).copied();
        match behavior {
            Some(Behavior::Fail) => Err(AppError::DatabaseError(format!("simulated failure of {:?}", op))),
            Some(Behavior::Stall) => {
                std::future::pending::<()>().await;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn author_of(&self, author_id: Uuid) -> Option<AuthorSummary> {
        lock(&self.profiles).get(&author_id).map(AuthorSummary::from)
    }
}

impl Filterable for Post {
    fn field(&self, column: &str) -> Option<FilterValue> {
        match column {
            "id" => Some(self.id.into()),
            "author_id" => Some(self.author_id.into()),
            "category" => self.category.clone().map(FilterValue::from),
            "is_published" => Some(self.is_published.into()),
            "created_at" => Some(self.created_at.into()),
            _ => None,
        }
    }
}

impl Filterable for Comment {
    fn field(&self, column: &str) -> Option<FilterValue> {
        match column {
            "id" => Some(self.id.into()),
            "post_id" => Some(self.post_id.into()),
            "author_id" => Some(self.author_id.into()),
            "created_at" => Some(self.created_at.into()),
            _ => None,
        }
    }
}

#[async_trait]
impl PostRepository for MemoryDatabase {
    async fn list_posts_with_authors(&self, query: &ListQuery) -> Result<Vec<Hydrated<Post>>> {
        self.enter(Operation::ListPostsJoined).await?;
        let posts = query.apply(lock(&self.posts).values().cloned().collect::<Vec<_>>());
        Ok(posts
            .into_iter()
            .map(|post| {
                let author = self.author_of(post.author_id);
                Hydrated::new(post, author)
            })
            .collect())
    }

    async fn list_posts(&self, query: &ListQuery) -> Result<Vec<Post>> {
        self.enter(Operation::ListPosts).await?;
        Ok(query.apply(lock(&self.posts).values().cloned().collect::<Vec<_>>()))
    }

    async fn get_post(&self, id: Uuid) -> Result<Option<Post>> {
        self.enter(Operation::GetPost).await?;
        Ok(lock(&self.posts).get(&id).cloned())
    }

    async fn create_post(&self, post: &NewPost) -> Result<Post> {
        self.enter(Operation::CreatePost).await?;
        let now = Utc::now();
        let created = Post {
            id: Uuid::new_v4(),
            author_id: post.author_id,
            title: post.title.clone(),
            content: post.content.clone(),
            category: post.category.clone(),
            tags: post.tags.clone(),
            likes_count: 0,
            comments_count: 0,
            is_published: post.is_published,
            created_at: now,
            updated_at: now,
        };
        lock(&self.posts).insert(created.id, created.clone());
        Ok(created)
    }

    async fn like_post(&self, post_id: Uuid, user_id: Uuid) -> Result<()> {
        self.enter(Operation::LikePost).await?;
        if !lock(&self.posts).contains_key(&post_id) {
            return Err(AppError::NotFound("Post not found".to_string()));
        }
        if !lock(&self.likes).insert((post_id, user_id)) {
            return Err(AppError::Conflict("duplicate key value violates unique constraint".to_string()));
        }
        if let Some(post) = lock(&self.posts).get_mut(&post_id) {
            post.likes_count += 1;
        }
        Ok(())
    }

    async fn unlike_post(&self, post_id: Uuid, user_id: Uuid) -> Result<()> {
        self.enter(Operation::UnlikePost).await?;
        if lock(&self.likes).remove(&(post_id, user_id)) {
            if let Some(post) = lock(&self.posts).get_mut(&post_id) {
                post.likes_count = (post.likes_count - 1).max(0);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileRepository for MemoryDatabase {
    async fn get_profiles_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Profile>> {
        self.enter(Operation::GetProfilesByIds).await?;
        let profiles = lock(&self.profiles);
        Ok(ids.iter().filter_map(|id| profiles.get(id).cloned()).collect())
    }

    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>> {
        self.enter(Operation::GetProfile).await?;
        Ok(lock(&self.profiles).get(&id).cloned())
    }

    async fn insert_profile(&self, profile: &NewProfile) -> Result<Profile> {
        self.enter(Operation::InsertProfile).await?;
        let mut profiles = lock(&self.profiles);
        if profiles.contains_key(&profile.id) {
            return Err(AppError::Conflict("duplicate key value violates unique constraint \"user_profiles_pkey\"".to_string()));
        }
        let now = Utc::now();
        let created = Profile {
            id: profile.id,
            username: profile.username.clone(),
            full_name: profile.full_name.clone(),
            avatar_url: profile.avatar_url.clone(),
            bio: None,
            user_type: None,
            level: 1,
            total_xp: 0,
            created_at: now,
            updated_at: now,
        };
        profiles.insert(created.id, created.clone());
        Ok(created)
    }
}

#[async_trait]
impl CommentRepository for MemoryDatabase {
    async fn list_comments_with_authors(&self, query: &ListQuery) -> Result<Vec<Hydrated<Comment>>> {
        self.enter(Operation::ListCommentsJoined).await?;
        let comments = query.apply(lock(&self.comments).values().cloned().collect::<Vec<_>>());
        Ok(comments
            .into_iter()
            .map(|comment| {
                let author = self.author_of(comment.author_id);
                Hydrated::new(comment, author)
            })
            .collect())
    }

    async fn list_comments(&self, query: &ListQuery) -> Result<Vec<Comment>> {
        self.enter(Operation::ListComments).await?;
        Ok(query.apply(lock(&self.comments).values().cloned().collect::<Vec<_>>()))
    }

    async fn create_comment(&self, comment: &NewComment) -> Result<Comment> {
        self.enter(Operation::CreateComment).await?;
        if !lock(&self.posts).contains_key(&comment.post_id) {
            return Err(AppError::NotFound("Post not found".to_string()));
        }
        let created = Comment {
            id: Uuid::new_v4(),
            post_id: comment.post_id,
            author_id: comment.author_id,
            content: comment.content.clone(),
            created_at: Utc::now(),
        };
        lock(&self.comments).insert(created.id, created.clone());
        if let Some(post) = lock(&self.posts).get_mut(&comment.post_id) {
            post.comments_count += 1;
        }
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_duplicate_like_is_conflict() {
        let db = MemoryDatabase::new();
        let author = Uuid::new_v4();
        let post = db
            .create_post(&NewPost {
                author_id: author,
                title: "Hello".to_string(),
                content: "First post".to_string(),
                category: None,
                tags: vec![],
                is_published: true,
            })
            .await
            .unwrap();

        db.like_post(post.id, author).await.unwrap();
        let err = db.like_post(post.id, author).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(db.get_post(post.id).await.unwrap().unwrap().likes_count, 1);
    }

    #[tokio::test]
    async fn test_injected_failure_is_counted() {
        let db = MemoryDatabase::new();
        db.fail(Operation::ListPosts);
        assert!(db.list_posts(&ListQuery::new()).await.is_err());
        assert_eq!(db.calls(Operation::ListPosts), 1);

        db.restore(Operation::ListPosts);
        assert!(db.list_posts(&ListQuery::new()).await.unwrap().is_empty());
        assert_eq!(db.calls(Operation::ListPosts), 2);
    }
}
