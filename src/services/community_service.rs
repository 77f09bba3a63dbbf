use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::db::companion::CompanionApi;
use crate::db::query::ListQuery;
use crate::db::repository::{CommentRepository, PostRepository, ProfileRepository};
use crate::models::comment::CreateCommentRequest;
use crate::models::post::CreatePostRequest;
use crate::models::{AuthorSummary, Comment, FeedQuery, HasAuthor, Hydrated, NewComment, NewPost, Post};
use crate::utils::fallback::{resolve_with_fallback, with_deadline, FallbackConfig, Resolved, Strategy};
use crate::{AppError, Result};

pub const STRATEGY_JOINED: &str = "joined_query";
pub const STRATEGY_HYDRATED: &str = "flat_query_with_hydration";
pub const STRATEGY_COMPANION: &str = "companion_api";

const MAX_TITLE_CHARS: usize = 200;
const MAX_POST_CHARS: usize = 10_000;
const MAX_COMMENT_CHARS: usize = 2_000;
const MAX_TAGS: usize = 10;
const MAX_TAG_CHARS: usize = 32;

/// Attach author summaries using a single batched profile lookup.
///
/// The lookup is keyed by the distinct author ids and bounded by `lookup_timeout`.
/// If it fails or overruns, every item is returned with `author: None` instead
/// of failing the whole read.
pub async fn hydrate_authors<T: HasAuthor>(
    items: Vec<T>,
    profiles: &dyn ProfileRepository,
    lookup_timeout: Duration,
) -> Vec<Hydrated<T>> {
    if items.is_empty() {
        return Vec::new();
    }

    let ids: Vec<Uuid> = items
        .iter()
        .map(HasAuthor::author_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let lookup = with_deadline(lookup_timeout, "author lookup", profiles.get_profiles_by_ids(&ids));
    let authors: HashMap<Uuid, AuthorSummary> = match lookup.await {
        Ok(found) => found.iter().map(|p| (p.id, AuthorSummary::from(p))).collect(),
        Err(e) => {
            tracing::warn!("⚠️ HYDRATION: Author lookup for {} ids failed: {}", ids.len(), e);
            HashMap::new()
        }
    };

    items
        .into_iter()
        .map(|item| {
            let author = authors.get(&item.author_id()).cloned();
            Hydrated::new(item, author)
        })
        .collect()
}

// Share of the attempt budget left for the author lookup, so a stalled lookup
// still leaves time to return the posts already fetched
fn hydration_budget(fallback: &FallbackConfig) -> Duration {
    fallback.attempt_timeout / 2
}

pub struct CommunityService {
    post_repo: Arc<dyn PostRepository>,
    profile_repo: Arc<dyn ProfileRepository>,
    comment_repo: Arc<dyn CommentRepository>,
    companion: Option<Arc<dyn CompanionApi>>,
    fallback: FallbackConfig,
}

impl CommunityService {
    pub fn new(
        post_repo: Arc<dyn PostRepository>,
        profile_repo: Arc<dyn ProfileRepository>,
        comment_repo: Arc<dyn CommentRepository>,
        companion: Option<Arc<dyn CompanionApi>>,
        fallback: FallbackConfig,
    ) -> Self {
        Self {
            post_repo,
            profile_repo,
            comment_repo,
            companion,
            fallback,
        }
    }

    /// Community feed. Never fails: an empty list means every path was unavailable.
    pub async fn get_posts(&self, feed: &FeedQuery) -> Vec<Hydrated<Post>> {
        self.resolve_posts(feed).await.into_value()
    }

    pub async fn resolve_posts(&self, feed: &FeedQuery) -> Resolved<Vec<Hydrated<Post>>> {
        let query = &feed.to_list_query();
        let this = self;

        let mut strategies = vec![
            Strategy::new(STRATEGY_JOINED, move || this.post_repo.list_posts_with_authors(query)),
            Strategy::new(STRATEGY_HYDRATED, move || async move {
                let posts = this.post_repo.list_posts(query).await?;
                Ok(hydrate_authors(posts, this.profile_repo.as_ref(), hydration_budget(&this.fallback)).await)
            }),
        ];

        if let Some(companion) = self.companion.clone() {
            let limit = feed.limit;
            strategies.push(Strategy::new(STRATEGY_COMPANION, move || async move {
                let mut posts = companion.list_posts(limit).await?;
                posts.retain(|p| feed.matches(&p.item));
                posts.truncate(limit as usize);
                Ok(posts)
            }));
        }

        resolve_with_fallback(strategies, &self.fallback, Vec::new()).await
    }

    /// Comments on a post, oldest first, with the same fallback chain as the feed.
    pub async fn get_comments(&self, post_id: Uuid, limit: u32) -> Vec<Hydrated<Comment>> {
        self.resolve_comments(post_id, limit).await.into_value()
    }

    pub async fn resolve_comments(&self, post_id: Uuid, limit: u32) -> Resolved<Vec<Hydrated<Comment>>> {
        let query = &ListQuery::new()
            .eq("post_id", post_id)
            .order_by("created_at", true)
            .limit(limit);
        let this = self;

        let mut strategies = vec![
            Strategy::new(STRATEGY_JOINED, move || this.comment_repo.list_comments_with_authors(query)),
            Strategy::new(STRATEGY_HYDRATED, move || async move {
                let comments = this.comment_repo.list_comments(query).await?;
                Ok(hydrate_authors(comments, this.profile_repo.as_ref(), hydration_budget(&this.fallback)).await)
            }),
        ];

        if let Some(companion) = self.companion.clone() {
            strategies.push(Strategy::new(STRATEGY_COMPANION, move || async move {
                let mut comments = companion.list_comments(post_id, limit).await?;
                comments.retain(|c| c.item.post_id == post_id);
                comments.truncate(limit as usize);
                Ok(comments)
            }));
        }

        resolve_with_fallback(strategies, &self.fallback, Vec::new()).await
    }

    pub async fn get_post(&self, post_id: Uuid) -> Result<Post> {
        with_deadline(self.fallback.attempt_timeout, "get_post", self.post_repo.get_post(post_id))
            .await?
            .ok_or_else(|| AppError::NotFound("Post not found".to_string()))
    }

    pub async fn create_post(&self, author_id: Uuid, request: CreatePostRequest) -> Result<Post> {
        let new_post = validate_post(author_id, request)?;
        let limit = self.fallback.attempt_timeout;

        match with_deadline(limit, "create_post", self.post_repo.create_post(&new_post)).await {
            Ok(post) => {
                tracing::info!("📝 POSTS: Created post {} by {}", post.id, author_id);
                Ok(post)
            }
            Err(e) if e.is_transient() => match &self.companion {
                Some(companion) => {
                    tracing::warn!("⚠️ POSTS: Primary insert failed ({}), retrying through companion API", e);
                    with_deadline(limit, "companion create_post", companion.create_post(&new_post)).await
                }
                None => Err(e),
            },
            Err(e) => Err(e),
        }
    }

    /// Idempotent: liking twice is not an error.
    pub async fn like_post(&self, post_id: Uuid, user_id: Uuid) -> Result<()> {
        let limit = self.fallback.attempt_timeout;
        match with_deadline(limit, "like_post", self.post_repo.like_post(post_id, user_id)).await {
            Err(e) if e.is_conflict() => {
                tracing::debug!("Like on {} by {} already recorded", post_id, user_id);
                Ok(())
            }
            other => other,
        }
    }

    /// Idempotent: removing a missing like is not an error.
    pub async fn unlike_post(&self, post_id: Uuid, user_id: Uuid) -> Result<()> {
        let limit = self.fallback.attempt_timeout;
        match with_deadline(limit, "unlike_post", self.post_repo.unlike_post(post_id, user_id)).await {
            Err(e) if e.is_not_found() => Ok(()),
            other => other,
        }
    }

    pub async fn add_comment(&self, post_id: Uuid, author_id: Uuid, request: CreateCommentRequest) -> Result<Comment> {
        let content = request.content.trim();
        if content.is_empty() {
            return Err(AppError::ValidationError("Comment cannot be empty".to_string()));
        }
        if content.chars().count() > MAX_COMMENT_CHARS {
            return Err(AppError::ValidationError(format!(
                "Comment must be at most {} characters", MAX_COMMENT_CHARS
            )));
        }

        let new_comment = NewComment {
            post_id,
            author_id,
            content: content.to_string(),
        };
        with_deadline(
            self.fallback.attempt_timeout,
            "create_comment",
            self.comment_repo.create_comment(&new_comment),
        )
        .await
    }
}

fn validate_post(author_id: Uuid, request: CreatePostRequest) -> Result<NewPost> {
    let title = request.title.trim();
    let content = request.content.trim();

    if title.is_empty() {
        return Err(AppError::ValidationError("Title is required".to_string()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(AppError::ValidationError(format!("Title must be at most {} characters", MAX_TITLE_CHARS)));
    }
    if content.is_empty() {
        return Err(AppError::ValidationError("Content is required".to_string()));
    }
    if content.chars().count() > MAX_POST_CHARS {
        return Err(AppError::ValidationError(format!("Content must be at most {} characters", MAX_POST_CHARS)));
    }

    let mut tags: Vec<String> = Vec::new();
    for tag in request.tags {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() || tags.contains(&tag) {
            continue;
        }
        if tag.chars().count() > MAX_TAG_CHARS {
            return Err(AppError::ValidationError(format!("Tags must be at most {} characters", MAX_TAG_CHARS)));
        }
        tags.push(tag);
    }
    if tags.len() > MAX_TAGS {
        return Err(AppError::ValidationError(format!("At most {} tags are allowed", MAX_TAGS)));
    }

    let category = request
        .category
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty());

    Ok(NewPost {
        author_id,
        title: title.to_string(),
        content: content.to_string(),
        category,
        tags,
        is_published: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::{MemoryDatabase, Operation};
    use crate::models::{NewProfile, Profile};
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn profile(id: Uuid, username: &str) -> Profile {
        let now = Utc::now();
        Profile {
            id,
            username: Some(username.to_string()),
            full_name: Some(format!("{} full", username)),
            avatar_url: None,
            bio: None,
            user_type: Some("community_member".to_string()),
            level: 1,
            total_xp: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn post(author_id: Uuid, minutes_ago: i64) -> Post {
        let at = Utc::now() - ChronoDuration::minutes(minutes_ago);
        Post {
            id: Uuid::new_v4(),
            author_id,
            title: format!("Post from {} minutes ago", minutes_ago),
            content: "Hello AeThex".to_string(),
            category: Some("general".to_string()),
            tags: vec![],
            likes_count: 0,
            comments_count: 0,
            is_published: true,
            created_at: at,
            updated_at: at,
        }
    }

    struct StubCompanion {
        posts: Vec<Hydrated<Post>>,
        comments: Vec<Hydrated<Comment>>,
        list_calls: AtomicUsize,
        create_calls: AtomicUsize,
    }

    impl StubCompanion {
        fn new(posts: Vec<Hydrated<Post>>) -> Self {
            Self {
                posts,
                comments: vec![],
                list_calls: AtomicUsize::new(0),
                create_calls: AtomicUsize::new(0),
            }
        }

        fn with_comments(mut self, comments: Vec<Hydrated<Comment>>) -> Self {
            self.comments = comments;
            self
        }
    }

    #[async_trait]
    impl CompanionApi for StubCompanion {
        async fn list_posts(&self, _limit: u32) -> Result<Vec<Hydrated<Post>>> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.posts.clone())
        }

        async fn list_comments(&self, _post_id: Uuid, _limit: u32) -> Result<Vec<Hydrated<Comment>>> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.comments.clone())
        }

        async fn create_post(&self, post: &NewPost) -> Result<Post> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            let mut created = self::post(post.author_id, 0);
            created.title = post.title.clone();
            Ok(created)
        }

        async fn ensure_profile(&self, _profile: &NewProfile) -> Result<Profile> {
            Err(AppError::InternalError("unused".to_string()))
        }

        async fn health(&self) -> Result<()> {
            Ok(())
        }
    }

    fn service(db: &Arc<MemoryDatabase>, companion: Option<Arc<dyn CompanionApi>>) -> CommunityService {
        CommunityService::new(db.clone(), db.clone(), db.clone(), companion, FallbackConfig::default())
    }

    /// 5 posts by 3 distinct authors; the third author has no profile row.
    fn seed_feed(db: &MemoryDatabase) -> [Uuid; 3] {
        let authors = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        db.seed_profile(profile(authors[0], "alex"));
        db.seed_profile(profile(authors[1], "sarah"));
        for (i, author) in [0, 1, 2, 0, 1].into_iter().enumerate() {
            db.seed_post(post(authors[author], i as i64));
        }
        authors
    }

    #[tokio::test]
    async fn test_joined_query_serves_feed_without_fallback() {
        let db = Arc::new(MemoryDatabase::new());
        seed_feed(&db);
        let companion = Arc::new(StubCompanion::new(vec![]));
        let service = service(&db, Some(companion.clone()));

        let resolved = service.resolve_posts(&FeedQuery::with_limit(10)).await;

        assert_eq!(resolved.source, Some(STRATEGY_JOINED));
        assert_eq!(resolved.value.len(), 5);
        assert_eq!(db.calls(Operation::ListPosts), 0);
        assert_eq!(db.calls(Operation::GetProfilesByIds), 0);
        assert_eq!(companion.list_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_flat_fallback_issues_two_queries_and_hydrates_authors() {
        let db = Arc::new(MemoryDatabase::new());
        let authors = seed_feed(&db);
        db.fail(Operation::ListPostsJoined);
        let service = service(&db, None);

        let resolved = service.resolve_posts(&FeedQuery::with_limit(10)).await;

        assert_eq!(resolved.source, Some(STRATEGY_HYDRATED));
        assert_eq!(resolved.value.len(), 5);
        // One flat posts query plus one batched profile lookup
        assert_eq!(db.calls(Operation::ListPosts), 1);
        assert_eq!(db.calls(Operation::GetProfilesByIds), 1);
        assert_eq!(db.total_calls() - db.calls(Operation::ListPostsJoined), 2);

        for hydrated in &resolved.value {
            let author_id = hydrated.item.author_id;
            if author_id == authors[2] {
                assert!(hydrated.author.is_none());
            } else {
                let author = hydrated.author.as_ref().expect("author should be hydrated");
                assert_eq!(author.id, author_id);
                let expected = if author_id == authors[0] { "alex" } else { "sarah" };
                assert_eq!(author.username.as_deref(), Some(expected));
            }
        }

        // Newest first
        let times: Vec<_> = resolved.value.iter().map(|p| p.item.created_at).collect();
        assert!(times.windows(2).all(|w| w[0] >= w[1]));
    }

    #[tokio::test]
    async fn test_failed_author_lookup_leaves_authors_null() {
        let db = Arc::new(MemoryDatabase::new());
        seed_feed(&db);
        db.fail(Operation::ListPostsJoined);
        db.fail(Operation::GetProfilesByIds);
        let service = service(&db, None);

        let resolved = service.resolve_posts(&FeedQuery::with_limit(10)).await;

        assert_eq!(resolved.source, Some(STRATEGY_HYDRATED));
        assert_eq!(resolved.value.len(), 5);
        assert!(resolved.value.iter().all(|p| p.author.is_none()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_joined_query_times_out_into_flat_path() {
        let db = Arc::new(MemoryDatabase::new());
        seed_feed(&db);
        db.stall(Operation::ListPostsJoined);
        let service = service(&db, None);

        let resolved = service.resolve_posts(&FeedQuery::with_limit(3)).await;

        assert_eq!(resolved.source, Some(STRATEGY_HYDRATED));
        assert_eq!(resolved.value.len(), 3);
        assert!(matches!(resolved.failures[0].error, AppError::Timeout(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_author_lookup_keeps_fetched_posts() {
        let db = Arc::new(MemoryDatabase::new());
        seed_feed(&db);
        db.fail(Operation::ListPostsJoined);
        db.stall(Operation::GetProfilesByIds);
        let service = CommunityService::new(db.clone(), db.clone(), db.clone(), None, FallbackConfig::from_millis(250));

        let resolved = service.resolve_posts(&FeedQuery::with_limit(10)).await;

        assert_eq!(resolved.source, Some(STRATEGY_HYDRATED));
        assert_eq!(resolved.failures.len(), 1);
        assert_eq!(resolved.value.len(), 5);
        assert!(resolved.value.iter().all(|p| p.author.is_none()));
        assert_eq!(db.calls(Operation::GetProfilesByIds), 1);
    }

    #[tokio::test]
    async fn test_companion_comments_are_scoped_and_truncated() {
        let db = Arc::new(MemoryDatabase::new());
        db.fail(Operation::ListCommentsJoined);
        db.fail(Operation::ListComments);

        let author = Uuid::new_v4();
        let target = Uuid::new_v4();
        let comment = |post_id: Uuid, content: &str| {
            Hydrated::without_author(Comment {
                id: Uuid::new_v4(),
                post_id,
                author_id: author,
                content: content.to_string(),
                created_at: Utc::now(),
            })
        };
        let companion = Arc::new(StubCompanion::new(vec![]).with_comments(vec![
            comment(target, "first"),
            comment(Uuid::new_v4(), "elsewhere"),
            comment(target, "second"),
            comment(target, "third"),
        ]));
        let service = service(&db, Some(companion.clone()));

        let resolved = service.resolve_comments(target, 2).await;

        assert_eq!(resolved.source, Some(STRATEGY_COMPANION));
        let contents: Vec<&str> = resolved.value.iter().map(|c| c.item.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second"]);
        assert_eq!(companion.list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_companion_api_is_last_resort() {
        let db = Arc::new(MemoryDatabase::new());
        let author = Uuid::new_v4();
        db.fail(Operation::ListPostsJoined);
        db.fail(Operation::ListPosts);

        let mut hidden = post(author, 1);
        hidden.is_published = false;
        let companion = Arc::new(StubCompanion::new(vec![
            Hydrated::without_author(post(author, 0)),
            Hydrated::without_author(hidden),
        ]));
        let service = service(&db, Some(companion.clone()));

        let resolved = service.resolve_posts(&FeedQuery::with_limit(10)).await;

        assert_eq!(resolved.source, Some(STRATEGY_COMPANION));
        assert_eq!(resolved.value.len(), 1);
        assert_eq!(companion.list_calls.load(Ordering::SeqCst), 1);
        // The flat path failed before any hydration lookup
        assert_eq!(db.calls(Operation::GetProfilesByIds), 0);
    }

    #[tokio::test]
    async fn test_all_strategies_failing_returns_empty_feed() {
        let db = Arc::new(MemoryDatabase::new());
        seed_feed(&db);
        db.fail(Operation::ListPostsJoined);
        db.fail(Operation::ListPosts);
        let service = service(&db, None);

        let posts = service.get_posts(&FeedQuery::default()).await;
        assert!(posts.is_empty());
    }

    #[tokio::test]
    async fn test_hydrating_nothing_skips_lookup() {
        let db = MemoryDatabase::new();
        let hydrated = hydrate_authors(Vec::<Post>::new(), &db, Duration::from_secs(1)).await;
        assert!(hydrated.is_empty());
        assert_eq!(db.calls(Operation::GetProfilesByIds), 0);
    }

    #[tokio::test]
    async fn test_feed_filters_by_category() {
        let db = Arc::new(MemoryDatabase::new());
        let author = Uuid::new_v4();
        let mut showcase = post(author, 0);
        showcase.category = Some("showcase".to_string());
        db.seed_post(showcase.clone());
        db.seed_post(post(author, 1));
        let service = service(&db, None);

        let feed = FeedQuery { limit: 10, category: Some("showcase".to_string()), author_id: None };
        let posts = service.get_posts(&feed).await;
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].item.id, showcase.id);
    }

    #[tokio::test]
    async fn test_comments_fall_back_to_hydration() {
        let db = Arc::new(MemoryDatabase::new());
        let author = Uuid::new_v4();
        db.seed_profile(profile(author, "mike"));
        let target = post(author, 0);
        db.seed_post(target.clone());
        let service = service(&db, None);

        service
            .add_comment(target.id, author, CreateCommentRequest { content: "  Nice work!  ".to_string() })
            .await
            .unwrap();
        db.fail(Operation::ListCommentsJoined);

        let resolved = service.resolve_comments(target.id, 20).await;
        assert_eq!(resolved.source, Some(STRATEGY_HYDRATED));
        assert_eq!(resolved.value.len(), 1);
        assert_eq!(resolved.value[0].item.content, "Nice work!");
        assert_eq!(resolved.value[0].author.as_ref().and_then(|a| a.username.as_deref()), Some("mike"));
    }

    #[tokio::test]
    async fn test_create_post_validates_before_writing() {
        let db = Arc::new(MemoryDatabase::new());
        let service = service(&db, None);

        let err = service
            .create_post(Uuid::new_v4(), CreatePostRequest {
                title: "   ".to_string(),
                content: "body".to_string(),
                category: None,
                tags: vec![],
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ValidationError(_)));
        assert_eq!(db.calls(Operation::CreatePost), 0);
    }

    #[tokio::test]
    async fn test_create_post_normalizes_tags() {
        let db = Arc::new(MemoryDatabase::new());
        let service = service(&db, None);

        let created = service
            .create_post(Uuid::new_v4(), CreatePostRequest {
                title: "Devlog #1".to_string(),
                content: "Shipping the first build".to_string(),
                category: Some(" Showcase ".to_string()),
                tags: vec!["Rust".to_string(), "rust ".to_string(), "".to_string(), "gamedev".to_string()],
            })
            .await
            .unwrap();

        assert_eq!(created.tags, vec!["rust".to_string(), "gamedev".to_string()]);
        assert_eq!(created.category.as_deref(), Some("showcase"));
    }

    #[tokio::test]
    async fn test_create_post_falls_back_to_companion_on_store_failure() {
        let db = Arc::new(MemoryDatabase::new());
        db.fail(Operation::CreatePost);
        let companion = Arc::new(StubCompanion::new(vec![]));
        let service = service(&db, Some(companion.clone()));

        let created = service
            .create_post(Uuid::new_v4(), CreatePostRequest {
                title: "Fallback".to_string(),
                content: "Written through the API".to_string(),
                category: None,
                tags: vec![],
            })
            .await
            .unwrap();

        assert_eq!(created.title, "Fallback");
        assert_eq!(companion.create_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_like_is_idempotent() {
        let db = Arc::new(MemoryDatabase::new());
        let author = Uuid::new_v4();
        let target = post(author, 0);
        db.seed_post(target.clone());
        let service = service(&db, None);

        service.like_post(target.id, author).await.unwrap();
        service.like_post(target.id, author).await.unwrap();
        assert_eq!(db.get_post(target.id).await.unwrap().unwrap().likes_count, 1);

        service.unlike_post(target.id, author).await.unwrap();
        service.unlike_post(target.id, author).await.unwrap();
        assert_eq!(db.get_post(target.id).await.unwrap().unwrap().likes_count, 0);
    }
}
