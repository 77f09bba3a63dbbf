use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::HasAuthor;
use crate::db::query::ListQuery;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub content: String,
    pub category: Option<String>, // "general", "showcase", "help", ...
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub likes_count: i32,
    #[serde(default)]
    pub comments_count: i32,
    #[serde(default = "default_published")]
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_published() -> bool {
    true
}

impl HasAuthor for Post {
    fn author_id(&self) -> Uuid {
        self.author_id
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Row inserted for a new post
#[derive(Debug, Clone, Serialize)]
pub struct NewPost {
    pub author_id: Uuid,
    pub title: String,
    pub content: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub is_published: bool,
}

/// Feed filters accepted by the community feed
#[derive(Debug, Clone)]
pub struct FeedQuery {
    pub limit: u32,
    pub category: Option<String>,
    pub author_id: Option<Uuid>,
}

impl Default for FeedQuery {
    fn default() -> Self {
        Self { limit: 10, category: None, author_id: None }
    }
}

impl FeedQuery {
    pub fn with_limit(limit: u32) -> Self {
        Self { limit, ..Default::default() }
    }

    /// Published posts, newest first.
    pub fn to_list_query(&self) -> ListQuery {
        let mut query = ListQuery::new()
            .eq("is_published", true)
            .order_by("created_at", false)
            .limit(self.limit);
        if let Some(category) = &self.category {
            query = query.eq("category", category.as_str());
        }
        if let Some(author_id) = self.author_id {
            query = query.eq("author_id", author_id);
        }
        query
    }

    /// Same filters as `to_list_query`, for results that come back unfiltered.
    pub fn matches(&self, post: &Post) -> bool {
        post.is_published
            && self.category.as_ref().map_or(true, |c| post.category.as_ref() == Some(c))
            && self.author_id.map_or(true, |a| post.author_id == a)
    }
}
