pub mod profile;
pub mod post;
pub mod comment;

// Re-export models for convenience
pub use profile::{AuthorSummary, NewProfile, Profile};
pub use post::{FeedQuery, NewPost, Post};
pub use comment::{Comment, NewComment};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Records that reference a profile through an `author_id` column.
pub trait HasAuthor {
    fn author_id(&self) -> Uuid;
}

/// A record enriched with its author's denormalized profile fields.
/// `author` is `None` when the author could not be resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hydrated<T> {
    #[serde(flatten)]
    pub item: T,
    #[serde(default)]
    pub author: Option<AuthorSummary>,
}

impl<T: HasAuthor> Hydrated<T> {
    pub fn new(item: T, author: Option<AuthorSummary>) -> Self {
        Self { item, author }
    }

    pub fn without_author(item: T) -> Self {
        Self { item, author: None }
    }
}
