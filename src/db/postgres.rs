// PostgreSQL repository implementations using sqlx
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{FromRow, Postgres, QueryBuilder, Row};
use uuid::Uuid;
use std::sync::Arc;
use std::time::Duration;
use crate::{Result, AppError};
use crate::db::query::{Filter, FilterValue, ListQuery};
use crate::db::repository::{CommentRepository, PostRepository, ProfileRepository};
use crate::models::{AuthorSummary, Comment, Hydrated, NewComment, NewPost, NewProfile, Post, Profile};

const AUTHOR_COLUMNS: &str =
    "a.id AS author_ref, a.username AS author_username, a.full_name AS author_full_name, a.avatar_url AS author_avatar_url";

// PostgreSQL connection pool wrapper
pub struct PostgresDatabase {
    pub pool: Arc<PgPool>,
}

impl PostgresDatabase {
    pub async fn new(database_url: &str, acquire_timeout: Duration) -> Result<Self> {
        tracing::info!("🔗 DATABASE: Configuring connection pool");
        tracing::info!("   📊 Max connections: 20");
        tracing::info!("   ⏰ Acquire timeout: {}ms", acquire_timeout.as_millis());

        let pool = PgPoolOptions::new()
            .max_connections(20)
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(3600))
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await
            .map_err(|e| {
                tracing::error!("❌ DATABASE: Failed to create connection pool: {}", e);
                AppError::DatabaseError(format!("Failed to connect to PostgreSQL: {}", e))
            })?;

        tracing::info!("✅ DATABASE: Connection pool configured successfully");

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    pub fn repository(&self) -> PostgresRepository {
        PostgresRepository { pool: self.pool.clone() }
    }
}

fn push_value(builder: &mut QueryBuilder<'_, Postgres>, value: &FilterValue) {
    match value {
        FilterValue::Text(s) => builder.push_bind(s.clone()),
        FilterValue::Uuid(id) => builder.push_bind(*id),
        FilterValue::Bool(b) => builder.push_bind(*b),
        FilterValue::Timestamp(ts) => builder.push_bind(*ts),
    };
}

fn push_array(builder: &mut QueryBuilder<'_, Postgres>, values: &[FilterValue]) {
    let uuids: Option<Vec<Uuid>> = values
        .iter()
        .map(|v| match v {
            FilterValue::Uuid(id) => Some(*id),
            _ => None,
        })
        .collect();

    match uuids {
        Some(ids) => builder.push_bind(ids),
        None => builder.push_bind(values.iter().map(|v| v.to_string()).collect::<Vec<String>>()),
    };
}

/// Append WHERE / ORDER BY / LIMIT for `query`, qualifying columns with `alias`.
/// Column names are `&'static str` from `ListQuery`, values are always bound.
fn push_list_query(builder: &mut QueryBuilder<'_, Postgres>, query: &ListQuery, alias: &str) {
    builder.push(" WHERE TRUE");
    for filter in &query.filters {
        match filter {
            Filter::Eq { column, value } => {
                builder.push(format!(" AND {}.{} = ", alias, column));
                push_value(builder, value);
            }
            Filter::In { column, values } => {
                builder.push(format!(" AND {}.{} = ANY(", alias, column));
                push_array(builder, values);
                builder.push(")");
            }
        }
    }
    if let Some(order) = &query.order {
        let direction = if order.ascending { "ASC" } else { "DESC" };
        builder.push(format!(" ORDER BY {}.{} {}", alias, order.column, direction));
    }
    if let Some(limit) = query.limit {
        builder.push(" LIMIT ");
        builder.push_bind(i64::from(limit));
    }
}

fn author_from_row(row: &PgRow) -> Result<Option<AuthorSummary>> {
    let id: Option<Uuid> = row.try_get("author_ref")?;
    Ok(match id {
        Some(id) => Some(AuthorSummary {
            id,
            username: row.try_get("author_username")?,
            full_name: row.try_get("author_full_name")?,
            avatar_url: row.try_get("author_avatar_url")?,
        }),
        None => None,
    })
}

// One repository over the shared pool for posts, profiles and comments
pub struct PostgresRepository {
    pool: Arc<PgPool>,
}

#[async_trait]
impl PostRepository for PostgresRepository {
    async fn list_posts_with_authors(&self, query: &ListQuery) -> Result<Vec<Hydrated<Post>>> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT p.*, {} FROM community_posts p LEFT JOIN user_profiles a ON a.id = p.author_id",
            AUTHOR_COLUMNS
        ));
        push_list_query(&mut builder, query, "p");

        let rows = builder.build().fetch_all(&*self.pool).await?;
        rows.iter()
            .map(|row| -> Result<Hydrated<Post>> { Ok(Hydrated::new(Post::from_row(row)?, author_from_row(row)?)) })
            .collect()
    }

    async fn list_posts(&self, query: &ListQuery) -> Result<Vec<Post>> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT p.* FROM community_posts p");
        push_list_query(&mut builder, query, "p");

        Ok(builder.build_query_as::<Post>().fetch_all(&*self.pool).await?)
    }

    async fn get_post(&self, id: Uuid) -> Result<Option<Post>> {
        Ok(sqlx::query_as::<_, Post>("SELECT * FROM community_posts WHERE id = $1")
            .bind(id)
            .fetch_optional(&*self.pool)
            .await?)
    }

    async fn create_post(&self, post: &NewPost) -> Result<Post> {
        Ok(sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO community_posts (author_id, title, content, category, tags, is_published)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(post.author_id)
        .bind(&post.title)
        .bind(&post.content)
        .bind(&post.category)
        .bind(&post.tags)
        .bind(post.is_published)
        .fetch_one(&*self.pool)
        .await?)
    }

    async fn like_post(&self, post_id: Uuid, user_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO community_post_likes (post_id, user_id) VALUES ($1, $2)")
            .bind(post_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE community_posts SET likes_count = likes_count + 1 WHERE id = $1")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn unlike_post(&self, post_id: Uuid, user_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM community_post_likes WHERE post_id = $1 AND user_id = $2")
            .bind(post_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if removed > 0 {
            sqlx::query("UPDATE community_posts SET likes_count = GREATEST(likes_count - 1, 0) WHERE id = $1")
                .bind(post_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl ProfileRepository for PostgresRepository {
    async fn get_profiles_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Profile>> {
        Ok(sqlx::query_as::<_, Profile>("SELECT * FROM user_profiles WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&*self.pool)
            .await?)
    }

    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>> {
        Ok(sqlx::query_as::<_, Profile>("SELECT * FROM user_profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(&*self.pool)
            .await?)
    }

    async fn insert_profile(&self, profile: &NewProfile) -> Result<Profile> {
        Ok(sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO user_profiles (id, username, full_name, avatar_url)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(profile.id)
        .bind(&profile.username)
        .bind(&profile.full_name)
        .bind(&profile.avatar_url)
        .fetch_one(&*self.pool)
        .await?)
    }
}

#[async_trait]
impl CommentRepository for PostgresRepository {
    async fn list_comments_with_authors(&self, query: &ListQuery) -> Result<Vec<Hydrated<Comment>>> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT c.*, {} FROM community_comments c LEFT JOIN user_profiles a ON a.id = c.author_id",
            AUTHOR_COLUMNS
        ));
        push_list_query(&mut builder, query, "c");

        let rows = builder.build().fetch_all(&*self.pool).await?;
        rows.iter()
            .map(|row| -> Result<Hydrated<Comment>> { Ok(Hydrated::new(Comment::from_row(row)?, author_from_row(row)?)) })
            .collect()
    }

    async fn list_comments(&self, query: &ListQuery) -> Result<Vec<Comment>> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT c.* FROM community_comments c");
        push_list_query(&mut builder, query, "c");

        Ok(builder.build_query_as::<Comment>().fetch_all(&*self.pool).await?)
    }

    async fn create_comment(&self, comment: &NewComment) -> Result<Comment> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO community_comments (post_id, author_id, content)
            VALUES ($1, $2, $3)
            RETURNING id, post_id, author_id, content, created_at
            "#,
        )
        .bind(comment.post_id)
        .bind(comment.author_id)
        .bind(&comment.content)
        .fetch_one(&mut *tx)
        .await?;
        sqlx::query("UPDATE community_posts SET comments_count = comments_count + 1 WHERE id = $1")
            .bind(comment.post_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(created)
    }
}
