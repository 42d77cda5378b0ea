//! RSS repositories for Gator.

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::types::{Feed, FeedFollow, NewFeed, NewPost, Post};
use crate::datetime::{now_db, parse_db, to_db};
use crate::db::conflict_as;
use crate::{GatorError, Result};

const FEED_COLUMNS: &str = "id, created_at, updated_at, name, url, user_id, last_fetched_at";

const POST_COLUMNS: &str = "id, created_at, updated_at, title, url, description, published_at, feed_id";

/// Row type for a feed from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
struct FeedRow {
    id: String,
    created_at: String,
    updated_at: String,
    name: String,
    url: String,
    user_id: String,
    last_fetched_at: Option<String>,
}

impl From<FeedRow> for Feed {
    fn from(row: FeedRow) -> Self {
        Feed {
            id: row.id,
            created_at: parse_db(&row.created_at).unwrap_or_else(Utc::now),
            updated_at: parse_db(&row.updated_at).unwrap_or_else(Utc::now),
            name: row.name,
            url: row.url,
            user_id: row.user_id,
            last_fetched_at: row.last_fetched_at.and_then(|s| parse_db(&s)),
        }
    }
}

/// Row type for a feed follow joined with feed and user names.
#[derive(Debug, Clone, sqlx::FromRow)]
struct FeedFollowRow {
    id: String,
    created_at: String,
    updated_at: String,
    user_id: String,
    feed_id: String,
    feed_name: String,
    user_name: String,
}

impl From<FeedFollowRow> for FeedFollow {
    fn from(row: FeedFollowRow) -> Self {
        FeedFollow {
            id: row.id,
            created_at: parse_db(&row.created_at).unwrap_or_else(Utc::now),
            updated_at: parse_db(&row.updated_at).unwrap_or_else(Utc::now),
            user_id: row.user_id,
            feed_id: row.feed_id,
            feed_name: row.feed_name,
            user_name: row.user_name,
        }
    }
}

/// Row type for a post from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
struct PostRow {
    id: String,
    created_at: String,
    updated_at: String,
    title: String,
    url: String,
    description: Option<String>,
    published_at: String,
    feed_id: String,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Post {
            id: row.id,
            created_at: parse_db(&row.created_at).unwrap_or_else(Utc::now),
            updated_at: parse_db(&row.updated_at).unwrap_or_else(Utc::now),
            title: row.title,
            url: row.url,
            description: row.description,
            published_at: parse_db(&row.published_at).unwrap_or_else(Utc::now),
            feed_id: row.feed_id,
        }
    }
}

/// Subquery selecting the ID of the feed to fetch next.
///
/// Never-fetched feeds come first, then the oldest fetch; ties go to the
/// feed added first. When `scoped`, only feeds followed by the bound user
/// are considered.
fn next_feed_id_query(scoped: bool) -> String {
    let filter = if scoped {
        "WHERE id IN (SELECT feed_id FROM feed_follows WHERE user_id = ?)"
    } else {
        ""
    };
    format!(
        "SELECT id FROM feeds {filter} ORDER BY last_fetched_at ASC NULLS FIRST, rowid ASC LIMIT 1"
    )
}

/// Repository for feed operations.
pub struct FeedRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FeedRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new feed.
    ///
    /// Returns `Conflict` if a feed with the same URL exists.
    pub async fn create(&self, feed: &NewFeed) -> Result<Feed> {
        let id = Uuid::new_v4().to_string();
        let now = now_db();

        let query = format!(
            "INSERT INTO feeds (id, created_at, updated_at, name, url, user_id)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING {FEED_COLUMNS}"
        );
        let row = sqlx::query_as::<_, FeedRow>(&query)
            .bind(&id)
            .bind(&now)
            .bind(&now)
            .bind(&feed.name)
            .bind(&feed.url)
            .bind(&feed.user_id)
            .fetch_one(self.pool)
            .await
            .map_err(|e| conflict_as(e, || format!("feed with url {:?}", feed.url)))?;

        Ok(Feed::from(row))
    }

    /// Create a feed and make its creator follow it.
    ///
    /// Both rows are written in one transaction; if the follow fails the
    /// feed is rolled back too.
    pub async fn create_followed(&self, feed: &NewFeed) -> Result<(Feed, FeedFollow)> {
        let feed_id = Uuid::new_v4().to_string();
        let follow_id = Uuid::new_v4().to_string();
        let now = now_db();

        let mut tx = self.pool.begin().await?;

        let query = format!(
            "INSERT INTO feeds (id, created_at, updated_at, name, url, user_id)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING {FEED_COLUMNS}"
        );
        let feed_row = sqlx::query_as::<_, FeedRow>(&query)
            .bind(&feed_id)
            .bind(&now)
            .bind(&now)
            .bind(&feed.name)
            .bind(&feed.url)
            .bind(&feed.user_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| conflict_as(e, || format!("feed with url {:?}", feed.url)))?;

        sqlx::query(
            "INSERT INTO feed_follows (id, created_at, updated_at, user_id, feed_id)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&follow_id)
        .bind(&now)
        .bind(&now)
        .bind(&feed.user_id)
        .bind(&feed_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_as(e, || "feed follow".to_string()))?;

        let follow_row = sqlx::query_as::<_, FeedFollowRow>(
            "SELECT ff.id, ff.created_at, ff.updated_at, ff.user_id, ff.feed_id,
                    f.name AS feed_name, u.name AS user_name
             FROM feed_follows ff
             JOIN feeds f ON f.id = ff.feed_id
             JOIN users u ON u.id = ff.user_id
             WHERE ff.id = ?",
        )
        .bind(&follow_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok((Feed::from(feed_row), FeedFollow::from(follow_row)))
    }

    /// Get a feed by ID.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Feed>> {
        let query = format!("SELECT {FEED_COLUMNS} FROM feeds WHERE id = ?");
        let row = sqlx::query_as::<_, FeedRow>(&query)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Feed::from))
    }

    /// Get a feed by URL.
    pub async fn get_by_url(&self, url: &str) -> Result<Option<Feed>> {
        let query = format!("SELECT {FEED_COLUMNS} FROM feeds WHERE url = ?");
        let row = sqlx::query_as::<_, FeedRow>(&query)
            .bind(url)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Feed::from))
    }

    /// List all feeds in the order they were added.
    pub async fn list(&self) -> Result<Vec<Feed>> {
        let query = format!("SELECT {FEED_COLUMNS} FROM feeds ORDER BY rowid ASC");
        let rows = sqlx::query_as::<_, FeedRow>(&query)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Feed::from).collect())
    }

    /// Peek at the feed that should be fetched next, without stamping it.
    pub async fn next_to_fetch(&self, user_id: Option<&str>) -> Result<Option<Feed>> {
        let query = format!(
            "SELECT {FEED_COLUMNS} FROM feeds WHERE id = ({})",
            next_feed_id_query(user_id.is_some())
        );
        let mut q = sqlx::query_as::<_, FeedRow>(&query);
        if let Some(user_id) = user_id {
            q = q.bind(user_id);
        }
        let row = q.fetch_optional(self.pool).await?;

        Ok(row.map(Feed::from))
    }

    /// Stamp a feed as fetched now.
    ///
    /// Returns the updated feed, or None if it does not exist.
    pub async fn mark_fetched(&self, id: &str) -> Result<Option<Feed>> {
        let now = now_db();
        let query = format!(
            "UPDATE feeds SET last_fetched_at = ?, updated_at = ? WHERE id = ? RETURNING {FEED_COLUMNS}"
        );
        let row = sqlx::query_as::<_, FeedRow>(&query)
            .bind(&now)
            .bind(&now)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Feed::from))
    }

    /// Select the next feed and stamp it as fetched in one statement.
    ///
    /// Two concurrent callers never claim the same feed for the same stamp.
    pub async fn claim_next(&self, user_id: Option<&str>) -> Result<Option<Feed>> {
        let now = to_db(&Utc::now());
        let query = format!(
            "UPDATE feeds SET last_fetched_at = ?, updated_at = ?
             WHERE id = ({})
             RETURNING {FEED_COLUMNS}",
            next_feed_id_query(user_id.is_some())
        );
        let mut q = sqlx::query_as::<_, FeedRow>(&query).bind(&now).bind(&now);
        if let Some(user_id) = user_id {
            q = q.bind(user_id);
        }
        let row = q.fetch_optional(self.pool).await?;

        Ok(row.map(Feed::from))
    }
}

/// Repository for feed follow operations.
pub struct FeedFollowRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FeedFollowRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Record that a user follows a feed.
    ///
    /// Returns `Conflict` if the user already follows it.
    pub async fn create(&self, user_id: &str, feed_id: &str) -> Result<FeedFollow> {
        let id = Uuid::new_v4().to_string();
        let now = now_db();

        sqlx::query(
            "INSERT INTO feed_follows (id, created_at, updated_at, user_id, feed_id)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&now)
        .bind(&now)
        .bind(user_id)
        .bind(feed_id)
        .execute(self.pool)
        .await
        .map_err(|e| conflict_as(e, || "feed follow".to_string()))?;

        let row = sqlx::query_as::<_, FeedFollowRow>(
            "SELECT ff.id, ff.created_at, ff.updated_at, ff.user_id, ff.feed_id,
                    f.name AS feed_name, u.name AS user_name
             FROM feed_follows ff
             JOIN feeds f ON f.id = ff.feed_id
             JOIN users u ON u.id = ff.user_id
             WHERE ff.id = ?",
        )
        .bind(&id)
        .fetch_optional(self.pool)
        .await?;

        row.map(FeedFollow::from)
            .ok_or_else(|| GatorError::NotFound(format!("feed follow {id}")))
    }

    /// List the follows of a user, oldest first.
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<FeedFollow>> {
        let rows = sqlx::query_as::<_, FeedFollowRow>(
            "SELECT ff.id, ff.created_at, ff.updated_at, ff.user_id, ff.feed_id,
                    f.name AS feed_name, u.name AS user_name
             FROM feed_follows ff
             JOIN feeds f ON f.id = ff.feed_id
             JOIN users u ON u.id = ff.user_id
             WHERE ff.user_id = ?
             ORDER BY ff.rowid ASC",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(FeedFollow::from).collect())
    }

    /// Remove a follow. Returns false if there was none.
    pub async fn delete(&self, user_id: &str, feed_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM feed_follows WHERE user_id = ? AND feed_id = ?")
            .bind(user_id)
            .bind(feed_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Repository for post operations.
pub struct PostRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> PostRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a post.
    ///
    /// Returns `Conflict` if a post with the same URL exists; ingestion
    /// relies on this for deduplication.
    pub async fn create(&self, post: &NewPost) -> Result<Post> {
        let id = Uuid::new_v4().to_string();
        let now = now_db();

        let query = format!(
            "INSERT INTO posts (id, created_at, updated_at, title, url, description, published_at, feed_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {POST_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PostRow>(&query)
            .bind(&id)
            .bind(&now)
            .bind(&now)
            .bind(&post.title)
            .bind(&post.url)
            .bind(&post.description)
            .bind(to_db(&post.published_at))
            .bind(&post.feed_id)
            .fetch_one(self.pool)
            .await
            .map_err(|e| conflict_as(e, || format!("post {:?}", post.url)))?;

        Ok(Post::from(row))
    }

    /// Posts from the feeds a user follows.
    ///
    /// Posts of the most recently updated feed come first; within a feed,
    /// newest publication first.
    pub async fn list_for_user(&self, user_id: &str, limit: i64) -> Result<Vec<Post>> {
        let rows = sqlx::query_as::<_, PostRow>(
            "SELECT p.id, p.created_at, p.updated_at, p.title, p.url, p.description,
                    p.published_at, p.feed_id
             FROM posts p
             JOIN feeds f ON f.id = p.feed_id
             JOIN feed_follows ff ON ff.feed_id = p.feed_id
             WHERE ff.user_id = ?
             ORDER BY f.updated_at DESC, p.published_at DESC, p.rowid ASC
             LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Post::from).collect())
    }

    /// Count stored posts of a feed.
    pub async fn count_by_feed(&self, feed_id: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE feed_id = ?")
            .bind(feed_id)
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}
