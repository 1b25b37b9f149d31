use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePoolOptions, FromRow, SqlitePool};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DbError {
    /// A uniqueness constraint rejected the write
    #[error("{what} already exists: {key}")]
    Conflict { what: &'static str, key: String },

    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

impl DbError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, DbError::Conflict { .. })
    }

    fn from_insert(err: sqlx::Error, what: &'static str, key: &str) -> Self {
        if is_unique_violation(&err) {
            return DbError::Conflict {
                what,
                key: key.to_string(),
            };
        }
        DbError::Sqlx(err)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Clone, FromRow, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, PartialEq)]
pub struct Feed {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub user_id: Uuid,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A follow joined with the names of the user and feed it links.
#[derive(Debug, Clone, FromRow)]
pub struct FeedFollowRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub feed_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub user_name: String,
    pub feed_name: String,
    pub feed_url: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct Post {
    pub id: Uuid,
    pub feed_id: Uuid,
    pub title: String,
    pub url: String,
    pub description: String,
    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct PostWithFeed {
    pub id: Uuid,
    pub feed_id: Uuid,
    pub feed_name: String,
    pub title: String,
    pub url: String,
    pub description: String,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFeed<'a> {
    pub name: &'a str,
    pub url: &'a str,
    pub user_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct NewPost<'a> {
    pub feed_id: Uuid,
    pub title: &'a str,
    pub url: &'a str,
    pub description: &'a str,
    pub published_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> DbResult<Self> {
        // Every pooled connection to `:memory:` would get its own empty database.
        let options = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = options.connect(database_url).await?;

        Ok(Self { pool })
    }

    pub async fn initialize(&self) -> DbResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id BLOB PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feeds (
                id BLOB PRIMARY KEY,
                name TEXT NOT NULL,
                url TEXT NOT NULL UNIQUE,
                user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                last_fetched_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feed_follows (
                id BLOB PRIMARY KEY,
                user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                feed_id BLOB NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(user_id, feed_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id BLOB PRIMARY KEY,
                feed_id BLOB NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                url TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL,
                published_at TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_posts_feed_published
            ON posts(feed_id, published_at DESC)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // Users

    pub async fn create_user(&self, id: Uuid, name: &str, now: DateTime<Utc>) -> DbResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, name, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError::from_insert(e, "user", name))
    }

    pub async fn get_user(&self, name: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn get_user_by_id(&self, id: Uuid) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn get_users(&self) -> DbResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    /// Removes every user; feeds, follows and posts go with them.
    pub async fn delete_all_users(&self) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM users")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // Feeds

    pub async fn create_feed(&self, feed: &NewFeed<'_>, now: DateTime<Utc>) -> DbResult<Feed> {
        sqlx::query_as::<_, Feed>(
            r#"
            INSERT INTO feeds (id, name, url, user_id, last_fetched_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, NULL, ?, ?)
            RETURNING id, name, url, user_id, last_fetched_at, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(feed.name)
        .bind(feed.url)
        .bind(feed.user_id)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError::from_insert(e, "feed", feed.url))
    }

    pub async fn get_feed_by_url(&self, url: &str) -> DbResult<Option<Feed>> {
        let feed = sqlx::query_as::<_, Feed>("SELECT * FROM feeds WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(feed)
    }

    pub async fn get_all_feeds(&self) -> DbResult<Vec<Feed>> {
        let feeds = sqlx::query_as::<_, Feed>("SELECT * FROM feeds ORDER BY created_at, rowid")
            .fetch_all(&self.pool)
            .await?;
        Ok(feeds)
    }

    /// The feed fetched longest ago; never-fetched feeds come first.
    pub async fn get_next_feed_to_fetch(&self) -> DbResult<Option<Feed>> {
        let feed = sqlx::query_as::<_, Feed>(
            r#"
            SELECT * FROM feeds
            ORDER BY last_fetched_at ASC NULLS FIRST, created_at ASC, rowid ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(feed)
    }

    pub async fn update_feed_fetch_time(&self, feed_id: Uuid, at: DateTime<Utc>) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE feeds
            SET last_fetched_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(at)
        .bind(at)
        .bind(feed_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // Follows

    pub async fn create_feed_follow(
        &self,
        user_id: Uuid,
        feed_id: Uuid,
        now: DateTime<Utc>,
    ) -> DbResult<FeedFollowRow> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO feed_follows (id, user_id, feed_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(feed_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from_insert(e, "follow", &feed_id.to_string()))?;

        let row = sqlx::query_as::<_, FeedFollowRow>(&follow_query("WHERE ff.id = ?"))
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn get_follows_by_user(&self, user_id: Uuid) -> DbResult<Vec<FeedFollowRow>> {
        let rows = sqlx::query_as::<_, FeedFollowRow>(&follow_query("WHERE ff.user_id = ?"))
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn get_all_feed_follows(&self) -> DbResult<Vec<FeedFollowRow>> {
        let rows = sqlx::query_as::<_, FeedFollowRow>(&follow_query(""))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Returns the number of follows removed (0 or 1).
    pub async fn delete_feed_follow(&self, user_id: Uuid, feed_id: Uuid) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM feed_follows WHERE user_id = ? AND feed_id = ?")
            .bind(user_id)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // Posts

    pub async fn create_post(&self, post: &NewPost<'_>, now: DateTime<Utc>) -> DbResult<Post> {
        sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (id, feed_id, title, url, description, published_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id, feed_id, title, url, description, published_at, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(post.feed_id)
        .bind(post.title)
        .bind(post.url)
        .bind(post.description)
        .bind(post.published_at)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError::from_insert(e, "post", post.url))
    }

    /// Newest posts from the feeds `user_id` follows.
    pub async fn get_posts_for_user(&self, user_id: Uuid, limit: i64) -> DbResult<Vec<PostWithFeed>> {
        let posts = sqlx::query_as::<_, PostWithFeed>(
            r#"
            SELECT p.id, p.feed_id, f.name AS feed_name, p.title, p.url, p.description, p.published_at
            FROM posts p
            JOIN feed_follows ff ON ff.feed_id = p.feed_id
            JOIN feeds f ON f.id = p.feed_id
            WHERE ff.user_id = ?
            ORDER BY p.published_at DESC, p.created_at DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    pub async fn count_posts_for_feed(&self, feed_id: Uuid) -> DbResult<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts WHERE feed_id = ?")
            .bind(feed_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}

fn follow_query(filter: &str) -> String {
    format!(
        r#"
        SELECT ff.id, ff.user_id, ff.feed_id, ff.created_at,
               u.name AS user_name, f.name AS feed_name, f.url AS feed_url
        FROM feed_follows ff
        JOIN users u ON u.id = ff.user_id
        JOIN feeds f ON f.id = ff.feed_id
        {filter}
        ORDER BY ff.created_at, ff.rowid
        "#
    )
}
