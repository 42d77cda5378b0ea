//! User repository for Gator.

use sqlx::SqlitePool;
use uuid::Uuid;

use super::conflict_as;
use super::user::{User, UserRow};
use crate::datetime::now_db;
use crate::{GatorError, Result};

/// Repository for user operations.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Create a new UserRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new user.
    ///
    /// Returns `Conflict` if the name is taken.
    pub async fn create(&self, name: &str) -> Result<User> {
        let id = Uuid::new_v4().to_string();
        let now = now_db();

        sqlx::query("INSERT INTO users (id, created_at, updated_at, name) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(&now)
            .bind(&now)
            .bind(name)
            .execute(self.pool)
            .await
            .map_err(|e| conflict_as(e, || format!("user {name:?}")))?;

        self.get_by_id(&id)
            .await?
            .ok_or_else(|| GatorError::NotFound(format!("user {id}")))
    }

    /// Get a user by name.
    pub async fn get_by_name(&self, name: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, created_at, updated_at, name FROM users WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, created_at, updated_at, name FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    /// List all users in registration order.
    pub async fn list(&self) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT id, created_at, updated_at, name FROM users ORDER BY rowid ASC",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    /// Delete every user. Feeds, follows and posts go with them.
    ///
    /// Returns the number of users removed.
    pub async fn reset(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM users").execute(self.pool).await?;
        Ok(result.rows_affected())
    }
}
