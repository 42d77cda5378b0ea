//! User model for Gator.

use chrono::{DateTime, Utc};

use crate::datetime::parse_db;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Opaque identifier (UUID v4).
    pub id: String,
    /// When the user registered.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
    /// Unique display name.
    pub name: String,
}

/// Row type for a user as stored.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct UserRow {
    id: String,
    created_at: String,
    updated_at: String,
    name: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            created_at: parse_db(&row.created_at).unwrap_or_else(Utc::now),
            updated_at: parse_db(&row.updated_at).unwrap_or_else(Utc::now),
            name: row.name,
        }
    }
}
