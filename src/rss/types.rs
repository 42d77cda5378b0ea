//! RSS types for Gator.

use chrono::{DateTime, Utc};

/// Maximum feed size in bytes (5MB).
pub const MAX_FEED_SIZE: u64 = 5 * 1024 * 1024;

/// Number of posts `browse` shows when no limit is given.
pub const DEFAULT_BROWSE_LIMIT: i64 = 2;

/// A subscribed RSS source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    /// Feed ID (UUID v4).
    pub id: String,
    /// When the feed was added.
    pub created_at: DateTime<Utc>,
    /// Last modification, including fetch stamps.
    pub updated_at: DateTime<Utc>,
    /// Display name chosen by the user who added it.
    pub name: String,
    /// Feed URL, unique across all feeds.
    pub url: String,
    /// ID of the user who added the feed.
    pub user_id: String,
    /// Last time the feed was claimed for fetching.
    pub last_fetched_at: Option<DateTime<Utc>>,
}

/// New feed for creation.
#[derive(Debug, Clone)]
pub struct NewFeed {
    /// Display name.
    pub name: String,
    /// Feed URL.
    pub url: String,
    /// ID of the creating user.
    pub user_id: String,
}

impl NewFeed {
    /// Create a new feed.
    pub fn new(name: impl Into<String>, url: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            user_id: user_id.into(),
        }
    }
}

/// A user following a feed, with the names of both sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedFollow {
    /// Follow ID.
    pub id: String,
    /// When the follow was created.
    pub created_at: DateTime<Utc>,
    /// Last modification.
    pub updated_at: DateTime<Utc>,
    /// Following user.
    pub user_id: String,
    /// Followed feed.
    pub feed_id: String,
    /// Name of the followed feed.
    pub feed_name: String,
    /// Name of the following user.
    pub user_name: String,
}

/// An ingested feed item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    /// Post ID.
    pub id: String,
    /// When the post was stored.
    pub created_at: DateTime<Utc>,
    /// Last modification.
    pub updated_at: DateTime<Utc>,
    /// Item title.
    pub title: String,
    /// Item link, unique across all posts.
    pub url: String,
    /// Item description.
    pub description: Option<String>,
    /// When the item was published.
    pub published_at: DateTime<Utc>,
    /// Feed the post came from.
    pub feed_id: String,
}

/// New post for creation.
#[derive(Debug, Clone)]
pub struct NewPost {
    /// Feed ID.
    pub feed_id: String,
    /// Item title.
    pub title: String,
    /// Item link.
    pub url: String,
    /// Item description.
    pub description: Option<String>,
    /// When the item was published.
    pub published_at: DateTime<Utc>,
}

impl NewPost {
    /// Create a new post.
    pub fn new(
        feed_id: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
        published_at: DateTime<Utc>,
    ) -> Self {
        Self {
            feed_id: feed_id.into(),
            title: title.into(),
            url: url.into(),
            description: None,
            published_at,
        }
    }

    /// Set the description. Empty text is stored as none.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let desc = description.into();
        self.description = if desc.is_empty() { None } else { Some(desc) };
        self
    }
}

/// Parsed feed document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RssFeed {
    /// Channel metadata.
    pub channel: RssChannel,
    /// Items in document order.
    pub items: Vec<RssItem>,
}

/// Channel metadata of a parsed feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RssChannel {
    /// Channel title, entities decoded.
    pub title: String,
    /// Site link.
    pub link: String,
    /// Channel description, entities decoded.
    pub description: String,
}

/// One item of a parsed feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RssItem {
    /// Item title, entities decoded.
    pub title: String,
    /// Item link.
    pub link: String,
    /// Item description, entities decoded.
    pub description: String,
    /// Raw `pubDate` text.
    pub pub_date: String,
}
