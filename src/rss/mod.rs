//! RSS aggregation for Gator.
//!
//! Feeds, follows and posts, plus fetching and the periodic ingestion loop.

pub mod fetcher;
pub mod ingest;
pub mod repository;
pub mod types;
pub mod updater;

pub use fetcher::{parse_feed, unescape_entities, validate_url, FeedFetcher, USER_AGENT};
pub use ingest::{ingest_items, scrape_next_feed, DatePolicy, IngestOptions, IngestReport};
pub use repository::{FeedFollowRepository, FeedRepository, PostRepository};
pub use types::{
    Feed, FeedFollow, NewFeed, NewPost, Post, RssChannel, RssFeed, RssItem, DEFAULT_BROWSE_LIMIT,
    MAX_FEED_SIZE,
};
pub use updater::{RssUpdater, UpdaterHandle};
