//! Gator - a command-line RSS feed aggregator.
//!
//! Users register, add and follow RSS feeds, and a background collector
//! stores new posts for browsing.

pub mod cli;
pub mod config;
pub mod datetime;
pub mod db;
pub mod error;
pub mod logging;
pub mod rss;

pub use cli::{Builtin, Command, Commands, Session, State};
pub use config::{Config, ConfigFile};
pub use db::{Database, User, UserRepository};
pub use error::{GatorError, Result, ResultExt};
pub use crate::rss::{
    scrape_next_feed, DatePolicy, Feed, FeedFetcher, FeedFollow, IngestOptions, IngestReport, Post,
    RssUpdater,
};
