//! One ingestion cycle: claim the stalest feed, fetch it, store new posts.

use tracing::{debug, error, info, warn};

use crate::datetime::parse_rfc1123;
use crate::db::Database;
use crate::error::ResultExt;
use crate::rss::fetcher::FeedFetcher;
use crate::rss::repository::{FeedRepository, PostRepository};
use crate::rss::types::{Feed, NewPost, RssItem};
use crate::Result;

/// What to do with an item whose `pubDate` is missing or malformed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DatePolicy {
    /// Skip the item and keep going.
    #[default]
    Skip,
    /// Fail the whole cycle.
    Abort,
}

/// Options for an ingestion cycle.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Handling of unparseable publish dates.
    pub date_policy: DatePolicy,
    /// Only consider feeds followed by this user. `None` means every feed.
    pub user_id: Option<String>,
}

/// Outcome of one ingestion cycle.
#[derive(Debug, Clone)]
pub struct IngestReport {
    /// The feed that was claimed, with its new fetch stamp.
    pub feed: Feed,
    /// Posts stored for the first time.
    pub inserted: usize,
    /// Items already stored earlier.
    pub duplicates: usize,
    /// Items without a link or a usable publish date.
    pub skipped: usize,
}

/// Run one ingestion cycle.
///
/// The feed is stamped as fetched before it is downloaded, so a failing
/// feed moves to the back of the queue. Returns `None` when there are no
/// feeds.
pub async fn scrape_next_feed(
    db: &Database,
    fetcher: &FeedFetcher,
    options: &IngestOptions,
) -> Result<Option<IngestReport>> {
    let feeds = FeedRepository::new(db.pool());
    let Some(feed) = feeds.claim_next(options.user_id.as_deref()).await? else {
        debug!("No feeds to fetch");
        return Ok(None);
    };

    info!(feed = %feed.name, url = %feed.url, "Fetching feed");
    let document = fetcher
        .fetch(&feed.url)
        .await
        .with_context(|| format!("feed {}", feed.url))?;

    let report = ingest_items(db, feed, &document.items, options.date_policy).await?;
    info!(
        feed = %report.feed.name,
        inserted = report.inserted,
        duplicates = report.duplicates,
        skipped = report.skipped,
        "Feed collected"
    );
    Ok(Some(report))
}

/// Store the items of an already fetched feed.
///
/// A post whose URL is already stored counts as a duplicate. Any other
/// storage failure ends the cycle.
pub async fn ingest_items(
    db: &Database,
    feed: Feed,
    items: &[RssItem],
    date_policy: DatePolicy,
) -> Result<IngestReport> {
    let posts = PostRepository::new(db.pool());
    let mut report = IngestReport {
        feed,
        inserted: 0,
        duplicates: 0,
        skipped: 0,
    };

    for item in items {
        if item.link.is_empty() {
            warn!(feed = %report.feed.url, title = %item.title, "Skipping item without link");
            report.skipped += 1;
            continue;
        }

        let published_at = match parse_rfc1123(&item.pub_date) {
            Ok(dt) => dt,
            Err(e) if date_policy == DatePolicy::Skip => {
                warn!(feed = %report.feed.url, link = %item.link, "Skipping item: {}", e);
                report.skipped += 1;
                continue;
            }
            Err(e) => return Err(e.context(format!("feed {}", report.feed.url))),
        };

        let new_post = NewPost::new(&report.feed.id, &item.title, &item.link, published_at)
            .with_description(item.description.as_str());

        match posts.create(&new_post).await {
            Ok(post) => {
                debug!(url = %post.url, "Stored post");
                report.inserted += 1;
            }
            Err(e) if e.is_conflict() => {
                debug!(url = %item.link, "Post already stored");
                report.duplicates += 1;
            }
            Err(e) => {
                error!(feed = %report.feed.url, "Failed to store post {}: {}", item.link, e);
                return Err(e.context(format!("feed {}", report.feed.url)));
            }
        }
    }

    Ok(report)
}
