//! Ingestion tests against feeds served by wiremock.

mod common;

use std::time::Duration;

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{rss_document, rss_item, sample_rss, serve_feed};
use gator::rss::{
    FeedFollowRepository, FeedRepository, NewFeed, PostRepository, MAX_FEED_SIZE,
};
use gator::{
    scrape_next_feed, Database, DatePolicy, Feed, FeedFetcher, GatorError, IngestOptions,
    RssUpdater, User, UserRepository,
};

async fn setup() -> (Database, User) {
    let db = Database::open_in_memory().await.unwrap();
    let user = UserRepository::new(db.pool()).create("alice").await.unwrap();
    (db, user)
}

async fn add_feed(db: &Database, user: &User, name: &str, url: &str) -> Feed {
    FeedRepository::new(db.pool())
        .create(&NewFeed::new(name, url, &user.id))
        .await
        .unwrap()
}

async fn post_count(db: &Database, feed: &Feed) -> i64 {
    PostRepository::new(db.pool())
        .count_by_feed(&feed.id)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_scrape_stores_posts_and_stamps_feed() {
    let server = MockServer::start().await;
    let url = serve_feed(&server, "/feed.xml", sample_rss("Blog", 3)).await;
    let (db, user) = setup().await;
    let feed = add_feed(&db, &user, "Blog", &url).await;
    let fetcher = FeedFetcher::new().unwrap();

    let report = scrape_next_feed(&db, &fetcher, &IngestOptions::default())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.feed.id, feed.id);
    assert_eq!(report.inserted, 3);
    assert_eq!(report.duplicates, 0);
    assert!(report.feed.last_fetched_at.is_some());
    assert_eq!(post_count(&db, &feed).await, 3);

    let stored = FeedRepository::new(db.pool())
        .get_by_id(&feed.id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.last_fetched_at.is_some());
}

#[tokio::test]
async fn test_rescrape_unchanged_feed_adds_nothing() {
    let server = MockServer::start().await;
    let url = serve_feed(&server, "/feed.xml", sample_rss("Blog", 4)).await;
    let (db, user) = setup().await;
    let feed = add_feed(&db, &user, "Blog", &url).await;
    let fetcher = FeedFetcher::new().unwrap();
    let options = IngestOptions::default();

    scrape_next_feed(&db, &fetcher, &options).await.unwrap();
    let report = scrape_next_feed(&db, &fetcher, &options)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.inserted, 0);
    assert_eq!(report.duplicates, 4);
    assert_eq!(post_count(&db, &feed).await, 4);
}

#[tokio::test]
async fn test_scrape_picks_unfetched_then_oldest() {
    let server = MockServer::start().await;
    let url_a = serve_feed(&server, "/a.xml", sample_rss("A", 1)).await;
    let url_b = serve_feed(&server, "/b.xml", sample_rss("B", 1)).await;
    let (db, user) = setup().await;
    let a = add_feed(&db, &user, "A", &url_a).await;
    let b = add_feed(&db, &user, "B", &url_b).await;
    let fetcher = FeedFetcher::new().unwrap();
    let options = IngestOptions::default();

    let mut order = Vec::new();
    for _ in 0..4 {
        let report = scrape_next_feed(&db, &fetcher, &options)
            .await
            .unwrap()
            .unwrap();
        order.push(report.feed.id);
    }

    assert_eq!(order, vec![a.id.clone(), b.id.clone(), a.id, b.id]);
}

#[tokio::test]
async fn test_scrape_sends_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .and(header("user-agent", "gator"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sample_rss("Blog", 1)))
        .expect(1)
        .mount(&server)
        .await;
    let (db, user) = setup().await;
    add_feed(&db, &user, "Blog", &format!("{}/feed.xml", server.uri())).await;

    let report = scrape_next_feed(&db, &FeedFetcher::new().unwrap(), &IngestOptions::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.inserted, 1);
}

#[tokio::test]
async fn test_scrape_http_error_moves_feed_back() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone.xml"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let good_url = serve_feed(&server, "/good.xml", sample_rss("Good", 1)).await;
    let (db, user) = setup().await;
    let gone_url = format!("{}/gone.xml", server.uri());
    let gone = add_feed(&db, &user, "Gone", &gone_url).await;
    let good = add_feed(&db, &user, "Good", &good_url).await;
    let fetcher = FeedFetcher::new().unwrap();
    let options = IngestOptions::default();

    let err = scrape_next_feed(&db, &fetcher, &options).await.unwrap_err();
    assert!(matches!(err.root(), GatorError::Fetch(_)));
    assert!(err.to_string().contains(&gone_url));

    // The failed feed was stamped, so the next cycle moves on
    let report = scrape_next_feed(&db, &fetcher, &options)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.feed.id, good.id);
    assert_eq!(post_count(&db, &gone).await, 0);
}

#[tokio::test]
async fn test_scrape_malformed_xml() {
    let server = MockServer::start().await;
    let url = serve_feed(&server, "/feed.xml", "<html><body>nope".to_string()).await;
    let (db, user) = setup().await;
    add_feed(&db, &user, "Broken", &url).await;

    let err = scrape_next_feed(&db, &FeedFetcher::new().unwrap(), &IngestOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err.root(), GatorError::Parse(_)));
}

#[tokio::test]
async fn test_scrape_oversized_body() {
    let server = MockServer::start().await;
    let body = "x".repeat(MAX_FEED_SIZE as usize + 1);
    let url = serve_feed(&server, "/huge.xml", body).await;
    let (db, user) = setup().await;
    add_feed(&db, &user, "Huge", &url).await;

    let err = scrape_next_feed(&db, &FeedFetcher::new().unwrap(), &IngestOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err.root(), GatorError::Fetch(_)));
    assert!(err.to_string().contains("too large"));
}

#[tokio::test]
async fn test_scrape_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(sample_rss("Slow", 1))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;
    let (db, user) = setup().await;
    add_feed(&db, &user, "Slow", &format!("{}/slow.xml", server.uri())).await;
    let fetcher = FeedFetcher::with_timeout(Duration::from_millis(200)).unwrap();

    let err = scrape_next_feed(&db, &fetcher, &IngestOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err.root(), GatorError::Fetch(_)));
}

#[tokio::test]
async fn test_scrape_decodes_entities_before_storing() {
    let server = MockServer::start().await;
    let item = rss_item(
        "Don&amp;#39;t &amp;amp; won&amp;#x27;t",
        "http://example.com/entities",
        "Mon, 21 Oct 2024 07:28:00 GMT",
    );
    let url = serve_feed(&server, "/feed.xml", rss_document("Entities", &[item])).await;
    let (db, user) = setup().await;
    let feed = add_feed(&db, &user, "Entities", &url).await;
    FeedFollowRepository::new(db.pool())
        .create(&user.id, &feed.id)
        .await
        .unwrap();

    scrape_next_feed(&db, &FeedFetcher::new().unwrap(), &IngestOptions::default())
        .await
        .unwrap();

    let posts = PostRepository::new(db.pool())
        .list_for_user(&user.id, 10)
        .await
        .unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].title, "Don't & won't");
}

#[tokio::test]
async fn test_bad_date_skip_and_abort() {
    let server = MockServer::start().await;
    let items = vec![
        rss_item("Good", "http://example.com/good", "Mon, 21 Oct 2024 07:28:00 GMT"),
        rss_item("Bad", "http://example.com/bad", "21/10/2024"),
    ];
    let url = serve_feed(&server, "/feed.xml", rss_document("Mixed", &items)).await;
    let fetcher = FeedFetcher::new().unwrap();

    // Skip: the good item is stored
    let (db, user) = setup().await;
    let feed = add_feed(&db, &user, "Mixed", &url).await;
    let report = scrape_next_feed(&db, &fetcher, &IngestOptions::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.inserted, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(post_count(&db, &feed).await, 1);

    // Abort: the cycle fails
    let (db, user) = setup().await;
    add_feed(&db, &user, "Mixed", &url).await;
    let options = IngestOptions {
        date_policy: DatePolicy::Abort,
        ..IngestOptions::default()
    };
    let err = scrape_next_feed(&db, &fetcher, &options).await.unwrap_err();
    assert!(matches!(err.root(), GatorError::Parse(_)));
}

#[tokio::test]
async fn test_scrape_scoped_to_followed_feeds() {
    let server = MockServer::start().await;
    let url_a = serve_feed(&server, "/a.xml", sample_rss("A", 1)).await;
    let url_b = serve_feed(&server, "/b.xml", sample_rss("B", 1)).await;
    let (db, alice) = setup().await;
    let bob = UserRepository::new(db.pool()).create("bob").await.unwrap();
    add_feed(&db, &alice, "A", &url_a).await;
    let b = add_feed(&db, &bob, "B", &url_b).await;
    FeedFollowRepository::new(db.pool())
        .create(&bob.id, &b.id)
        .await
        .unwrap();
    let fetcher = FeedFetcher::new().unwrap();
    let options = IngestOptions {
        user_id: Some(bob.id.clone()),
        ..IngestOptions::default()
    };

    for _ in 0..2 {
        let report = scrape_next_feed(&db, &fetcher, &options)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.feed.id, b.id);
    }
}

#[tokio::test]
async fn test_updater_collects_every_feed() {
    let server = MockServer::start().await;
    let url_a = serve_feed(&server, "/a.xml", sample_rss("A", 2)).await;
    let url_b = serve_feed(&server, "/b.xml", sample_rss("B", 3)).await;
    let (db, user) = setup().await;
    let a = add_feed(&db, &user, "A", &url_a).await;
    let b = add_feed(&db, &user, "B", &url_b).await;

    let handle = RssUpdater::new(
        db.clone(),
        FeedFetcher::new().unwrap(),
        Duration::from_millis(50),
    )
    .spawn();
    tokio::time::sleep(Duration::from_millis(500)).await;
    let cycles = handle.stop().await.unwrap();

    assert!(cycles >= 2, "only {cycles} cycles");
    assert_eq!(post_count(&db, &a).await, 2);
    assert_eq!(post_count(&db, &b).await, 3);
}

#[tokio::test]
async fn test_updater_survives_failing_feed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken.xml"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let good_url = serve_feed(&server, "/good.xml", sample_rss("Good", 2)).await;
    let (db, user) = setup().await;
    add_feed(&db, &user, "Broken", &format!("{}/broken.xml", server.uri())).await;
    let good = add_feed(&db, &user, "Good", &good_url).await;

    let updater = RssUpdater::new(
        db.clone(),
        FeedFetcher::new().unwrap(),
        Duration::from_millis(50),
    );
    let cycles = updater
        .run_until(tokio::time::sleep(Duration::from_millis(500)))
        .await;

    assert!(cycles >= 2);
    assert_eq!(post_count(&db, &good).await, 2);
}

#[tokio::test]
async fn test_updater_applies_ingest_options() {
    let server = MockServer::start().await;
    let items = vec![
        rss_item("Good", "http://example.com/good", "Mon, 21 Oct 2024 07:28:00 GMT"),
        rss_item("Bad", "http://example.com/bad", "21/10/2024"),
    ];
    let url = serve_feed(&server, "/feed.xml", rss_document("Mixed", &items)).await;
    let (db, user) = setup().await;
    let feed = add_feed(&db, &user, "Mixed", &url).await;

    let updater = RssUpdater::new(
        db.clone(),
        FeedFetcher::new().unwrap(),
        Duration::from_secs(60),
    )
    .with_options(IngestOptions {
        date_policy: DatePolicy::Abort,
        ..IngestOptions::default()
    });

    let err = updater.run_cycle().await.unwrap_err();
    assert!(matches!(err.root(), GatorError::Parse(_)));

    let updater = RssUpdater::new(
        db.clone(),
        FeedFetcher::new().unwrap(),
        Duration::from_secs(60),
    )
    .with_options(IngestOptions::default());
    let report = updater.run_cycle().await.unwrap().unwrap();
    assert_eq!(report.skipped, 1);
    assert!(post_count(&db, &feed).await >= 1);
}
