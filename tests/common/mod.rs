//! Test helpers for integration tests.
//!
//! Provides TestEnv (state + registry over an in-memory database), an
//! output capture buffer and RSS fixtures served through wiremock.

#![allow(dead_code)]

use std::io::Write;
use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gator::{Command, Commands, Config, ConfigFile, Database, FeedFetcher, Result, State};

/// Cloneable in-memory writer for capturing command output.
#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    /// Everything written so far.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    /// Discard what was written so far.
    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// A command environment with a temporary config file.
pub struct TestEnv {
    pub dir: TempDir,
    pub state: State,
    pub commands: Commands,
    pub out: SharedBuf,
}

impl TestEnv {
    /// Fresh environment: empty database, nobody logged in.
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigFile::new(
            dir.path().join(".gatorconfig.json"),
            Config::new("sqlite::memory:"),
        );
        config.save().unwrap();

        let db = Database::open_in_memory().await.unwrap();
        let out = SharedBuf::default();
        let state = State::new(config, db, FeedFetcher::new().unwrap())
            .with_output(Box::new(out.clone()));

        Self {
            dir,
            state,
            commands: Commands::standard(),
            out,
        }
    }

    /// Dispatch a command by name.
    pub async fn run(&mut self, name: &str, args: &[&str]) -> Result<()> {
        let command = Command::new(name, args.iter().copied());
        self.commands.run(&mut self.state, &command).await
    }

    /// Dispatch a command, discarding earlier output, and return its output.
    pub async fn output_of(&mut self, name: &str, args: &[&str]) -> Result<String> {
        self.out.clear();
        self.run(name, args).await?;
        Ok(self.out.contents())
    }

    /// Current user recorded in the config file on disk.
    pub fn persisted_user(&self) -> Option<String> {
        ConfigFile::load(self.state.config().path())
            .unwrap()
            .config()
            .current_user_name
            .clone()
    }

    /// Database handle.
    pub fn db(&self) -> &Database {
        self.state.db()
    }
}

/// One `<item>` element.
pub fn rss_item(title: &str, link: &str, pub_date: &str) -> String {
    format!(
        "<item><title>{title}</title><link>{link}</link><pubDate>{pub_date}</pubDate>\
         <description>About {title}</description></item>"
    )
}

/// A complete RSS 2.0 document around `items`.
pub fn rss_document(title: &str, items: &[String]) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>{title}</title>
    <link>http://example.com/</link>
    <description>Test description</description>
    {}
  </channel>
</rss>"#,
        items.join("\n    ")
    )
}

/// Sample feed with `n` items dated a day apart, newest last.
pub fn sample_rss(title: &str, n: usize) -> String {
    let items: Vec<String> = (1..=n)
        .map(|i| {
            rss_item(
                &format!("{title} item {i}"),
                &format!("http://example.com/{}/{i}", title.to_lowercase()),
                &Utc.with_ymd_and_hms(2024, 10, i as u32, 7, 28, 0)
                    .unwrap()
                    .to_rfc2822(),
            )
        })
        .collect();
    rss_document(title, &items)
}

/// Serve `body` at `route` and return its full URL.
pub async fn serve_feed(server: &MockServer, route: &str, body: String) -> String {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/rss+xml")
                .set_body_string(body),
        )
        .mount(server)
        .await;
    format!("{}{}", server.uri(), route)
}
