//! Shared state threaded through every command.

use std::io::Write;
use std::sync::Arc;

use tokio::sync::Notify;
use tracing::debug;

use crate::config::{Config, ConfigFile};
use crate::db::{Database, User, UserRepository};
use crate::rss::FeedFetcher;
use crate::{GatorError, Result};

/// The logged-in identity for this process.
///
/// Seeded from the configuration file at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Name of the current user, if any.
    pub current_user: Option<String>,
}

impl Session {
    /// Seed a session from persisted configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            current_user: config.current_user_name.clone(),
        }
    }
}

/// Everything a command handler can reach.
pub struct State {
    config: ConfigFile,
    session: Session,
    db: Database,
    fetcher: FeedFetcher,
    shutdown: Arc<Notify>,
    out: Box<dyn Write + Send + Sync>,
}

impl State {
    /// Create state writing command output to stdout.
    pub fn new(config: ConfigFile, db: Database, fetcher: FeedFetcher) -> Self {
        let session = Session::from_config(config.config());
        Self {
            config,
            session,
            db,
            fetcher,
            shutdown: Arc::new(Notify::new()),
            out: Box::new(std::io::stdout()),
        }
    }

    /// Send command output somewhere else.
    pub fn with_output(mut self, out: Box<dyn Write + Send + Sync>) -> Self {
        self.out = out;
        self
    }

    /// Database handle.
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// HTTP fetcher for feeds.
    pub fn fetcher(&self) -> &FeedFetcher {
        &self.fetcher
    }

    /// Persisted configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Name of the logged-in user, if any.
    pub fn current_user_name(&self) -> Option<&str> {
        self.session.current_user.as_deref()
    }

    /// Switch the logged-in user.
    ///
    /// The configuration file is written first; the session only changes
    /// once that succeeded.
    pub fn set_current_user(&mut self, name: &str) -> Result<()> {
        self.config.set_user(name)?;
        self.session.current_user = Some(name.to_string());
        debug!(user = name, "current user set");
        Ok(())
    }

    /// Resolve the logged-in user record.
    ///
    /// Fails with `Auth` if nobody is logged in or the named user no
    /// longer exists.
    pub async fn current_user(&self) -> Result<User> {
        let name = self.current_user_name().ok_or_else(|| {
            GatorError::Auth("not logged in (use login or register first)".to_string())
        })?;

        UserRepository::new(self.db.pool())
            .get_by_name(name)
            .await?
            .ok_or_else(|| GatorError::Auth(format!("current user {name:?} does not exist")))
    }

    /// Signal that long-running commands should stop.
    ///
    /// A notification sent before anyone waits is kept for the next waiter.
    pub fn shutdown(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    /// Output sink for user-facing text.
    pub fn out(&mut self) -> &mut (dyn Write + Send + Sync) {
        self.out.as_mut()
    }
}

impl std::fmt::Debug for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State")
            .field("config", &self.config)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
