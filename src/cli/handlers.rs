//! Built-in command handlers.

use std::io::Write;

use async_trait::async_trait;
use tracing::info;

use super::command::{Arity, Handler, UserHandler};
use super::state::State;
use crate::datetime::{format_rfc1123, parse_duration};
use crate::db::{User, UserRepository};
use crate::rss::{
    validate_url, FeedFollowRepository, FeedRepository, NewFeed, PostRepository, RssUpdater,
    DEFAULT_BROWSE_LIMIT,
};
use crate::{GatorError, Result};

/// `register <name>`: create a user and log in as them.
pub struct RegisterHandler;

#[async_trait]
impl Handler for RegisterHandler {
    fn usage(&self) -> &'static str {
        "gator register <name>"
    }

    fn arity(&self) -> Arity {
        Arity::exact(1)
    }

    async fn handle(&self, state: &mut State, args: &[String]) -> Result<()> {
        let name = &args[0];
        let user = UserRepository::new(state.db().pool()).create(name).await?;
        info!(user = %user.name, "user registered");

        state.set_current_user(&user.name)?;

        let out = state.out();
        writeln!(out, "User {} registered", user.name)?;
        writeln!(out, "ID: {}", user.id)?;
        writeln!(out, "Created at: {}", user.created_at)?;
        writeln!(out, "Updated at: {}", user.updated_at)?;
        Ok(())
    }
}

/// `login <name>`: switch to an existing user.
pub struct LoginHandler;

#[async_trait]
impl Handler for LoginHandler {
    fn usage(&self) -> &'static str {
        "gator login <name>"
    }

    fn arity(&self) -> Arity {
        Arity::exact(1)
    }

    async fn handle(&self, state: &mut State, args: &[String]) -> Result<()> {
        let name = &args[0];
        let user = UserRepository::new(state.db().pool())
            .get_by_name(name)
            .await?
            .ok_or_else(|| GatorError::NotFound(format!("user {name:?}")))?;

        state.set_current_user(&user.name)?;
        writeln!(state.out(), "Username set to {}", user.name)?;
        Ok(())
    }
}

/// `reset`: delete all users, feeds, follows and posts.
pub struct ResetHandler;

#[async_trait]
impl Handler for ResetHandler {
    fn usage(&self) -> &'static str {
        "gator reset"
    }

    fn arity(&self) -> Arity {
        Arity::exact(0)
    }

    async fn handle(&self, state: &mut State, _args: &[String]) -> Result<()> {
        let removed = UserRepository::new(state.db().pool()).reset().await?;
        info!(users = removed, "database reset");
        writeln!(state.out(), "Database reset")?;
        Ok(())
    }
}

/// `users`: list users, marking the current one.
pub struct UsersHandler;

#[async_trait]
impl Handler for UsersHandler {
    fn usage(&self) -> &'static str {
        "gator users"
    }

    fn arity(&self) -> Arity {
        Arity::exact(0)
    }

    async fn handle(&self, state: &mut State, _args: &[String]) -> Result<()> {
        let users = UserRepository::new(state.db().pool()).list().await?;
        let current = state.current_user_name().map(str::to_owned);

        let out = state.out();
        for user in users {
            if current.as_deref() == Some(user.name.as_str()) {
                writeln!(out, "* {} (current)", user.name)?;
            } else {
                writeln!(out, "* {}", user.name)?;
            }
        }
        Ok(())
    }
}

/// `agg <interval>`: collect feeds every interval until shut down.
pub struct AggHandler;

#[async_trait]
impl Handler for AggHandler {
    fn usage(&self) -> &'static str {
        "gator agg <interval>"
    }

    fn arity(&self) -> Arity {
        Arity::exact(1)
    }

    async fn handle(&self, state: &mut State, args: &[String]) -> Result<()> {
        let interval = parse_duration(&args[0])?;

        writeln!(state.out(), "Collecting feeds every {}", args[0])?;
        state.out().flush()?;

        let shutdown = state.shutdown();
        let updater = RssUpdater::new(state.db().clone(), state.fetcher().clone(), interval);
        let cycles = updater
            .run_until(async move { shutdown.notified().await })
            .await;

        info!(cycles, "feed collection stopped");
        Ok(())
    }
}

/// `addfeed <name> <url>`: add a feed and follow it.
pub struct AddFeedHandler;

#[async_trait]
impl UserHandler for AddFeedHandler {
    fn usage(&self) -> &'static str {
        "gator addfeed <name> <url>"
    }

    fn arity(&self) -> Arity {
        Arity::exact(2)
    }

    async fn handle(&self, state: &mut State, user: &User, args: &[String]) -> Result<()> {
        let (name, url) = (&args[0], &args[1]);
        validate_url(url)?;

        let (feed, _) = FeedRepository::new(state.db().pool())
            .create_followed(&NewFeed::new(name, url, &user.id))
            .await?;
        info!(feed = %feed.name, url = %feed.url, user = %user.name, "feed added");

        let out = state.out();
        writeln!(out, "Feed added successfully")?;
        writeln!(out, "Feed ID: {}", feed.id)?;
        writeln!(out, "Feed Name: {}", feed.name)?;
        writeln!(out, "Feed URL: {}", feed.url)?;
        writeln!(out, "Feed User: {}", user.name)?;
        writeln!(out, "Feed: {} now followed by {}", feed.name, user.name)?;
        Ok(())
    }
}

/// `feeds`: list every feed with the user who added it.
pub struct FeedsHandler;

#[async_trait]
impl Handler for FeedsHandler {
    fn usage(&self) -> &'static str {
        "gator feeds"
    }

    fn arity(&self) -> Arity {
        Arity::exact(0)
    }

    async fn handle(&self, state: &mut State, _args: &[String]) -> Result<()> {
        let feeds = FeedRepository::new(state.db().pool()).list().await?;
        if feeds.is_empty() {
            writeln!(state.out(), "No feeds found")?;
            return Ok(());
        }

        let users = UserRepository::new(state.db().pool());
        let mut lines = Vec::with_capacity(feeds.len());
        for feed in feeds {
            let creator = users
                .get_by_id(&feed.user_id)
                .await?
                .map(|u| u.name)
                .unwrap_or_else(|| "(unknown)".to_string());
            lines.push((feed, creator));
        }

        let out = state.out();
        writeln!(out, "Feeds:")?;
        for (feed, creator) in lines {
            writeln!(out, "Feed Name: {}", feed.name)?;
            writeln!(out, "Feed URL: {}", feed.url)?;
            writeln!(out, "Feed User: {}", creator)?;
        }
        Ok(())
    }
}

/// `follow <url>`: follow an existing feed.
pub struct FollowHandler;

#[async_trait]
impl UserHandler for FollowHandler {
    fn usage(&self) -> &'static str {
        "gator follow <url>"
    }

    fn arity(&self) -> Arity {
        Arity::exact(1)
    }

    async fn handle(&self, state: &mut State, user: &User, args: &[String]) -> Result<()> {
        let url = &args[0];
        let feed = FeedRepository::new(state.db().pool())
            .get_by_url(url)
            .await?
            .ok_or_else(|| GatorError::NotFound(format!("feed {url:?}")))?;

        let follow = FeedFollowRepository::new(state.db().pool())
            .create(&user.id, &feed.id)
            .await?;

        let out = state.out();
        writeln!(out, "Feed Name: {}", follow.feed_name)?;
        writeln!(out, "Feed User: {}", follow.user_name)?;
        Ok(())
    }
}

/// `following`: list the feeds the current user follows.
pub struct FollowingHandler;

#[async_trait]
impl UserHandler for FollowingHandler {
    fn usage(&self) -> &'static str {
        "gator following"
    }

    fn arity(&self) -> Arity {
        Arity::exact(0)
    }

    async fn handle(&self, state: &mut State, user: &User, _args: &[String]) -> Result<()> {
        let follows = FeedFollowRepository::new(state.db().pool())
            .list_for_user(&user.id)
            .await?;

        let out = state.out();
        if follows.is_empty() {
            writeln!(out, "No feeds followed")?;
            return Ok(());
        }
        writeln!(out, "Feeds followed:")?;
        for follow in follows {
            writeln!(out, "* {}", follow.feed_name)?;
        }
        Ok(())
    }
}

/// `unfollow <url>`: stop following a feed.
pub struct UnfollowHandler;

#[async_trait]
impl UserHandler for UnfollowHandler {
    fn usage(&self) -> &'static str {
        "gator unfollow <url>"
    }

    fn arity(&self) -> Arity {
        Arity::exact(1)
    }

    async fn handle(&self, state: &mut State, user: &User, args: &[String]) -> Result<()> {
        let url = &args[0];
        let feed = FeedRepository::new(state.db().pool())
            .get_by_url(url)
            .await?
            .ok_or_else(|| GatorError::NotFound(format!("feed {url:?}")))?;

        let removed = FeedFollowRepository::new(state.db().pool())
            .delete(&user.id, &feed.id)
            .await?;
        if !removed {
            return Err(GatorError::NotFound(format!(
                "follow of feed {url:?} by {}",
                user.name
            )));
        }

        writeln!(
            state.out(),
            "Feed: {} now unfollowed by {}",
            feed.name, user.name
        )?;
        Ok(())
    }
}

/// `browse [limit]`: show recent posts from followed feeds.
pub struct BrowseHandler;

#[async_trait]
impl UserHandler for BrowseHandler {
    fn usage(&self) -> &'static str {
        "gator browse [limit]"
    }

    fn arity(&self) -> Arity {
        Arity::between(0, 1)
    }

    async fn handle(&self, state: &mut State, user: &User, args: &[String]) -> Result<()> {
        let limit = match args.first() {
            Some(arg) => parse_limit(arg)?,
            None => DEFAULT_BROWSE_LIMIT,
        };

        let posts = PostRepository::new(state.db().pool())
            .list_for_user(&user.id, limit)
            .await?;

        let out = state.out();
        if posts.is_empty() {
            writeln!(out, "No posts found")?;
            return Ok(());
        }
        writeln!(out, "Posts:")?;
        for post in posts {
            writeln!(out, "Title: {}", post.title)?;
            writeln!(out, "Link: {}", post.url)?;
            writeln!(out, "Published At: {}", format_rfc1123(&post.published_at))?;
            if let Some(description) = &post.description {
                writeln!(out, "Description: {}", description)?;
            }
            writeln!(out)?;
        }
        Ok(())
    }
}

/// Parse a `browse` limit: a positive integer.
fn parse_limit(s: &str) -> Result<i64> {
    match s.trim().parse::<i64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(GatorError::Parse(format!(
            "invalid limit {s:?} (expected a positive integer)"
        ))),
    }
}
