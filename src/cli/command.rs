//! Command registry and dispatch.
//!
//! A [`Command`] is looked up by name in [`Commands`], checked against the
//! handler's arity and then handed to the handler. Handlers that need a
//! logged-in user implement [`UserHandler`] and are registered wrapped in
//! [`LoggedIn`].

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use super::handlers::{
    AddFeedHandler, AggHandler, BrowseHandler, FeedsHandler, FollowHandler, FollowingHandler,
    LoginHandler, RegisterHandler, ResetHandler, UnfollowHandler, UsersHandler,
};
use super::state::State;
use crate::db::User;
use crate::error::ResultExt;
use crate::{GatorError, Result};

/// One command invocation: a name and its positional arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Command name.
    pub name: String,
    /// Positional arguments.
    pub args: Vec<String>,
}

impl Command {
    /// Create a command.
    pub fn new<I, S>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

/// Accepted number of positional arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    min: usize,
    max: usize,
}

impl Arity {
    /// Exactly `n` arguments.
    pub const fn exact(n: usize) -> Self {
        Self { min: n, max: n }
    }

    /// Between `min` and `max` arguments, inclusive.
    pub const fn between(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    /// Whether `n` arguments are accepted.
    pub fn accepts(&self, n: usize) -> bool {
        (self.min..=self.max).contains(&n)
    }
}

/// A command implementation.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Usage line shown when the arguments don't fit.
    fn usage(&self) -> &'static str;

    /// Accepted argument count.
    fn arity(&self) -> Arity;

    /// Run the command.
    async fn handle(&self, state: &mut State, args: &[String]) -> Result<()>;
}

/// A command implementation that needs the logged-in user.
#[async_trait]
pub trait UserHandler: Send + Sync {
    /// Usage line shown when the arguments don't fit.
    fn usage(&self) -> &'static str;

    /// Accepted argument count.
    fn arity(&self) -> Arity;

    /// Run the command as `user`.
    async fn handle(&self, state: &mut State, user: &User, args: &[String]) -> Result<()>;
}

/// Require a logged-in user before running the inner handler.
///
/// The inner handler is never invoked if the session names no user or the
/// named user does not exist.
pub struct LoggedIn<H>(pub H);

#[async_trait]
impl<H: UserHandler> Handler for LoggedIn<H> {
    fn usage(&self) -> &'static str {
        self.0.usage()
    }

    fn arity(&self) -> Arity {
        self.0.arity()
    }

    async fn handle(&self, state: &mut State, args: &[String]) -> Result<()> {
        let user = state.current_user().await?;
        debug!(user = %user.name, "authenticated");
        self.0.handle(state, &user, args).await
    }
}

/// Built-in commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Register,
    Login,
    Reset,
    Users,
    Agg,
    AddFeed,
    Feeds,
    Follow,
    Following,
    Unfollow,
    Browse,
}

impl Builtin {
    /// Every built-in command.
    pub const ALL: [Builtin; 11] = [
        Builtin::Register,
        Builtin::Login,
        Builtin::Reset,
        Builtin::Users,
        Builtin::Agg,
        Builtin::AddFeed,
        Builtin::Feeds,
        Builtin::Follow,
        Builtin::Following,
        Builtin::Unfollow,
        Builtin::Browse,
    ];

    /// Name the command is invoked by.
    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Register => "register",
            Builtin::Login => "login",
            Builtin::Reset => "reset",
            Builtin::Users => "users",
            Builtin::Agg => "agg",
            Builtin::AddFeed => "addfeed",
            Builtin::Feeds => "feeds",
            Builtin::Follow => "follow",
            Builtin::Following => "following",
            Builtin::Unfollow => "unfollow",
            Builtin::Browse => "browse",
        }
    }

    /// Look up a built-in by name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }

    /// The handler implementing this command.
    pub fn handler(&self) -> Box<dyn Handler> {
        match self {
            Builtin::Register => Box::new(RegisterHandler),
            Builtin::Login => Box::new(LoginHandler),
            Builtin::Reset => Box::new(ResetHandler),
            Builtin::Users => Box::new(UsersHandler),
            Builtin::Agg => Box::new(AggHandler),
            Builtin::AddFeed => Box::new(LoggedIn(AddFeedHandler)),
            Builtin::Feeds => Box::new(FeedsHandler),
            Builtin::Follow => Box::new(LoggedIn(FollowHandler)),
            Builtin::Following => Box::new(LoggedIn(FollowingHandler)),
            Builtin::Unfollow => Box::new(LoggedIn(UnfollowHandler)),
            Builtin::Browse => Box::new(LoggedIn(BrowseHandler)),
        }
    }
}

/// Name to handler registry.
#[derive(Default)]
pub struct Commands {
    handlers: HashMap<String, Box<dyn Handler>>,
}

impl Commands {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in command.
    pub fn standard() -> Self {
        let mut commands = Self::new();
        for builtin in Builtin::ALL {
            commands.register(builtin.name(), builtin.handler());
        }
        commands
    }

    /// Register a handler. An existing handler of the same name is replaced.
    pub fn register(&mut self, name: impl Into<String>, handler: Box<dyn Handler>) {
        self.handlers.insert(name.into(), handler);
    }

    /// Whether a command is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Usage line of a registered command.
    pub fn usage(&self, name: &str) -> Option<&'static str> {
        self.handlers.get(name).map(|h| h.usage())
    }

    /// Dispatch a command.
    ///
    /// Fails with `NoCommand` for an empty name, `UnknownCommand` for an
    /// unregistered one and `Usage` when the argument count doesn't fit.
    /// In those cases no handler runs.
    pub async fn run(&self, state: &mut State, command: &Command) -> Result<()> {
        if command.name.is_empty() {
            return Err(GatorError::NoCommand);
        }

        let handler = self
            .handlers
            .get(&command.name)
            .ok_or_else(|| GatorError::UnknownCommand(command.name.clone()))?;

        if !handler.arity().accepts(command.args.len()) {
            return Err(GatorError::Usage(handler.usage().to_string()));
        }

        debug!(command = %command.name, args = ?command.args, "running command");
        handler
            .handle(state, &command.args)
            .await
            .with_context(|| format!("{} failed", command.name))
    }
}
