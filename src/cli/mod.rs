//! Command-line commands for Gator.
//!
//! This module provides the command registry, the login requirement for
//! commands that act as a user, the built-in handlers and the state they
//! share.

pub mod command;
pub mod handlers;
pub mod state;

pub use command::{Arity, Builtin, Command, Commands, Handler, LoggedIn, UserHandler};
pub use handlers::{
    AddFeedHandler, AggHandler, BrowseHandler, FeedsHandler, FollowHandler, FollowingHandler,
    LoginHandler, RegisterHandler, ResetHandler, UnfollowHandler, UsersHandler,
};
pub use state::{Session, State};
