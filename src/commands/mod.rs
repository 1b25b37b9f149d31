//! Named CLI commands and the registry that dispatches them.

mod handlers;
pub mod middleware;
mod registry;

use thiserror::Error;

use crate::browser::OpenUrlError;
use crate::cache::CacheError;
use crate::db::DbError;

pub use registry::{
    CommandRegistry, DispatchError, Handler, HandlerFn, HandlerFuture, Invocation, UserHandlerFn,
};

use middleware::logged_in;

/// A command name plus its positional arguments, as typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
}

impl Command {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    /// Wrong arguments; the dispatcher prints the usage text instead of failing
    #[error("invalid arguments")]
    Usage { hint: Option<String> },

    #[error("not logged in; run 'register <name>' or 'login <name>' first")]
    NotLoggedIn,

    #[error("user '{0}' does not exist")]
    UnknownUser(String),

    #[error("no feed with url {0}; add it with 'addfeed' first")]
    UnknownFeed(String),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("{what} already exists: {key}")]
    AlreadyExists { what: &'static str, key: String },

    #[error("already following {0}")]
    AlreadyFollowing(String),

    #[error("not following {0}")]
    NotFollowing(String),

    #[error("browse_limit in the config must be a positive number, got {0}")]
    InvalidBrowseLimit(i64),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    UnsafeUrl(#[from] OpenUrlError),

    #[error(transparent)]
    Db(DbError),

    #[error("config error: {0:#}")]
    Config(#[from] anyhow::Error),
}

impl CommandError {
    pub fn usage() -> Self {
        CommandError::Usage { hint: None }
    }

    pub fn usage_hint(hint: impl Into<String>) -> Self {
        CommandError::Usage {
            hint: Some(hint.into()),
        }
    }
}

impl From<DbError> for CommandError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Conflict { what, key } => CommandError::AlreadyExists { what, key },
            other => CommandError::Db(other),
        }
    }
}

/// Build the registry with every gator command.
pub fn registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new();

    registry.register(
        "addfeed",
        logged_in(handlers::add_feed),
        "addfeed <name> <url> - add a feed and follow it",
    );
    registry.register(
        "agg",
        Handler::Plain(handlers::agg),
        "agg <interval> - fetch feeds every interval, e.g. 30s, 1m, 1h30m",
    );
    registry.register(
        "allfollows",
        Handler::Plain(handlers::all_follows),
        "allfollows - list every follow",
    );
    registry.register(
        "browse",
        logged_in(handlers::browse),
        "browse [limit] - show the newest posts from followed feeds",
    );
    registry.register(
        "feeds",
        logged_in(handlers::feeds),
        "feeds - list all feeds",
    );
    registry.register(
        "follow",
        logged_in(handlers::follow),
        "follow <url> - follow an existing feed",
    );
    registry.register(
        "following",
        logged_in(handlers::following),
        "following - list the feeds you follow",
    );
    registry.register(
        "help",
        Handler::Plain(handlers::help),
        "help [command] - show usage",
    );
    registry.register(
        "login",
        Handler::Plain(handlers::login),
        "login <username> - switch to an existing user",
    );
    registry.register(
        "openpost",
        Handler::Plain(handlers::open_post),
        "openpost <index> - open a post from the last browse",
    );
    registry.register(
        "register",
        Handler::Plain(handlers::register),
        "register <username> - create a user and log in",
    );
    registry.register(
        "reset",
        Handler::Plain(handlers::reset),
        "reset - delete all users, feeds and posts",
    );
    registry.register(
        "unfollow",
        logged_in(handlers::unfollow),
        "unfollow <url> - stop following a feed",
    );
    registry.register(
        "users",
        Handler::Plain(handlers::users),
        "users - list all users",
    );

    registry
}
