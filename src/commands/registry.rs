use std::collections::HashMap;

use futures::future::BoxFuture;
use thiserror::Error;

use super::middleware;
use super::{Command, CommandError};
use crate::db::User;
use crate::state::AppState;

pub type HandlerFuture<'a> = BoxFuture<'a, Result<(), CommandError>>;

/// A handler that runs without a logged-in user.
pub type HandlerFn = for<'a> fn(Invocation<'a>) -> HandlerFuture<'a>;

/// A handler that receives the current user resolved by the middleware.
pub type UserHandlerFn = for<'a> fn(Invocation<'a>, User) -> HandlerFuture<'a>;

/// What a handler sees of the world during one dispatch.
#[derive(Clone, Copy)]
pub struct Invocation<'a> {
    pub state: &'a AppState,
    pub registry: &'a CommandRegistry,
    pub command: &'a Command,
}

impl<'a> Invocation<'a> {
    pub fn args(&self) -> &'a [String] {
        &self.command.args
    }
}

#[derive(Clone, Copy)]
pub enum Handler {
    Plain(HandlerFn),
    /// Runs [`middleware::current_user`] first and passes its user on.
    LoggedIn(UserHandlerFn),
}

impl Handler {
    async fn call(self, invocation: Invocation<'_>) -> Result<(), CommandError> {
        match self {
            Handler::Plain(handler) => handler(invocation).await,
            Handler::LoggedIn(handler) => {
                let user = middleware::current_user(invocation.state).await?;
                handler(invocation, user).await
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
    /// The command's own message; it is not chained as a separate cause.
    #[error("{command}: {error}")]
    Failed { command: String, error: CommandError },
}

struct Entry {
    handler: Handler,
    help: String,
}

#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<String, Entry>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registering a name twice keeps the last handler.
    pub fn register(&mut self, name: &str, handler: Handler, help: &str) {
        self.commands.insert(
            name.to_string(),
            Entry {
                handler,
                help: help.to_string(),
            },
        );
    }

    pub fn describe(&self, name: &str) -> Option<&str> {
        self.commands.get(name).map(|entry| entry.help.as_str())
    }

    /// `(name, help)` for every command, sorted by name.
    pub fn describe_all(&self) -> Vec<(&str, &str)> {
        let mut all: Vec<_> = self
            .commands
            .iter()
            .map(|(name, entry)| (name.as_str(), entry.help.as_str()))
            .collect();
        all.sort_unstable_by_key(|(name, _)| *name);
        all
    }

    pub async fn dispatch(&self, state: &AppState, command: &Command) -> Result<(), DispatchError> {
        let entry = self
            .commands
            .get(&command.name)
            .ok_or_else(|| DispatchError::UnknownCommand(command.name.clone()))?;

        let invocation = Invocation {
            state,
            registry: self,
            command,
        };

        match entry.handler.call(invocation).await {
            Ok(()) => Ok(()),
            Err(CommandError::Usage { hint }) => {
                if let Some(hint) = hint {
                    println!("{}", hint);
                }
                println!("Usage: {}", entry.help);
                Ok(())
            }
            Err(error) => Err(DispatchError::Failed {
                command: command.name.clone(),
                error,
            }),
        }
    }
}
