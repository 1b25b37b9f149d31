use super::registry::{Handler, UserHandlerFn};
use super::CommandError;
use crate::db::User;
use crate::state::AppState;

/// Wrap a handler so it only runs for the configured user.
pub fn logged_in(handler: UserHandlerFn) -> Handler {
    Handler::LoggedIn(handler)
}

/// Resolve the configured username to a stored user.
pub async fn current_user(state: &AppState) -> Result<User, CommandError> {
    let name = state
        .config
        .read()
        .await
        .current_user_name
        .clone()
        .ok_or(CommandError::NotLoggedIn)?;

    state
        .db
        .get_user(&name)
        .await?
        .ok_or(CommandError::UnknownUser(name))
}
