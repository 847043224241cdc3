//! Request handlers, one module per resource family.

mod dispatch;
mod guilds;
mod health;
mod replies;

pub use dispatch::{dm_bulk, dm_single, start_reply_listener};
pub use guilds::{guild_members, list_guilds};
pub use health::health;
pub use replies::{list_replies, submit_reply};

use courier_core::{Error, Result};

use crate::router::AppState;

/// Pick the effective bot token. Process configuration wins over the
/// per-request credential whenever both are present.
pub(crate) fn resolve_token(state: &AppState, request_token: Option<String>) -> Result<String> {
    if let Some(token) = &state.config.bot_token {
        return Ok(token.clone());
    }
    match request_token {
        Some(token) if !token.trim().is_empty() => Ok(token),
        _ => Err(Error::Validation(
            "no bot token provided: set DISCORD_BOT_TOKEN or pass one in the request".to_string(),
        )),
    }
}
