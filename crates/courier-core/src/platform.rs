use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{
    domain::{BotIdentity, GuildId, GuildMember, GuildSummary, InboundMessage, PlatformUser, UserId},
    Result,
};

/// Opens authenticated platform sessions.
///
/// The Discord adapter is the production implementation; tests inject
/// fakes behind the same trait.
#[async_trait]
pub trait ChatConnector: Send + Sync {
    /// Authenticate `token` against the platform and return a live session.
    ///
    /// Fails with `Error::Auth` when the platform rejects the credential,
    /// leaving no partially-open connection behind.
    async fn open(&self, token: &str) -> Result<Arc<dyn PlatformSession>>;
}

/// An authenticated handle to the chat platform.
///
/// Whoever holds the session last owns its teardown: the dispatch path
/// destroys sessions it does not hand off, and the listener service
/// destroys the session it replaces.
#[async_trait]
pub trait PlatformSession: Send + Sync {
    /// The bot identity this session authenticated as.
    fn identity(&self) -> BotIdentity;

    /// Every guild the session can see.
    async fn list_guilds(&self) -> Result<Vec<GuildSummary>>;

    /// Look up a single guild by id.
    async fn get_guild(&self, guild: &GuildId) -> Result<GuildSummary>;

    /// The member list of one guild.
    async fn list_members(&self, guild: &GuildId) -> Result<Vec<GuildMember>>;

    /// Resolve a raw id to a platform user.
    async fn resolve_user(&self, id: &UserId) -> Result<PlatformUser>;

    /// Open (or reuse) the direct channel to `user` and send `text`.
    async fn send_dm(&self, user: &UserId, text: &str) -> Result<()>;

    /// Hand out the session's inbound event stream.
    ///
    /// Returns `None` after the first call; a session's events have
    /// exactly one consumer.
    fn take_events(&self) -> Option<mpsc::Receiver<InboundMessage>>;

    /// Tear down the platform connection. Idempotent; safe to call on an
    /// already-destroyed session.
    async fn destroy(&self);
}
