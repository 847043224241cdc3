//! Discord binding for the courier service, built on serenity.
//!
//! [`DiscordConnector`] implements the core `ChatConnector` port: opening a
//! session validates the token over REST before the gateway spins up, so a
//! rejected credential never leaves a half-open connection behind. The
//! returned [`DiscordSession`] serves member and guild queries over REST
//! and forwards gateway message events into the session's inbound stream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serenity::all::{
    Client, Context, EventHandler, GatewayIntents, GuildId as DiscordGuildId, Ready,
    UserId as DiscordUserId,
};
use serenity::gateway::ShardManager;
use serenity::http::{GuildPagination, Http, HttpError};
use serenity::model::channel::Message;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use courier_core::{
    domain::{
        BotIdentity, GuildId, GuildMember, GuildSummary, InboundMessage, MessageId, PlatformUser,
        UserId,
    },
    platform::{ChatConnector, PlatformSession},
    Error, Result,
};

/// Discord message character limit.
const MAX_MESSAGE_LENGTH: usize = 2000;

/// Page sizes for the paginated listing endpoints.
const GUILD_PAGE: u64 = 100;
const MEMBER_PAGE: u64 = 1000;

/// Opens Discord sessions. One connector serves the whole process; every
/// `open` call builds an independent client.
pub struct DiscordConnector {
    event_buffer: usize,
}

impl DiscordConnector {
    /// `event_buffer` bounds each session's inbound event channel; events
    /// past the bound are dropped, not queued.
    pub fn new(event_buffer: usize) -> Self {
        Self { event_buffer }
    }
}

#[async_trait]
impl ChatConnector for DiscordConnector {
    async fn open(&self, token: &str) -> Result<Arc<dyn PlatformSession>> {
        let intents = GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT;

        let (event_tx, event_rx) = mpsc::channel(self.event_buffer);
        let handler = ForwardHandler { events: event_tx };

        let client = Client::builder(token, intents)
            .event_handler(handler)
            .await
            .map_err(|e| Error::Platform(format!("discord client setup failed: {e}")))?;

        // Validate the credential before the gateway starts.
        let current = client
            .http
            .get_current_user()
            .await
            .map_err(credential_err)?;
        let identity = BotIdentity {
            user_id: UserId(current.id.to_string()),
            username: current.name.clone(),
        };

        let http = client.http.clone();
        let shard_manager = client.shard_manager.clone();
        let bot = identity.username.clone();
        let gateway = tokio::spawn(async move {
            let mut client = client;
            if let Err(e) = client.start().await {
                warn!(bot = %bot, "discord gateway exited with error: {e}");
            }
        });

        info!(bot = %identity.username, "discord session opened");
        Ok(Arc::new(DiscordSession {
            http,
            shard_manager,
            identity,
            events: Mutex::new(Some(event_rx)),
            gateway: Mutex::new(Some(gateway)),
            destroyed: AtomicBool::new(false),
        }))
    }
}

/// A live Discord connection: REST handle plus the running gateway.
pub struct DiscordSession {
    http: Arc<Http>,
    shard_manager: Arc<ShardManager>,
    identity: BotIdentity,
    events: Mutex<Option<mpsc::Receiver<InboundMessage>>>,
    gateway: Mutex<Option<JoinHandle<()>>>,
    destroyed: AtomicBool,
}

#[async_trait]
impl PlatformSession for DiscordSession {
    fn identity(&self) -> BotIdentity {
        self.identity.clone()
    }

    async fn list_guilds(&self) -> Result<Vec<GuildSummary>> {
        let mut summaries = Vec::new();
        let mut after: Option<DiscordGuildId> = None;
        loop {
            let page = self
                .http
                .get_guilds(after.map(GuildPagination::After), Some(GUILD_PAGE))
                .await
                .map_err(|e| platform_err("guild listing failed", e))?;
            for info in &page {
                // The listing row carries no member count; each guild needs
                // its own lookup. A guild that fails it is left out.
                match self.http.get_guild_with_counts(info.id).await {
                    Ok(guild) => summaries.push(GuildSummary {
                        id: GuildId(info.id.to_string()),
                        name: guild.name.clone(),
                        member_count: guild.approximate_member_count.unwrap_or(0),
                        icon_url: guild.icon_url(),
                    }),
                    Err(e) => warn!(guild = %info.id, "skipping guild without details: {e}"),
                }
            }
            after = page.last().map(|info| info.id);
            if (page.len() as u64) < GUILD_PAGE {
                break;
            }
        }
        Ok(summaries)
    }

    async fn get_guild(&self, guild: &GuildId) -> Result<GuildSummary> {
        let gid = parse_guild_id(guild)?;
        let fetched = self
            .http
            .get_guild_with_counts(gid)
            .await
            .map_err(|e| platform_err("guild lookup failed", e))?;
        Ok(GuildSummary {
            id: guild.clone(),
            name: fetched.name.clone(),
            member_count: fetched.approximate_member_count.unwrap_or(0),
            icon_url: fetched.icon_url(),
        })
    }

    async fn list_members(&self, guild: &GuildId) -> Result<Vec<GuildMember>> {
        let gid = parse_guild_id(guild)?;
        let mut members = Vec::new();
        let mut after: Option<DiscordUserId> = None;
        loop {
            let page = gid
                .members(&self.http, Some(MEMBER_PAGE), after)
                .await
                .map_err(|e| platform_err("member listing failed", e))?;
            for member in &page {
                members.push(GuildMember {
                    id: UserId(member.user.id.to_string()),
                    display_name: member
                        .nick
                        .clone()
                        .or_else(|| member.user.global_name.clone())
                        .unwrap_or_else(|| member.user.name.clone()),
                    is_bot: member.user.bot,
                });
            }
            after = page.last().map(|member| member.user.id);
            if (page.len() as u64) < MEMBER_PAGE {
                break;
            }
        }
        Ok(members)
    }

    async fn resolve_user(&self, id: &UserId) -> Result<PlatformUser> {
        let uid = parse_user_id(id)?;
        let user = self
            .http
            .get_user(uid)
            .await
            .map_err(|e| platform_err("user lookup failed", e))?;
        Ok(PlatformUser {
            id: id.clone(),
            username: user.name.clone(),
            is_bot: user.bot,
        })
    }

    async fn send_dm(&self, user: &UserId, text: &str) -> Result<()> {
        let uid = parse_user_id(user)?;
        let channel = uid
            .create_dm_channel(&self.http)
            .await
            .map_err(|e| platform_err("dm channel open failed", e))?;
        channel
            .id
            .say(&self.http, truncate(text))
            .await
            .map_err(|e| platform_err("dm send failed", e))?;
        Ok(())
    }

    fn take_events(&self) -> Option<mpsc::Receiver<InboundMessage>> {
        self.events.lock().ok().and_then(|mut guard| guard.take())
    }

    async fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shard_manager.shutdown_all().await;
        let gateway = self.gateway.lock().ok().and_then(|mut guard| guard.take());
        if let Some(handle) = gateway {
            let _ = handle.await;
        }
        debug!(bot = %self.identity.username, "discord session destroyed");
    }
}

/// Forwards gateway message events into the session's bounded channel.
struct ForwardHandler {
    events: mpsc::Sender<InboundMessage>,
}

#[async_trait]
impl EventHandler for ForwardHandler {
    async fn message(&self, _ctx: Context, msg: Message) {
        let inbound = InboundMessage {
            message_id: MessageId(msg.id.to_string()),
            author_id: UserId(msg.author.id.to_string()),
            author_name: msg.author.name.clone(),
            content: msg.content.clone(),
            avatar_url: msg.author.avatar_url(),
            is_direct: msg.guild_id.is_none(),
        };
        // Only the listening session consumes its stream; for every other
        // session the channel just fills once and later events fall out here.
        if let Err(mpsc::error::TrySendError::Full(_)) = self.events.try_send(inbound) {
            debug!("inbound event buffer full, dropping message");
        }
    }

    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(bot = %ready.user.name, "discord gateway connected");
    }
}

fn parse_user_id(id: &UserId) -> Result<DiscordUserId> {
    id.0.trim()
        .parse::<u64>()
        .ok()
        .filter(|n| *n != 0)
        .map(DiscordUserId::new)
        .ok_or_else(|| Error::Platform(format!("invalid user id: {}", id.0)))
}

fn parse_guild_id(id: &GuildId) -> Result<DiscordGuildId> {
    id.0.trim()
        .parse::<u64>()
        .ok()
        .filter(|n| *n != 0)
        .map(DiscordGuildId::new)
        .ok_or_else(|| Error::Platform(format!("invalid guild id: {}", id.0)))
}

/// A 401 on the identity probe means the credential itself was rejected;
/// anything else (network, outage) is a platform failure.
fn credential_err(e: serenity::Error) -> Error {
    if let serenity::Error::Http(HttpError::UnsuccessfulRequest(response)) = &e {
        if response.status_code.as_u16() == 401 {
            return Error::Auth(format!("discord rejected the bot token: {e}"));
        }
    }
    Error::Platform(format!("credential check failed: {e}"))
}

fn platform_err(context: &str, e: serenity::Error) -> Error {
    Error::Platform(format!("{context}: {e}"))
}

/// Cut `text` to the Discord message limit on a char boundary.
fn truncate(text: &str) -> &str {
    if text.len() <= MAX_MESSAGE_LENGTH {
        return text;
    }
    let mut end = MAX_MESSAGE_LENGTH;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_messages_pass_through_untouched() {
        assert_eq!(truncate("hello"), "hello");
    }

    #[test]
    fn long_messages_are_cut_to_the_limit() {
        let long = "x".repeat(MAX_MESSAGE_LENGTH + 50);
        assert_eq!(truncate(&long).len(), MAX_MESSAGE_LENGTH);
    }

    #[test]
    fn truncation_never_splits_a_char() {
        // Four-byte scorpions straddling the limit.
        let long = "\u{1f982}".repeat(600);
        let cut = truncate(&long);
        assert!(cut.len() <= MAX_MESSAGE_LENGTH);
        assert!(cut.chars().all(|c| c == '\u{1f982}'));
    }

    #[test]
    fn non_numeric_ids_are_rejected() {
        assert!(parse_user_id(&UserId("not-a-snowflake".to_string())).is_err());
        assert!(parse_user_id(&UserId("0".to_string())).is_err());
        assert!(parse_user_id(&UserId("123456789".to_string())).is_ok());
    }
}
