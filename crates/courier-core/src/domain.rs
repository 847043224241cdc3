use serde::{Deserialize, Serialize};

/// Platform user id. Kept in its string wire form: Discord snowflakes
/// exceed 2^53 and travel as JSON strings.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Platform guild id (string wire form).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuildId(pub String);

impl std::fmt::Display for GuildId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Platform message id (string wire form).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

/// The bot identity a session authenticated as.
#[derive(Clone, Debug)]
pub struct BotIdentity {
    pub user_id: UserId,
    pub username: String,
}

/// Summary of one guild visible to a session.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildSummary {
    pub id: GuildId,
    pub name: String,
    pub member_count: u64,
    pub icon_url: Option<String>,
}

/// One row from a guild member listing.
#[derive(Clone, Debug)]
pub struct GuildMember {
    pub id: UserId,
    pub display_name: String,
    pub is_bot: bool,
}

/// A member as returned by the preview query: deduplicated across guilds
/// and tagged with the guild it was first found in. Never persisted.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub id: UserId,
    pub display_name: String,
    pub is_bot: bool,
    pub guild_id: GuildId,
    pub guild_name: String,
}

/// A platform user as resolved at send time.
#[derive(Clone, Debug)]
pub struct PlatformUser {
    pub id: UserId,
    pub username: String,
    pub is_bot: bool,
}

/// Tally of one bulk dispatch invocation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchResult {
    pub success_count: usize,
    pub failed_count: usize,
    pub failed_ids: Vec<UserId>,
}

impl DispatchResult {
    /// Targets actually attempted (bot-skips count in neither bucket).
    pub fn attempted(&self) -> usize {
        self.success_count + self.failed_count
    }
}

/// A stored inbound reply. Immutable once persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub user_id: UserId,
    pub username: String,
    pub content: String,
    pub source_message_id: MessageId,
    /// Epoch milliseconds, strictly increasing in store order.
    pub timestamp: i64,
    pub avatar_url: Option<String>,
    pub guild_id: Option<GuildId>,
    pub guild_name: Option<String>,
}

/// Reply fields as they arrive, before the store assigns a timestamp.
#[derive(Clone, Debug)]
pub struct NewReply {
    pub user_id: UserId,
    pub username: String,
    pub content: String,
    pub source_message_id: MessageId,
    pub avatar_url: Option<String>,
    pub guild_id: Option<GuildId>,
    pub guild_name: Option<String>,
}

/// One message from a session's inbound event stream, before the reply
/// filter is applied.
#[derive(Clone, Debug)]
pub struct InboundMessage {
    pub message_id: MessageId,
    pub author_id: UserId,
    pub author_name: String,
    pub content: String,
    pub avatar_url: Option<String>,
    /// True when the message arrived on a direct (non-guild) channel.
    pub is_direct: bool,
}
