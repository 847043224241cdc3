//! Wire types for the JSON API. Field names follow the camelCase shape
//! the dashboard client already speaks.

use courier_core::domain::{GuildId, MessageId, NewReply, Recipient, UserId};
use courier_core::domain::{DispatchResult, GuildSummary};
use courier_core::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleDmRequest {
    pub token: Option<String>,
    pub user_id: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDmRequest {
    pub token: Option<String>,
    #[serde(default)]
    pub user_ids: Vec<String>,
    pub message: Option<String>,
    #[serde(default)]
    pub select_all: bool,
    /// Pause between sends, in milliseconds.
    pub delay: Option<u64>,
}

/// Body shared by the endpoints that only need a credential.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembersRequest {
    pub token: Option<String>,
    pub guild_id: Option<String>,
}

/// A reply submitted out of band, over POST or a WebSocket frame.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReplyRequest {
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub content: Option<String>,
    pub message_id: Option<String>,
    pub avatar_url: Option<String>,
    pub guild_id: Option<String>,
    pub guild_name: Option<String>,
}

impl SubmitReplyRequest {
    pub fn into_new_reply(self) -> Result<NewReply> {
        Ok(NewReply {
            user_id: UserId(require(self.user_id, "userId")?),
            username: require(self.username, "username")?,
            content: require(self.content, "content")?,
            source_message_id: MessageId(require(self.message_id, "messageId")?),
            avatar_url: self.avatar_url,
            guild_id: self.guild_id.filter(|s| !s.is_empty()).map(GuildId),
            guild_name: self.guild_name.filter(|s| !s.is_empty()),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AckResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildsResponse {
    pub success: bool,
    pub guilds: Vec<GuildSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MembersResponse {
    pub success: bool,
    pub members: Vec<Recipient>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDmResponse {
    pub success: bool,
    pub message: String,
    pub sent_count: usize,
    pub failed_count: usize,
    pub failed_ids: Vec<UserId>,
    pub reply_listener_active: bool,
}

impl BulkDmResponse {
    pub fn from_tally(tally: DispatchResult, listener_active: bool) -> Self {
        Self {
            success: true,
            message: format!(
                "dispatched to {} of {} targets",
                tally.success_count,
                tally.attempted()
            ),
            sent_count: tally.success_count,
            failed_count: tally.failed_count,
            failed_ids: tally.failed_ids,
            reply_listener_active: listener_active,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub uptime: u64,
}

/// Reject missing or blank required fields with the field's wire name.
pub fn require(value: Option<String>, field: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(Error::Validation(format!("{field} is required"))),
    }
}
