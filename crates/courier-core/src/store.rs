use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::{
    domain::{NewReply, Reply},
    Result,
};

/// Durable append-only persistence for replies.
#[async_trait]
pub trait ReplyStore: Send + Sync {
    /// Persist `reply`, assigning the next monotonic timestamp, and return
    /// the stored record.
    async fn insert(&self, reply: NewReply) -> Result<Reply>;

    /// Every stored reply, timestamp ascending.
    async fn list(&self) -> Result<Vec<Reply>>;
}

/// Stamp an incoming reply with a strictly increasing epoch-ms timestamp.
/// Two arrivals in the same millisecond keep their arrival order.
fn stamp(reply: NewReply, last_timestamp: i64) -> Reply {
    let now = Utc::now().timestamp_millis();
    Reply {
        user_id: reply.user_id,
        username: reply.username,
        content: reply.content,
        source_message_id: reply.source_message_id,
        timestamp: now.max(last_timestamp + 1),
        avatar_url: reply.avatar_url,
        guild_id: reply.guild_id,
        guild_name: reply.guild_name,
    }
}

/// In-memory store. Used when no persistence path is configured, and by
/// tests.
#[derive(Default)]
pub struct MemoryReplyStore {
    replies: Mutex<Vec<Reply>>,
}

impl MemoryReplyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReplyStore for MemoryReplyStore {
    async fn insert(&self, reply: NewReply) -> Result<Reply> {
        let mut replies = self.replies.lock().await;
        let last = replies.last().map(|r| r.timestamp).unwrap_or(0);
        let stored = stamp(reply, last);
        replies.push(stored.clone());
        Ok(stored)
    }

    async fn list(&self) -> Result<Vec<Reply>> {
        Ok(self.replies.lock().await.clone())
    }
}

/// File-backed store: a single JSON array, loaded at startup and rewritten
/// on every insert. Fine for the reply volumes a DM listener sees.
pub struct JsonFileReplyStore {
    path: PathBuf,
    replies: Mutex<Vec<Reply>>,
}

impl JsonFileReplyStore {
    /// Open the store, loading any existing replies from `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut replies = load_replies_file(&path)?;
        replies.sort_by_key(|r| r.timestamp);
        Ok(Self {
            path,
            replies: Mutex::new(replies),
        })
    }
}

#[async_trait]
impl ReplyStore for JsonFileReplyStore {
    async fn insert(&self, reply: NewReply) -> Result<Reply> {
        let mut replies = self.replies.lock().await;
        let last = replies.last().map(|r| r.timestamp).unwrap_or(0);
        let stored = stamp(reply, last);
        replies.push(stored.clone());
        if let Err(e) = save_replies_file(&self.path, &replies) {
            // Keep memory and disk consistent: an insert that did not reach
            // disk is not an insert.
            replies.pop();
            return Err(e);
        }
        Ok(stored)
    }

    async fn list(&self) -> Result<Vec<Reply>> {
        Ok(self.replies.lock().await.clone())
    }
}

fn load_replies_file(path: &Path) -> Result<Vec<Reply>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let txt = std::fs::read_to_string(path)?;
    if txt.trim().is_empty() {
        return Ok(Vec::new());
    }
    let replies: Vec<Reply> = serde_json::from_str(&txt)?;
    Ok(replies)
}

fn save_replies_file(path: &Path, replies: &[Reply]) -> Result<()> {
    let txt = serde_json::to_string(replies)?;
    std::fs::write(path, txt)?;
    Ok(())
}
