//! The single listening-session slot and the ingest task that turns
//! inbound direct messages into stored, broadcast replies.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    domain::{BotIdentity, InboundMessage, NewReply},
    hub::ReplyHub,
    platform::{ChatConnector, PlatformSession},
    Result,
};

struct ActiveListener {
    session: Arc<dyn PlatformSession>,
    cancel: CancellationToken,
    ingest: Option<JoinHandle<()>>,
}

/// Owns the at-most-one session that is listening for replies.
///
/// Replacing the listener is one critical section: the previous session
/// is retired before the new one is recorded, so there is never a moment
/// with two live gateway connections feeding the store.
pub struct ListenerService {
    hub: Arc<ReplyHub>,
    slot: Mutex<Option<ActiveListener>>,
}

impl ListenerService {
    pub fn new(hub: Arc<ReplyHub>) -> Self {
        Self {
            hub,
            slot: Mutex::new(None),
        }
    }

    /// Hand an already-open session the listener role.
    ///
    /// Any previous listener is destroyed first, even when the new session
    /// has no event stream left to attach to; in that case the slot is
    /// still taken so teardown stays in one place.
    pub async fn promote(&self, session: Arc<dyn PlatformSession>) {
        let mut slot = self.slot.lock().await;
        if let Some(previous) = slot.take() {
            retire(previous).await;
        }

        let identity = session.identity();
        let cancel = CancellationToken::new();
        let ingest = match session.take_events() {
            Some(events) => {
                let hub = self.hub.clone();
                let bot = identity.clone();
                let token = cancel.clone();
                Some(tokio::spawn(async move {
                    ingest_replies(bot, events, hub, token).await;
                }))
            }
            None => {
                warn!("session has no event stream; listener will not receive replies");
                None
            }
        };

        info!(bot = %identity.username, "reply listener active");
        *slot = Some(ActiveListener {
            session,
            cancel,
            ingest,
        });
    }

    /// Open a fresh session for `token` and promote it.
    ///
    /// When the open fails the current listener, if any, stays untouched.
    pub async fn start_standalone(&self, connector: &dyn ChatConnector, token: &str) -> Result<()> {
        let session = connector.open(token).await?;
        self.promote(session).await;
        Ok(())
    }

    pub async fn is_listening(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    /// Retire the current listener, if any. Used on shutdown.
    pub async fn shutdown(&self) {
        let mut slot = self.slot.lock().await;
        if let Some(previous) = slot.take() {
            retire(previous).await;
        }
    }
}

async fn retire(listener: ActiveListener) {
    listener.cancel.cancel();
    if let Some(handle) = listener.ingest {
        let _ = handle.await;
    }
    listener.session.destroy().await;
    debug!("previous listening session destroyed");
}

/// Consume a session's event stream until cancelled or the stream closes.
///
/// Only direct messages not authored by the session's own bot identity
/// become replies; everything else is dropped here.
async fn ingest_replies(
    bot: BotIdentity,
    mut events: mpsc::Receiver<InboundMessage>,
    hub: Arc<ReplyHub>,
    cancel: CancellationToken,
) {
    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => break,
            message = events.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        if !message.is_direct || message.author_id == bot.user_id {
            continue;
        }

        let reply = NewReply {
            user_id: message.author_id,
            username: message.author_name,
            content: message.content,
            source_message_id: message.message_id,
            avatar_url: message.avatar_url,
            guild_id: None,
            guild_name: None,
        };
        if let Err(e) = hub.publish(reply).await {
            warn!("failed to record inbound reply: {e}");
        }
    }
    debug!("reply ingest stopped");
}
