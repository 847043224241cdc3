use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use crate::{
    domain::{NewReply, Reply},
    store::ReplyStore,
    Result,
};

pub type SubscriberId = u64;

/// Wire event pushed to reply-feed subscribers. Serialized once per publish
/// and fanned out as text frames.
#[derive(Serialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum Event<'a> {
    InitialReplies(&'a [Reply]),
    NewReply(&'a Reply),
}

impl Event<'_> {
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

struct Subscriber {
    id: SubscriberId,
    tx: mpsc::Sender<String>,
}

struct HubState {
    subscribers: Vec<Subscriber>,
    next_id: SubscriberId,
}

/// Fan-out point for the live reply feed.
///
/// Both `attach` and `publish` run under the same lock, so a subscriber's
/// initial snapshot and the stream of deltas after it never miss or repeat
/// a reply: every publish lands either in the snapshot or after it, never
/// both.
pub struct ReplyHub {
    store: Arc<dyn ReplyStore>,
    state: Mutex<HubState>,
}

impl ReplyHub {
    pub fn new(store: Arc<dyn ReplyStore>) -> Self {
        Self {
            store,
            state: Mutex::new(HubState {
                subscribers: Vec::new(),
                next_id: 1,
            }),
        }
    }

    /// Register a subscriber and hand it the current reply history as an
    /// `initialReplies` event. Returns the id to `detach` with.
    pub async fn attach(&self, tx: mpsc::Sender<String>) -> Result<SubscriberId> {
        let mut state = self.state.lock().await;
        let history = self.store.list().await?;
        let snapshot = Event::InitialReplies(&history).encode()?;

        let id = state.next_id;
        state.next_id += 1;

        match tx.try_send(snapshot) {
            Ok(()) => {
                state.subscribers.push(Subscriber { id, tx });
                debug!("reply feed subscriber {id} attached ({} replies sent)", history.len());
            }
            Err(_) => {
                // Receiver vanished before the snapshot went out; nothing to
                // register.
                warn!("reply feed subscriber {id} went away during attach");
            }
        }
        Ok(id)
    }

    /// Remove a subscriber. Unknown ids are a no-op.
    pub async fn detach(&self, id: SubscriberId) {
        let mut state = self.state.lock().await;
        state.subscribers.retain(|s| s.id != id);
        debug!("reply feed subscriber {id} detached");
    }

    /// Persist a reply and broadcast it to every live subscriber. If the
    /// store rejects the insert nothing is broadcast.
    pub async fn publish(&self, reply: NewReply) -> Result<Reply> {
        let mut state = self.state.lock().await;
        let stored = self.store.insert(reply).await?;
        let frame = Event::NewReply(&stored).encode()?;

        state.subscribers.retain(|s| match s.tx.try_send(frame.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("reply feed subscriber {} is lagging; dropping event", s.id);
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("reply feed subscriber {} closed; pruning", s.id);
                false
            }
        });
        Ok(stored)
    }

    pub async fn subscriber_count(&self) -> usize {
        self.state.lock().await.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{MessageId, UserId},
        store::MemoryReplyStore,
        Error,
    };
    use async_trait::async_trait;
    use serde_json::Value;

    fn new_reply(user: &str, content: &str) -> NewReply {
        NewReply {
            user_id: UserId(user.to_string()),
            username: user.to_string(),
            content: content.to_string(),
            source_message_id: MessageId(format!("m-{user}-{content}")),
            avatar_url: None,
            guild_id: None,
            guild_name: None,
        }
    }

    fn event_type(frame: &str) -> String {
        let v: Value = serde_json::from_str(frame).unwrap();
        v["type"].as_str().unwrap().to_string()
    }

    struct FailingStore;

    #[async_trait]
    impl ReplyStore for FailingStore {
        async fn insert(&self, _reply: NewReply) -> Result<Reply> {
            Err(Error::Store("disk full".to_string()))
        }

        async fn list(&self) -> Result<Vec<Reply>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn attach_sends_history_snapshot_first() {
        let store = Arc::new(MemoryReplyStore::new());
        let hub = ReplyHub::new(store.clone());
        store.insert(new_reply("alice", "earlier")).await.unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        hub.attach(tx).await.unwrap();
        hub.publish(new_reply("bob", "later")).await.unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(event_type(&first), "initialReplies");
        let v: Value = serde_json::from_str(&first).unwrap();
        assert_eq!(v["data"].as_array().unwrap().len(), 1);

        let second = rx.recv().await.unwrap();
        assert_eq!(event_type(&second), "newReply");
        let v: Value = serde_json::from_str(&second).unwrap();
        assert_eq!(v["data"]["content"], "later");
    }

    #[tokio::test]
    async fn publish_reaches_every_subscriber() {
        let hub = ReplyHub::new(Arc::new(MemoryReplyStore::new()));
        let (tx1, mut rx1) = mpsc::channel(8);
        let (tx2, mut rx2) = mpsc::channel(8);
        hub.attach(tx1).await.unwrap();
        hub.attach(tx2).await.unwrap();

        hub.publish(new_reply("alice", "hello")).await.unwrap();

        // Skip each subscriber's snapshot, then expect the delta.
        for rx in [&mut rx1, &mut rx2] {
            let snapshot = rx.recv().await.unwrap();
            assert_eq!(event_type(&snapshot), "initialReplies");
            let delta = rx.recv().await.unwrap();
            assert_eq!(event_type(&delta), "newReply");
        }
    }

    #[tokio::test]
    async fn closed_subscribers_are_pruned_on_publish() {
        let hub = ReplyHub::new(Arc::new(MemoryReplyStore::new()));
        let (tx1, rx1) = mpsc::channel(8);
        let (tx2, mut rx2) = mpsc::channel(8);
        hub.attach(tx1).await.unwrap();
        hub.attach(tx2).await.unwrap();
        assert_eq!(hub.subscriber_count().await, 2);

        drop(rx1);
        hub.publish(new_reply("alice", "hello")).await.unwrap();
        assert_eq!(hub.subscriber_count().await, 1);

        let snapshot = rx2.recv().await.unwrap();
        assert_eq!(event_type(&snapshot), "initialReplies");
        let delta = rx2.recv().await.unwrap();
        assert_eq!(event_type(&delta), "newReply");
    }

    #[tokio::test]
    async fn detach_stops_delivery() {
        let hub = ReplyHub::new(Arc::new(MemoryReplyStore::new()));
        let (tx, mut rx) = mpsc::channel(8);
        let id = hub.attach(tx).await.unwrap();
        let _ = rx.recv().await; // snapshot

        hub.detach(id).await;
        assert_eq!(hub.subscriber_count().await, 0);

        hub.publish(new_reply("alice", "hello")).await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn store_failure_suppresses_broadcast() {
        let hub = ReplyHub::new(Arc::new(FailingStore));
        let (tx, mut rx) = mpsc::channel(8);
        hub.attach(tx).await.unwrap();
        let _ = rx.recv().await; // snapshot

        let err = hub.publish(new_reply("alice", "lost")).await.unwrap_err();
        assert!(matches!(err, Error::Store(_)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn late_subscriber_sees_each_reply_exactly_once() {
        let hub = Arc::new(ReplyHub::new(Arc::new(MemoryReplyStore::new())));

        let publisher = {
            let hub = hub.clone();
            tokio::spawn(async move {
                for i in 0..50 {
                    hub.publish(new_reply("alice", &format!("{i}"))).await.unwrap();
                    if i == 20 {
                        tokio::task::yield_now().await;
                    }
                }
            })
        };

        tokio::task::yield_now().await;
        let (tx, mut rx) = mpsc::channel(128);
        hub.attach(tx).await.unwrap();
        publisher.await.unwrap();

        let mut seen = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            let v: Value = serde_json::from_str(&frame).unwrap();
            match v["type"].as_str().unwrap() {
                "initialReplies" => {
                    for r in v["data"].as_array().unwrap() {
                        seen.push(r["content"].as_str().unwrap().parse::<u32>().unwrap());
                    }
                }
                "newReply" => {
                    seen.push(v["data"]["content"].as_str().unwrap().parse::<u32>().unwrap());
                }
                other => panic!("unexpected event {other}"),
            }
        }

        seen.sort_unstable();
        assert_eq!(seen, (0..50).collect::<Vec<_>>());
    }
}
