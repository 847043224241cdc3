use std::sync::Arc;

use tracing::info;

use courier_core::{
    config::Config,
    hub::ReplyHub,
    listener::ListenerService,
    store::{JsonFileReplyStore, MemoryReplyStore, ReplyStore},
};
use courier_discord::DiscordConnector;
use courier_server::AppState;

#[tokio::main]
async fn main() -> Result<(), courier_core::Error> {
    courier_core::logging::init("courier")?;

    let cfg = Arc::new(Config::load()?);

    let store: Arc<dyn ReplyStore> = match &cfg.reply_store_path {
        Some(path) => {
            info!("persisting replies to {}", path.display());
            Arc::new(JsonFileReplyStore::open(path)?)
        }
        None => {
            info!("no REPLY_STORE_PATH set, replies are kept in memory");
            Arc::new(MemoryReplyStore::new())
        }
    };

    let hub = Arc::new(ReplyHub::new(store.clone()));
    let listener = Arc::new(ListenerService::new(hub.clone()));
    let connector = Arc::new(DiscordConnector::new(cfg.inbound_event_buffer));

    let state = AppState::new(cfg, connector, listener.clone(), hub, store);
    courier_server::run(state).await?;

    // The server has drained; take the listening session down with it.
    listener.shutdown().await;
    info!("shutdown complete");
    Ok(())
}
