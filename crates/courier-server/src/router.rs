use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

use courier_core::config::Config;
use courier_core::hub::ReplyHub;
use courier_core::listener::ListenerService;
use courier_core::platform::ChatConnector;
use courier_core::store::ReplyStore;
use courier_core::Result;

use crate::{handlers, ws};

/// Everything a handler can reach, cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub connector: Arc<dyn ChatConnector>,
    pub listener: Arc<ListenerService>,
    pub hub: Arc<ReplyHub>,
    pub store: Arc<dyn ReplyStore>,
    pub started: Instant,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        connector: Arc<dyn ChatConnector>,
        listener: Arc<ListenerService>,
        hub: Arc<ReplyHub>,
        store: Arc<dyn ReplyStore>,
    ) -> Self {
        Self {
            config,
            connector,
            listener,
            hub,
            store,
            started: Instant::now(),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/dm/single", post(handlers::dm_single))
        .route("/dm/bulk", post(handlers::dm_bulk))
        .route("/guilds", post(handlers::list_guilds))
        .route("/guild/members", post(handlers::guild_members))
        .route("/startReplyListener", post(handlers::start_reply_listener))
        .route(
            "/replies",
            get(handlers::list_replies).post(handlers::submit_reply),
        )
        .route("/health", get(handlers::health))
        .route("/ws", get(ws::ws_handler))
        .layer(middleware::from_fn(log_requests))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until ctrl-c. Callers tear down the listener service afterwards.
pub async fn run(state: AppState) -> Result<()> {
    let bind = state.config.http_bind.clone();
    let app = build_router(state);
    let listener = TcpListener::bind(&bind).await?;
    info!("http server listening on {bind}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}

async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let response = next.run(req).await;
    debug!(%method, path, status = response.status().as_u16(), "http request");
    response
}
