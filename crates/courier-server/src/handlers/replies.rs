use axum::extract::State;
use axum::Json;
use courier_core::domain::Reply;

use crate::dto::SubmitReplyRequest;
use crate::error::ApiResult;
use crate::router::AppState;

/// GET /replies: every stored reply, oldest first.
pub async fn list_replies(State(state): State<AppState>) -> ApiResult<Json<Vec<Reply>>> {
    Ok(Json(state.store.list().await?))
}

/// POST /replies: record a reply submitted out of band and broadcast it
/// to WebSocket subscribers like any gateway-sourced one.
pub async fn submit_reply(
    State(state): State<AppState>,
    Json(req): Json<SubmitReplyRequest>,
) -> ApiResult<Json<Reply>> {
    let reply = req.into_new_reply()?;
    Ok(Json(state.hub.publish(reply).await?))
}
