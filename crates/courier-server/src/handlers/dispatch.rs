use axum::extract::State;
use axum::Json;
use courier_core::dispatch::send_bulk;
use courier_core::domain::UserId;
use courier_core::platform::PlatformSession;
use courier_core::resolver::resolve_targets;
use courier_core::Error;
use tracing::info;

use crate::dto::{
    require, AckResponse, BulkDmRequest, BulkDmResponse, SingleDmRequest, TokenRequest,
};
use crate::error::ApiResult;
use crate::handlers::resolve_token;
use crate::router::AppState;

/// POST /dm/single: one-off DM over a throwaway session.
pub async fn dm_single(
    State(state): State<AppState>,
    Json(req): Json<SingleDmRequest>,
) -> ApiResult<Json<AckResponse>> {
    let token = resolve_token(&state, req.token)?;
    let user_id = UserId(require(req.user_id, "userId")?);
    let message = require(req.message, "message")?;

    let session = state.connector.open(&token).await?;
    let outcome = send_single(session.as_ref(), &user_id, &message).await;
    // This session is never handed off, so it dies here on both paths.
    session.destroy().await;
    let username = outcome?;

    Ok(Json(AckResponse {
        success: true,
        message: format!("message sent to {username}"),
    }))
}

async fn send_single(
    session: &dyn PlatformSession,
    user: &UserId,
    message: &str,
) -> courier_core::Result<String> {
    let resolved = session.resolve_user(user).await?;
    session.send_dm(user, message).await?;
    Ok(resolved.username)
}

/// POST /dm/bulk: resolve targets, walk them sequentially, then hand the
/// session off as the reply listener.
pub async fn dm_bulk(
    State(state): State<AppState>,
    Json(req): Json<BulkDmRequest>,
) -> ApiResult<Json<BulkDmResponse>> {
    let token = resolve_token(&state, req.token)?;
    let message = require(req.message, "message")?;
    if req.user_ids.is_empty() && !req.select_all {
        return Err(Error::Validation(
            "userIds is required unless selectAll is set".to_string(),
        )
        .into());
    }
    if let Some(delay) = req.delay {
        if delay > state.config.max_send_delay_ms {
            return Err(Error::Validation(format!(
                "delay must not exceed {} ms",
                state.config.max_send_delay_ms
            ))
            .into());
        }
    }
    let explicit: Vec<UserId> = req.user_ids.into_iter().map(UserId).collect();

    let session = state.connector.open(&token).await?;
    let targets = match resolve_targets(session.as_ref(), &explicit, req.select_all).await {
        Ok(targets) => targets,
        Err(e) => {
            session.destroy().await;
            return Err(e.into());
        }
    };

    info!(targets = targets.len(), "starting bulk dispatch");
    let tally = send_bulk(session.as_ref(), &targets, &message, req.delay).await;

    // The session that sent the batch becomes the listener for replies.
    state.listener.promote(session).await;
    let active = state.listener.is_listening().await;

    Ok(Json(BulkDmResponse::from_tally(tally, active)))
}

/// POST /startReplyListener: open a fresh session purely for listening.
pub async fn start_reply_listener(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> ApiResult<Json<AckResponse>> {
    let token = resolve_token(&state, req.token)?;
    state
        .listener
        .start_standalone(state.connector.as_ref(), &token)
        .await?;

    Ok(Json(AckResponse {
        success: true,
        message: "reply listener active".to_string(),
    }))
}
