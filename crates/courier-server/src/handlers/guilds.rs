use axum::extract::State;
use axum::Json;
use courier_core::domain::GuildId;
use courier_core::resolver::preview_members;

use crate::dto::{GuildsResponse, MembersRequest, MembersResponse, TokenRequest};
use crate::error::ApiResult;
use crate::handlers::resolve_token;
use crate::router::AppState;

/// POST /guilds: every guild the credential can see.
pub async fn list_guilds(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> ApiResult<Json<GuildsResponse>> {
    let token = resolve_token(&state, req.token)?;

    let session = state.connector.open(&token).await?;
    let outcome = session.list_guilds().await;
    session.destroy().await;

    Ok(Json(GuildsResponse {
        success: true,
        guilds: outcome?,
    }))
}

/// POST /guild/members: member preview for one guild, or aggregated and
/// deduplicated across all of them when no guild id is given.
pub async fn guild_members(
    State(state): State<AppState>,
    Json(req): Json<MembersRequest>,
) -> ApiResult<Json<MembersResponse>> {
    let token = resolve_token(&state, req.token)?;
    let guild = req
        .guild_id
        .filter(|id| !id.trim().is_empty())
        .map(GuildId);

    let session = state.connector.open(&token).await?;
    let outcome = preview_members(session.as_ref(), guild.as_ref()).await;
    session.destroy().await;

    Ok(Json(MembersResponse {
        success: true,
        members: outcome?,
    }))
}
