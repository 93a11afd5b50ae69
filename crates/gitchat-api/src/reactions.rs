use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use gitchat_types::api::{Claims, ReactRequest, ReactResponse};
use gitchat_types::models::Reaction;

use crate::error::ApiError;
use crate::session::AppState;

/// Toggle the caller's reaction on a message. Same reaction twice removes
/// it; a different reaction replaces the previous one.
pub async fn react(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ReactRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(reaction) = Reaction::parse(&req.reaction) else {
        return Err(ApiError::BadRequest(format!(
            "Unknown reaction: {}",
            req.reaction
        )));
    };

    let db = state.clone();
    let caller = claims.sub.clone();
    let mid = message_id.to_string();

    let outcome = tokio::task::spawn_blocking(move || {
        let Some(message) = db.db.get_message(&mid)? else {
            return Err(ApiError::NotFound("Message"));
        };
        if message.sender != caller && message.receiver != caller {
            return Err(ApiError::Forbidden);
        }
        Ok(db.db.toggle_reaction(&mid, &caller, reaction.as_str())?)
    })
    .await??;

    Ok((StatusCode::OK, Json(ReactResponse { outcome })))
}
