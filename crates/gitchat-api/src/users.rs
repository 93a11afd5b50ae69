use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use gitchat_types::api::Claims;
use gitchat_types::models::{LikeEntry, UserProfile};

use crate::error::ApiError;
use crate::session::AppState;

/// How many candidate chat partners a single listing returns.
const USER_LIST_LIMIT: u32 = 50;

/// Everyone the caller could start a conversation with.
pub async fn list_chat_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let caller = claims.sub.clone();

    let users = tokio::task::spawn_blocking(move || {
        db.db.list_users_except(&caller, USER_LIST_LIMIT)
    })
    .await??;

    let profiles: Vec<UserProfile> = users.into_iter().map(|u| u.into_profile()).collect();
    Ok(Json(profiles))
}

/// Like another user's profile. Idempotent; re-liking is a no-op.
pub async fn like_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    if username == claims.sub {
        return Err(ApiError::BadRequest("You cannot like your own profile".into()));
    }

    let db = state.clone();
    let liker = claims.sub.clone();
    let liked = tokio::task::spawn_blocking(move || {
        if db.db.get_user(&username)?.is_none() {
            return Err(ApiError::NotFound("User"));
        }
        Ok(db.db.like_profile(&liker, &username)?)
    })
    .await??;

    Ok(Json(json!({ "liked": liked })))
}

/// Remove a previously placed like. Removing a like that was never placed
/// is a no-op, not an error.
pub async fn unlike_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let liker = claims.sub.clone();

    tokio::task::spawn_blocking(move || {
        if db.db.get_user(&username)?.is_none() {
            return Err(ApiError::NotFound("User"));
        }
        db.db.unlike_profile(&liker, &username)?;
        Ok(())
    })
    .await??;

    Ok(StatusCode::NO_CONTENT)
}

/// Who has liked the given user's profile.
pub async fn list_likes(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();

    let likes = tokio::task::spawn_blocking(move || {
        if db.db.get_user(&username)?.is_none() {
            return Err(ApiError::NotFound("User"));
        }
        Ok(db.db.likes_for(&username)?)
    })
    .await??;

    let entries: Vec<LikeEntry> = likes.into_iter().map(|l| l.into_entry()).collect();
    Ok(Json(entries))
}
