use std::sync::Arc;

use axum::{
    Json,
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};

use gitchat_db::Database;
use gitchat_types::api::{Claims, SessionRequest, SessionResponse};

use crate::error::ApiError;
use crate::uploads::UploadStore;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub session_secret: String,
    pub uploads: UploadStore,
}

pub fn default_secret() -> String {
    std::env::var("GITCHAT_SESSION_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into())
}

/// Mint a session token from an identity assertion handed over by the OAuth
/// callback layer. Provisions the user row on first login and backfills a
/// missing avatar URL on later ones.
pub async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<SessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.username.is_empty() || req.profile_url.is_empty() {
        return Err(ApiError::BadRequest("Missing required fields".into()));
    }

    let db = state.clone();
    let username = req.username.clone();
    let name = req.name.clone();
    tokio::task::spawn_blocking(move || {
        db.db
            .upsert_user(&username, &name, &req.profile_url, req.avatar_url.as_deref())
    })
    .await??;

    let token = create_token(&state.session_secret, &req.username, &req.name)
        .map_err(ApiError::from)?;

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            username: req.username,
            token,
        }),
    ))
}

pub fn create_token(secret: &str, username: &str, name: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: username.to_string(),
        name: name.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

pub fn verify_token(secret: &str, token: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims)
}

/// Extract and validate the session token from the Authorization header.
/// Unauthenticated API calls get a 401 JSON body.
pub async fn require_session(mut req: Request, next: Next) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::Unauthorized)?;

    let claims = verify_token(&default_secret(), token).ok_or(ApiError::Unauthorized)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip() {
        let token = create_token("sekrit", "octocat", "The Octocat").unwrap();
        let claims = verify_token("sekrit", &token).unwrap();
        assert_eq!(claims.sub, "octocat");
        assert_eq!(claims.name, "The Octocat");
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = create_token("sekrit", "octocat", "").unwrap();
        assert!(verify_token("other", &token).is_none());
    }

    #[test]
    fn garbage_token_rejected() {
        assert!(verify_token("sekrit", "not-a-jwt").is_none());
    }
}
