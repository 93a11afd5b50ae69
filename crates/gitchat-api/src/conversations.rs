use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use gitchat_db::models::{ConversationRow, parse_utc, parse_uuid};
use gitchat_types::api::{Claims, ConversationResponse, LinkRepoRequest};
use gitchat_types::models::UserProfile;

use crate::error::ApiError;
use crate::session::AppState;

/// All conversations the viewer participates in, enriched with the other
/// participant's public profile, most recent activity first.
pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let viewer = claims.sub.clone();

    let enriched = tokio::task::spawn_blocking(move || {
        let rows = db.db.list_conversations_for(&viewer)?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let other = row.other_participant(&viewer).to_string();
            let profile = db.db.get_user(&other)?;
            out.push((row, profile));
        }
        Ok::<_, anyhow::Error>(out)
    })
    .await??;

    let conversations: Vec<ConversationResponse> = enriched
        .into_iter()
        .map(|(row, profile)| {
            let other = row.other_participant(&claims.sub).to_string();
            to_response(row, profile_or_bare(profile.map(|p| p.into_profile()), other))
        })
        .collect();

    Ok(Json(conversations))
}

/// Look up (or lazily create) the conversation with a named user.
/// 201 when this call created it, 200 when it already existed.
pub async fn get_or_create(
    State(state): State<AppState>,
    Path(other): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    if other == claims.sub {
        return Err(ApiError::BadRequest(
            "Cannot start a conversation with yourself".into(),
        ));
    }

    let db = state.clone();
    let me = claims.sub.clone();
    let candidate_id = Uuid::new_v4().to_string();

    let (row, created, profile) = tokio::task::spawn_blocking(move || {
        let Some(profile) = db.db.get_user(&other)? else {
            return Err(ApiError::NotFound("User"));
        };
        let (row, created) = db
            .db
            .get_or_create_conversation(&candidate_id, &me, &other)?;
        Ok((row, created, profile))
    })
    .await??;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(to_response(row, profile.into_profile()))))
}

/// Link an external GitHub repository to a conversation.
pub async fn link_repo(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<LinkRepoRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.repo_url.trim().is_empty() {
        return Err(ApiError::BadRequest("Repository URL is required".into()));
    }

    let url = normalize_repo_url(&req.repo_url);
    let (owner, repo) = parse_github_repo(&url)
        .ok_or_else(|| ApiError::BadRequest("Invalid GitHub repository URL".into()))?;

    let db = state.clone();
    let viewer = claims.sub.clone();
    let cid = conversation_id.to_string();

    let (row, profile) = tokio::task::spawn_blocking(move || {
        let Some(conversation) = db.db.get_conversation(&cid)? else {
            return Err(ApiError::NotFound("Conversation"));
        };
        if !conversation.has_participant(&viewer) {
            return Err(ApiError::Forbidden);
        }

        db.db.set_repo_link(&cid, &url, &owner, &repo, &viewer)?;
        let row = db
            .db
            .get_conversation(&cid)?
            .ok_or(ApiError::NotFound("Conversation"))?;
        let other = row.other_participant(&viewer).to_string();
        let profile = db.db.get_user(&other)?;
        Ok((row, profile))
    })
    .await??;

    let other = row.other_participant(&claims.sub).to_string();
    Ok(Json(to_response(
        row,
        profile_or_bare(profile.map(|p| p.into_profile()), other),
    )))
}

/// Remove the repository link from a conversation.
pub async fn unlink_repo(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let viewer = claims.sub.clone();
    let cid = conversation_id.to_string();

    let (row, profile) = tokio::task::spawn_blocking(move || {
        let Some(conversation) = db.db.get_conversation(&cid)? else {
            return Err(ApiError::NotFound("Conversation"));
        };
        if !conversation.has_participant(&viewer) {
            return Err(ApiError::Forbidden);
        }

        db.db.clear_repo_link(&cid)?;
        let row = db
            .db
            .get_conversation(&cid)?
            .ok_or(ApiError::NotFound("Conversation"))?;
        let other = row.other_participant(&viewer).to_string();
        let profile = db.db.get_user(&other)?;
        Ok((row, profile))
    })
    .await??;

    let other = row.other_participant(&claims.sub).to_string();
    Ok(Json(to_response(
        row,
        profile_or_bare(profile.map(|p| p.into_profile()), other),
    )))
}

fn to_response(row: ConversationRow, other: UserProfile) -> ConversationResponse {
    let linked_repo = row.linked_repo();
    ConversationResponse {
        id: parse_uuid(&row.id, "conversation id"),
        participants: [row.participant_a.clone(), row.participant_b.clone()],
        other,
        last_message: row.last_message,
        last_message_time: parse_utc(&row.last_message_time),
        linked_repo,
        created_at: parse_utc(&row.created_at),
    }
}

fn profile_or_bare(profile: Option<UserProfile>, username: String) -> UserProfile {
    profile.unwrap_or(UserProfile {
        username,
        name: String::new(),
        profile_url: String::new(),
        avatar_url: None,
    })
}

/// Trim the URL the way users paste it: whitespace, a trailing slash and a
/// `.git` suffix all normalize away.
pub fn normalize_repo_url(raw: &str) -> String {
    let s = raw.trim().trim_end_matches('/');
    s.strip_suffix(".git").unwrap_or(s).to_string()
}

/// Extract (owner, repo) from a github.com URL.
pub fn parse_github_repo(url: &str) -> Option<(String, String)> {
    let rest = url.split_once("github.com/")?.1;
    let mut segments = rest.split('/').filter(|s| !s.is_empty());
    let owner = segments.next()?;
    let repo = segments.next()?;
    Some((owner.to_string(), repo.to_string()))
}
