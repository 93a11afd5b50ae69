use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use gitchat_db::Database;
use gitchat_db::models::MessageRow;
use gitchat_types::api::{Claims, ForwardRequest, ReplyRequest, SendMessageRequest};
use gitchat_types::models::{Message, MessageKind, ReactionEntry};

use crate::error::ApiError;
use crate::session::AppState;
use crate::uploads::MAX_IMAGE_BYTES;

/// Fixed page size for message history fetches.
const MESSAGE_PAGE_SIZE: u32 = 100;

/// Fetch a conversation's messages as seen by the viewer, then mark inbound
/// unread messages read. Fetch and read-marking are separate store
/// operations composed here; the endpoint keeps the combined behavior.
pub async fn list_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let viewer = claims.sub.clone();
    let cid = conversation_id.to_string();

    let (rows, reaction_rows) = tokio::task::spawn_blocking(move || {
        let Some(conversation) = db.db.get_conversation(&cid)? else {
            return Err(ApiError::NotFound("Conversation"));
        };
        if !conversation.has_participant(&viewer) {
            return Err(ApiError::Forbidden);
        }

        let rows = db.db.list_messages(&cid, &viewer, MESSAGE_PAGE_SIZE)?;
        db.db.mark_read(&cid, &viewer)?;

        let message_ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let reaction_rows = db.db.reactions_for_messages(&message_ids)?;

        Ok((rows, reaction_rows))
    })
    .await??;

    // Group reactions by message id (cheap in-memory work, fine on the async thread)
    let mut reaction_map: HashMap<String, Vec<ReactionEntry>> = HashMap::new();
    for row in &reaction_rows {
        if let Some(entry) = row.entry() {
            reaction_map.entry(row.message_id.clone()).or_default().push(entry);
        }
    }

    let messages: Vec<Message> = rows
        .into_iter()
        .map(|row| {
            let reactions = reaction_map.remove(&row.id).unwrap_or_default();
            row.into_message(reactions)
        })
        .collect();

    Ok(Json(messages))
}

/// Send a text or emoji message. Image messages go through the multipart
/// upload endpoint instead.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.receiver.is_empty() || req.body.is_empty() {
        return Err(ApiError::BadRequest("Missing required fields".into()));
    }
    if req.kind == MessageKind::Image {
        return Err(ApiError::BadRequest(
            "Image messages must be sent via the upload endpoint".into(),
        ));
    }

    let row = new_row(
        &claims.sub,
        &req.receiver,
        req.conversation_id,
        req.body,
        req.kind,
        None,
    );

    let db = state.clone();
    let sender = claims.sub.clone();
    let receiver = req.receiver.clone();
    let row = tokio::task::spawn_blocking(move || {
        check_participants(&db.db, &row.conversation_id, &sender, &receiver)?;
        insert_and_touch(&db.db, &row, None)?;
        Ok::<_, ApiError>(row)
    })
    .await??;

    Ok((StatusCode::CREATED, Json(row.into_message(vec![]))))
}

/// Reply to an existing message. The target's sender and display body are
/// snapshotted into the reply so it stays renderable after the target is
/// hard-deleted.
pub async fn reply(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ReplyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.receiver.is_empty() || req.body.is_empty() {
        return Err(ApiError::BadRequest("Missing required fields".into()));
    }

    let db = state.clone();
    let sender = claims.sub.clone();
    let receiver = req.receiver.clone();
    let mid = message_id.to_string();

    let row = tokio::task::spawn_blocking(move || {
        let Some(target) = db.db.get_message(&mid)? else {
            return Err(ApiError::NotFound("Message"));
        };
        if target.conversation_id != req.conversation_id.to_string() {
            return Err(ApiError::BadRequest(
                "Target message belongs to another conversation".into(),
            ));
        }
        check_participants(&db.db, &target.conversation_id, &sender, &receiver)?;

        let mut row = new_row(
            &sender,
            &receiver,
            req.conversation_id,
            req.body,
            MessageKind::Text,
            None,
        );
        row.reply_to_id = Some(target.id.clone());
        row.reply_to_sender = Some(target.sender.clone());
        row.reply_to_body = Some(display_body(&target));

        insert_and_touch(&db.db, &row, None)?;
        Ok(row)
    })
    .await??;

    Ok((StatusCode::CREATED, Json(row.into_message(vec![]))))
}

/// Forward an existing message into another conversation. The forwarder
/// must be a participant of the destination conversation only; forward
/// provenance travels with the copy.
pub async fn forward(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ForwardRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.receiver.is_empty() {
        return Err(ApiError::BadRequest("Missing required fields".into()));
    }

    let db = state.clone();
    let sender = claims.sub.clone();
    let receiver = req.receiver.clone();
    let mid = message_id.to_string();

    let row = tokio::task::spawn_blocking(move || {
        let Some(original) = db.db.get_message(&mid)? else {
            return Err(ApiError::NotFound("Message"));
        };
        check_participants(&db.db, &req.conversation_id.to_string(), &sender, &receiver)?;

        let kind = MessageKind::parse(&original.kind).unwrap_or(MessageKind::Text);
        let mut row = new_row(
            &sender,
            &receiver,
            req.conversation_id,
            original.body.clone(),
            kind,
            original.image_url.clone(),
        );
        row.forwarded_from = Some(original.sender.clone());
        row.forwarded_message_id = Some(original.id.clone());

        insert_and_touch(&db.db, &row, None)?;
        Ok(row)
    })
    .await??;

    Ok((StatusCode::CREATED, Json(row.into_message(vec![]))))
}

/// Send an image message: multipart with `receiver`, `conversation_id` and
/// an `image` part. Size and MIME checks happen before anything is written.
pub async fn send_image(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut receiver: Option<String> = None;
    let mut conversation_id: Option<Uuid> = None;
    let mut image: Option<(String, bytes::Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        match field.name() {
            Some("receiver") => {
                receiver = Some(field.text().await.map_err(bad_part)?);
            }
            Some("conversation_id") => {
                let raw = field.text().await.map_err(bad_part)?;
                conversation_id = Some(
                    raw.parse()
                        .map_err(|_| ApiError::BadRequest("Malformed conversation id".into()))?,
                );
            }
            Some("image") => {
                let content_type = field.content_type().unwrap_or_default().to_string();
                validate_image(&content_type, 0)?;
                let data = field.bytes().await.map_err(|_| ApiError::PayloadTooLarge)?;
                validate_image(&content_type, data.len())?;
                image = Some((content_type, data));
            }
            _ => {}
        }
    }

    let (Some(receiver), Some(conversation_id), Some((content_type, data))) =
        (receiver, conversation_id, image)
    else {
        return Err(ApiError::BadRequest("Missing required fields".into()));
    };

    // Authorization before any blob or row write.
    let db = state.clone();
    let sender = claims.sub.clone();
    let receiver_check = receiver.clone();
    let cid = conversation_id.to_string();
    tokio::task::spawn_blocking(move || check_participants(&db.db, &cid, &sender, &receiver_check))
        .await??;

    let url = state.uploads.save(&data, &content_type).await.map_err(ApiError::from)?;

    let row = new_row(
        &claims.sub,
        &receiver,
        conversation_id,
        url.clone(),
        MessageKind::Image,
        Some(url),
    );

    let db = state.clone();
    let row = tokio::task::spawn_blocking(move || {
        insert_and_touch(&db.db, &row, Some("Image"))?;
        Ok::<_, ApiError>(row)
    })
    .await??;

    Ok((StatusCode::CREATED, Json(row.into_message(vec![]))))
}

/// Hide a message from the caller's own history. Idempotent.
pub async fn soft_delete(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let viewer = claims.sub.clone();
    let mid = message_id.to_string();

    tokio::task::spawn_blocking(move || {
        let Some(message) = db.db.get_message(&mid)? else {
            return Err(ApiError::NotFound("Message"));
        };
        if message.sender != viewer && message.receiver != viewer {
            return Err(ApiError::Forbidden);
        }
        db.db.soft_delete_message(&mid, &viewer)?;
        Ok(())
    })
    .await??;

    Ok(StatusCode::NO_CONTENT)
}

/// Remove a message for everyone. Sender-only; the attached image blob is
/// cleaned up best-effort after the row is gone.
pub async fn hard_delete(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let caller = claims.sub.clone();
    let mid = message_id.to_string();

    let image_url = tokio::task::spawn_blocking(move || {
        let Some(message) = db.db.get_message(&mid)? else {
            return Err(ApiError::NotFound("Message"));
        };
        if message.sender != caller {
            return Err(ApiError::Forbidden);
        }
        db.db.hard_delete_message(&mid)?;
        Ok(message.image_url)
    })
    .await??;

    if let Some(url) = image_url {
        state.uploads.delete_by_url(&url).await;
    }

    Ok(StatusCode::NO_CONTENT)
}

// -- shared helpers --

fn new_row(
    sender: &str,
    receiver: &str,
    conversation_id: Uuid,
    body: String,
    kind: MessageKind,
    image_url: Option<String>,
) -> MessageRow {
    MessageRow {
        id: Uuid::new_v4().to_string(),
        conversation_id: conversation_id.to_string(),
        sender: sender.to_string(),
        receiver: receiver.to_string(),
        body,
        kind: kind.as_str().to_string(),
        image_url,
        read: false,
        reply_to_id: None,
        reply_to_sender: None,
        reply_to_body: None,
        forwarded_from: None,
        forwarded_message_id: None,
        created_at: chrono::Utc::now().to_rfc3339(),
    }
}

/// Both sender and receiver must be participants of the conversation.
fn check_participants(
    db: &Database,
    conversation_id: &str,
    sender: &str,
    receiver: &str,
) -> Result<(), ApiError> {
    let Some(conversation) = db.get_conversation(conversation_id)? else {
        return Err(ApiError::NotFound("Conversation"));
    };
    if !conversation.has_participant(sender) || !conversation.has_participant(receiver) {
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

/// Insert a message and refresh the conversation's denormalized last-message
/// fields. Two single-row writes, not a transaction; a crash between them
/// leaves only cosmetic drift in the sidebar preview.
fn insert_and_touch(
    db: &Database,
    row: &MessageRow,
    last_text_override: Option<&str>,
) -> Result<(), ApiError> {
    db.insert_message(row)?;
    let last_text = last_text_override.unwrap_or(match row.kind.as_str() {
        "image" => "Image",
        _ => row.body.as_str(),
    });
    db.update_last_message(&row.conversation_id, last_text, &row.created_at)?;
    Ok(())
}

/// Image upload gate, applied before anything is written to the store.
fn validate_image(content_type: &str, len: usize) -> Result<(), ApiError> {
    if !content_type.starts_with("image/") {
        return Err(ApiError::UnsupportedMediaType);
    }
    if len > MAX_IMAGE_BYTES {
        return Err(ApiError::PayloadTooLarge);
    }
    Ok(())
}

fn display_body(row: &MessageRow) -> String {
    if row.kind == "image" {
        "Image".to_string()
    } else {
        row.body.clone()
    }
}

fn bad_part(err: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::BadRequest(format!("Malformed multipart body: {}", err))
}
