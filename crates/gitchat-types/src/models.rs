use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Public profile fields of a user. Identity key is the GitHub username;
/// the row is provisioned on first login and never hard-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    pub name: String,
    pub profile_url: String,
    pub avatar_url: Option<String>,
}

/// One "liked by" entry on a profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikeEntry {
    pub username: String,
    pub avatar_url: Option<String>,
    pub liked_at: DateTime<Utc>,
}

/// External repository linked to a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedRepo {
    pub url: String,
    pub owner: String,
    pub repo: String,
    pub added_by: String,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Emoji,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Emoji => "emoji",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(Self::Text),
            "image" => Some(Self::Image),
            "emoji" => Some(Self::Emoji),
            _ => None,
        }
    }
}

/// The fixed reaction vocabulary. Anything else is rejected as a bad request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reaction {
    Like,
    Love,
    Laugh,
    Wow,
    Sad,
    Angry,
}

impl Reaction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Love => "love",
            Self::Laugh => "laugh",
            Self::Wow => "wow",
            Self::Sad => "sad",
            Self::Angry => "angry",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "like" => Some(Self::Like),
            "love" => Some(Self::Love),
            "laugh" => Some(Self::Laugh),
            "wow" => Some(Self::Wow),
            "sad" => Some(Self::Sad),
            "angry" => Some(Self::Angry),
            _ => None,
        }
    }
}

/// A user's active reaction on a message (at most one per user per message).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionEntry {
    pub username: String,
    pub reaction: Reaction,
}

/// Snapshot of a reply target, stored on the replying message so it stays
/// displayable even after the target is hard-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplySnapshot {
    pub message_id: Uuid,
    pub sender: String,
    pub body: String,
}

/// Forward provenance: who originally sent the copied message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardOrigin {
    pub sender: String,
    pub message_id: Uuid,
}

/// Canonical message record as returned by the REST API and echoed over the
/// gateway. Soft-deletion state is per viewer and never serialized here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender: String,
    pub receiver: String,
    pub body: String,
    pub kind: MessageKind,
    #[serde(default)]
    pub image_url: Option<String>,
    pub read: bool,
    #[serde(default)]
    pub reply_to: Option<ReplySnapshot>,
    #[serde(default)]
    pub forwarded_from: Option<ForwardOrigin>,
    #[serde(default)]
    pub reactions: Vec<ReactionEntry>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Text used for last-message denormalization and reply snapshots.
    /// Image bodies are not meaningful display text.
    pub fn display_body(&self) -> &str {
        match self.kind {
            MessageKind::Image => "Image",
            _ => &self.body,
        }
    }
}
