use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{LinkedRepo, MessageKind, UserProfile};

// -- Session claims --

/// Session token claims shared between the REST middleware and the gateway
/// upgrade. `sub` is the GitHub username (the identity key everywhere).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub name: String,
    pub exp: usize,
}

// -- Session --

/// Identity assertion handed over by the OAuth callback layer. The OAuth
/// dance itself lives outside this system.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionRequest {
    pub username: String,
    #[serde(default)]
    pub name: String,
    pub profile_url: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub username: String,
    pub token: String,
}

// -- Conversations --

#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub id: Uuid,
    pub participants: [String; 2],
    /// The other participant's public profile, for sidebar rendering.
    pub other: UserProfile,
    pub last_message: String,
    pub last_message_time: DateTime<Utc>,
    pub linked_repo: Option<LinkedRepo>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkRepoRequest {
    pub repo_url: String,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub receiver: String,
    pub conversation_id: Uuid,
    pub body: String,
    #[serde(default = "default_kind")]
    pub kind: MessageKind,
}

fn default_kind() -> MessageKind {
    MessageKind::Text
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplyRequest {
    pub receiver: String,
    pub conversation_id: Uuid,
    pub body: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForwardRequest {
    pub receiver: String,
    pub conversation_id: Uuid,
}

// -- Reactions --

/// The reaction arrives as a raw string so unknown values can be rejected
/// as a 400 with a useful message instead of a deserialization failure.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReactRequest {
    pub reaction: String,
}

/// What a reaction toggle did. `Removed` and `Replaced` matter to clients
/// applying the change locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionOutcome {
    Added,
    Removed,
    Replaced,
}

#[derive(Debug, Serialize)]
pub struct ReactResponse {
    pub outcome: ReactionOutcome,
}
