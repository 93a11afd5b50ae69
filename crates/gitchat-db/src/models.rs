//! Database row types — these map directly to SQLite rows.
//! Distinct from the gitchat-types API models to keep the DB layer
//! independent; conversions into the API shapes live here.

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use gitchat_types::models::{
    ForwardOrigin, LikeEntry, LinkedRepo, Message, MessageKind, Reaction, ReactionEntry,
    ReplySnapshot, UserProfile,
};

pub struct UserRow {
    pub username: String,
    pub name: String,
    pub profile_url: String,
    pub avatar_url: Option<String>,
    pub created_at: String,
}

pub struct LikeRow {
    pub liker: String,
    pub avatar_url: Option<String>,
    pub created_at: String,
}

pub struct ConversationRow {
    pub id: String,
    pub participant_a: String,
    pub participant_b: String,
    pub last_message: String,
    pub last_message_time: String,
    pub repo_url: Option<String>,
    pub repo_owner: Option<String>,
    pub repo_name: Option<String>,
    pub repo_added_by: Option<String>,
    pub repo_added_at: Option<String>,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub sender: String,
    pub receiver: String,
    pub body: String,
    pub kind: String,
    pub image_url: Option<String>,
    pub read: bool,
    pub reply_to_id: Option<String>,
    pub reply_to_sender: Option<String>,
    pub reply_to_body: Option<String>,
    pub forwarded_from: Option<String>,
    pub forwarded_message_id: Option<String>,
    pub created_at: String,
}

pub struct ReactionRow {
    pub message_id: String,
    pub username: String,
    pub reaction: String,
    pub created_at: String,
}

/// Parse a stored timestamp, tolerating SQLite's naive
/// "YYYY-MM-DD HH:MM:SS" form alongside RFC 3339.
pub fn parse_utc(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

pub fn parse_uuid(raw: &str, what: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, raw, e);
        Uuid::default()
    })
}

impl UserRow {
    pub fn into_profile(self) -> UserProfile {
        UserProfile {
            username: self.username,
            name: self.name,
            profile_url: self.profile_url,
            avatar_url: self.avatar_url,
        }
    }
}

impl LikeRow {
    pub fn into_entry(self) -> LikeEntry {
        let liked_at = parse_utc(&self.created_at);
        LikeEntry {
            username: self.liker,
            avatar_url: self.avatar_url,
            liked_at,
        }
    }
}

impl ConversationRow {
    pub fn linked_repo(&self) -> Option<LinkedRepo> {
        match (&self.repo_url, &self.repo_owner, &self.repo_name, &self.repo_added_by) {
            (Some(url), Some(owner), Some(repo), Some(added_by)) => Some(LinkedRepo {
                url: url.clone(),
                owner: owner.clone(),
                repo: repo.clone(),
                added_by: added_by.clone(),
                added_at: self
                    .repo_added_at
                    .as_deref()
                    .map(parse_utc)
                    .unwrap_or_default(),
            }),
            _ => None,
        }
    }

    /// The participant that is not `viewer`.
    pub fn other_participant(&self, viewer: &str) -> &str {
        if self.participant_a == viewer {
            &self.participant_b
        } else {
            &self.participant_a
        }
    }

    pub fn has_participant(&self, username: &str) -> bool {
        self.participant_a == username || self.participant_b == username
    }
}

impl MessageRow {
    pub fn into_message(self, reactions: Vec<ReactionEntry>) -> Message {
        let reply_to = match (&self.reply_to_id, &self.reply_to_sender, &self.reply_to_body) {
            (Some(id), Some(sender), Some(body)) => Some(ReplySnapshot {
                message_id: parse_uuid(id, "reply_to_id"),
                sender: sender.clone(),
                body: body.clone(),
            }),
            _ => None,
        };

        let forwarded_from = match (&self.forwarded_from, &self.forwarded_message_id) {
            (Some(sender), Some(id)) => Some(ForwardOrigin {
                sender: sender.clone(),
                message_id: parse_uuid(id, "forwarded_message_id"),
            }),
            _ => None,
        };

        Message {
            id: parse_uuid(&self.id, "message id"),
            conversation_id: parse_uuid(&self.conversation_id, "conversation_id"),
            sender: self.sender,
            receiver: self.receiver,
            body: self.body,
            kind: MessageKind::parse(&self.kind).unwrap_or_else(|| {
                warn!("Corrupt message kind '{}' on '{}'", self.kind, self.id);
                MessageKind::Text
            }),
            image_url: self.image_url,
            read: self.read,
            reply_to,
            forwarded_from,
            reactions,
            created_at: parse_utc(&self.created_at),
        }
    }
}

impl ReactionRow {
    pub fn entry(&self) -> Option<ReactionEntry> {
        let reaction = Reaction::parse(&self.reaction)?;
        Some(ReactionEntry {
            username: self.username.clone(),
            reaction,
        })
    }
}
