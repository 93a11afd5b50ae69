use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Message, Reaction};

/// Events pushed from the server to connected clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Connection accepted and presence registered.
    Ready { username: String },

    /// Full snapshot of currently online usernames. Re-broadcast to every
    /// connection on each join/leave.
    OnlineUsers { users: Vec<String> },

    /// A message addressed to this client arrived while it was online.
    ReceiveMessage { message: Message },

    /// The receiver of one of this client's messages was online and the
    /// message was pushed to it. Cosmetic checkmark, never drives retries.
    MessageDelivered { message_id: Uuid },

    /// A message was removed for everyone; clients drop it from view.
    MessageDeleted {
        message_id: Uuid,
        conversation_id: Uuid,
        deleted_by: String,
    },

    /// A reaction toggled on a message. `reaction: None` means removed.
    MessageReaction {
        message_id: Uuid,
        conversation_id: Uuid,
        username: String,
        reaction: Option<Reaction>,
    },

    /// A message was forwarded into one of this client's conversations.
    MessageForwarded {
        conversation_id: Uuid,
        sender: String,
        message: Message,
    },
}

/// Commands sent from the client to the server. The REST call has already
/// persisted the underlying change; commands only drive live delivery, so
/// each one names the other participant for presence lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Push a freshly persisted message to its receiver, if online.
    SendMessage { message: Message },

    /// Announce a delete-for-everyone to the conversation's other participant.
    DeleteForEveryone {
        message_id: Uuid,
        conversation_id: Uuid,
        receiver: String,
    },

    /// Announce a reaction toggle. `reaction: None` means removed.
    Reaction {
        message_id: Uuid,
        conversation_id: Uuid,
        receiver: String,
        reaction: Option<Reaction>,
    },

    /// Announce a forwarded message to its receiver.
    Forward { receiver: String, message: Message },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_use_tagged_envelope() {
        let event = GatewayEvent::OnlineUsers {
            users: vec!["octocat".into()],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "OnlineUsers");
        assert_eq!(json["data"]["users"][0], "octocat");
    }

    #[test]
    fn removed_reaction_serializes_as_null() {
        let event = GatewayEvent::MessageReaction {
            message_id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
            username: "octocat".into(),
            reaction: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert!(json["data"]["reaction"].is_null());
    }
}
