use std::collections::HashSet;

use chrono::Utc;
use uuid::Uuid;

use gitchat_types::models::{Message, MessageKind, Reaction, ReactionEntry};

/// Where a locally-known message stands in its delivery lifecycle.
///
/// `Pending` and `Failed` carry the client-generated temp id; `Confirmed`
/// carries the server-assigned id plus the cosmetic delivered flag. Failed
/// sends stay in the thread until the user retries or discards them; the
/// delivered flag never drives a retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryState {
    Pending { temp_id: String },
    Confirmed { id: Uuid, delivered: bool },
    Failed { temp_id: String },
}

impl DeliveryState {
    fn temp_id(&self) -> Option<&str> {
        match self {
            DeliveryState::Pending { temp_id } | DeliveryState::Failed { temp_id } => {
                Some(temp_id)
            }
            DeliveryState::Confirmed { .. } => None,
        }
    }

    fn confirmed_id(&self) -> Option<Uuid> {
        match self {
            DeliveryState::Confirmed { id, .. } => Some(*id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ThreadEntry {
    pub state: DeliveryState,
    pub message: Message,
    /// Local-only visibility flag, orthogonal to the delivery state.
    pub deleted_for_me: bool,
}

/// One conversation's reconciled view of its messages, oldest first.
#[derive(Debug)]
pub struct Thread {
    conversation_id: Uuid,
    me: String,
    entries: Vec<ThreadEntry>,
}

impl Thread {
    pub fn new(conversation_id: Uuid, me: impl Into<String>) -> Self {
        Self {
            conversation_id,
            me: me.into(),
            entries: Vec::new(),
        }
    }

    /// Optimistically append an outgoing message and return its temp id.
    pub fn begin_send(&mut self, receiver: &str, body: &str, kind: MessageKind) -> String {
        let temp_id = format!("temp-{}", Uuid::new_v4());
        let message = Message {
            // Placeholder until the server assigns the canonical id.
            id: Uuid::new_v4(),
            conversation_id: self.conversation_id,
            sender: self.me.clone(),
            receiver: receiver.to_string(),
            body: body.to_string(),
            kind,
            image_url: None,
            read: false,
            reply_to: None,
            forwarded_from: None,
            reactions: Vec::new(),
            created_at: Utc::now(),
        };
        self.entries.push(ThreadEntry {
            state: DeliveryState::Pending {
                temp_id: temp_id.clone(),
            },
            message,
            deleted_for_me: false,
        });
        temp_id
    }

    /// Splice the server's canonical record in place of a pending entry.
    /// Unknown temp ids are a no-op, so a duplicate confirmation is safe.
    pub fn confirm(&mut self, temp_id: &str, canonical: Message) {
        if let Some(entry) = self.entry_by_temp_id_mut(temp_id) {
            entry.state = DeliveryState::Confirmed {
                id: canonical.id,
                delivered: false,
            };
            entry.message = canonical;
        }
    }

    /// Mark a pending send as failed. It stays in the thread for a retry.
    pub fn fail(&mut self, temp_id: &str) {
        if let Some(entry) = self.entry_by_temp_id_mut(temp_id) {
            if matches!(entry.state, DeliveryState::Pending { .. }) {
                entry.state = DeliveryState::Failed {
                    temp_id: temp_id.to_string(),
                };
            }
        }
    }

    /// Flip a failed send back to pending, reusing the same temp id so a
    /// confirmation raced from the first attempt still matches.
    pub fn retry(&mut self, temp_id: &str) {
        if let Some(entry) = self.entry_by_temp_id_mut(temp_id) {
            if matches!(entry.state, DeliveryState::Failed { .. }) {
                entry.state = DeliveryState::Pending {
                    temp_id: temp_id.to_string(),
                };
            }
        }
    }

    /// Merge an ascending history page from the server. Confirmed entries
    /// are replaced by the server's view; local pending and failed entries
    /// survive the merge and stay at the tail.
    pub fn apply_history(&mut self, page: Vec<Message>) {
        let mut seen: HashSet<Uuid> = HashSet::with_capacity(page.len());
        let mut merged: Vec<ThreadEntry> = Vec::with_capacity(page.len());

        for message in page {
            if !seen.insert(message.id) {
                continue;
            }
            let deleted_for_me = self
                .entries
                .iter()
                .find(|e| e.state.confirmed_id() == Some(message.id))
                .map(|e| e.deleted_for_me)
                .unwrap_or(false);
            merged.push(ThreadEntry {
                state: DeliveryState::Confirmed {
                    id: message.id,
                    delivered: true,
                },
                message,
                deleted_for_me,
            });
        }

        for entry in self.entries.drain(..) {
            if entry.state.confirmed_id().is_none() {
                merged.push(entry);
            }
        }

        self.entries = merged;
    }

    /// Handle a live inbound message. A payload whose id is already known
    /// is dropped; an echo of one of our own pending sends confirms that
    /// entry instead of appending a duplicate.
    pub fn on_receive(&mut self, message: Message) {
        if self
            .entries
            .iter()
            .any(|e| e.state.confirmed_id() == Some(message.id))
        {
            return;
        }

        if let Some(entry) = self.entries.iter_mut().find(|e| {
            matches!(e.state, DeliveryState::Pending { .. })
                && e.message.sender == message.sender
                && e.message.body == message.body
                && e.message.kind == message.kind
        }) {
            entry.state = DeliveryState::Confirmed {
                id: message.id,
                delivered: false,
            };
            entry.message = message;
            return;
        }

        self.entries.push(ThreadEntry {
            state: DeliveryState::Confirmed {
                id: message.id,
                delivered: false,
            },
            message,
            deleted_for_me: false,
        });
    }

    /// Delivery receipt for one of our confirmed sends. Purely cosmetic.
    pub fn on_delivered(&mut self, id: Uuid) {
        for entry in &mut self.entries {
            if let DeliveryState::Confirmed { id: entry_id, delivered } = &mut entry.state {
                if *entry_id == id {
                    *delivered = true;
                }
            }
        }
    }

    /// The message was removed for everyone; drop it from the thread.
    pub fn on_deleted(&mut self, id: Uuid) {
        self.entries
            .retain(|e| e.state.confirmed_id() != Some(id));
    }

    /// Apply a reaction change: the user's previous reaction (if any) goes
    /// away, and the new one lands unless this was a removal.
    pub fn on_reaction(&mut self, message_id: Uuid, username: &str, reaction: Option<Reaction>) {
        let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.state.confirmed_id() == Some(message_id))
        else {
            return;
        };
        entry.message.reactions.retain(|r| r.username != username);
        if let Some(reaction) = reaction {
            entry.message.reactions.push(ReactionEntry {
                username: username.to_string(),
                reaction,
            });
        }
    }

    /// Hide a message locally without touching its delivery state.
    pub fn delete_for_me(&mut self, id: Uuid) {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.state.confirmed_id() == Some(id))
        {
            entry.deleted_for_me = true;
        }
    }

    /// Entries the UI should render, oldest first.
    pub fn visible(&self) -> impl Iterator<Item = &ThreadEntry> {
        self.entries.iter().filter(|e| !e.deleted_for_me)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry_by_temp_id_mut(&mut self, temp_id: &str) -> Option<&mut ThreadEntry> {
        self.entries
            .iter_mut()
            .find(|e| e.state.temp_id() == Some(temp_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_message(sender: &str, receiver: &str, body: &str) -> Message {
        Message {
            id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            body: body.to_string(),
            kind: MessageKind::Text,
            image_url: None,
            read: false,
            reply_to: None,
            forwarded_from: None,
            reactions: Vec::new(),
            created_at: Utc::now(),
        }
    }

    fn thread() -> Thread {
        Thread::new(Uuid::new_v4(), "alice")
    }

    #[test]
    fn confirm_splices_canonical_record_in_place() {
        let mut t = thread();
        let temp = t.begin_send("bob", "hey", MessageKind::Text);

        let canonical = server_message("alice", "bob", "hey");
        let canonical_id = canonical.id;
        t.confirm(&temp, canonical);

        assert_eq!(t.len(), 1);
        let entry = t.visible().next().unwrap();
        assert_eq!(
            entry.state,
            DeliveryState::Confirmed {
                id: canonical_id,
                delivered: false
            }
        );
        assert_eq!(entry.message.id, canonical_id);
    }

    #[test]
    fn confirm_with_unknown_temp_id_is_a_no_op() {
        let mut t = thread();
        t.begin_send("bob", "hey", MessageKind::Text);
        t.confirm("temp-nope", server_message("alice", "bob", "hey"));
        assert!(matches!(
            t.visible().next().unwrap().state,
            DeliveryState::Pending { .. }
        ));
    }

    #[test]
    fn gateway_echo_confirms_the_pending_entry_instead_of_duplicating() {
        let mut t = thread();
        t.begin_send("bob", "hey", MessageKind::Text);

        let echo = server_message("alice", "bob", "hey");
        let echo_id = echo.id;
        t.on_receive(echo);

        assert_eq!(t.len(), 1);
        assert_eq!(
            t.visible().next().unwrap().state,
            DeliveryState::Confirmed {
                id: echo_id,
                delivered: false
            }
        );
    }

    #[test]
    fn duplicate_arrival_by_id_is_dropped() {
        let mut t = thread();
        let msg = server_message("bob", "alice", "hi");
        t.on_receive(msg.clone());
        t.on_receive(msg);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn retry_reuses_the_original_temp_id() {
        let mut t = thread();
        let temp = t.begin_send("bob", "hey", MessageKind::Text);

        t.fail(&temp);
        assert!(matches!(
            t.visible().next().unwrap().state,
            DeliveryState::Failed { .. }
        ));

        t.retry(&temp);
        assert_eq!(
            t.visible().next().unwrap().state,
            DeliveryState::Pending {
                temp_id: temp.clone()
            }
        );

        // A confirmation raced from the first attempt still lands.
        let canonical = server_message("alice", "bob", "hey");
        t.confirm(&temp, canonical);
        assert!(matches!(
            t.visible().next().unwrap().state,
            DeliveryState::Confirmed { .. }
        ));
    }

    #[test]
    fn history_merge_keeps_unsettled_local_entries() {
        let mut t = thread();
        let first = server_message("bob", "alice", "one");
        t.on_receive(first.clone());
        let temp = t.begin_send("bob", "draft", MessageKind::Text);
        t.fail(&temp);

        let second = server_message("bob", "alice", "two");
        t.apply_history(vec![first.clone(), first, second]);

        assert_eq!(t.len(), 3);
        let states: Vec<_> = t.visible().map(|e| e.state.clone()).collect();
        assert!(matches!(states[0], DeliveryState::Confirmed { delivered: true, .. }));
        assert!(matches!(states[1], DeliveryState::Confirmed { delivered: true, .. }));
        assert!(matches!(states[2], DeliveryState::Failed { .. }));
    }

    #[test]
    fn history_merge_preserves_local_hide_flag() {
        let mut t = thread();
        let msg = server_message("bob", "alice", "gone");
        t.on_receive(msg.clone());
        t.delete_for_me(msg.id);

        t.apply_history(vec![msg]);

        assert_eq!(t.len(), 1);
        assert_eq!(t.visible().count(), 0);
    }

    #[test]
    fn delivered_flag_is_set_on_the_matching_entry_only() {
        let mut t = thread();
        let temp = t.begin_send("bob", "a", MessageKind::Text);
        let canonical = server_message("alice", "bob", "a");
        let id = canonical.id;
        t.confirm(&temp, canonical);

        let other = server_message("bob", "alice", "b");
        t.on_receive(other);

        t.on_delivered(id);
        t.on_delivered(id); // duplicate receipt

        let delivered: Vec<bool> = t
            .visible()
            .filter_map(|e| match e.state {
                DeliveryState::Confirmed { delivered, .. } => Some(delivered),
                _ => None,
            })
            .collect();
        assert_eq!(delivered, vec![true, false]);
    }

    #[test]
    fn deletion_removes_the_entry_from_view() {
        let mut t = thread();
        let msg = server_message("bob", "alice", "oops");
        t.on_receive(msg.clone());
        t.on_deleted(msg.id);
        t.on_deleted(msg.id);
        assert!(t.is_empty());
    }

    #[test]
    fn reaction_change_replaces_the_users_previous_reaction() {
        let mut t = thread();
        let msg = server_message("bob", "alice", "nice");
        let id = msg.id;
        t.on_receive(msg);

        t.on_reaction(id, "alice", Some(Reaction::Like));
        t.on_reaction(id, "bob", Some(Reaction::Wow));
        t.on_reaction(id, "alice", Some(Reaction::Love));

        let entry = t.visible().next().unwrap();
        assert_eq!(entry.message.reactions.len(), 2);
        let alice = entry
            .message
            .reactions
            .iter()
            .find(|r| r.username == "alice")
            .unwrap();
        assert_eq!(alice.reaction, Reaction::Love);

        t.on_reaction(id, "alice", None);
        let entry = t.visible().next().unwrap();
        assert!(entry.message.reactions.iter().all(|r| r.username != "alice"));
    }
}
