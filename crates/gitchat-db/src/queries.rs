use anyhow::Result;
use rusqlite::Connection;

use gitchat_types::api::ReactionOutcome;

use crate::Database;
use crate::models::{ConversationRow, LikeRow, MessageRow, ReactionRow, UserRow};

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Canonical ordering of a participant pair. Both directions of a contact
/// map onto the same (a, b) key, which the UNIQUE index enforces.
pub fn canonical_pair<'a>(x: &'a str, y: &'a str) -> (&'a str, &'a str) {
    if x <= y { (x, y) } else { (y, x) }
}

impl Database {
    // -- Users --

    /// Insert a user on first login; on later logins only backfill a missing
    /// avatar URL. Name and profile URL stay as first recorded.
    pub fn upsert_user(
        &self,
        username: &str,
        name: &str,
        profile_url: &str,
        avatar_url: Option<&str>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (username, name, profile_url, avatar_url, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(username) DO UPDATE
                     SET avatar_url = COALESCE(users.avatar_url, excluded.avatar_url)",
                rusqlite::params![username, name, profile_url, avatar_url, now()],
            )?;
            Ok(())
        })
    }

    pub fn get_user(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, username))
    }

    /// Chat-eligible users: everyone but the viewer, capped.
    pub fn list_users_except(&self, username: &str, limit: u32) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT username, name, profile_url, avatar_url, created_at
                 FROM users WHERE username != ?1 ORDER BY username LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![username, limit], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Returns false if the like already existed.
    pub fn like_profile(&self, liker: &str, liked: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO likes (liker, liked, created_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![liker, liked, now()],
            )?;
            Ok(changed > 0)
        })
    }

    /// Returns false if there was no like to remove.
    pub fn unlike_profile(&self, liker: &str, liked: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM likes WHERE liker = ?1 AND liked = ?2",
                rusqlite::params![liker, liked],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn likes_for(&self, username: &str) -> Result<Vec<LikeRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT l.liker, u.avatar_url, l.created_at
                 FROM likes l
                 LEFT JOIN users u ON l.liker = u.username
                 WHERE l.liked = ?1
                 ORDER BY l.created_at DESC",
            )?;
            let rows = stmt
                .query_map([username], |row| {
                    Ok(LikeRow {
                        liker: row.get(0)?,
                        avatar_url: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Conversations --

    /// Look up the conversation for an unordered pair, creating it lazily on
    /// first contact. `INSERT OR IGNORE` against the canonical-pair index
    /// makes concurrent callers converge on a single row.
    /// Returns (row, created).
    pub fn get_or_create_conversation(
        &self,
        id: &str,
        user_x: &str,
        user_y: &str,
    ) -> Result<(ConversationRow, bool)> {
        let (a, b) = canonical_pair(user_x, user_y);
        self.with_conn(|conn| {
            let ts = now();
            let changed = conn.execute(
                "INSERT OR IGNORE INTO conversations
                     (id, participant_a, participant_b, last_message, last_message_time, created_at)
                 VALUES (?1, ?2, ?3, '', ?4, ?4)",
                rusqlite::params![id, a, b, ts],
            )?;
            let row = query_conversation_by_pair(conn, a, b)?
                .ok_or_else(|| anyhow::anyhow!("conversation vanished after upsert"))?;
            Ok((row, changed > 0))
        })
    }

    pub fn get_conversation(&self, id: &str) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| query_conversation(conn, id))
    }

    pub fn list_conversations_for(&self, username: &str) -> Result<Vec<ConversationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLS} FROM conversations
                 WHERE participant_a = ?1 OR participant_b = ?1
                 ORDER BY last_message_time DESC",
                COLS = CONVERSATION_COLS,
            ))?;
            let rows = stmt
                .query_map([username], conversation_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_last_message(&self, id: &str, text: &str, time: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE conversations SET last_message = ?2, last_message_time = ?3 WHERE id = ?1",
                rusqlite::params![id, text, time],
            )?;
            Ok(())
        })
    }

    pub fn set_repo_link(
        &self,
        id: &str,
        url: &str,
        owner: &str,
        repo: &str,
        added_by: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE conversations
                 SET repo_url = ?2, repo_owner = ?3, repo_name = ?4,
                     repo_added_by = ?5, repo_added_at = ?6
                 WHERE id = ?1",
                rusqlite::params![id, url, owner, repo, added_by, now()],
            )?;
            Ok(())
        })
    }

    pub fn clear_repo_link(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE conversations
                 SET repo_url = NULL, repo_owner = NULL, repo_name = NULL,
                     repo_added_by = NULL, repo_added_at = NULL
                 WHERE id = ?1",
                [id],
            )?;
            Ok(())
        })
    }

    // -- Messages --

    pub fn insert_message(&self, msg: &MessageRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages
                     (id, conversation_id, sender, receiver, body, kind, image_url, read,
                      reply_to_id, reply_to_sender, reply_to_body,
                      forwarded_from, forwarded_message_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                rusqlite::params![
                    msg.id,
                    msg.conversation_id,
                    msg.sender,
                    msg.receiver,
                    msg.body,
                    msg.kind,
                    msg.image_url,
                    msg.read,
                    msg.reply_to_id,
                    msg.reply_to_sender,
                    msg.reply_to_body,
                    msg.forwarded_from,
                    msg.forwarded_message_id,
                    msg.created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLS} FROM messages WHERE id = ?1",
                COLS = MESSAGE_COLS,
            ))?;
            stmt.query_row([id], message_from_row).optional()
        })
    }

    /// Messages of a conversation as seen by `viewer`: soft-deleted entries
    /// are filtered out, ascending creation order, capped.
    pub fn list_messages(
        &self,
        conversation_id: &str,
        viewer: &str,
        limit: u32,
    ) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLS} FROM messages m
                 WHERE m.conversation_id = ?1
                   AND NOT EXISTS (
                       SELECT 1 FROM message_deletions d
                       WHERE d.message_id = m.id AND d.username = ?2
                   )
                 ORDER BY m.created_at ASC
                 LIMIT ?3",
                COLS = MESSAGE_COLS_QUALIFIED,
            ))?;
            let rows = stmt
                .query_map(rusqlite::params![conversation_id, viewer, limit], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Flip unread messages addressed to `receiver` in this conversation.
    /// Returns how many were marked.
    pub fn mark_read(&self, conversation_id: &str, receiver: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE messages SET read = 1
                 WHERE conversation_id = ?1 AND receiver = ?2 AND read = 0",
                rusqlite::params![conversation_id, receiver],
            )?;
            Ok(changed)
        })
    }

    /// Hide a message from one user's history. Idempotent.
    pub fn soft_delete_message(&self, message_id: &str, username: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO message_deletions (message_id, username, created_at)
                 VALUES (?1, ?2, ?3)",
                rusqlite::params![message_id, username, now()],
            )?;
            Ok(())
        })
    }

    /// Physically remove a message and its attached reaction/deletion rows.
    pub fn hard_delete_message(&self, message_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM reactions WHERE message_id = ?1", [message_id])?;
            conn.execute(
                "DELETE FROM message_deletions WHERE message_id = ?1",
                [message_id],
            )?;
            conn.execute("DELETE FROM messages WHERE id = ?1", [message_id])?;
            Ok(())
        })
    }

    // -- Reactions --

    /// Toggle semantics: same reaction again removes it, a different one
    /// replaces it. The UNIQUE(message_id, username) index keeps a user at
    /// one reaction per message no matter what.
    pub fn toggle_reaction(
        &self,
        message_id: &str,
        username: &str,
        reaction: &str,
    ) -> Result<ReactionOutcome> {
        self.with_conn(|conn| {
            let existing: Option<String> = conn
                .query_row(
                    "SELECT reaction FROM reactions WHERE message_id = ?1 AND username = ?2",
                    rusqlite::params![message_id, username],
                    |row| row.get(0),
                )
                .optional()?;

            match existing {
                Some(prior) if prior == reaction => {
                    conn.execute(
                        "DELETE FROM reactions WHERE message_id = ?1 AND username = ?2",
                        rusqlite::params![message_id, username],
                    )?;
                    Ok(ReactionOutcome::Removed)
                }
                Some(_) => {
                    conn.execute(
                        "UPDATE reactions SET reaction = ?3, created_at = ?4
                         WHERE message_id = ?1 AND username = ?2",
                        rusqlite::params![message_id, username, reaction, now()],
                    )?;
                    Ok(ReactionOutcome::Replaced)
                }
                None => {
                    conn.execute(
                        "INSERT INTO reactions (message_id, username, reaction, created_at)
                         VALUES (?1, ?2, ?3, ?4)",
                        rusqlite::params![message_id, username, reaction, now()],
                    )?;
                    Ok(ReactionOutcome::Added)
                }
            }
        })
    }

    /// Batch-fetch reactions for a set of message IDs.
    pub fn reactions_for_messages(&self, message_ids: &[String]) -> Result<Vec<ReactionRow>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=message_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT message_id, username, reaction, created_at
                 FROM reactions WHERE message_id IN ({})",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = message_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok(ReactionRow {
                        message_id: row.get(0)?,
                        username: row.get(1)?,
                        reaction: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

const CONVERSATION_COLS: &str = "id, participant_a, participant_b, last_message, \
     last_message_time, repo_url, repo_owner, repo_name, repo_added_by, repo_added_at, created_at";

const MESSAGE_COLS: &str = "id, conversation_id, sender, receiver, body, kind, image_url, read, \
     reply_to_id, reply_to_sender, reply_to_body, forwarded_from, forwarded_message_id, created_at";

const MESSAGE_COLS_QUALIFIED: &str =
    "m.id, m.conversation_id, m.sender, m.receiver, m.body, m.kind, m.image_url, m.read, \
     m.reply_to_id, m.reply_to_sender, m.reply_to_body, m.forwarded_from, \
     m.forwarded_message_id, m.created_at";

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        username: row.get(0)?,
        name: row.get(1)?,
        profile_url: row.get(2)?,
        avatar_url: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn conversation_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationRow> {
    Ok(ConversationRow {
        id: row.get(0)?,
        participant_a: row.get(1)?,
        participant_b: row.get(2)?,
        last_message: row.get(3)?,
        last_message_time: row.get(4)?,
        repo_url: row.get(5)?,
        repo_owner: row.get(6)?,
        repo_name: row.get(7)?,
        repo_added_by: row.get(8)?,
        repo_added_at: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender: row.get(2)?,
        receiver: row.get(3)?,
        body: row.get(4)?,
        kind: row.get(5)?,
        image_url: row.get(6)?,
        read: row.get(7)?,
        reply_to_id: row.get(8)?,
        reply_to_sender: row.get(9)?,
        reply_to_body: row.get(10)?,
        forwarded_from: row.get(11)?,
        forwarded_message_id: row.get(12)?,
        created_at: row.get(13)?,
    })
}

fn query_user(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT username, name, profile_url, avatar_url, created_at
         FROM users WHERE username = ?1",
    )?;
    stmt.query_row([username], user_from_row).optional()
}

fn query_conversation(conn: &Connection, id: &str) -> Result<Option<ConversationRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CONVERSATION_COLS} FROM conversations WHERE id = ?1"
    ))?;
    stmt.query_row([id], conversation_from_row).optional()
}

fn query_conversation_by_pair(
    conn: &Connection,
    a: &str,
    b: &str,
) -> Result<Option<ConversationRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CONVERSATION_COLS} FROM conversations
         WHERE participant_a = ?1 AND participant_b = ?2"
    ))?;
    stmt.query_row([a, b], conversation_from_row).optional()
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn db_with_users(users: &[&str]) -> Database {
        let db = Database::open_in_memory().unwrap();
        for u in users {
            db.upsert_user(u, "", &format!("https://github.com/{u}"), None)
                .unwrap();
        }
        db
    }

    fn send(db: &Database, conversation_id: &str, sender: &str, receiver: &str, body: &str) -> String {
        let id = Uuid::new_v4().to_string();
        db.insert_message(&MessageRow {
            id: id.clone(),
            conversation_id: conversation_id.to_string(),
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            body: body.to_string(),
            kind: "text".to_string(),
            image_url: None,
            read: false,
            reply_to_id: None,
            reply_to_sender: None,
            reply_to_body: None,
            forwarded_from: None,
            forwarded_message_id: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        })
        .unwrap();
        id
    }

    #[test]
    fn pair_canonicalization_yields_one_conversation() {
        let db = db_with_users(&["alice", "bob"]);

        let (first, created) = db
            .get_or_create_conversation(&Uuid::new_v4().to_string(), "alice", "bob")
            .unwrap();
        assert!(created);

        // Opposite direction, different candidate id: converges on the same row.
        let (second, created) = db
            .get_or_create_conversation(&Uuid::new_v4().to_string(), "bob", "alice")
            .unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);

        assert_eq!(db.list_conversations_for("alice").unwrap().len(), 1);
    }

    #[test]
    fn soft_delete_scopes_visibility_per_user() {
        let db = db_with_users(&["alice", "bob"]);
        let (conv, _) = db
            .get_or_create_conversation(&Uuid::new_v4().to_string(), "alice", "bob")
            .unwrap();

        let msg = send(&db, &conv.id, "alice", "bob", "hello");

        db.soft_delete_message(&msg, "bob").unwrap();
        // Idempotent.
        db.soft_delete_message(&msg, "bob").unwrap();

        let bob_view = db.list_messages(&conv.id, "bob", 100).unwrap();
        assert!(bob_view.is_empty());

        let alice_view = db.list_messages(&conv.id, "alice", 100).unwrap();
        assert_eq!(alice_view.len(), 1);
        assert_eq!(alice_view[0].body, "hello");
    }

    #[test]
    fn hard_delete_removes_for_everyone() {
        let db = db_with_users(&["alice", "bob"]);
        let (conv, _) = db
            .get_or_create_conversation(&Uuid::new_v4().to_string(), "alice", "bob")
            .unwrap();

        let msg = send(&db, &conv.id, "alice", "bob", "oops");
        db.toggle_reaction(&msg, "bob", "love").unwrap();
        db.soft_delete_message(&msg, "bob").unwrap();

        db.hard_delete_message(&msg).unwrap();

        assert!(db.get_message(&msg).unwrap().is_none());
        assert!(db.list_messages(&conv.id, "alice", 100).unwrap().is_empty());
        assert!(db.list_messages(&conv.id, "bob", 100).unwrap().is_empty());
        assert!(db.reactions_for_messages(&[msg]).unwrap().is_empty());
    }

    #[test]
    fn reaction_toggle_never_accumulates() {
        let db = db_with_users(&["alice", "bob"]);
        let (conv, _) = db
            .get_or_create_conversation(&Uuid::new_v4().to_string(), "alice", "bob")
            .unwrap();
        let msg = send(&db, &conv.id, "alice", "bob", "hi");

        assert_eq!(
            db.toggle_reaction(&msg, "bob", "like").unwrap(),
            ReactionOutcome::Added
        );
        assert_eq!(
            db.toggle_reaction(&msg, "bob", "love").unwrap(),
            ReactionOutcome::Replaced
        );

        let reactions = db.reactions_for_messages(&[msg.clone()]).unwrap();
        assert_eq!(reactions.len(), 1);
        assert_eq!(reactions[0].reaction, "love");

        assert_eq!(
            db.toggle_reaction(&msg, "bob", "love").unwrap(),
            ReactionOutcome::Removed
        );
        assert!(db.reactions_for_messages(&[msg]).unwrap().is_empty());
    }

    #[test]
    fn reply_snapshot_survives_target_hard_delete() {
        let db = db_with_users(&["alice", "bob"]);
        let (conv, _) = db
            .get_or_create_conversation(&Uuid::new_v4().to_string(), "alice", "bob")
            .unwrap();
        let target = send(&db, &conv.id, "alice", "bob", "original text");

        let reply_id = Uuid::new_v4().to_string();
        db.insert_message(&MessageRow {
            id: reply_id.clone(),
            conversation_id: conv.id.clone(),
            sender: "bob".to_string(),
            receiver: "alice".to_string(),
            body: "replying".to_string(),
            kind: "text".to_string(),
            image_url: None,
            read: false,
            reply_to_id: Some(target.clone()),
            reply_to_sender: Some("alice".to_string()),
            reply_to_body: Some("original text".to_string()),
            forwarded_from: None,
            forwarded_message_id: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        })
        .unwrap();

        db.hard_delete_message(&target).unwrap();

        let reply = db.get_message(&reply_id).unwrap().unwrap();
        assert_eq!(reply.reply_to_sender.as_deref(), Some("alice"));
        assert_eq!(reply.reply_to_body.as_deref(), Some("original text"));
    }

    #[test]
    fn mark_read_flips_only_receivers_unread() {
        let db = db_with_users(&["alice", "bob"]);
        let (conv, _) = db
            .get_or_create_conversation(&Uuid::new_v4().to_string(), "alice", "bob")
            .unwrap();
        send(&db, &conv.id, "alice", "bob", "one");
        send(&db, &conv.id, "alice", "bob", "two");
        send(&db, &conv.id, "bob", "alice", "back at you");

        assert_eq!(db.mark_read(&conv.id, "bob").unwrap(), 2);
        assert_eq!(db.mark_read(&conv.id, "bob").unwrap(), 0);

        // Alice's inbound message untouched until she fetches.
        let unread: Vec<_> = db
            .list_messages(&conv.id, "alice", 100)
            .unwrap()
            .into_iter()
            .filter(|m| !m.read && m.receiver == "alice")
            .collect();
        assert_eq!(unread.len(), 1);
    }

    #[test]
    fn last_message_denormalization_orders_conversations() {
        let db = db_with_users(&["alice", "bob", "carol"]);
        let (with_bob, _) = db
            .get_or_create_conversation(&Uuid::new_v4().to_string(), "alice", "bob")
            .unwrap();
        let (with_carol, _) = db
            .get_or_create_conversation(&Uuid::new_v4().to_string(), "alice", "carol")
            .unwrap();

        db.update_last_message(&with_bob.id, "early", "2026-01-01T00:00:00+00:00")
            .unwrap();
        db.update_last_message(&with_carol.id, "late", "2026-02-01T00:00:00+00:00")
            .unwrap();

        let listed = db.list_conversations_for("alice").unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, with_carol.id);
        assert_eq!(listed[0].last_message, "late");
    }

    #[test]
    fn repo_link_roundtrip() {
        let db = db_with_users(&["alice", "bob"]);
        let (conv, _) = db
            .get_or_create_conversation(&Uuid::new_v4().to_string(), "alice", "bob")
            .unwrap();

        db.set_repo_link(
            &conv.id,
            "https://github.com/rust-lang/rust",
            "rust-lang",
            "rust",
            "alice",
        )
        .unwrap();

        let row = db.get_conversation(&conv.id).unwrap().unwrap();
        let repo = row.linked_repo().unwrap();
        assert_eq!(repo.owner, "rust-lang");
        assert_eq!(repo.repo, "rust");
        assert_eq!(repo.added_by, "alice");

        db.clear_repo_link(&conv.id).unwrap();
        let row = db.get_conversation(&conv.id).unwrap().unwrap();
        assert!(row.linked_repo().is_none());
    }

    #[test]
    fn avatar_backfill_does_not_clobber() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_user("alice", "Alice", "https://github.com/alice", None)
            .unwrap();
        db.upsert_user("alice", "Alice", "https://github.com/alice", Some("https://a/1.png"))
            .unwrap();
        db.upsert_user("alice", "Alice", "https://github.com/alice", Some("https://a/2.png"))
            .unwrap();

        let user = db.get_user("alice").unwrap().unwrap();
        assert_eq!(user.avatar_url.as_deref(), Some("https://a/1.png"));
    }

    #[test]
    fn likes_are_set_semantics() {
        let db = db_with_users(&["alice", "bob"]);
        assert!(db.like_profile("bob", "alice").unwrap());
        assert!(!db.like_profile("bob", "alice").unwrap());

        let likes = db.likes_for("alice").unwrap();
        assert_eq!(likes.len(), 1);
        assert_eq!(likes[0].liker, "bob");

        assert!(db.unlike_profile("bob", "alice").unwrap());
        assert!(!db.unlike_profile("bob", "alice").unwrap());
        assert!(db.likes_for("alice").unwrap().is_empty());
    }

    #[test]
    fn open_at_path_persists_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gitchat.db");
        {
            let db = Database::open(&path).unwrap();
            db.upsert_user("alice", "", "https://github.com/alice", None)
                .unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert!(db.get_user("alice").unwrap().is_some());
    }
}
