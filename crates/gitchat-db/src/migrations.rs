use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            username    TEXT PRIMARY KEY,
            name        TEXT NOT NULL DEFAULT '',
            profile_url TEXT NOT NULL,
            avatar_url  TEXT,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS likes (
            liker       TEXT NOT NULL REFERENCES users(username),
            liked       TEXT NOT NULL REFERENCES users(username),
            created_at  TEXT NOT NULL,
            UNIQUE(liker, liked)
        );

        CREATE INDEX IF NOT EXISTS idx_likes_liked
            ON likes(liked);

        -- Participants are stored as a canonicalized sorted pair so the
        -- one-conversation-per-pair invariant is a storage constraint, not
        -- an application-level check.
        CREATE TABLE IF NOT EXISTS conversations (
            id                  TEXT PRIMARY KEY,
            participant_a       TEXT NOT NULL REFERENCES users(username),
            participant_b       TEXT NOT NULL REFERENCES users(username),
            last_message        TEXT NOT NULL DEFAULT '',
            last_message_time   TEXT NOT NULL,
            repo_url            TEXT,
            repo_owner          TEXT,
            repo_name           TEXT,
            repo_added_by       TEXT,
            repo_added_at       TEXT,
            created_at          TEXT NOT NULL,
            CHECK(participant_a < participant_b),
            UNIQUE(participant_a, participant_b)
        );

        CREATE TABLE IF NOT EXISTS messages (
            id                   TEXT PRIMARY KEY,
            conversation_id      TEXT NOT NULL REFERENCES conversations(id),
            sender               TEXT NOT NULL REFERENCES users(username),
            receiver             TEXT NOT NULL REFERENCES users(username),
            body                 TEXT NOT NULL,
            kind                 TEXT NOT NULL DEFAULT 'text',
            image_url            TEXT,
            read                 INTEGER NOT NULL DEFAULT 0,
            reply_to_id          TEXT,
            reply_to_sender      TEXT,
            reply_to_body        TEXT,
            forwarded_from       TEXT,
            forwarded_message_id TEXT,
            created_at           TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation_id, created_at);

        -- Per-user soft-delete set: a row here hides the message from that
        -- user's fetched history without touching the record itself.
        CREATE TABLE IF NOT EXISTS message_deletions (
            message_id  TEXT NOT NULL REFERENCES messages(id),
            username    TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            UNIQUE(message_id, username)
        );

        CREATE TABLE IF NOT EXISTS reactions (
            message_id  TEXT NOT NULL REFERENCES messages(id),
            username    TEXT NOT NULL,
            reaction    TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            UNIQUE(message_id, username)
        );

        CREATE INDEX IF NOT EXISTS idx_reactions_message
            ON reactions(message_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
