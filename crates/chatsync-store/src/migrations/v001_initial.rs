//! v001 -- Initial schema creation.
//!
//! Creates the `messages` table holding acknowledged messages of every
//! thread, keyed by the client unique id.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS messages (
    unique_id        TEXT PRIMARY KEY NOT NULL,
    id               INTEGER,                   -- server id, NULL until acked
    thread_id        INTEGER NOT NULL,
    time             INTEGER NOT NULL,          -- millis since epoch
    participant_id   INTEGER,
    participant_name TEXT,
    text             TEXT,
    message_type     TEXT NOT NULL,             -- JSON-encoded MessageType
    delivered        INTEGER NOT NULL DEFAULT 0,
    seen             INTEGER NOT NULL DEFAULT 0,
    pinned           INTEGER NOT NULL DEFAULT 0,
    edited           INTEGER NOT NULL DEFAULT 0,
    reply_info       TEXT,                      -- JSON
    forward_info     TEXT                       -- JSON
);

CREATE INDEX IF NOT EXISTS idx_messages_thread_time
    ON messages(thread_id, time);

CREATE INDEX IF NOT EXISTS idx_messages_id
    ON messages(id);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
