use rusqlite::{params, params_from_iter, types::Value};

use chatsync_shared::protocol::{HistoryRequest, HistoryResponse};
use chatsync_shared::types::{Message, MessageId, Participant, ThreadId};

use crate::database::Database;
use crate::error::{Result, StoreError};

const COLUMNS: &str = "unique_id, id, thread_id, time, participant_id, participant_name, text,
     message_type, delivered, seen, pinned, edited, reply_info, forward_info";

impl Database {
    /// Insert or overwrite a message keyed by its unique id.
    ///
    /// Upload placeholders are never cached; they only live in memory until
    /// the server acknowledges them.
    pub fn upsert_message(&self, message: &Message) -> Result<()> {
        if message.is_upload() {
            return Ok(());
        }
        let reply = message.reply_info.as_ref().map(serde_json::to_string).transpose()?;
        let forward = message
            .forward_info
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.conn().execute(
            "INSERT INTO messages (unique_id, id, thread_id, time, participant_id, participant_name,
                 text, message_type, delivered, seen, pinned, edited, reply_info, forward_info)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
             ON CONFLICT(unique_id) DO UPDATE SET
                 id = excluded.id,
                 time = excluded.time,
                 participant_id = excluded.participant_id,
                 participant_name = excluded.participant_name,
                 text = excluded.text,
                 message_type = excluded.message_type,
                 delivered = excluded.delivered,
                 seen = excluded.seen,
                 pinned = excluded.pinned,
                 edited = excluded.edited,
                 reply_info = excluded.reply_info,
                 forward_info = excluded.forward_info",
            params![
                message.unique_id,
                message.id,
                message.thread_id,
                message.time as i64,
                message.participant.as_ref().map(|p| p.id),
                message.participant.as_ref().and_then(|p| p.name.clone()),
                message.text,
                serde_json::to_string(&message.message_type)?,
                message.delivered,
                message.seen,
                message.pinned,
                message.edited,
                reply,
                forward,
            ],
        )?;
        Ok(())
    }

    /// Answer a history request from the cache.
    ///
    /// Bounds follow the network semantics: `from_time` is an exclusive
    /// lower bound in ascending order, `to_time` an exclusive upper bound in
    /// descending order, otherwise the newest page after `offset`.
    pub fn history(&self, request: &HistoryRequest) -> Result<HistoryResponse> {
        let limit = request.count as i64 + 1;
        let mut args: Vec<Value> = vec![Value::Integer(request.thread_id)];

        let sql = if let Some(from) = request.from_time {
            args.push(Value::Integer(from as i64));
            args.push(Value::Integer(limit));
            format!(
                "SELECT {COLUMNS} FROM messages
                 WHERE thread_id = ?1 AND time > ?2
                 ORDER BY time ASC LIMIT ?3"
            )
        } else if let Some(to) = request.to_time {
            args.push(Value::Integer(to as i64));
            args.push(Value::Integer(limit));
            format!(
                "SELECT {COLUMNS} FROM messages
                 WHERE thread_id = ?1 AND time < ?2
                 ORDER BY time DESC LIMIT ?3"
            )
        } else {
            args.push(Value::Integer(limit));
            args.push(Value::Integer(request.offset.unwrap_or(0) as i64));
            format!(
                "SELECT {COLUMNS} FROM messages
                 WHERE thread_id = ?1
                 ORDER BY time DESC LIMIT ?2 OFFSET ?3"
            )
        };

        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args), row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }

        let has_next = messages.len() > request.count;
        messages.truncate(request.count);

        tracing::debug!(
            thread = request.thread_id,
            count = messages.len(),
            has_next,
            "served history from cache"
        );

        Ok(HistoryResponse {
            thread_id: request.thread_id,
            messages,
            has_next,
            from_cache: true,
        })
    }

    pub fn message_by_id(&self, thread_id: ThreadId, id: MessageId) -> Result<Message> {
        self.conn()
            .query_row(
                &format!("SELECT {COLUMNS} FROM messages WHERE thread_id = ?1 AND id = ?2"),
                params![thread_id, id],
                row_to_message,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Delete by unique id, falling back to the server id.
    pub fn delete_message(
        &self,
        thread_id: ThreadId,
        unique_id: Option<&str>,
        id: Option<MessageId>,
    ) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM messages
             WHERE thread_id = ?1 AND (unique_id = ?2 OR (?3 IS NOT NULL AND id = ?3))",
            params![thread_id, unique_id, id],
        )?;
        Ok(affected > 0)
    }

    /// Flip the delivery flags of a cached message.
    pub fn mark_status(
        &self,
        thread_id: ThreadId,
        id: MessageId,
        delivered: bool,
        seen: bool,
    ) -> Result<()> {
        self.conn().execute(
            "UPDATE messages SET delivered = MAX(delivered, ?3), seen = MAX(seen, ?4)
             WHERE thread_id = ?1 AND id = ?2",
            params![thread_id, id, delivered, seen],
        )?;
        Ok(())
    }

    pub fn count_for_thread(&self, thread_id: ThreadId) -> Result<u64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM messages WHERE thread_id = ?1",
            params![thread_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let participant_id: Option<i64> = row.get(4)?;
    let participant_name: Option<String> = row.get(5)?;
    let type_json: String = row.get(7)?;
    let reply_json: Option<String> = row.get(12)?;
    let forward_json: Option<String> = row.get(13)?;
    let time: i64 = row.get(3)?;

    let message_type = serde_json::from_str(&type_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let reply_info = reply_json
        .map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(12, rusqlite::types::Type::Text, Box::new(e))
        })?;
    let forward_info = forward_json
        .map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(13, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Message {
        unique_id: row.get(0)?,
        id: row.get(1)?,
        thread_id: row.get(2)?,
        time: time.max(0) as u64,
        participant: participant_id.map(|id| Participant {
            id,
            name: participant_name,
        }),
        text: row.get(6)?,
        message_type,
        delivered: row.get(8)?,
        seen: row.get(9)?,
        pinned: row.get(10)?,
        edited: row.get(11)?,
        reply_info,
        forward_info,
        upload: None,
    })
}
