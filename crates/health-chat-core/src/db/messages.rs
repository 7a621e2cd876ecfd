//! Message database operations.

use chrono::Utc;
use rusqlite::{params, Row};

use super::{Database, DbError, DbResult};
use crate::models::{Message, Sender};

impl Database {
    /// Append a message, stamped with the current time.
    pub fn insert_message(&self, patient_id: i64, sender: Sender, text: &str) -> DbResult<Message> {
        let timestamp = Utc::now();
        self.conn.execute(
            r#"
            INSERT INTO messages (patient_id, sender, text, timestamp)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![patient_id, sender.as_str(), text, timestamp],
        )?;

        Ok(Message {
            id: self.conn.last_insert_rowid(),
            patient_id,
            sender,
            text: text.to_string(),
            timestamp,
        })
    }

    /// Full conversation for a patient, oldest first.
    pub fn list_messages(&self, patient_id: i64) -> DbResult<Vec<Message>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, patient_id, sender, text, timestamp
            FROM messages
            WHERE patient_id = ?
            ORDER BY timestamp, id
            "#,
        )?;
        let rows = stmt.query_map([patient_id], MessageRow::from_row)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?.try_into()?);
        }
        Ok(messages)
    }

    /// The `limit` most recent messages for a patient, newest first.
    pub fn recent_messages(&self, patient_id: i64, limit: usize) -> DbResult<Vec<Message>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, patient_id, sender, text, timestamp
            FROM messages
            WHERE patient_id = ?
            ORDER BY timestamp DESC, id DESC
            LIMIT ?
            "#,
        )?;
        let rows = stmt.query_map(params![patient_id, limit as i64], MessageRow::from_row)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?.try_into()?);
        }
        Ok(messages)
    }
}

/// Intermediate row struct for database mapping.
struct MessageRow {
    id: i64,
    patient_id: i64,
    sender: String,
    text: String,
    timestamp: chrono::DateTime<Utc>,
}

impl MessageRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            patient_id: row.get(1)?,
            sender: row.get(2)?,
            text: row.get(3)?,
            timestamp: row.get(4)?,
        })
    }
}

impl TryFrom<MessageRow> for Message {
    type Error = DbError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        let sender = Sender::parse(&row.sender)
            .ok_or_else(|| DbError::Constraint(format!("Unknown message sender: {}", row.sender)))?;

        Ok(Message {
            id: row.id,
            patient_id: row.patient_id,
            sender,
            text: row.text,
            timestamp: row.timestamp,
        })
    }
}
