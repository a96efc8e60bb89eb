//! Storage collaborator: chat history and registered providers.
//!
//! The recommendation core consumes storage through the [`ChatStore`] trait
//! so the pipeline can be exercised with in-memory fakes. The production
//! implementation is [`SqliteStore`], backed by the sqlx pool from
//! [`crate::db`].
//!
//! Contract notes:
//! - `recent_messages` returns the newest `limit` messages in chronological
//!   order (oldest first), ready to feed the intent extractor.
//! - `find_providers` returns *unordered* case-insensitive substring
//!   matches; bid ordering is the ranker's responsibility, not storage's.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::models::{ChatMessage, ProviderRecord, SenderKind};

#[async_trait]
pub trait ChatStore: Send + Sync {
    /// The newest `limit` messages of a room, oldest first.
    async fn recent_messages(&self, room_id: i64, limit: usize) -> Result<Vec<ChatMessage>>;

    /// Persist a message and return it with its assigned id and timestamp.
    async fn append_message(
        &self,
        room_id: i64,
        content: &str,
        sender: SenderKind,
        sender_identity: Option<&str>,
    ) -> Result<ChatMessage>;

    /// Providers whose topic and location each substring-match the given
    /// filter (either direction, case-insensitive). Order is unspecified.
    async fn find_providers(&self, topic: &str, location: &str) -> Result<Vec<ProviderRecord>>;
}

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> ChatMessage {
    let sender: String = row.get("sender");
    let ts: i64 = row.get("timestamp");
    ChatMessage {
        id: row.get("id"),
        room_id: row.get("room_id"),
        content: row.get("content"),
        sender: if sender == "bot" {
            SenderKind::Bot
        } else {
            SenderKind::User
        },
        timestamp: DateTime::from_timestamp(ts, 0).unwrap_or_else(Utc::now),
        sender_identity: row.get("sender_identity"),
    }
}

#[async_trait]
impl ChatStore for SqliteStore {
    async fn recent_messages(&self, room_id: i64, limit: usize) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query(
            r#"
            SELECT id, room_id, content, sender, sender_identity, timestamp
            FROM messages
            WHERE room_id = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(room_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        // Query walks backwards from the newest row; flip to chronological.
        let mut messages: Vec<ChatMessage> = rows.iter().map(row_to_message).collect();
        messages.reverse();
        Ok(messages)
    }

    async fn append_message(
        &self,
        room_id: i64,
        content: &str,
        sender: SenderKind,
        sender_identity: Option<&str>,
    ) -> Result<ChatMessage> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO messages (room_id, content, sender, sender_identity, timestamp)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(room_id)
        .bind(content)
        .bind(sender.as_str())
        .bind(sender_identity)
        .bind(now.timestamp())
        .execute(&self.pool)
        .await?;

        sqlx::query("UPDATE rooms SET last_updated = ? WHERE id = ?")
            .bind(now.timestamp())
            .bind(room_id)
            .execute(&self.pool)
            .await?;

        Ok(ChatMessage {
            id: result.last_insert_rowid(),
            room_id,
            content: content.to_string(),
            sender,
            timestamp: now,
            sender_identity: sender_identity.map(|s| s.to_string()),
        })
    }

    async fn find_providers(&self, topic: &str, location: &str) -> Result<Vec<ProviderRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, website, topic, location, bid_amount, max_budget
            FROM providers
            WHERE (instr(lower(topic), lower(?)) > 0 OR instr(lower(?), lower(topic)) > 0)
              AND (instr(lower(location), lower(?)) > 0 OR instr(lower(?), lower(location)) > 0)
            "#,
        )
        .bind(topic)
        .bind(topic)
        .bind(location)
        .bind(location)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| ProviderRecord {
                id: row.get("id"),
                name: row.get("name"),
                website: row.get("website"),
                topic: row.get("topic"),
                location: row.get("location"),
                bid_amount: row.get("bid_amount"),
                max_budget: row.get("max_budget"),
            })
            .collect())
    }
}
