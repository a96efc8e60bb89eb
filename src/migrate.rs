use anyhow::Result;
use sqlx::SqlitePool;

/// Create the schema. Idempotent: every statement is `IF NOT EXISTS`.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Rooms (group chats). Membership and ownership live with the account
    // service; this core only needs the room row for foreign keys.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS rooms (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL DEFAULT 'New Chat',
            created_at INTEGER NOT NULL,
            last_updated INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            room_id INTEGER NOT NULL,
            content TEXT NOT NULL,
            sender TEXT NOT NULL,
            sender_identity TEXT,
            timestamp INTEGER NOT NULL,
            FOREIGN KEY (room_id) REFERENCES rooms(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Registered providers with their bidding rules. Written by the account
    // surface; read-only here.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS providers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            website TEXT NOT NULL,
            topic TEXT NOT NULL,
            location TEXT NOT NULL,
            bid_amount REAL NOT NULL DEFAULT 0,
            max_budget REAL NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_room_id ON messages(room_id, id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_providers_topic ON providers(topic)")
        .execute(pool)
        .await?;

    Ok(())
}
