//! Core data models used throughout recme.
//!
//! These types represent the chat messages, indexed document chunks, and
//! recommendation candidates that flow through the realtime and pipeline
//! layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who authored a chat message. Serialized as `"user"` / `"bot"` on the
/// wire, matching the frontend contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderKind {
    User,
    Bot,
}

impl SenderKind {
    /// Database column value for this sender kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            SenderKind::User => "user",
            SenderKind::Bot => "bot",
        }
    }
}

/// A persisted chat message. Immutable after creation.
///
/// The outbound WebSocket frame is the JSON serialization of this type
/// minus `room_id` (the room is implied by the connection).
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub id: i64,
    #[serde(skip_serializing)]
    pub room_id: i64,
    pub content: String,
    pub sender: SenderKind,
    pub timestamp: DateTime<Utc>,
    /// Display name of the human sender; `None` for bot messages.
    pub sender_identity: Option<String>,
}

/// A registered provider with its bidding rule. Owned by storage;
/// read-only to the recommendation core.
#[derive(Debug, Clone)]
pub struct ProviderRecord {
    pub id: i64,
    pub name: String,
    pub website: String,
    pub topic: String,
    pub location: String,
    pub bid_amount: f64,
    /// Monthly budget cap. Informational only: it never affects ordering
    /// or filtering in this core.
    pub max_budget: f64,
}

/// Which ranking tier a recommendation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// From the registered-provider ranking (bid-ordered).
    Sponsored,
    /// From external search backfill.
    Organic,
}

/// A single recommendation in a batch. Rank within a tier is the position
/// in the batch vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub name: String,
    pub website: String,
    pub tier: Tier,
}

/// An embedded piece of reference text. Immutable once indexed; persisted
/// as part of the vector index. Embeddings are L2-normalized at insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub text: String,
    pub embedding: Vec<f32>,
    /// Label for where this chunk came from (e.g. an uploaded filename).
    pub source: String,
}

/// A nearest-neighbor hit produced by a vector index query. Transient.
#[derive(Debug, Clone)]
pub struct SimilarityHit {
    pub chunk: DocumentChunk,
    /// Squared Euclidean distance; lower = more similar. In `[0, 4]` for
    /// normalized embeddings (`2 - 2 * cosine`).
    pub distance: f32,
}
