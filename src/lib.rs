//! # recme
//!
//! A realtime group-chat server with an LLM-driven recommendation
//! pipeline. Members of a room chat normally; posting the trigger marker
//! (`@recme` by default) starts a background workflow that infers what
//! they're looking for from the conversation, ranks registered providers
//! by bid, backfills with establishments found via web search, and pushes
//! the result back into the room — all without stalling message traffic.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐    ┌──────────────────┐    ┌─────────────┐
//! │ WebSocket  │──▶│ TriggerCoordinator│──▶│  pipeline    │
//! │ per room   │    │ (marker detect)  │    │ (spawned)    │
//! └─────┬──────┘    └──────────────────┘    └──────┬──────┘
//!       │                                          │
//!       ▼                                          ▼
//! ┌────────────┐    intent ◀── retriever ◀── VectorIndex
//! │ Broadcaster│    rank   ◀── SQLite providers
//! │ (fanout)   │◀── format ◀── backfill ◀── web search + LLM
//! └────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`db`] | SQLite connection pool |
//! | [`migrate`] | Schema migrations |
//! | [`store`] | Chat history and provider storage |
//! | [`embedding`] | Embedding collaborator |
//! | [`llm`] | Chat-completion collaborator |
//! | [`websearch`] | Web-search collaborator |
//! | [`index`] | Persistent vector index |
//! | [`ingest`] | Reference-document ingestion |
//! | [`retriever`] | Threshold-filtered, deduplicated retrieval |
//! | [`intent`] | Intent extraction from chat history |
//! | [`rank`] | Bid ordering of matched providers |
//! | [`backfill`] | Organic backfill from external search |
//! | [`format`] | Terminal message rendering |
//! | [`broadcast`] | Per-room connection registry and fanout |
//! | [`pipeline`] | Trigger detection and background pipeline |
//! | [`server`] | HTTP server with WebSocket transport |

pub mod backfill;
pub mod broadcast;
pub mod config;
pub mod db;
pub mod embedding;
pub mod format;
pub mod index;
pub mod ingest;
pub mod intent;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod rank;
pub mod retriever;
pub mod server;
pub mod store;
pub mod websearch;
