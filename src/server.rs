//! Realtime HTTP server.
//!
//! Exposes the WebSocket transport for group chats and the document
//! ingestion endpoint for reference material.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/ws/{room_id}?user=<name>` | Join a room; inbound frames are plain text bodies, outbound frames are message JSON |
//! | `POST` | `/documents` | Index pre-extracted reference text into the vector store |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Connection model
//!
//! Each WebSocket connection gets two tasks: the receive loop below and a
//! forwarding task that drains the room-broadcast channel into the socket.
//! The receive loop hands every text frame to the trigger coordinator and
//! never waits on a recommendation pipeline, so message traffic keeps
//! flowing while background work runs. Pipeline errors are logged, not
//! surfaced as protocol errors, and never close the connection.
//!
//! # Error Contract
//!
//! HTTP error responses use the body:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "texts must not be empty" } }
//! ```
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser
//! clients during development.

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::backfill::ExternalBackfill;
use crate::broadcast::RoomBroadcaster;
use crate::config::Config;
use crate::embedding::{Embedder, OpenAiEmbedder};
use crate::index::VectorIndex;
use crate::ingest;
use crate::intent::IntentExtractor;
use crate::llm::OpenAiChat;
use crate::pipeline::TriggerCoordinator;
use crate::retriever::Retriever;
use crate::store::SqliteStore;
use crate::websearch::SerpApiSearch;
use crate::{db, migrate};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    coordinator: Arc<TriggerCoordinator>,
    broadcaster: Arc<RoomBroadcaster>,
    index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
}

impl AppState {
    pub fn new(
        coordinator: Arc<TriggerCoordinator>,
        broadcaster: Arc<RoomBroadcaster>,
        index: Arc<VectorIndex>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            coordinator,
            broadcaster,
            index,
            embedder,
        }
    }
}

/// Wire up the production collaborators and run the server until the
/// process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(&config.db).await?;
    migrate::run_migrations(&pool).await?;

    let store = Arc::new(SqliteStore::new(pool));
    let index = Arc::new(VectorIndex::load(&config.index.path)?);
    let embedder: Arc<dyn Embedder> = Arc::new(OpenAiEmbedder::new(&config.embedding)?);
    let model = Arc::new(OpenAiChat::new(&config.llm)?);
    let search = Arc::new(SerpApiSearch::new(&config.websearch)?);

    let broadcaster = Arc::new(RoomBroadcaster::new());
    let retriever = Arc::new(Retriever::new(
        Arc::clone(&index),
        Arc::clone(&embedder),
        config.recommend.distance_threshold,
    ));
    let extractor = Arc::new(IntentExtractor::new(model.clone()));
    let backfill = Arc::new(ExternalBackfill::new(search, model));

    let coordinator = Arc::new(TriggerCoordinator::new(
        store,
        Arc::clone(&broadcaster),
        retriever,
        extractor,
        backfill,
        config.recommend.clone(),
    ));

    let state = AppState::new(coordinator, broadcaster, index, embedder);
    serve(&config.server.bind, state).await
}

/// Bind and serve with prepared state. Split from [`run_server`] so tests
/// and custom binaries can inject their own collaborators.
pub async fn serve(bind_addr: &str, state: AppState) -> anyhow::Result<()> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/ws/{room_id}", get(handle_ws_upgrade))
        .route("/documents", post(handle_ingest))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    tracing::info!("recme server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn internal_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /documents ============

#[derive(Deserialize)]
struct IngestRequest {
    source: String,
    texts: Vec<String>,
}

#[derive(Serialize)]
struct IngestResponse {
    indexed: usize,
}

async fn handle_ingest(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, AppError> {
    if request.texts.is_empty() {
        return Err(bad_request("texts must not be empty"));
    }

    let indexed = ingest::ingest_texts(
        state.index.as_ref(),
        state.embedder.as_ref(),
        &request.source,
        &request.texts,
    )
    .await
    .map_err(|e| internal_error(format!("{:#}", e)))?;

    Ok(Json(IngestResponse { indexed }))
}

// ============ GET /ws/{room_id} ============

#[derive(Deserialize)]
struct WsParams {
    /// Display name attached to messages from this connection. Token
    /// validation happens at the auth gateway; by the time a connection
    /// reaches this service the identity is trusted.
    user: Option<String>,
}

async fn handle_ws_upgrade(
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| client_connection(state, room_id, params.user, socket))
}

/// Per-connection lifecycle: register with the room, pump frames both
/// ways, deregister on any exit.
async fn client_connection(
    state: AppState,
    room_id: i64,
    user: Option<String>,
    socket: WebSocket,
) {
    let (conn_id, mut frames) = state.broadcaster.connect(room_id).await;
    tracing::debug!(room_id, ?user, "connection joined");

    let (mut sink, mut stream) = socket.split();

    // Forward room broadcasts onto this socket until either side goes away.
    let forward = tokio::spawn(async move {
        while let Some(frame) = frames.recv().await {
            if sink.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => {
                let body = text.as_str();
                if body.trim().is_empty() {
                    continue;
                }
                // An inbound failure is logged, never propagated into the
                // socket: the connection stays up.
                if let Err(e) = state
                    .coordinator
                    .handle_inbound(room_id, user.as_deref(), body)
                    .await
                {
                    tracing::error!(room_id, "failed to handle inbound message: {:#}", e);
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    state.broadcaster.disconnect(room_id, conn_id).await;
    forward.abort();
    tracing::debug!(room_id, ?user, "connection left");
}
