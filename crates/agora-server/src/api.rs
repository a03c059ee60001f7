use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::Method,
    middleware,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use agora_shared::constants;
use agora_shared::protocol::{AttachmentMeta, PostRecord};
use agora_shared::types::Author;
use agora_store::Database;

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::hub::EventHub;
use crate::media_store::MediaStore;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::router::{author_from_user, record_from_entry, EventRouter};
use crate::ws;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub media: Arc<MediaStore>,
    pub router: Arc<EventRouter>,
    pub hub: EventHub,
    pub rate_limiter: RateLimiter,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    let media_root = state.media.base_path().to_path_buf();

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        .route("/ws", get(ws::ws_handler))
        .route("/feed", get(feed))
        .route("/feed/:id", delete(remove_post))
        .route("/conversations/:id", get(conversations))
        .route("/conversations/:id/messages", get(conversation_messages))
        .route("/conversations/:id/read", post(mark_read))
        .route("/messages/:id", delete(remove_message))
        .nest_service("/media", ServeDir::new(media_root))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ServerInfoResponse {
    name: String,
    version: &'static str,
    max_post_chars: usize,
    max_attachments: usize,
    max_attachment_bytes: usize,
    allowed_media_types: Vec<String>,
}

#[derive(Deserialize)]
struct Pagination {
    limit: Option<u32>,
    offset: Option<u32>,
}

impl Pagination {
    fn limit(&self) -> u32 {
        self.limit.unwrap_or(constants::DEFAULT_PAGE_SIZE)
    }

    fn offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }
}

/// One inbox entry as served to a client's conversation list.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConversationSummary {
    id: Uuid,
    /// The other participant, when their display data is known.
    peer: Option<Author>,
    last_message: String,
    updated_at: DateTime<Utc>,
}

/// One history row: the stored message with its author rehydrated.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryMessage {
    id: Uuid,
    conversation_id: Uuid,
    author: Option<Author>,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    attachment: Option<AttachmentMeta>,
    created_at: DateTime<Utc>,
    read: bool,
    deleted: bool,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    Json(ServerInfoResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        max_post_chars: state.config.max_post_chars,
        max_attachments: state.config.max_attachments,
        max_attachment_bytes: state.config.max_attachment_bytes,
        allowed_media_types: state.config.allowed_media_types.clone(),
    })
}

/// Feed page, newest first, authors rehydrated.
async fn feed(
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<PostRecord>>, ServerError> {
    let db = state.db.lock().await;
    let entries = db.list_feed(page.limit(), page.offset())?;
    Ok(Json(entries.into_iter().map(record_from_entry).collect()))
}

/// Storage-side post deletion. The socket `deletePost` event only spreads
/// the news; this is the path that actually removes the record.
async fn remove_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let db = state.db.lock().await;
    if db.delete_post(id)? {
        info!(post = %id, "Post deleted");
        Ok(Json(serde_json::json!({ "deleted": true })))
    } else {
        Err(ServerError::NotFound(format!("No post {id}")))
    }
}

/// Conversation list for a user, most recently active first.
async fn conversations(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<ConversationSummary>>, ServerError> {
    let db = state.db.lock().await;
    let rows = db.list_conversations_for_user(user_id)?;

    let mut summaries = Vec::with_capacity(rows.len());
    for conversation in rows {
        let peer_id = if conversation.participant_a == user_id {
            conversation.participant_b
        } else {
            conversation.participant_a
        };
        let peer = db.get_user(peer_id).ok().map(|u| author_from_user(&u));

        summaries.push(ConversationSummary {
            id: conversation.id,
            peer,
            last_message: conversation.last_message,
            updated_at: conversation.updated_at,
        });
    }

    Ok(Json(summaries))
}

/// Message history of a conversation, oldest first.
async fn conversation_messages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<HistoryMessage>>, ServerError> {
    let db = state.db.lock().await;
    // 404 for unknown conversations rather than an empty page.
    db.get_conversation(id)?;

    let rows = db.get_messages_for_conversation(id, page.limit(), page.offset())?;

    let mut history = Vec::with_capacity(rows.len());
    for message in rows {
        let author = db
            .get_user(message.sender_id)
            .ok()
            .map(|u| author_from_user(&u));
        let attachment = match (message.attachment_kind, message.attachment_url) {
            (Some(kind), Some(url)) => Some(AttachmentMeta { kind, url }),
            _ => None,
        };

        history.push(HistoryMessage {
            id: message.id,
            conversation_id: message.conversation_id,
            author,
            content: message.content,
            attachment,
            created_at: message.created_at,
            read: message.is_read,
            deleted: message.is_deleted,
        });
    }

    Ok(Json(history))
}

/// Mark every message of a conversation as read.
async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let db = state.db.lock().await;
    db.get_conversation(id)?;
    db.mark_conversation_read(id)?;
    Ok(Json(serde_json::json!({ "read": true })))
}

/// Soft-delete a message: the row survives, the content is redacted and the
/// conversation preview is cleared when it was the latest message.
async fn remove_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let mut db = state.db.lock().await;
    if db.soft_delete_message(id)? {
        info!(message = %id, "Message soft-deleted");
        Ok(Json(serde_json::json!({ "deleted": true })))
    } else {
        Err(ServerError::NotFound(format!("No message {id}")))
    }
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
