//! HTTP request handlers

use super::types::{
    ClearResponse, CreateSessionResponse, ErrorResponse, HistoryResponse, SendMessageRequest,
};
use super::AppState;
use crate::chat::{ChatError, Exchange};
use crate::db::{DbError, GlobalStats, SessionMetadata, SessionStats};
use axum::{
    extract::{ConnectInfo, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::net::SocketAddr;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Session creation
        .route("/api/sessions", post(create_session))
        // Conversation
        .route(
            "/api/sessions/:id/messages",
            get(get_history).post(send_message),
        )
        .route("/api/sessions/:id/clear", post(clear_session))
        // Statistics
        .route("/api/sessions/:id/stats", get(get_session_stats))
        .route("/api/stats", get(get_global_stats))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

/// Request metadata recorded on a session's first contact
fn request_metadata(
    headers: &HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
) -> SessionMetadata {
    SessionMetadata {
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string),
        ip_address: connect_info.map(|ConnectInfo(addr)| addr.ip().to_string()),
    }
}

// ============================================================
// Sessions
// ============================================================

async fn create_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), AppError> {
    let session_id = uuid::Uuid::new_v4().to_string();
    let metadata = request_metadata(&headers, connect_info);

    state.db().touch_session(&session_id, &metadata)?;
    tracing::info!(session_id = %session_id, "Session created");

    Ok((StatusCode::CREATED, Json(CreateSessionResponse { session_id })))
}

async fn clear_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ClearResponse>, AppError> {
    let deleted = state.chat.clear(&id)?;
    Ok(Json(ClearResponse {
        session_id: id,
        deleted,
    }))
}

// ============================================================
// Conversation
// ============================================================

async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<Exchange>, AppError> {
    let metadata = request_metadata(&headers, connect_info);
    let exchange = state.chat.handle_message(&id, &req.message, &metadata)?;
    Ok(Json(exchange))
}

async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<HistoryResponse>, AppError> {
    let messages = state.db().get_history(&id)?;
    Ok(Json(HistoryResponse {
        session_id: id,
        messages,
    }))
}

// ============================================================
// Statistics
// ============================================================

async fn get_session_stats(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionStats>, AppError> {
    Ok(Json(state.db().get_session_stats(&id)?))
}

async fn get_global_stats(State(state): State<AppState>) -> Result<Json<GlobalStats>, AppError> {
    Ok(Json(state.db().get_global_stats()?))
}

async fn get_version() -> &'static str {
    concat!("airline-chat ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl From<DbError> for AppError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::StatsDisabled => AppError::NotFound(e.to_string()),
            DbError::InvalidTurn(msg) => AppError::BadRequest(msg),
            other => {
                tracing::error!(error = %other, "Storage failure");
                AppError::Internal(other.to_string())
            }
        }
    }
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::Validation(msg) => AppError::BadRequest(msg),
            ChatError::Storage(db) => db.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
