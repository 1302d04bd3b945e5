//! API request and response types

use crate::db::Turn;
use serde::{Deserialize, Serialize};

/// Request to post a message into a session
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub message: String,
}

/// Response for session creation
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
}

/// Ordered history of a session
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub session_id: String,
    pub messages: Vec<Turn>,
}

/// Response for clearing a session
#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub session_id: String,
    pub deleted: usize,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
