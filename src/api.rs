//! HTTP API for the chat service
//!
//! Sessions are addressed by id in the path; every message goes through the
//! chat pipeline and every read comes straight from the store.

mod handlers;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::chat::ChatService;
use crate::db::Database;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub chat: ChatService,
}

impl AppState {
    pub fn new(db: Database) -> Self {
        Self {
            chat: ChatService::new(db),
        }
    }

    pub fn db(&self) -> &Database {
        self.chat.db()
    }
}
