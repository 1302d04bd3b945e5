//! Database schema and types

use crate::classifier::Intent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS sessions (
    session_id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL,
    last_activity TEXT NOT NULL,
    user_agent TEXT,
    ip_address TEXT
);

CREATE TABLE IF NOT EXISTS turns (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    role TEXT NOT NULL CHECK(role IN ('user', 'bot')),
    content TEXT NOT NULL,
    intent TEXT,
    confidence REAL,
    created_at TEXT NOT NULL,

    CHECK ((role = 'bot') = (intent IS NOT NULL)),
    CHECK ((intent IS NULL) = (confidence IS NULL))
);

CREATE INDEX IF NOT EXISTS idx_turns_session ON turns(session_id, created_at, id);
CREATE INDEX IF NOT EXISTS idx_turns_intent ON turns(intent);
";

/// Who wrote a turn
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Bot,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Bot => "bot",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Intent label and confidence carried by every bot turn
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IntentTag {
    pub intent: Intent,
    pub confidence: f64,
}

impl IntentTag {
    pub fn new(intent: Intent, confidence: f64) -> Self {
        Self { intent, confidence }
    }
}

/// One immutable conversational turn
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turn {
    /// Store-wide insertion sequence, the tiebreak for equal timestamps
    pub id: i64,
    pub session_id: String,
    pub role: Role,
    pub content: String,
    pub intent: Option<Intent>,
    pub confidence: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    #[allow(dead_code)] // Used in tests
    pub fn tag(&self) -> Option<IntentTag> {
        match (self.intent, self.confidence) {
            (Some(intent), Some(confidence)) => Some(IntentTag::new(intent, confidence)),
            _ => None,
        }
    }
}

/// Request metadata captured on a session's first contact
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

/// Session record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

/// Session row after a touch
#[derive(Debug, Clone, PartialEq)]
pub struct TouchedSession {
    pub session: Session,
    /// The touch inserted the row
    pub created: bool,
}

/// A stored user turn and the outcome of storing its reply
#[derive(Debug)]
pub struct ExchangeWrite {
    pub user: Turn,
    /// `Err` leaves `user` in history without a reply
    pub bot: super::DbResult<Turn>,
}

/// Count of bot turns carrying one intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LabelCount {
    pub intent: Intent,
    pub count: u64,
}

/// Per-session aggregates
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStats {
    pub session_id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub last_activity: Option<DateTime<Utc>>,
    pub message_count: u64,
    pub user_count: u64,
    pub bot_count: u64,
    /// Mean bot confidence; `None` when the session has no bot turns
    pub avg_confidence: Option<f64>,
    /// Descending by count, then by label
    pub label_distribution: Vec<LabelCount>,
}

/// Store-wide aggregates
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlobalStats {
    pub total_sessions: u64,
    pub total_messages: u64,
    pub label_distribution: Vec<LabelCount>,
}
