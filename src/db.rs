//! Database module for the chat service
//!
//! Provides persistence for sessions and their conversational turns, plus
//! the aggregate views read back for display.

mod schema;

pub use schema::*;

use crate::classifier::Intent;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Store is closed")]
    Closed,
    #[error("Store connection lock poisoned")]
    Poisoned,
    #[error("Invalid turn: {0}")]
    InvalidTurn(String),
    #[error("Statistics are disabled")]
    StatsDisabled,
}

pub type DbResult<T> = Result<T, DbError>;

/// Optional store features
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Keep a sessions row with creation time, last activity and metadata
    pub session_tracking: bool,
    /// Serve session and global statistics
    pub stats: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            session_tracking: true,
            stats: true,
        }
    }
}

/// Thread-safe database handle
///
/// Clones share one connection. The mutex serialises every write, which is
/// what keeps per-session append order intact.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Option<Connection>>>,
    options: StoreOptions,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P, options: StoreOptions) -> DbResult<Self> {
        Self::from_connection(Connection::open(path)?, options)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        Self::open_in_memory_with(StoreOptions::default())
    }

    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory_with(options: StoreOptions) -> DbResult<Self> {
        Self::from_connection(Connection::open_in_memory()?, options)
    }

    fn from_connection(conn: Connection, options: StoreOptions) -> DbResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            options,
        })
    }

    /// Close the underlying connection. Every later call on any clone of
    /// this handle fails with [`DbError::Closed`]. Closing twice is a no-op.
    pub fn close(&self) -> DbResult<()> {
        let mut guard = self.conn.lock().map_err(|_| DbError::Poisoned)?;
        if let Some(conn) = guard.take() {
            conn.close().map_err(|(_, e)| DbError::Sqlite(e))?;
        }
        Ok(())
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> DbResult<T>) -> DbResult<T> {
        let guard = self.conn.lock().map_err(|_| DbError::Poisoned)?;
        let conn = guard.as_ref().ok_or(DbError::Closed)?;
        f(conn)
    }

    // ==================== Session Operations ====================

    /// Record contact from a session.
    ///
    /// The first contact creates the row and keeps `metadata`; later contacts
    /// only move `last_activity` forward. Returns `None` when session
    /// tracking is disabled.
    pub fn touch_session(
        &self,
        session_id: &str,
        metadata: &SessionMetadata,
    ) -> DbResult<Option<TouchedSession>> {
        if !self.options.session_tracking {
            return Ok(None);
        }

        self.with_conn(|conn| {
            let stamp = format_datetime(&now());
            let created = conn.execute(
                "INSERT INTO sessions (session_id, created_at, last_activity, user_agent, ip_address)
                 VALUES (?1, ?2, ?2, ?3, ?4)
                 ON CONFLICT(session_id) DO NOTHING",
                params![
                    session_id,
                    stamp,
                    metadata.user_agent,
                    metadata.ip_address
                ],
            )? == 1;

            if !created {
                conn.execute(
                    "UPDATE sessions SET last_activity = MAX(last_activity, ?2)
                     WHERE session_id = ?1",
                    params![session_id, stamp],
                )?;
            }

            Ok(query_session(conn, session_id)?.map(|session| TouchedSession { session, created }))
        })
    }

    /// Get the session row, if one is tracked
    #[allow(dead_code)] // Used in tests
    pub fn get_session(&self, session_id: &str) -> DbResult<Option<Session>> {
        self.with_conn(|conn| query_session(conn, session_id))
    }

    // ==================== Turn Operations ====================

    /// Append one immutable turn.
    ///
    /// User turns need non-blank content and no tag; bot turns need a tag.
    /// `created_at` never runs backwards within a session.
    #[allow(dead_code)] // Used in tests
    pub fn append_turn(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
        tag: Option<IntentTag>,
    ) -> DbResult<Turn> {
        validate_turn(role, content, tag)?;
        let tracking = self.options.session_tracking;
        self.with_conn(|conn| insert_turn(conn, session_id, role, content, tag, tracking))
    }

    /// Append a user turn and the bot turn answering it without letting any
    /// other write into the session in between.
    ///
    /// `reply_to` builds the bot reply from the stored user turn. The user
    /// turn is committed on its own first, so a failed bot write leaves it
    /// in history and is reported through [`ExchangeWrite::bot`].
    pub fn append_exchange(
        &self,
        session_id: &str,
        text: &str,
        reply_to: impl FnOnce(&Turn) -> (String, IntentTag),
    ) -> DbResult<ExchangeWrite> {
        validate_turn(Role::User, text, None)?;
        let tracking = self.options.session_tracking;

        self.with_conn(|conn| {
            let user = insert_turn(conn, session_id, Role::User, text, None, tracking)?;

            let (reply, tag) = reply_to(&user);
            let bot = validate_turn(Role::Bot, &reply, Some(tag)).and_then(|()| {
                insert_turn(conn, session_id, Role::Bot, &reply, Some(tag), tracking)
            });

            Ok(ExchangeWrite { user, bot })
        })
    }

    /// Turns of a session in append order; empty for unknown sessions
    pub fn get_history(&self, session_id: &str) -> DbResult<Vec<Turn>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, role, content, intent, confidence, created_at
                 FROM turns WHERE session_id = ?1 ORDER BY created_at ASC, id ASC",
            )?;

            let rows = stmt.query_map(params![session_id], parse_turn_row)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
        })
    }

    /// Delete every turn of a session and return how many were removed.
    ///
    /// The session row is kept. Clearing an empty session removes nothing.
    pub fn clear_session(&self, session_id: &str) -> DbResult<usize> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM turns WHERE session_id = ?1", params![session_id])?;
            Ok(deleted)
        })
    }

    // ==================== Statistics ====================

    pub fn get_session_stats(&self, session_id: &str) -> DbResult<SessionStats> {
        if !self.options.stats {
            return Err(DbError::StatsDisabled);
        }

        self.with_conn(|conn| {
            let (message_count, user_count, bot_count, avg_confidence) = conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(CASE WHEN role = 'user' THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(CASE WHEN role = 'bot' THEN 1 ELSE 0 END), 0),
                        AVG(CASE WHEN role = 'bot' THEN confidence END)
                 FROM turns WHERE session_id = ?1",
                params![session_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, Option<f64>>(3)?,
                    ))
                },
            )?;

            let session = query_session(conn, session_id)?;
            let label_distribution = query_distribution(conn, Some(session_id))?;

            Ok(SessionStats {
                session_id: session_id.to_string(),
                created_at: session.as_ref().map(|s| s.created_at),
                last_activity: session.as_ref().map(|s| s.last_activity),
                message_count: to_count(message_count),
                user_count: to_count(user_count),
                bot_count: to_count(bot_count),
                avg_confidence,
                label_distribution,
            })
        })
    }

    pub fn get_global_stats(&self) -> DbResult<GlobalStats> {
        if !self.options.stats {
            return Err(DbError::StatsDisabled);
        }

        self.with_conn(|conn| {
            // Sessions seen either through tracking or through turns
            let total_sessions: i64 = conn.query_row(
                "SELECT COUNT(*) FROM (
                     SELECT session_id FROM sessions
                     UNION
                     SELECT session_id FROM turns
                 )",
                [],
                |row| row.get(0),
            )?;
            let total_messages: i64 =
                conn.query_row("SELECT COUNT(*) FROM turns", [], |row| row.get(0))?;

            Ok(GlobalStats {
                total_sessions: to_count(total_sessions),
                total_messages: to_count(total_messages),
                label_distribution: query_distribution(conn, None)?,
            })
        })
    }
}

/// Insert one turn in its own transaction, clamping `created_at` so it never
/// precedes the session's latest turn
fn insert_turn(
    conn: &Connection,
    session_id: &str,
    role: Role,
    content: &str,
    tag: Option<IntentTag>,
    tracking: bool,
) -> DbResult<Turn> {
    let tx = conn.unchecked_transaction()?;

    let last: Option<DateTime<Utc>> = tx.query_row(
        "SELECT MAX(created_at) FROM turns WHERE session_id = ?1",
        params![session_id],
        |row| match row.get::<_, Option<String>>(0)? {
            Some(_) => get_datetime(row, 0).map(Some),
            None => Ok(None),
        },
    )?;
    let current = now();
    let created_at = match last {
        Some(last) if last > current => last,
        _ => current,
    };
    let created_str = format_datetime(&created_at);

    tx.execute(
        "INSERT INTO turns (session_id, role, content, intent, confidence, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            session_id,
            role.as_str(),
            content,
            tag.map(|t| t.intent.label()),
            tag.map(|t| t.confidence),
            created_str,
        ],
    )?;
    let id = tx.last_insert_rowid();

    if tracking {
        tx.execute(
            "INSERT INTO sessions (session_id, created_at, last_activity)
             VALUES (?1, ?2, ?2)
             ON CONFLICT(session_id) DO UPDATE
             SET last_activity = MAX(last_activity, excluded.last_activity)",
            params![session_id, created_str],
        )?;
    }

    tx.commit()?;

    Ok(Turn {
        id,
        session_id: session_id.to_string(),
        role,
        content: content.to_string(),
        intent: tag.map(|t| t.intent),
        confidence: tag.map(|t| t.confidence),
        created_at,
    })
}

fn validate_turn(role: Role, content: &str, tag: Option<IntentTag>) -> DbResult<()> {
    match (role, tag) {
        (Role::User, Some(_)) => Err(DbError::InvalidTurn(
            "user turns carry no intent".to_string(),
        )),
        (Role::User, None) if content.trim().is_empty() => Err(DbError::InvalidTurn(
            "user turn content is empty".to_string(),
        )),
        (Role::Bot, None) => Err(DbError::InvalidTurn(
            "bot turns require an intent".to_string(),
        )),
        (Role::Bot, Some(tag)) if !(0.0..=1.0).contains(&tag.confidence) => Err(
            DbError::InvalidTurn(format!("confidence {} outside [0, 1]", tag.confidence)),
        ),
        _ => Ok(()),
    }
}

fn query_session(conn: &Connection, session_id: &str) -> DbResult<Option<Session>> {
    conn.query_row(
        "SELECT session_id, created_at, last_activity, user_agent, ip_address
         FROM sessions WHERE session_id = ?1",
        params![session_id],
        |row| {
            Ok(Session {
                session_id: row.get(0)?,
                created_at: get_datetime(row, 1)?,
                last_activity: get_datetime(row, 2)?,
                user_agent: row.get(3)?,
                ip_address: row.get(4)?,
            })
        },
    )
    .optional()
    .map_err(DbError::from)
}

/// Intent counts over bot turns, for one session or the whole store
fn query_distribution(conn: &Connection, session_id: Option<&str>) -> DbResult<Vec<LabelCount>> {
    let mut stmt = conn.prepare(
        "SELECT intent, COUNT(*) AS n FROM turns
         WHERE role = 'bot' AND intent IS NOT NULL AND (?1 IS NULL OR session_id = ?1)
         GROUP BY intent
         ORDER BY n DESC, intent ASC",
    )?;

    let rows = stmt.query_map(params![session_id], |row| {
        Ok(LabelCount {
            intent: parse_intent(row, 0)?,
            count: to_count(row.get(1)?),
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
}

/// Parse a turn row from the database
fn parse_turn_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Turn> {
    let role = match row.get::<_, String>(2)?.as_str() {
        "user" => Role::User,
        "bot" => Role::Bot,
        other => {
            return Err(rusqlite::Error::FromSqlConversionFailure(
                2,
                Type::Text,
                format!("unknown role: {other}").into(),
            ))
        }
    };
    let intent = match row.get::<_, Option<String>>(4)? {
        Some(_) => Some(parse_intent(row, 4)?),
        None => None,
    };

    Ok(Turn {
        id: row.get(0)?,
        session_id: row.get(1)?,
        role,
        content: row.get(3)?,
        intent,
        confidence: row.get(5)?,
        created_at: get_datetime(row, 6)?,
    })
}

fn parse_intent(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Intent> {
    let label: String = row.get(idx)?;
    label
        .parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn to_count(n: i64) -> u64 {
    u64::try_from(n).unwrap_or(0)
}

/// Current time at the precision timestamps are stored with
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Fixed-width RFC 3339 so text order matches time order
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Read a stored timestamp, failing on text that is not RFC 3339
fn get_datetime(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
