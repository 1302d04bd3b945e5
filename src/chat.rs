//! Per-message pipeline
//!
//! Validate the text, record session activity, store the user turn, classify
//! it, then store the bot reply.

use crate::classifier::{self, Classification};
use crate::db::{Database, DbError, IntentTag, SessionMetadata, Turn};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Storage(#[from] DbError),
}

/// The two turns written for one user message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Exchange {
    pub user: Turn,
    pub bot: Turn,
}

#[derive(Clone)]
pub struct ChatService {
    db: Database,
}

impl ChatService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Run one message through the pipeline.
    ///
    /// The user turn and its reply are written back to back with no other
    /// turn of the session in between. If the bot write fails the user turn
    /// stays in history.
    pub fn handle_message(
        &self,
        session_id: &str,
        text: &str,
        metadata: &SessionMetadata,
    ) -> Result<Exchange, ChatError> {
        self.handle_message_with(session_id, text, metadata, classifier::classify)
    }

    fn handle_message_with(
        &self,
        session_id: &str,
        text: &str,
        metadata: &SessionMetadata,
        classify: impl FnOnce(&str, &str) -> Classification,
    ) -> Result<Exchange, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            tracing::warn!(session_id = %session_id, "Rejected empty message");
            return Err(ChatError::Validation(
                "Please enter a message".to_string(),
            ));
        }

        if let Some(touched) = self.db.touch_session(session_id, metadata)? {
            if touched.created {
                tracing::info!(session_id = %session_id, "New session tracked");
            }
        }

        let write = self
            .db
            .append_exchange(session_id, text, |user| {
                tracing::info!(session_id = %session_id, turn_id = user.id, "Message received");
                let Classification {
                    intent,
                    confidence,
                    reply,
                } = classify(text, session_id);
                (reply, IntentTag::new(intent, confidence))
            })
            .map_err(|e| {
                tracing::error!(session_id = %session_id, error = %e, "Failed to store user turn");
                e
            })?;

        let user = write.user;
        let bot = match write.bot {
            Ok(turn) => turn,
            Err(e) => {
                tracing::warn!(
                    session_id = %session_id,
                    turn_id = user.id,
                    error = %e,
                    "Bot reply not stored, user turn left without a reply"
                );
                return Err(e.into());
            }
        };

        tracing::info!(
            session_id = %session_id,
            turn_id = bot.id,
            intent = ?bot.intent,
            confidence = ?bot.confidence,
            "Bot reply stored"
        );

        Ok(Exchange { user, bot })
    }

    /// Drop a session's history, returning how many turns were removed
    pub fn clear(&self, session_id: &str) -> Result<usize, ChatError> {
        let deleted = self.db.clear_session(session_id)?;
        tracing::info!(session_id = %session_id, deleted, "Session cleared");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Intent;
    use crate::db::Role;

    fn service() -> ChatService {
        ChatService::new(Database::open_in_memory().unwrap())
    }

    #[test]
    fn test_message_produces_user_and_bot_turns() {
        let chat = service();

        let exchange = chat
            .handle_message("sess-1", "  I want to cancel my flight  ", &SessionMetadata::default())
            .unwrap();

        assert_eq!(exchange.user.content, "I want to cancel my flight");
        assert_eq!(exchange.user.role, Role::User);
        assert_eq!(exchange.bot.role, Role::Bot);
        assert_eq!(exchange.bot.intent, Some(Intent::Cancellation));
        assert!(exchange.bot.id > exchange.user.id);

        let history = chat.db().get_history("sess-1").unwrap();
        assert_eq!(history, vec![exchange.user, exchange.bot]);
    }

    #[test]
    fn test_empty_message_is_rejected_without_writes() {
        let chat = service();

        for text in ["", "   ", "\n\t"] {
            let err = chat
                .handle_message("sess-1", text, &SessionMetadata::default())
                .unwrap_err();
            assert!(matches!(err, ChatError::Validation(_)));
        }

        assert!(chat.db().get_history("sess-1").unwrap().is_empty());
        assert!(chat.db().get_session("sess-1").unwrap().is_none());
    }

    #[test]
    fn test_first_contact_records_metadata() {
        let chat = service();
        let metadata = SessionMetadata {
            user_agent: Some("Mozilla/5.0".to_string()),
            ip_address: Some("192.168.1.20".to_string()),
        };

        chat.handle_message("sess-1", "hello", &metadata).unwrap();
        chat.handle_message("sess-1", "bye", &SessionMetadata::default())
            .unwrap();

        let session = chat.db().get_session("sess-1").unwrap().unwrap();
        assert_eq!(session.user_agent.as_deref(), Some("Mozilla/5.0"));
        assert_eq!(session.ip_address.as_deref(), Some("192.168.1.20"));
    }

    #[test]
    fn test_reply_mentions_session_prefix() {
        let chat = service();

        let exchange = chat
            .handle_message(
                "3f2a9c1d-0000-4000-8000-000000000000",
                "hello",
                &SessionMetadata::default(),
            )
            .unwrap();

        assert_eq!(exchange.bot.intent, Some(Intent::Support));
        assert!(exchange.bot.content.contains("3f2a9c1d"));
        assert!(!exchange.bot.content.contains("3f2a9c1d-"));
    }

    #[test]
    fn test_stats_follow_the_conversation() {
        let chat = service();
        let meta = SessionMetadata::default();
        chat.handle_message("sess-1", "I need a refund", &meta).unwrap();
        chat.handle_message("sess-1", "zzz qqq", &meta).unwrap();

        let stats = chat.db().get_session_stats("sess-1").unwrap();
        assert_eq!(stats.message_count, 4);
        assert_eq!(stats.user_count, 2);
        assert_eq!(stats.bot_count, 2);
        assert!((stats.avg_confidence.unwrap() - 0.75).abs() < 1e-9);

        assert_eq!(chat.clear("sess-1").unwrap(), 4);
        assert_eq!(chat.clear("sess-1").unwrap(), 0);
        assert_eq!(chat.db().get_session_stats("sess-1").unwrap().message_count, 0);
    }

    #[test]
    fn test_closed_store_surfaces_storage_error() {
        let chat = service();
        chat.db().close().unwrap();

        let err = chat
            .handle_message("sess-1", "hello", &SessionMetadata::default())
            .unwrap_err();
        assert!(matches!(err, ChatError::Storage(DbError::Closed)));
    }

    #[test]
    fn test_failed_reply_leaves_user_turn_in_history() {
        let chat = service();

        let err = chat
            .handle_message_with("sess-1", "hello", &SessionMetadata::default(), |_, _| {
                Classification {
                    intent: Intent::Support,
                    confidence: 1.5,
                    reply: "out of range".to_string(),
                }
            })
            .unwrap_err();
        assert!(matches!(err, ChatError::Storage(DbError::InvalidTurn(_))));

        let history = chat.db().get_history("sess-1").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].content, "hello");

        // The session keeps working after the orphan
        let exchange = chat
            .handle_message("sess-1", "hello again", &SessionMetadata::default())
            .unwrap();
        assert_eq!(exchange.bot.intent, Some(Intent::Support));
        assert_eq!(chat.db().get_history("sess-1").unwrap().len(), 3);
    }

    #[test]
    fn test_concurrent_messages_in_one_session_stay_paired() {
        let chat = service();

        let handles: Vec<_> = (0..4)
            .map(|n| {
                let chat = chat.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        chat.handle_message(
                            "shared",
                            &format!("refund {n}-{i}"),
                            &SessionMetadata::default(),
                        )
                        .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let history = chat.db().get_history("shared").unwrap();
        assert_eq!(history.len(), 400);
        for pair in history.chunks(2) {
            assert_eq!(pair[0].role, Role::User, "turn {} out of place", pair[0].id);
            assert_eq!(pair[1].role, Role::Bot, "turn {} out of place", pair[1].id);
            assert_eq!(pair[1].id, pair[0].id + 1);
        }
    }
}
