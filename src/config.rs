//! Service configuration from environment variables

use crate::db::StoreOptions;

const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub db_path: String,
    pub port: u16,
    pub store: StoreOptions,
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let db_path = lookup("CHAT_DB_PATH").unwrap_or_else(|| {
            let home = lookup("HOME").unwrap_or_else(|| "/tmp".to_string());
            format!("{home}/.airline-chat/chat.db")
        });

        let port = match lookup("CHAT_PORT") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, default = DEFAULT_PORT, "Invalid CHAT_PORT, using default");
                DEFAULT_PORT
            }),
            None => DEFAULT_PORT,
        };

        let defaults = StoreOptions::default();
        let store = StoreOptions {
            session_tracking: flag(&lookup, "CHAT_SESSION_TRACKING", defaults.session_tracking),
            stats: flag(&lookup, "CHAT_STATS", defaults.stats),
        };

        Self {
            db_path,
            port,
            store,
        }
    }
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    let Some(raw) = lookup(key) else {
        return default;
    };
    parse_bool(&raw).unwrap_or_else(|| {
        tracing::warn!(key, value = %raw, default, "Invalid boolean setting, using default");
        default
    })
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
