use std::sync::{Arc, OnceLock};

use tokio::sync::broadcast;
use tradbridge_core::Settings;
use tradbridge_db::BridgeDbPool;

use crate::channel::{ForumPosts, MessageChannel};

static GLOBAL_LOG_TX: OnceLock<broadcast::Sender<LogEntry>> = OnceLock::new();

/// Forward an entry to the `/logs` stream, if a state has been created.
pub fn emit_global_log(entry: LogEntry) {
    if let Some(tx) = GLOBAL_LOG_TX.get() {
        let _ = tx.send(entry);
    }
}

/// Log entry for broadcasting events to listeners
#[derive(Debug, Clone)]
pub enum LogEntry {
    /// Event captured from `tracing`
    Trace {
        level: String,
        target: String,
        message: String,
    },
    /// HTTP request handled
    HttpRequest {
        method: String,
        path: String,
        status: u16,
    },
    /// WebSocket event
    WebSocket { event: String, client_id: String },
    /// General info message
    Info { message: String },
}

impl std::fmt::Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use chrono::Utc;
        let timestamp = Utc::now().format("%H:%M:%S");

        match self {
            LogEntry::Trace {
                level,
                target,
                message,
            } => write!(f, "[{timestamp}] [{level}] {target}: {message}"),
            LogEntry::HttpRequest {
                method,
                path,
                status,
            } => write!(f, "[{timestamp}] [HTTP] {method} {path} {status}"),
            LogEntry::WebSocket { event, client_id } => {
                write!(f, "[{timestamp}] [WS] {event} {client_id}")
            }
            LogEntry::Info { message } => write!(f, "[{timestamp}] [INFO] {message}"),
        }
    }
}

/// Shared application state
pub struct AppState {
    pub settings: Settings,
    pub db: BridgeDbPool,
    /// Log broadcast channel
    log_tx: broadcast::Sender<LogEntry>,
    /// Set once the announcer bot's HTTP client exists
    forum: OnceLock<Arc<dyn ForumPosts>>,
    announcements: OnceLock<Arc<dyn MessageChannel>>,
}

impl AppState {
    pub fn new(settings: Settings, db: BridgeDbPool) -> Self {
        let (log_tx, _) = broadcast::channel(100);
        let _ = GLOBAL_LOG_TX.set(log_tx.clone());
        Self {
            settings,
            db,
            log_tx,
            forum: OnceLock::new(),
            announcements: OnceLock::new(),
        }
    }

    /// Attach the Discord side. Later calls are ignored.
    pub fn attach_discord(
        &self,
        forum: Arc<dyn ForumPosts>,
        announcements: Option<Arc<dyn MessageChannel>>,
    ) {
        let _ = self.forum.set(forum);
        if let Some(channel) = announcements {
            let _ = self.announcements.set(channel);
        }
    }

    pub fn forum(&self) -> Option<Arc<dyn ForumPosts>> {
        self.forum.get().cloned()
    }

    pub fn announcements(&self) -> Option<Arc<dyn MessageChannel>> {
        self.announcements.get().cloned()
    }

    /// Forum used when a request names none.
    pub fn default_forum_id(&self) -> Option<u64> {
        self.settings.discord.forum_id
    }

    /// Get a receiver for log entries
    pub fn subscribe_logs(&self) -> broadcast::Receiver<LogEntry> {
        self.log_tx.subscribe()
    }

    /// Broadcast a log entry
    pub async fn log(&self, entry: LogEntry) {
        let _ = self.log_tx.send(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_entry_display() {
        let entry = LogEntry::HttpRequest {
            method: "POST".to_string(),
            path: "/api/forum-post".to_string(),
            status: 201,
        };
        let s = entry.to_string();
        assert!(s.contains("[HTTP]"));
        assert!(s.contains("POST /api/forum-post 201"));
    }

    #[test]
    fn test_trace_entry_display() {
        let entry = LogEntry::Trace {
            level: "WARN".to_string(),
            target: "tradbridge_gateway::announce".to_string(),
            message: "history scan failed".to_string(),
        };
        assert!(
            entry
                .to_string()
                .ends_with("[WARN] tradbridge_gateway::announce: history scan failed")
        );
    }
}
