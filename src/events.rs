//! Audit event logging for the leader process.
//!
//! The leader appends one JSON object per line (NDJSON) to an events file
//! next to its socket, recording socket lifecycle and every compare-and-swap
//! it serves. The log is diagnostic only: appends are best-effort on the
//! request path and a failed append must never fail the request itself.
//!
//! # Event Format
//!
//! Each event is a JSON object with the following fields:
//! - `ts`: RFC3339 timestamp
//! - `action`: the action performed (leader_bind, cas, shutdown)
//! - `actor`: the leader's owner string (e.g., `user@HOST`)
//! - `key`: optional lock key for per-request events
//! - `details`: freeform object with action-specific details

use crate::error::{CorralError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Actions that can be logged as events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    /// Leader bound the socket and started serving.
    LeaderBind,
    /// A compare-and-swap request was served.
    Cas,
    /// Leader drained connections and released the socket.
    Shutdown,
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventAction::LeaderBind => write!(f, "leader_bind"),
            EventAction::Cas => write!(f, "cas"),
            EventAction::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// An event record for the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// RFC3339 timestamp when the event occurred.
    pub ts: DateTime<Utc>,

    /// The action that was performed.
    pub action: EventAction,

    /// The actor hosting the leader (e.g., `user@HOST`).
    pub actor: String,

    /// Optional lock key for per-request events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Freeform details object with action-specific information.
    pub details: Value,
}

impl Event {
    /// Create a new event with the given action.
    ///
    /// The timestamp is set to the current time, and the actor is
    /// determined from the environment (USER@HOSTNAME).
    pub fn new(action: EventAction) -> Self {
        Self {
            ts: Utc::now(),
            action,
            actor: get_actor_string(),
            key: None,
            details: Value::Object(serde_json::Map::new()),
        }
    }

    /// Set the lock key for this event.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set the details object for this event.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Serialize the event to a single-line JSON string.
    pub fn to_ndjson_line(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| CorralError::UserError(format!("failed to serialize event: {}", e)))
    }
}

/// Get the actor string for event metadata.
fn get_actor_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}

/// Append-only NDJSON event log.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    /// Create a log writing to `path`. Nothing is opened until the first
    /// append.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// The events file that sits alongside a leader socket.
    pub fn for_socket(socket_path: &Path) -> Self {
        let dir = socket_path.parent().unwrap_or_else(|| Path::new("."));
        Self::new(dir.join("events.ndjson"))
    }

    /// Append an event as a single JSON line, creating the file (and its
    /// parent directory) if needed.
    pub fn append(&self, event: &Event) -> Result<()> {
        let json_line = event.to_ndjson_line()?;

        if let Some(parent) = self.path.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| {
                CorralError::UserError(format!(
                    "failed to create events directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                CorralError::UserError(format!(
                    "failed to open events file '{}': {}",
                    self.path.display(),
                    e
                ))
            })?;

        writeln!(file, "{}", json_line).map_err(|e| {
            CorralError::UserError(format!(
                "failed to write event to '{}': {}",
                self.path.display(),
                e
            ))
        })
    }

    /// Append an event, downgrading failure to a stderr warning.
    ///
    /// Used on the request path, where the audit log must never take a
    /// request down with it.
    pub fn append_best_effort(&self, event: &Event) {
        if let Err(e) = self.append(event) {
            eprintln!("Warning: failed to log {} event: {}", event.action, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn event_serializes_to_single_line() {
        let event = Event::new(EventAction::Cas)
            .with_key("build-lock")
            .with_details(json!({"old": "", "new": "1", "replaced": true}));

        let line = event.to_ndjson_line().unwrap();
        assert!(!line.contains('\n'));
        assert!(line.contains("\"action\":\"cas\""));
        assert!(line.contains("\"key\":\"build-lock\""));
        assert!(line.contains("\"replaced\":true"));
    }

    #[test]
    fn key_is_omitted_when_unset() {
        let event = Event::new(EventAction::LeaderBind);
        let line = event.to_ndjson_line().unwrap();
        assert!(!line.contains("\"key\""));
    }

    #[test]
    fn actor_is_user_at_host() {
        let event = Event::new(EventAction::Shutdown);
        assert!(event.actor.contains('@'));
    }

    #[test]
    fn append_creates_file_and_appends_lines() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("events.ndjson");
        let log = EventLog::new(path.clone());

        log.append(&Event::new(EventAction::LeaderBind)).unwrap();
        log.append(&Event::new(EventAction::Shutdown)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let parsed: Event = serde_json::from_str(line).unwrap();
            assert!(matches!(
                parsed.action,
                EventAction::LeaderBind | EventAction::Shutdown
            ));
        }
    }

    #[test]
    fn for_socket_places_log_next_to_socket() {
        let temp = TempDir::new().unwrap();
        let socket = temp.path().join("leader-sock");

        let log = EventLog::for_socket(&socket);
        log.append(&Event::new(EventAction::LeaderBind)).unwrap();

        assert!(temp.path().join("events.ndjson").exists());
    }

    #[test]
    fn action_display_matches_serde_names() {
        assert_eq!(EventAction::LeaderBind.to_string(), "leader_bind");
        assert_eq!(EventAction::Cas.to_string(), "cas");
        assert_eq!(EventAction::Shutdown.to_string(), "shutdown");
    }
}
