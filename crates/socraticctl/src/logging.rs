//! Session log: one JSON line per lock, unlock and quiz outcome.
//!
//! Path discovery follows the XDG fallback chain:
//! 1. `$SOCRATIC_LOG_FILE`
//! 2. `$XDG_STATE_HOME/socratic/session.jsonl`
//! 3. `~/.local/state/socratic/session.jsonl`

use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const LOG_FILE_ENV: &str = "SOCRATIC_LOG_FILE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionLogEntry {
    /// RFC 3339 timestamp
    pub ts: String,

    /// Practice session id (UUID)
    pub session_id: String,

    /// `locked`, `unlocked`, `answer`, `reset`
    pub event: String,

    /// Builder score after the event
    pub score: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_count: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub penalty: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub refunded: Option<f64>,

    /// Unlock reason or validation status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// Validation passed only because the backend failed
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub failed_open: bool,
}

impl SessionLogEntry {
    pub fn new(session_id: &str, event: &str, score: f64) -> Self {
        Self {
            ts: chrono::Utc::now().to_rfc3339(),
            session_id: session_id.to_string(),
            event: event.to_string(),
            score,
            line_count: None,
            penalty: None,
            refunded: None,
            detail: None,
            failed_open: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionLog {
    path: Option<PathBuf>,
    session_id: String,
}

impl SessionLog {
    /// Log at the discovered path with a fresh session id.
    pub fn discover() -> Self {
        Self {
            path: discover_log_path(),
            session_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn at(path: &Path) -> Self {
        Self {
            path: Some(path.to_path_buf()),
            session_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Log that drops every entry.
    pub fn disabled() -> Self {
        Self {
            path: None,
            session_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn entry(&self, event: &str, score: f64) -> SessionLogEntry {
        SessionLogEntry::new(&self.session_id, event, score)
    }

    /// Append an entry. Write failures are reported through tracing only.
    pub fn record(&self, entry: &SessionLogEntry) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = write_line(path, entry) {
            warn!("Session log {} not writable: {}", path.display(), e);
        }
    }
}

fn discover_log_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(LOG_FILE_ENV) {
        return Some(PathBuf::from(path));
    }
    if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
        return Some(PathBuf::from(xdg_state).join("socratic").join("session.jsonl"));
    }
    dirs::home_dir().map(|home| {
        home.join(".local")
            .join("state")
            .join("socratic")
            .join("session.jsonl")
    })
}

fn write_line(path: &Path, entry: &SessionLogEntry) -> std::io::Result<()> {
    let json = serde_json::to_string(entry)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", json)?;
    Ok(())
}
