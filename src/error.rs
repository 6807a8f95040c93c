use crate::session::SessionState;
use thiserror::Error;

/// A session action that is not legal in the current state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("cannot {action} a session that is {state}")]
    InvalidTransition {
        state: SessionState,
        action: &'static str,
    },
}

/// Failures reported by a text-to-speech sink. Never surfaced past the announcer.
#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("speech engine unavailable: {0}")]
    Unavailable(String),
    #[error("failed to launch speech command: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Failures starting a host positioning service
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("positioning permission denied")]
    PermissionDenied,
    #[error("positioning service unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("activity {0} not found")]
    NotFound(i64),
    #[error("stored activity {id} is corrupt: {reason}")]
    Corrupt { id: i64, reason: String },
}

/// Crate-level error for the persistence and file layers around the core
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("unsupported route file format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, Error>;
