use thiserror::Error;

/// Failure to obtain a word pool from a [`crate::text_source::WordBackend`].
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read word list: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse word list: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("word list `{0}` contains no words")]
    Empty(String),
    #[error("word source unavailable: {0}")]
    Unavailable(String),
}

/// Failure to hand a finished result to a [`crate::persistence::ResultSink`].
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("results database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to prepare results storage: {0}")]
    Io(#[from] std::io::Error),
    #[error("results database lock poisoned")]
    LockPoisoned,
    #[error("result rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to write config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode config: {0}")]
    Json(#[from] serde_json::Error),
}
