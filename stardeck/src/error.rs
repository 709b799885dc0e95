use crate::remote::RemoteError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Tag '{name}' is still used by {count} record(s)")]
    TagInUse { name: String, count: usize },

    #[error("Record not found: {0}")]
    NotFound(i64),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl Error {
    /// True for errors raised before any optimistic write or remote call.
    pub fn is_local_rejection(&self) -> bool {
        matches!(self, Error::Validation(_) | Error::TagInUse { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
