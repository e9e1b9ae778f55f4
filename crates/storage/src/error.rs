use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("version condition failed for job set {0}")]
    VersionConditionFailed(String),

    #[error("job set {0} is locked")]
    Locked(String),

    #[error("core error: {0}")]
    Core(#[from] jobset_core::CoreError),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
