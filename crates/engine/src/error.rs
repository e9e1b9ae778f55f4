use jobset_core::CoreError;
use jobset_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("no step name for change at {0}")]
    UnnamedChange(String),

    #[error("cannot assign {found} at {path}")]
    UnexpectedValue { path: String, found: &'static str },

    #[error("entity not found: {0}")]
    MissingEntity(String),

    #[error("step not found: {0}")]
    StepNotFound(String),

    #[error("operation {index} of step {step} is not a conflict")]
    NotAConflict { step: String, index: usize },

    #[error("conflict in step {0} has related changes in later steps")]
    ConflictHasRelatedChanges(String),

    #[error("no job set loaded")]
    NoJobSetLoaded,

    #[error("job set is locked")]
    Locked,

    #[error("invalid edit: {0}")]
    InvalidEdit(String),
}
