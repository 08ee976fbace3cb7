//! Error taxonomy for the task core.
//!
//! Nothing here is fatal: the worst outcome of any error is loss of
//! persistence, never loss of in-memory state.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("nothing to redo")]
    NothingToRedo,

    #[error("incorrect password, access denied")]
    AccessDenied,
}

impl TaskError {
    pub fn task_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "task",
            id: id.into(),
        }
    }

    pub fn subtask_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "subtask",
            id: id.into(),
        }
    }

    /// True for errors that leave state untouched and only warrant a notice.
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::NothingToUndo | Self::NothingToRedo
        )
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage quota exceeded writing {key}: {needed} bytes over a {limit} byte limit")]
    QuotaExceeded {
        key: String,
        needed: usize,
        limit: usize,
    },

    #[error("corrupt data under {key}: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TaskError>;
