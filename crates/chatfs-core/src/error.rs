/// All errors produced by chatfs-core.
#[derive(Debug, thiserror::Error)]
pub enum ChatFsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid path: {path}")]
    InvalidPath { path: String },

    #[error("not found: {path}")]
    NotFound { path: String },

    #[error("already exists: {path}")]
    AlreadyExists { path: String },

    #[error("source and destination are identical: {path}")]
    IdenticalSourceDestination { path: String },

    #[error("not a directory: {path}")]
    NotADirectory { path: String },

    #[error("not a file: {path}")]
    NotAFile { path: String },

    #[error("no timestamp recorded for: {path}")]
    TimestampUnavailable { path: String },

    #[error("file system is not active")]
    MountInactive,

    #[error("no conversion session for operator: {operator}")]
    NoSession { operator: String },

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ChatFsError>;
