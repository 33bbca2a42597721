use std::path::PathBuf;

/// Result alias used throughout the engine crate.
pub type CResult<T> = Result<T, Error>;

/// Root error type for the workspace data engine.
///
/// Validation and lookup failures that are part of normal control flow are
/// represented as result sum types at the call site (`RowResult`, `FsResult`)
/// rather than through this enum; `Error` covers programmer misuse and
/// environment failures that the caller is expected to propagate with `?`.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("value error: {0}")]
    Value(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("identifier {0:?} must not contain ':'")]
    IdCollision(String),

    #[error("unknown table {0:?}")]
    UnknownTable(String),

    #[error("entity already exists: {0:?}")]
    AlreadyExists(String),

    #[error("table {0:?} already has an id field")]
    DuplicateIdField(String),

    #[error("key {0:?} is not declared in this workspace's kv_keys")]
    UnknownKvKey(String),

    #[error(transparent)]
    Fs(#[from] crate::fs::error::FsError),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}
