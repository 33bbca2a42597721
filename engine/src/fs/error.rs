use std::path::PathBuf;

/// POSIX-flavored error codes the filesystem surface returns (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsErrorCode {
    ENOENT,
    EEXIST,
    EISDIR,
    ENOTDIR,
    ENOTEMPTY,
    ENOSYS,
}

#[derive(thiserror::Error, Debug, Clone)]
#[error("{code:?}: {path}")]
pub struct FsError {
    pub code: FsErrorCode,
    pub path: PathBuf,
}

impl FsError {
    pub fn new(code: FsErrorCode, path: impl Into<PathBuf>) -> Self {
        FsError { code, path: path.into() }
    }

    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::new(FsErrorCode::ENOENT, path)
    }

    pub fn already_exists(path: impl Into<PathBuf>) -> Self {
        Self::new(FsErrorCode::EEXIST, path)
    }

    pub fn is_dir(path: impl Into<PathBuf>) -> Self {
        Self::new(FsErrorCode::EISDIR, path)
    }

    pub fn not_dir(path: impl Into<PathBuf>) -> Self {
        Self::new(FsErrorCode::ENOTDIR, path)
    }

    pub fn not_empty(path: impl Into<PathBuf>) -> Self {
        Self::new(FsErrorCode::ENOTEMPTY, path)
    }

    pub fn not_supported(path: impl Into<PathBuf>) -> Self {
        Self::new(FsErrorCode::ENOSYS, path)
    }
}
