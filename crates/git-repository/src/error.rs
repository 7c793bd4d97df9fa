use std::path::PathBuf;

/// Process exit code for a successful run. Documented here for a future
/// front-end to consume; this crate has no CLI of its own.
pub const EXIT_SUCCESS: i32 = 0;
/// Process exit code for an ordinary, reported failure (bad input, not found, ...).
pub const EXIT_FAILURE: i32 = 1;
/// Process exit code for a fatal, unexpected failure (panics, I/O corruption).
pub const EXIT_FATAL: i32 = 128;

/// Errors from repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("not a git repository (or any of the parent directories): {0}")]
    NotFound(PathBuf),

    #[error("invalid git directory: {path}: {reason}")]
    InvalidGitDir { path: PathBuf, reason: String },

    #[error("repository already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("bare repository has no working tree")]
    BareNoWorkTree,

    #[error("unable to read HEAD: {0}")]
    InvalidHead(String),

    #[error(transparent)]
    Config(#[from] git_config::ConfigError),

    #[error(transparent)]
    Odb(#[from] git_odb::OdbError),

    #[error(transparent)]
    Index(#[from] git_index::IndexError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
