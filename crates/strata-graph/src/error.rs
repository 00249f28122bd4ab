//! Error types for repository analysis.
//!
//! Only repository-level failures surface as [`Error`]. Everything that can
//! go wrong with a single file is recovered locally by the builder and shows
//! up in [`crate::BuildStats`] instead.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for repository-level operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors raised to the caller. No partial graph is returned.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Repository root does not exist: {0}")]
    RootNotFound(PathBuf),

    #[error("Repository root is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid ignore pattern: {0}")]
    IgnorePattern(#[from] ignore::Error),

    #[error("Failed to start worker pool: {0}")]
    WorkerPool(String),
}

/// Errors from the grammar-based strategy for a single file.
///
/// These never reach the caller of the builder; each one triggers the
/// pattern fallback for the file it occurred in.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("No grammar registered for language: {0}")]
    UnsupportedLanguage(String),

    #[error("Failed to set parser language: {0}")]
    LanguageError(String),

    #[error("Failed to parse source code")]
    ParseFailed,

    #[error("Syntax errors in source")]
    SyntaxError,

    #[error("Failed to compile query: {0}")]
    QueryError(String),
}
