use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("walkdir error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("required artifact not found: {what} at {}", path.display())]
    MissingArtifact { what: &'static str, path: PathBuf },

    #[error("malformed token array {}: {reason}", path.display())]
    TokenArrayFormat { path: PathBuf, reason: String },

    #[error("not enough tokens to split: {available} available, {required} required")]
    InsufficientTokens { available: u64, required: u64 },
}

pub(crate) fn ensure_file(path: &std::path::Path, what: &'static str) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(Error::MissingArtifact {
            what,
            path: path.to_path_buf(),
        })
    }
}

pub(crate) fn format_error(path: &std::path::Path, reason: impl Into<String>) -> Error {
    Error::TokenArrayFormat {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}
