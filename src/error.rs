//! Content error types.
//!
//! Returned by the parser and the content store. Orchestration code
//! (`build`, `serve`, `main`) wraps these in `anyhow` with context.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContentError {
    /// Front matter missing or unparseable.
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    /// A post that cannot enter the store (e.g. empty slug).
    #[error("invalid post: {0}")]
    InvalidPost(String),

    #[error("post not found: {0}")]
    NotFound(String),

    #[error("IO error when accessing `{0}`")]
    Io(PathBuf, #[source] std::io::Error),
}

pub type ContentResult<T> = Result<T, ContentError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_content_error_display() {
        let err = ContentError::NotFound("hello".into());
        assert_eq!(err.to_string(), "post not found: hello");

        let err = ContentError::Io(
            PathBuf::from("content/a.md"),
            Error::new(ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("content/a.md"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
