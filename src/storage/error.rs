//! Errors for the storage layer

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::format::{DecodeError, EncodeError};
use crate::query::QueryError;

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{store} store not yet initialized, call init() first")]
    NotInitialized { store: &'static str },

    #[error("could not determine the user {kind} directory")]
    PathResolution { kind: &'static str },

    #[error("invalid application name {0:?}")]
    InvalidAppName(String),

    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to create {path}: {source}")]
    CreateFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path} does not exist")]
    NotFound { path: PathBuf },

    #[error("timed out after {timeout:?} waiting for lock on {path}")]
    LockTimeout { path: PathBuf, timeout: Duration },

    #[error("failed to lock {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to {op} {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },

    #[error("failed to encode data for {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: EncodeError,
    },

    #[error("invalid query {expr:?} at position {position}: {message}")]
    QuerySyntax {
        expr: String,
        position: usize,
        message: String,
    },
}

impl StoreError {
    /// Wraps an I/O error, turning "not found" into [`StoreError::NotFound`].
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            return StoreError::NotFound { path };
        }
        StoreError::Io { op, path, source }
    }

    pub(crate) fn query(expr: &str, path: impl Into<PathBuf>, source: QueryError) -> Self {
        let path = path.into();
        match source {
            QueryError::Syntax { position, message } => StoreError::QuerySyntax {
                expr: expr.to_string(),
                position,
                message,
            },
            QueryError::Decode(source) => StoreError::Decode { path, source },
            QueryError::Encode(source) => StoreError::Encode { path, source },
        }
    }

    /// Returns true if the error came from waiting on a lock
    pub fn is_lock_timeout(&self) -> bool {
        matches!(self, StoreError::LockTimeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_distinct() {
        let err = StoreError::io(
            "read",
            "/nowhere/config.yaml",
            io::Error::from(io::ErrorKind::NotFound),
        );
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert_eq!(err.to_string(), "/nowhere/config.yaml does not exist");
    }

    #[test]
    fn other_io_errors_keep_context() {
        let err = StoreError::io(
            "write",
            "/etc/app",
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert!(err.to_string().starts_with("failed to write /etc/app"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn syntax_errors_carry_expression() {
        let err = StoreError::query(
            ".a[",
            "config.yaml",
            QueryError::Syntax {
                position: 3,
                message: "expected an index".to_string(),
            },
        );
        assert!(matches!(err, StoreError::QuerySyntax { position: 3, .. }));
        assert!(err.to_string().contains("\".a[\""));
    }
}
