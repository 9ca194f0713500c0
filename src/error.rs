use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Typed failures raised by trees, blobs and roots.
///
/// Every operation returns `anyhow::Error`; match on the kind with
/// `err.downcast_ref::<VfsError>()`. Native I/O failures are not wrapped in
/// this enum, they propagate as `io::Error` with the host path attached as
/// context.
#[derive(Debug, Error)]
pub enum VfsError {
    #[error("invalid path component {component:?}: {reason}")]
    InvalidPath {
        component: String,
        reason: &'static str,
    },

    #[error("{0} does not exist")]
    NotFound(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("attempt to modify read-only root {0}")]
    ReadOnly(String),

    #[error("temporary {kind} has already been moved")]
    AlreadyMoved { kind: &'static str },

    #[error("invalid target {path}: {reason}")]
    InvalidTarget { path: String, reason: &'static str },

    /// Moving new data into `dest` failed, and putting the previous content
    /// back failed as well. The previous content is still intact in `holding`.
    #[error(
        "moving data to {} failed and the original data could not be restored \
         (restore error: {restore}); the original data is preserved in {}",
        dest.display(),
        holding.display()
    )]
    Rollback {
        dest: PathBuf,
        holding: PathBuf,
        #[source]
        source: io::Error,
        restore: io::Error,
    },

    #[error("{path} should be a {expected}")]
    TypeMismatch { path: String, expected: &'static str },

    #[error("unknown storage driver {0:?}")]
    UnknownDriver(String),
}

impl VfsError {
    pub(crate) fn not_found(path: impl ToString) -> Self {
        VfsError::NotFound(path.to_string())
    }

    pub(crate) fn read_only(root: impl ToString) -> Self {
        VfsError::ReadOnly(root.to_string())
    }

    pub(crate) fn invalid_target(path: impl ToString, reason: &'static str) -> Self {
        VfsError::InvalidTarget {
            path: path.to_string(),
            reason,
        }
    }
}
