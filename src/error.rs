use std::path::PathBuf;

use thiserror::Error;

/// Failures of the verify → backup → patch → verify pipeline.
///
/// Every variant is fatal; `main` maps each one to its own exit code.
#[derive(Debug, Error)]
pub enum PatchError {
    /// The target is not the version the patch was built for.
    #[error("version mismatch for '{}': expected {expected}, found {actual} ({hint})", .path.display())]
    VersionMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
        hint: String,
    },

    #[error("backup failed for '{}': {reason}", .path.display())]
    BackupError { path: PathBuf, reason: String },

    /// The rebuilt bytes do not match the expected post-patch identity.
    #[error("patched data failed verification: expected {expected}, got {actual}")]
    PatchVerificationError { expected: String, actual: String },

    #[error("invalid patch file: {0}")]
    InvalidPatch(String),

    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PatchError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PatchError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            PatchError::Io { .. } => 2,
            PatchError::VersionMismatch { .. } => 3,
            PatchError::BackupError { .. } => 4,
            PatchError::PatchVerificationError { .. } => 5,
            PatchError::InvalidPatch(_) => 6,
        }
    }
}
