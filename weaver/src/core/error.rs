//! Error taxonomy for a single session iteration.
//!
//! Every variant here is recoverable: the session controller converts it into
//! a counted failure and keeps looping. Startup failure is not an error type;
//! it surfaces as [`TerminationReason::StartupFailed`](crate::core::types::TerminationReason).

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Why the allocator refused to hand out an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocateError {
    #[error("label {label:?} does not normalize into a safe identifier ({reason})")]
    InvalidLabel { label: String, reason: String },

    #[error("path {} is {len} bytes, limit is {max}", path.display())]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },
}

/// Failure reported by a drive adapter while materializing an artifact.
#[derive(Debug, Error)]
pub enum DriveFailure {
    #[error("{action} timed out after {timeout:?}")]
    Timeout { action: String, timeout: Duration },

    #[error("unexpected editor state: {0}")]
    UnexpectedState(String),

    #[error("{action}: {source}")]
    Io {
        action: String,
        #[source]
        source: std::io::Error,
    },
}

impl DriveFailure {
    pub fn io(action: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            action: action.into(),
            source,
        }
    }
}

/// Anything that can make one iteration fail.
#[derive(Debug, Error)]
pub enum IterationError {
    #[error(transparent)]
    Allocate(#[from] AllocateError),

    #[error("render artifact body: {0}")]
    Render(String),

    #[error(transparent)]
    Drive(#[from] DriveFailure),
}

impl IterationError {
    /// Short stable tag used in progress output and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Allocate(AllocateError::InvalidLabel { .. }) => "invalid_label",
            Self::Allocate(AllocateError::PathTooLong { .. }) => "path_too_long",
            Self::Render(_) => "render",
            Self::Drive(_) => "drive",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        let invalid = IterationError::from(AllocateError::InvalidLabel {
            label: "()".to_string(),
            reason: "empty base".to_string(),
        });
        assert_eq!(invalid.kind(), "invalid_label");

        let drive = IterationError::from(DriveFailure::UnexpectedState("gone".to_string()));
        assert_eq!(drive.kind(), "drive");
        assert_eq!(drive.to_string(), "unexpected editor state: gone");
    }

    #[test]
    fn path_too_long_message_names_limit() {
        let err = AllocateError::PathTooLong {
            path: PathBuf::from("out/a.py"),
            len: 8,
            max: 4,
        };
        assert!(err.to_string().contains("limit is 4"));
    }
}
