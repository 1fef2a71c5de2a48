//! Error taxonomy for the engine bridge.
//!
//! Every failure that reaches a caller is one of these variants. A session
//! timeout is deliberately absent: it is a soft outcome reported through
//! [`SessionResult::timed_out`](crate::models::SessionResult::timed_out),
//! because partial output is still parsed and returned.

use std::path::PathBuf;

/// Failures surfaced by the bridge core.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The engine binary is missing or the OS refused to spawn it.
    #[error("engine unavailable at {path}: {reason}")]
    EngineUnavailable { path: PathBuf, reason: String },

    /// Rejected before any process was started.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Another operation currently owns the engine.
    #[error("engine is busy with another operation, retry later")]
    SessionBusy,

    /// The upload carried no boundary or no usable file parts.
    #[error("malformed upload: {0}")]
    MalformedUpload(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Shorthand for [`BridgeError::InvalidArgument`].
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Machine-readable code used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EngineUnavailable { .. } => "engine_unavailable",
            Self::InvalidArgument(_) => "bad_request",
            Self::SessionBusy => "session_busy",
            Self::MalformedUpload(_) => "malformed_upload",
            Self::Io(_) => "internal",
        }
    }
}

pub type Result<T, E = BridgeError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(BridgeError::SessionBusy.code(), "session_busy");
        assert_eq!(BridgeError::invalid("x").code(), "bad_request");
        assert_eq!(
            BridgeError::MalformedUpload("no files".into()).code(),
            "malformed_upload"
        );
        let unavailable = BridgeError::EngineUnavailable {
            path: PathBuf::from("/nope/search_engine"),
            reason: "not found".into(),
        };
        assert_eq!(unavailable.code(), "engine_unavailable");
        assert!(unavailable.to_string().contains("/nope/search_engine"));
    }
}
