//! Error types for ingestion and sync
//!
//! Errors are classified by recoverability:
//! - Retryable: network issues, timeouts, server-reported failures
//! - RequiresUserAction: version conflicts (reload first), missing endpoint
//! - NonRetryable: malformed local data

use thiserror::Error;

/// A source could not be parsed into member records. Aborts the whole load.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Source is empty")]
    Empty,

    #[error("Unterminated quoted field starting on line {line}")]
    UnterminatedQuote { line: usize },
}

/// Error types for remote reads and the sync protocol
#[derive(Debug, Error)]
pub enum SyncError {
    // Requires user action
    #[error("Version conflict: {message}")]
    Conflict {
        message: String,
        current_version: Option<String>,
    },

    #[error("Unacknowledged version conflict. Reload before syncing again")]
    ConflictUnacknowledged,

    #[error("No version token from the script API. Refusing to overwrite the remote data")]
    NoVersion,

    #[error("No remote endpoint configured")]
    NotConfigured,

    #[error("Invalid endpoint URL: {0}")]
    InvalidEndpoint(String),

    // Retryable errors
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Server error: {0}")]
    Server(String),

    // Non-retryable errors
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// Returns true if the user may simply try again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::Timeout(_)
                | SyncError::Transport(_)
                | SyncError::Http { .. }
                | SyncError::MalformedResponse(_)
                | SyncError::Server(_)
        )
    }

    /// Returns true if something must change before retrying
    pub fn requires_user_action(&self) -> bool {
        matches!(
            self,
            SyncError::Conflict { .. }
                | SyncError::ConflictUnacknowledged
                | SyncError::NoVersion
                | SyncError::NotConfigured
                | SyncError::InvalidEndpoint(_)
        )
    }

    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            SyncError::Conflict { .. } | SyncError::ConflictUnacknowledged
        )
    }

    /// Get a user-friendly recovery suggestion
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            SyncError::Conflict { .. } | SyncError::ConflictUnacknowledged => {
                "Someone else updated the data. Reload to get the latest version, then reapply your edits."
            }
            SyncError::NoVersion => {
                "The data was not loaded from the script API. Reload from the script API first, then reapply your edits."
            }
            SyncError::NotConfigured => "Set the script URL with `family-tree config set-url <url>`.",
            SyncError::InvalidEndpoint(_) => "Check the configured script URL.",
            SyncError::Timeout(_) => "The request took too long. Try again.",
            SyncError::Transport(_) => "Check your internet connection and try again.",
            SyncError::Http { .. } => {
                "The endpoint rejected the request. Check that the script is deployed and up to date."
            }
            SyncError::MalformedResponse(_) => {
                "The script returned an unexpected response. Redeploy the latest script version."
            }
            SyncError::Server(_) => "The spreadsheet backend reported a failure. Try again.",
            SyncError::Parse(_) => "Check the file format is correct.",
            SyncError::Json(_) => "The data could not be encoded. Check for unusual characters.",
        }
    }
}

/// Serializable error representation for display layers
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncFailure {
    pub message: String,
    pub error_type: ErrorType,
    pub can_retry: bool,
    pub recovery_suggestion: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorType {
    Retryable,
    NonRetryable,
    RequiresUserAction,
}

impl From<&SyncError> for SyncFailure {
    fn from(err: &SyncError) -> Self {
        let error_type = if err.requires_user_action() {
            ErrorType::RequiresUserAction
        } else if err.is_retryable() {
            ErrorType::Retryable
        } else {
            ErrorType::NonRetryable
        };

        SyncFailure {
            message: err.to_string(),
            error_type,
            can_retry: err.is_retryable(),
            recovery_suggestion: err.recovery_suggestion().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(SyncError::Timeout(30).is_retryable());
        assert!(SyncError::Server("boom".into()).is_retryable());
        assert!(!SyncError::Parse(ParseError::Empty).is_retryable());

        let conflict = SyncError::Conflict {
            message: "stale".into(),
            current_version: Some("v2".into()),
        };
        assert!(conflict.is_conflict());
        assert!(conflict.requires_user_action());
        assert!(!conflict.is_retryable());

        let unversioned = SyncFailure::from(&SyncError::NoVersion);
        assert_eq!(unversioned.error_type, ErrorType::RequiresUserAction);
        assert!(!unversioned.can_retry);
        assert!(unversioned.recovery_suggestion.contains("Reload from the script API"));
    }

    #[test]
    fn test_failure_serialization() {
        let failure = SyncFailure::from(&SyncError::Transport("refused".into()));
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["errorType"], "retryable");
        assert_eq!(json["canRetry"], true);
        assert_eq!(json["message"], "Network error: refused");
    }
}
