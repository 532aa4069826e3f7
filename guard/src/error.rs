//! Error types for the confirmation guard

use crate::policy::Severity;
use crate::protocol::{ConfirmationRequired, OutcomeCode};
use serde::Serialize;
use thiserror::Error;

/// Result type for guard operations
pub type Result<T> = std::result::Result<T, GuardError>;

/// Policy context attached to rejections so the caller can decide whether to
/// start over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectionContext {
    pub tool_name: String,
    pub category: String,
    pub severity: Severity,
    pub required_confirmation: String,
}

/// Confirmation guard errors
#[derive(Debug, Error)]
pub enum GuardError {
    /// The operation is guarded and has to be confirmed first
    #[error("Confirmation required for '{}'", .0.tool_name)]
    ConfirmationRequired(Box<ConfirmationRequired>),

    /// The caller explicitly declined
    #[error("Operation cancelled by user")]
    Denied(Box<RejectionContext>),

    /// Confirmed, but the typed phrase did not match
    #[error("Invalid confirmation text: expected '{}'", .0.required_confirmation)]
    InvalidText(Box<RejectionContext>),

    /// The response does not belong to the pending request it was matched with
    #[error("Correlation id mismatch for '{}'", .0.tool_name)]
    CorrelationMismatch(Box<RejectionContext>),

    /// Unknown, already resolved, or timed out correlation id
    #[error("Confirmation request is invalid or expired")]
    Expired,

    /// Too many confirmations are pending
    #[error("Too many pending confirmations (limit {max_pending}), retry later")]
    Capacity { max_pending: usize },

    /// Structurally invalid confirmation response
    #[error("Malformed confirmation response: {0}")]
    MalformedResponse(String),

    /// Registry construction rejected a policy
    #[error("Invalid action policy for '{tool}': {reason}")]
    InvalidPolicy { tool: String, reason: String },

    /// A correlation id was issued twice
    #[error("Duplicate correlation id: {0}")]
    DuplicateCorrelationId(String),

    /// I/O error (audit log files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GuardError {
    /// Protocol outcome code, for errors that belong to the confirmation
    /// protocol itself.
    pub fn code(&self) -> Option<OutcomeCode> {
        match self {
            GuardError::ConfirmationRequired(_) => Some(OutcomeCode::ConfirmationRequired),
            GuardError::Denied(_) => Some(OutcomeCode::ConfirmationDenied),
            GuardError::InvalidText(_) | GuardError::CorrelationMismatch(_) => {
                Some(OutcomeCode::ConfirmationInvalid)
            }
            GuardError::Expired => Some(OutcomeCode::ConfirmationExpired),
            _ => None,
        }
    }

    /// Policy context carried by a rejection, if any.
    pub fn context(&self) -> Option<&RejectionContext> {
        match self {
            GuardError::Denied(ctx)
            | GuardError::InvalidText(ctx)
            | GuardError::CorrelationMismatch(ctx) => Some(ctx),
            _ => None,
        }
    }
}
