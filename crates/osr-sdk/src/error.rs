//! Error types for the Garnet SDK.

use crate::transport::TransportError;
use osr_core::{AggregateId, MutationId, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Why a pending mutation was rolled back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// The server refused the mutation.
    Server(String),
    /// No reply arrived within the configured timeout.
    Timeout,
    /// The transport failed before the server could answer.
    Transport(String),
    /// The caller withdrew the mutation.
    Cancelled,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Server(msg) => write!(f, "rejected by server: {}", msg),
            RejectReason::Timeout => write!(f, "timed out waiting for server"),
            RejectReason::Transport(msg) => write!(f, "transport failure: {}", msg),
            RejectReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Errors surfaced by the reconciler to the caller that issued an intent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    /// The intent never became a pending mutation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A previously optimistic mutation was rolled back.
    #[error("Mutation {mutation_id} rolled back: {reason}")]
    Conflict {
        mutation_id: MutationId,
        reason: RejectReason,
    },
}

/// Error type for SDK operations.
#[derive(Error, Debug)]
pub enum SdkError {
    #[error("Cart not found: {0}")]
    CartNotFound(AggregateId),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// `Cart::submit` needs a Tokio runtime to deliver the mutation.
    #[error("No Tokio runtime available to deliver the mutation")]
    NoRuntime,
}

impl From<ValidationError> for SdkError {
    fn from(err: ValidationError) -> Self {
        SdkError::Reconcile(ReconcileError::Validation(err))
    }
}

/// Result type for SDK operations.
pub type Result<T> = std::result::Result<T, SdkError>;

#[cfg(test)]
mod tests {
    use super::*;
    use osr_core::LineItemId;

    #[test]
    fn test_conflict_message() {
        let id = MutationId::new();
        let err = ReconcileError::Conflict {
            mutation_id: id.clone(),
            reason: RejectReason::Server("out of stock".into()),
        };
        assert_eq!(
            err.to_string(),
            format!("Mutation {} rolled back: rejected by server: out of stock", id)
        );
    }

    #[test]
    fn test_validation_error_lifts_into_sdk_error() {
        let err: SdkError = ValidationError::UnknownTarget(LineItemId::new("x")).into();
        assert!(matches!(
            err,
            SdkError::Reconcile(ReconcileError::Validation(ValidationError::UnknownTarget(_)))
        ));
        assert_eq!(err.to_string(), "Unknown line item: x");
    }
}
