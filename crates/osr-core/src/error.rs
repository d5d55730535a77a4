//! Error types for intent validation.

use crate::ids::LineItemId;
use crate::mutation::MutationKind;
use thiserror::Error;

/// An intent was refused before it was registered as a pending mutation.
///
/// Validation is synchronous and leaves no trace: no pending mutation is
/// created and no subscriber is notified.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Unknown line item: {0}")]
    UnknownTarget(LineItemId),

    #[error("Invalid delta {delta} for {kind} on {target}")]
    InvalidDelta {
        kind: MutationKind,
        target: LineItemId,
        delta: i64,
    },

    #[error("Quantity limit exceeded on {target}: requested {requested}, limit {limit}")]
    QuantityLimit {
        target: LineItemId,
        requested: u64,
        limit: u64,
    },

    #[error("Intent refused by policy: {0}")]
    Policy(String),
}

pub type Result<T> = std::result::Result<T, ValidationError>;
