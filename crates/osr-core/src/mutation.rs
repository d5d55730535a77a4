//! Mutation intents and the pending mutations they become.

use crate::error::ValidationError;
use crate::ids::{LineItemId, MutationId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of change a mutation makes to a line item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutationKind {
    /// Add units, creating the line if needed.
    Add,
    /// Change quantity by a signed delta.
    Update,
    /// Remove units, or the whole line when exclusive.
    Remove,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MutationKind::Add => "add",
            MutationKind::Update => "update",
            MutationKind::Remove => "remove",
        };
        f.write_str(name)
    }
}

/// A change requested by the UI, not yet registered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationIntent {
    pub kind: MutationKind,
    pub target: LineItemId,
    /// Units for `Add`/`Remove` (positive), signed delta for `Update`.
    /// Ignored for exclusive removals.
    pub delta: i64,
    /// An exclusive removal drops the whole line and suppresses later
    /// mutations on the same target until it is resolved.
    pub exclusive: bool,
}

impl MutationIntent {
    pub fn add(target: impl Into<LineItemId>, quantity: u64) -> Self {
        Self {
            kind: MutationKind::Add,
            target: target.into(),
            delta: saturating_delta(quantity),
            exclusive: false,
        }
    }

    pub fn update(target: impl Into<LineItemId>, delta: i64) -> Self {
        Self {
            kind: MutationKind::Update,
            target: target.into(),
            delta,
            exclusive: false,
        }
    }

    pub fn remove(target: impl Into<LineItemId>, quantity: u64) -> Self {
        Self {
            kind: MutationKind::Remove,
            target: target.into(),
            delta: saturating_delta(quantity),
            exclusive: false,
        }
    }

    /// Remove the entire line regardless of its quantity.
    pub fn remove_line(target: impl Into<LineItemId>) -> Self {
        Self {
            kind: MutationKind::Remove,
            target: target.into(),
            delta: 0,
            exclusive: true,
        }
    }

    /// Check the intent on its own, without looking at any state.
    pub fn check_shape(&self) -> Result<(), ValidationError> {
        let valid = match (self.kind, self.exclusive) {
            (MutationKind::Remove, true) => true,
            (MutationKind::Add, _) | (MutationKind::Remove, false) => self.delta > 0,
            (MutationKind::Update, _) => self.delta != 0,
        };
        if valid {
            Ok(())
        } else {
            Err(ValidationError::InvalidDelta {
                kind: self.kind,
                target: self.target.clone(),
                delta: self.delta,
            })
        }
    }
}

fn saturating_delta(quantity: u64) -> i64 {
    i64::try_from(quantity).unwrap_or(i64::MAX)
}

/// An in-flight local mutation awaiting server confirmation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingMutation {
    pub id: MutationId,
    pub kind: MutationKind,
    pub target: LineItemId,
    pub delta: i64,
    pub exclusive: bool,
    pub submitted_at: DateTime<Utc>,
}

impl PendingMutation {
    /// Register an intent under a fresh id, stamped with the current time.
    pub fn from_intent(intent: MutationIntent) -> Self {
        Self::from_intent_at(intent, Utc::now())
    }

    pub fn from_intent_at(intent: MutationIntent, submitted_at: DateTime<Utc>) -> Self {
        Self {
            id: MutationId::new(),
            kind: intent.kind,
            target: intent.target,
            delta: intent.delta,
            exclusive: intent.exclusive,
            submitted_at,
        }
    }

    /// The intent this mutation was registered from.
    pub fn intent(&self) -> MutationIntent {
        MutationIntent {
            kind: self.kind,
            target: self.target.clone(),
            delta: self.delta,
            exclusive: self.exclusive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_checks() {
        assert!(MutationIntent::add("a", 1).check_shape().is_ok());
        assert!(MutationIntent::add("a", 0).check_shape().is_err());
        assert!(MutationIntent::update("a", -2).check_shape().is_ok());
        assert!(MutationIntent::update("a", 0).check_shape().is_err());
        assert!(MutationIntent::remove("a", 0).check_shape().is_err());
        assert!(MutationIntent::remove_line("a").check_shape().is_ok());
    }

    #[test]
    fn test_invalid_delta_error_names_target() {
        let err = MutationIntent::remove("line-7", 0).check_shape().unwrap_err();
        assert_eq!(err.to_string(), "Invalid delta 0 for remove on line-7");
    }

    #[test]
    fn test_from_intent_round_trips_intent() {
        let intent = MutationIntent::update("a", 3);
        let pending = PendingMutation::from_intent(intent.clone());
        assert_eq!(pending.intent(), intent);
    }

    #[test]
    fn test_pending_mutation_serializes() {
        let pending = PendingMutation::from_intent(MutationIntent::remove_line("a"));
        let json = serde_json::to_string(&pending).unwrap();
        let back: PendingMutation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pending);
    }
}
