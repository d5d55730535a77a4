//! Intent validation run before a mutation is registered.
//!
//! Built-in checks run first (delta shape, target existence), then any
//! injected [`IntentValidator`]s in the order they were configured. The
//! first failure wins and nothing is registered.

use osr_core::{MergedView, MutationIntent, MutationKind, ServerSnapshot, ValidationError};
use osr_store::PendingMutationStore;

/// What to do with an intent whose target line is unknown.
///
/// A target is known when it is in the current snapshot or touched by a
/// pending mutation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnknownTargetPolicy {
    /// Refuse the intent with [`ValidationError::UnknownTarget`].
    #[default]
    Reject,
    /// Turn a positive `Update` into an `Add` that creates the line.
    /// Removals of unknown lines are still refused.
    CreateLine,
}

/// A pluggable predicate consulted before an intent is registered.
pub trait IntentValidator: Send + Sync {
    fn validate(&self, intent: &MutationIntent, view: &MergedView) -> Result<(), ValidationError>;
}

impl<F> IntentValidator for F
where
    F: Fn(&MutationIntent, &MergedView) -> Result<(), ValidationError> + Send + Sync,
{
    fn validate(&self, intent: &MutationIntent, view: &MergedView) -> Result<(), ValidationError> {
        self(intent, view)
    }
}

/// Caps the optimistic quantity of any single line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MaxLineQuantity(pub u64);

impl IntentValidator for MaxLineQuantity {
    fn validate(&self, intent: &MutationIntent, view: &MergedView) -> Result<(), ValidationError> {
        let grows = match intent.kind {
            MutationKind::Add | MutationKind::Update => intent.delta > 0,
            MutationKind::Remove => false,
        };
        if !grows {
            return Ok(());
        }
        let requested = view
            .quantity_of(&intent.target)
            .saturating_add(intent.delta.unsigned_abs());
        if requested > self.0 {
            return Err(ValidationError::QuantityLimit {
                target: intent.target.clone(),
                requested,
                limit: self.0,
            });
        }
        Ok(())
    }
}

/// Apply the built-in checks, possibly rewriting the intent under `policy`.
pub(crate) fn resolve_intent(
    intent: MutationIntent,
    snapshot: &ServerSnapshot,
    pending: &PendingMutationStore,
    policy: UnknownTargetPolicy,
) -> Result<MutationIntent, ValidationError> {
    intent.check_shape()?;

    if intent.kind == MutationKind::Add {
        return Ok(intent);
    }

    let known = snapshot.aggregate.line(&intent.target).is_some()
        || pending.targets(&intent.target).next().is_some();
    if known {
        return Ok(intent);
    }

    match (policy, intent.kind) {
        (UnknownTargetPolicy::CreateLine, MutationKind::Update) if intent.delta > 0 => {
            Ok(MutationIntent::add(intent.target, intent.delta.unsigned_abs()))
        }
        _ => Err(ValidationError::UnknownTarget(intent.target)),
    }
}
