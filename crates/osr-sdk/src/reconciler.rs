//! The reconciler state machine.
//!
//! Owns the pending store, the snapshot cache and the subscription hub for
//! one aggregate, and keeps the merged view in step with them:
//!
//! ```text
//!               apply_optimistic
//!   intent ──validate──► pending += m ──► view' ──► Optimistic
//!
//!   confirm(m, snap)     pending -= m, cache.set(snap) ──► view' ──► Confirmed
//!   reject(m, reason)    pending -= m                  ──► view' ──► Rejected
//!   observe_snapshot(s)  cache.set(s) (if newer)       ──► view' ──► SnapshotObserved
//! ```
//!
//! Every method takes `&mut self`; callers serialize access (see
//! [`Cart`](crate::cart::Cart)). The merged view is recomputed once per
//! transition and cached, so reads never merge.

use crate::error::RejectReason;
use crate::hub::{SubscriptionHub, SubscriptionToken, Transition, ViewChange};
use crate::validation::{self, IntentValidator, UnknownTargetPolicy};
use osr_core::{
    MergedView, MutationId, MutationIntent, PendingMutation, ServerSnapshot, ValidationError,
};
use osr_store::{PendingMutationStore, ServerSnapshotCache, SnapshotOutcome};
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of a confirm or reject call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The mutation was pending and has been resolved. For confirms,
    /// `snapshot` says whether the accompanying snapshot was installed.
    Resolved { snapshot: Option<SnapshotOutcome> },
    /// The mutation had already been confirmed or rejected.
    AlreadyResolved,
}

impl ReconcileOutcome {
    pub fn is_resolved(&self) -> bool {
        matches!(self, ReconcileOutcome::Resolved { .. })
    }
}

pub struct Reconciler {
    pending: PendingMutationStore,
    snapshots: ServerSnapshotCache,
    hub: SubscriptionHub,
    policy: UnknownTargetPolicy,
    validators: Vec<Arc<dyn IntentValidator>>,
    view: Arc<MergedView>,
}

impl Reconciler {
    /// Create a reconciler on top of the given confirmed state.
    pub fn new(initial: ServerSnapshot) -> Self {
        let view = Arc::new(MergedView::merge(&initial, &[]));
        Self {
            pending: PendingMutationStore::new(),
            snapshots: ServerSnapshotCache::new(initial),
            hub: SubscriptionHub::default(),
            policy: UnknownTargetPolicy::default(),
            validators: Vec::new(),
            view,
        }
    }

    pub fn with_policy(mut self, policy: UnknownTargetPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn IntentValidator>) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.hub = SubscriptionHub::new(capacity);
        self
    }

    /// Validate `intent`, register it, and publish the optimistic view.
    ///
    /// On error nothing changes and nothing is published.
    pub fn apply_optimistic(
        &mut self,
        intent: MutationIntent,
    ) -> Result<PendingMutation, ValidationError> {
        let intent =
            validation::resolve_intent(intent, self.snapshots.get(), &self.pending, self.policy)?;
        for validator in &self.validators {
            validator.validate(&intent, &self.view)?;
        }

        let mutation = PendingMutation::from_intent(intent);
        self.pending.add(mutation.clone());
        self.recompute();

        debug!(
            aggregate = %self.view.aggregate_id(),
            mutation = %mutation.id,
            kind = %mutation.kind,
            target = %mutation.target,
            delta = mutation.delta,
            pending = self.pending.len(),
            "applied optimistic mutation"
        );
        self.publish(Transition::Optimistic {
            mutation_id: mutation.id.clone(),
        });
        Ok(mutation)
    }

    /// Resolve a mutation as accepted and adopt the server's snapshot.
    ///
    /// A stale snapshot (version not above the current one) is dropped but
    /// the mutation is still resolved: a newer snapshot already reflects it.
    /// A snapshot of another aggregate is refused the same way.
    /// Confirming an already resolved mutation still offers the snapshot.
    pub fn confirm(&mut self, id: &MutationId, snapshot: ServerSnapshot) -> ReconcileOutcome {
        let server_version = snapshot.server_version;
        let removed = self.pending.remove(id).is_some();
        let installed = self.offer(snapshot);

        if !removed {
            debug!(mutation = %id, "confirm for resolved mutation");
            if installed.is_installed() {
                self.recompute();
                self.publish(Transition::SnapshotObserved { server_version });
            }
            return ReconcileOutcome::AlreadyResolved;
        }

        self.recompute();
        debug!(
            aggregate = %self.view.aggregate_id(),
            mutation = %id,
            server_version,
            pending = self.pending.len(),
            "confirmed mutation"
        );
        self.publish(Transition::Confirmed {
            mutation_id: id.clone(),
            server_version,
        });
        ReconcileOutcome::Resolved {
            snapshot: Some(installed),
        }
    }

    /// Roll back a mutation. Idempotent: rejecting a resolved mutation is a
    /// no-op that publishes nothing.
    pub fn reject(&mut self, id: &MutationId, reason: RejectReason) -> ReconcileOutcome {
        if self.pending.remove(id).is_none() {
            return ReconcileOutcome::AlreadyResolved;
        }

        self.recompute();
        debug!(
            aggregate = %self.view.aggregate_id(),
            mutation = %id,
            %reason,
            pending = self.pending.len(),
            "rejected mutation"
        );
        self.publish(Transition::Rejected {
            mutation_id: id.clone(),
            reason,
        });
        ReconcileOutcome::Resolved { snapshot: None }
    }

    /// Offer a snapshot that did not come with a confirmation.
    pub fn observe_snapshot(&mut self, snapshot: ServerSnapshot) -> SnapshotOutcome {
        let server_version = snapshot.server_version;
        let outcome = self.offer(snapshot);
        if outcome.is_installed() {
            self.recompute();
            self.publish(Transition::SnapshotObserved { server_version });
        }
        outcome
    }

    /// The merged view. Cheap: the view is computed once per transition.
    pub fn current_view(&self) -> Arc<MergedView> {
        self.view.clone()
    }

    pub fn pending(&self) -> &[PendingMutation] {
        self.pending.list()
    }

    pub fn is_pending(&self, id: &MutationId) -> bool {
        self.pending.contains(id)
    }

    pub fn snapshot(&self) -> Arc<ServerSnapshot> {
        self.snapshots.get().clone()
    }

    pub fn hub(&self) -> &SubscriptionHub {
        &self.hub
    }

    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionToken
    where
        F: Fn(&ViewChange) + Send + Sync + 'static,
    {
        self.hub.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, token: SubscriptionToken) -> bool {
        self.hub.unsubscribe(token)
    }

    fn offer(&mut self, snapshot: ServerSnapshot) -> SnapshotOutcome {
        let outcome = self.snapshots.set(snapshot);
        match &outcome {
            SnapshotOutcome::Stale { offered, current } => debug!(
                aggregate = %self.view.aggregate_id(),
                offered,
                current,
                "discarded stale snapshot"
            ),
            SnapshotOutcome::Foreign { offered, current } => warn!(
                aggregate = %current,
                offered = %offered,
                "discarded snapshot of another aggregate"
            ),
            SnapshotOutcome::Installed { .. } => {}
        }
        outcome
    }

    fn recompute(&mut self) {
        self.view = Arc::new(MergedView::merge(
            self.snapshots.get(),
            self.pending.list(),
        ));
    }

    fn publish(&self, transition: Transition) {
        self.hub.publish(ViewChange {
            transition,
            view: self.view.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::MaxLineQuantity;
    use osr_core::{Aggregate, LineItem, Money};
    use parking_lot::Mutex;

    fn snapshot(quantity: u64, version: u64) -> ServerSnapshot {
        let cart = Aggregate::new("cart-1", "USD")
            .with_line(LineItem::new("a", quantity, Money::from_minor(250, "USD")));
        ServerSnapshot::new(cart, version)
    }

    fn recorder(reconciler: &mut Reconciler) -> Arc<Mutex<Vec<Transition>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        reconciler.subscribe(move |change| sink.lock().push(change.transition.clone()));
        log
    }

    #[test]
    fn test_apply_then_confirm() {
        let mut r = Reconciler::new(snapshot(2, 5));
        let m = r.apply_optimistic(MutationIntent::add("a", 1)).unwrap();
        assert_eq!(r.current_view().quantity_of(&"a".into()), 3);

        let outcome = r.confirm(&m.id, snapshot(3, 6));
        assert_eq!(
            outcome,
            ReconcileOutcome::Resolved {
                snapshot: Some(SnapshotOutcome::Installed { previous: 5 })
            }
        );
        assert_eq!(r.current_view().quantity_of(&"a".into()), 3);
        assert!(r.pending().is_empty());
        assert!(r.current_view().is_settled());
    }

    #[test]
    fn test_validation_failure_publishes_nothing() {
        let mut r = Reconciler::new(snapshot(2, 1));
        let log = recorder(&mut r);

        let err = r.apply_optimistic(MutationIntent::remove("ghost", 1)).unwrap_err();

        assert_eq!(err, ValidationError::UnknownTarget("ghost".into()));
        assert!(r.pending().is_empty());
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_injected_validator_runs() {
        let mut r = Reconciler::new(snapshot(2, 1)).with_validator(Arc::new(MaxLineQuantity(2)));
        assert!(matches!(
            r.apply_optimistic(MutationIntent::add("a", 1)),
            Err(ValidationError::QuantityLimit { .. })
        ));
        assert!(r.apply_optimistic(MutationIntent::update("a", -1)).is_ok());
    }

    #[test]
    fn test_one_event_per_transition() {
        let mut r = Reconciler::new(snapshot(2, 1));
        let log = recorder(&mut r);

        let a = r.apply_optimistic(MutationIntent::add("a", 1)).unwrap();
        let b = r.apply_optimistic(MutationIntent::add("a", 1)).unwrap();
        r.reject(&a.id, RejectReason::Timeout);
        r.reject(&a.id, RejectReason::Timeout);
        r.confirm(&b.id, snapshot(3, 2));

        let log = log.lock();
        assert_eq!(log.len(), 4);
        assert!(matches!(log[0], Transition::Optimistic { .. }));
        assert!(matches!(log[2], Transition::Rejected { reason: RejectReason::Timeout, .. }));
        assert!(matches!(log[3], Transition::Confirmed { server_version: 2, .. }));
    }

    #[test]
    fn test_confirm_with_stale_snapshot_still_resolves() {
        let mut r = Reconciler::new(snapshot(2, 1));
        let a = r.apply_optimistic(MutationIntent::add("a", 1)).unwrap();
        let b = r.apply_optimistic(MutationIntent::add("a", 1)).unwrap();

        // b's reply overtakes a's.
        r.confirm(&b.id, snapshot(4, 3));
        let outcome = r.confirm(&a.id, snapshot(3, 2));

        assert_eq!(
            outcome,
            ReconcileOutcome::Resolved {
                snapshot: Some(SnapshotOutcome::Stale { offered: 2, current: 3 })
            }
        );
        assert_eq!(r.snapshot().server_version, 3);
        assert_eq!(r.current_view().quantity_of(&"a".into()), 4);
    }

    #[test]
    fn test_confirm_with_foreign_snapshot_keeps_own_state() {
        let mut r = Reconciler::new(snapshot(2, 1));
        let log = recorder(&mut r);
        let m = r.apply_optimistic(MutationIntent::add("a", 1)).unwrap();
        let other = Aggregate::new("cart-other", "EUR")
            .with_line(LineItem::new("z", 9, Money::from_minor(100, "EUR")));

        let outcome = r.confirm(&m.id, ServerSnapshot::new(other, 2));

        assert_eq!(
            outcome,
            ReconcileOutcome::Resolved {
                snapshot: Some(SnapshotOutcome::Foreign {
                    offered: "cart-other".into(),
                    current: "cart-1".into(),
                })
            }
        );
        let view = r.current_view();
        assert_eq!(view.aggregate_id().as_str(), "cart-1");
        assert_eq!(view.currency_code(), "USD");
        assert_eq!(view.server_version(), 1);
        assert_eq!(view.total_quantity(), 2);
        assert!(!r.observe_snapshot(ServerSnapshot::initial("cart-other", "EUR")).is_installed());
        assert_eq!(log.lock().len(), 2);
    }

    #[test]
    fn test_late_confirm_of_resolved_mutation_installs_newer_snapshot() {
        let mut r = Reconciler::new(snapshot(2, 1));
        let log = recorder(&mut r);
        let a = r.apply_optimistic(MutationIntent::add("a", 1)).unwrap();
        r.reject(&a.id, RejectReason::Timeout);

        let outcome = r.confirm(&a.id, snapshot(3, 2));

        assert_eq!(outcome, ReconcileOutcome::AlreadyResolved);
        assert_eq!(r.current_view().quantity_of(&"a".into()), 3);
        assert_eq!(
            log.lock().last(),
            Some(&Transition::SnapshotObserved { server_version: 2 })
        );
    }

    #[test]
    fn test_observe_snapshot_keeps_pending_on_top() {
        let mut r = Reconciler::new(snapshot(2, 1));
        r.apply_optimistic(MutationIntent::add("a", 1)).unwrap();

        assert!(r.observe_snapshot(snapshot(10, 7)).is_installed());
        assert_eq!(r.current_view().quantity_of(&"a".into()), 11);
        assert!(!r.observe_snapshot(snapshot(0, 7)).is_installed());
    }
}
