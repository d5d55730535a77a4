//! Cart handles: the serialization point for one aggregate.
//!
//! A [`Cart`] wraps one [`Reconciler`] behind a lock. The UI applies intents
//! through it, and transport completions arriving on other tasks resolve
//! mutations through the same lock, so no consumer ever observes a view in
//! the middle of an update.

use crate::error::{ReconcileError, RejectReason, Result as SdkResult, SdkError};
use crate::hub::{SubscriptionToken, ViewChange};
use crate::reconciler::{ReconcileOutcome, Reconciler};
use crate::transport::{CartTransport, TransportError};
use crate::validation::{IntentValidator, MaxLineQuantity, UnknownTargetPolicy};
use osr_core::{
    AggregateId, MergedView, MutationId, MutationIntent, PendingMutation, ServerSnapshot,
    ServerVersion, ValidationError,
};
use osr_store::SnapshotOutcome;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, oneshot};
use tracing::warn;

/// Configuration for a cart.
#[derive(Clone)]
pub struct CartConfig {
    /// How long [`Cart::submit`] waits for the backend before rejecting
    /// with [`RejectReason::Timeout`]. `None` waits forever.
    pub mutation_timeout: Option<Duration>,
    pub unknown_target_policy: UnknownTargetPolicy,
    /// Capacity of the broadcast channel behind [`Cart::events`].
    pub event_capacity: usize,
    pub validators: Vec<Arc<dyn IntentValidator>>,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            mutation_timeout: Some(Duration::from_secs(10)),
            unknown_target_policy: UnknownTargetPolicy::Reject,
            event_capacity: 100,
            validators: Vec::new(),
        }
    }
}

impl fmt::Debug for CartConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CartConfig")
            .field("mutation_timeout", &self.mutation_timeout)
            .field("unknown_target_policy", &self.unknown_target_policy)
            .field("event_capacity", &self.event_capacity)
            .field("validators", &self.validators.len())
            .finish()
    }
}

/// Builder for cart configuration.
pub struct CartConfigBuilder {
    config: CartConfig,
}

impl CartConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: CartConfig::default(),
        }
    }

    pub fn mutation_timeout(mut self, timeout: Duration) -> Self {
        self.config.mutation_timeout = Some(timeout);
        self
    }

    pub fn no_timeout(mut self) -> Self {
        self.config.mutation_timeout = None;
        self
    }

    pub fn unknown_target_policy(mut self, policy: UnknownTargetPolicy) -> Self {
        self.config.unknown_target_policy = policy;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    pub fn validator(mut self, validator: impl IntentValidator + 'static) -> Self {
        self.config.validators.push(Arc::new(validator));
        self
    }

    pub fn max_line_quantity(self, limit: u64) -> Self {
        self.validator(MaxLineQuantity(limit))
    }

    pub fn build(self) -> CartConfig {
        self.config
    }
}

impl Default for CartConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The server's verdict on one mutation.
pub type Settlement = Result<ServerVersion, ReconcileError>;

/// Handle for one registered mutation. Resolves exactly once.
#[derive(Debug)]
pub struct MutationTicket {
    mutation: PendingMutation,
    settled: oneshot::Receiver<Settlement>,
}

impl MutationTicket {
    pub fn mutation(&self) -> &PendingMutation {
        &self.mutation
    }

    pub fn id(&self) -> &MutationId {
        &self.mutation.id
    }

    /// Wait for the server's verdict: the confirmed version, or the
    /// conflict that rolled the mutation back.
    pub async fn settled(self) -> Settlement {
        let id = self.mutation.id;
        self.settled.await.unwrap_or(Err(ReconcileError::Conflict {
            mutation_id: id,
            reason: RejectReason::Cancelled,
        }))
    }
}

/// Wait for a batch of tickets, returning verdicts in ticket order.
pub async fn settle_all(tickets: impl IntoIterator<Item = MutationTicket>) -> Vec<Settlement> {
    futures::future::join_all(tickets.into_iter().map(MutationTicket::settled)).await
}

struct CartState {
    reconciler: Reconciler,
    waiters: HashMap<MutationId, oneshot::Sender<Settlement>>,
}

/// A cart bound to a transport.
pub struct Cart<T: CartTransport> {
    id: AggregateId,
    config: CartConfig,
    state: Arc<Mutex<CartState>>,
    transport: Arc<T>,
}

impl<T: CartTransport> Clone for Cart<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            config: self.config.clone(),
            state: self.state.clone(),
            transport: self.transport.clone(),
        }
    }
}

impl<T: CartTransport> Cart<T> {
    /// Create a cart on top of `initial` confirmed state.
    pub fn new(initial: ServerSnapshot, transport: Arc<T>, config: CartConfig) -> Self {
        let id = initial.aggregate.id.clone();
        let mut reconciler = Reconciler::new(initial)
            .with_policy(config.unknown_target_policy)
            .with_event_capacity(config.event_capacity);
        for validator in &config.validators {
            reconciler = reconciler.with_validator(validator.clone());
        }

        Self {
            id,
            config,
            state: Arc::new(Mutex::new(CartState {
                reconciler,
                waiters: HashMap::new(),
            })),
            transport,
        }
    }

    pub fn id(&self) -> &AggregateId {
        &self.id
    }

    pub fn config(&self) -> &CartConfig {
        &self.config
    }

    pub fn current_view(&self) -> Arc<MergedView> {
        self.state.lock().reconciler.current_view()
    }

    pub fn pending(&self) -> Vec<PendingMutation> {
        self.state.lock().reconciler.pending().to_vec()
    }

    pub fn snapshot(&self) -> Arc<ServerSnapshot> {
        self.state.lock().reconciler.snapshot()
    }

    /// Read the reconciler under the cart lock, so snapshot, pending list
    /// and view are observed at the same instant.
    pub fn inspect<R>(&self, f: impl FnOnce(&Reconciler) -> R) -> R {
        f(&self.state.lock().reconciler)
    }

    /// Register a callback. See [`crate::hub`] for delivery rules.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionToken
    where
        F: Fn(&ViewChange) + Send + Sync + 'static,
    {
        self.state.lock().reconciler.subscribe(callback)
    }

    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        self.state.lock().reconciler.unsubscribe(token)
    }

    /// Subscribe to view changes as an async stream of events.
    pub fn events(&self) -> broadcast::Receiver<ViewChange> {
        self.state.lock().reconciler.hub().events()
    }

    /// Apply an intent optimistically without sending it anywhere.
    ///
    /// The caller owns delivery and must later call [`confirm`](Self::confirm)
    /// or [`reject`](Self::reject) for the returned mutation.
    pub fn apply_optimistic(&self, intent: MutationIntent) -> Result<MutationTicket, ValidationError> {
        let mut state = self.state.lock();
        let mutation = state.reconciler.apply_optimistic(intent)?;
        let (tx, rx) = oneshot::channel();
        state.waiters.insert(mutation.id.clone(), tx);
        Ok(MutationTicket {
            mutation,
            settled: rx,
        })
    }

    pub fn confirm(&self, id: &MutationId, snapshot: ServerSnapshot) -> ReconcileOutcome {
        let server_version = snapshot.server_version;
        let mut state = self.state.lock();
        let outcome = state.reconciler.confirm(id, snapshot);
        if let Some(tx) = state.waiters.remove(id) {
            let _ = tx.send(Ok(server_version));
        }
        outcome
    }

    /// Roll back a mutation. Safe to call for a mutation that already
    /// resolved, which is how callers enforce their own timeouts.
    pub fn reject(&self, id: &MutationId, reason: RejectReason) -> ReconcileOutcome {
        let mut state = self.state.lock();
        let outcome = state.reconciler.reject(id, reason.clone());
        if let Some(tx) = state.waiters.remove(id) {
            let _ = tx.send(Err(ReconcileError::Conflict {
                mutation_id: id.clone(),
                reason,
            }));
        }
        outcome
    }

    /// Offer a snapshot obtained outside any confirmation.
    pub fn observe_snapshot(&self, snapshot: ServerSnapshot) -> SnapshotOutcome {
        self.state.lock().reconciler.observe_snapshot(snapshot)
    }

    /// Apply an intent optimistically and send it to the backend.
    ///
    /// Returns once the mutation is registered; delivery continues on a
    /// spawned task that confirms or rejects it. Without a Tokio runtime
    /// nothing is registered and [`SdkError::NoRuntime`] is returned.
    ///
    /// A timed-out mutation is rejected at once, but the task keeps waiting
    /// for the backend: a late snapshot is still offered to the cart.
    pub fn submit(&self, intent: MutationIntent) -> SdkResult<MutationTicket> {
        let runtime = Handle::try_current().map_err(|_| SdkError::NoRuntime)?;
        let ticket = self.apply_optimistic(intent)?;
        let mutation = ticket.mutation().clone();
        let cart = self.clone();

        runtime.spawn(async move {
            let mut reply = cart.transport.submit(&cart.id, &mutation);
            let result = match cart.config.mutation_timeout {
                Some(limit) => match tokio::time::timeout(limit, &mut reply).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(cart = %cart.id, mutation = %mutation.id, "mutation timed out");
                        cart.reject(&mutation.id, RejectReason::Timeout);
                        reply.await
                    }
                },
                None => reply.await,
            };
            match result {
                Ok(snapshot) => {
                    cart.confirm(&mutation.id, snapshot);
                }
                Err(TransportError::Rejected(msg)) => {
                    cart.reject(&mutation.id, RejectReason::Server(msg));
                }
                Err(err) => {
                    warn!(cart = %cart.id, mutation = %mutation.id, error = %err, "transport failed");
                    cart.reject(&mutation.id, RejectReason::Transport(err.to_string()));
                }
            }
        });

        Ok(ticket)
    }

    /// Fetch the backend's state and offer it to the reconciler.
    pub async fn refresh(&self) -> Result<SnapshotOutcome, TransportError> {
        let snapshot = self.transport.fetch(&self.id).await?;
        Ok(self.observe_snapshot(snapshot))
    }
}
