//! Change notification for merged views.
//!
//! Two delivery paths carry the same [`ViewChange`] events:
//!
//! - callbacks registered with [`SubscriptionHub::subscribe`], invoked
//!   synchronously in subscription order on the cart's serialization point;
//! - a `tokio::sync::broadcast` channel from [`SubscriptionHub::events`] for
//!   async consumers.
//!
//! Exactly one event is published per successful state transition. Intents
//! that fail validation publish nothing.
//!
//! Callbacks must not call back into the cart that invoked them; the cart's
//! lock is held while they run. Consumers that need to react by mutating
//! should use the broadcast receiver instead.

use crate::error::RejectReason;
use osr_core::{MergedView, MutationId, ServerVersion};
use std::sync::Arc;
use tokio::sync::broadcast;

/// The transition that produced a new view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    /// A mutation was registered and applied optimistically.
    Optimistic { mutation_id: MutationId },
    /// The server confirmed a mutation.
    Confirmed {
        mutation_id: MutationId,
        server_version: ServerVersion,
    },
    /// A mutation was rolled back. Carries the error payload.
    Rejected {
        mutation_id: MutationId,
        reason: RejectReason,
    },
    /// A newer snapshot arrived outside any confirmation (e.g. a refetch).
    SnapshotObserved { server_version: ServerVersion },
}

/// Event delivered to observers.
#[derive(Clone, Debug)]
pub struct ViewChange {
    pub transition: Transition,
    pub view: Arc<MergedView>,
}

/// Handle returned by [`SubscriptionHub::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

type Callback = Arc<dyn Fn(&ViewChange) + Send + Sync>;

pub struct SubscriptionHub {
    next_token: u64,
    subscribers: Vec<(SubscriptionToken, Callback)>,
    event_tx: broadcast::Sender<ViewChange>,
}

impl SubscriptionHub {
    /// `capacity` bounds the broadcast channel; slow receivers lag rather
    /// than block publishers.
    pub fn new(capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity.max(1));
        Self {
            next_token: 0,
            subscribers: Vec::new(),
            event_tx,
        }
    }

    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionToken
    where
        F: Fn(&ViewChange) + Send + Sync + 'static,
    {
        let token = SubscriptionToken(self.next_token);
        self.next_token += 1;
        self.subscribers.push((token, Arc::new(callback)));
        token
    }

    /// Returns false if the token was unknown or already unsubscribed.
    pub fn unsubscribe(&mut self, token: SubscriptionToken) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(t, _)| *t != token);
        self.subscribers.len() != before
    }

    /// Receiver for async consumers. Only events published after this call
    /// are delivered.
    pub fn events(&self) -> broadcast::Receiver<ViewChange> {
        self.event_tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn publish(&self, change: ViewChange) {
        for (_, callback) in &self.subscribers {
            callback(&change);
        }
        // No receivers is fine.
        let _ = self.event_tx.send(change);
    }
}

impl Default for SubscriptionHub {
    fn default() -> Self {
        Self::new(100)
    }
}
