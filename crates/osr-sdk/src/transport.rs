//! Transport abstractions between carts and the authoritative backend.

use async_trait::async_trait;
use osr_core::{
    Aggregate, AggregateId, LineItem, LineItemId, Money, MutationKind, PendingMutation,
    ServerSnapshot,
};
use parking_lot::RwLock;
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Transport error type.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum TransportError {
    /// The backend answered and refused the mutation.
    #[error("Rejected: {0}")]
    Rejected(String),

    #[error("Cart not found: {0}")]
    CartNotFound(AggregateId),

    /// No answer could be obtained.
    #[error("Unavailable: {0}")]
    Unavailable(String),
}

/// Abstract transport to the backend that owns confirmed cart state.
///
/// Implementations must answer each submitted mutation exactly once, with a
/// snapshot whose version is strictly greater than any version the backend
/// produced before applying it.
#[async_trait]
pub trait CartTransport: Send + Sync + 'static {
    /// Send a mutation and wait for the resulting confirmed state.
    async fn submit(
        &self,
        cart_id: &AggregateId,
        mutation: &PendingMutation,
    ) -> Result<ServerSnapshot, TransportError>;

    /// Fetch the current confirmed state.
    async fn fetch(&self, cart_id: &AggregateId) -> Result<ServerSnapshot, TransportError>;
}

/// Behavior of the in-memory backend.
#[derive(Clone, Debug)]
pub struct MemoryTransportConfig {
    /// Fixed delay before every reply.
    pub latency: Duration,
    /// Extra random delay up to this bound. Non-zero jitter lets replies
    /// overtake each other.
    pub jitter: Duration,
    /// Unit price for merchandise without a catalog price.
    pub default_price_minor: i64,
    pub currency_code: String,
}

impl Default for MemoryTransportConfig {
    fn default() -> Self {
        Self {
            latency: Duration::ZERO,
            jitter: Duration::ZERO,
            default_price_minor: 1000,
            currency_code: "USD".to_string(),
        }
    }
}

/// In-memory authoritative backend for testing and simulation.
///
/// Applies mutations under a lock, bumps the cart version, then sleeps for
/// the configured latency before replying, so reply order can differ from
/// apply order.
pub struct MemoryTransport {
    config: MemoryTransportConfig,
    carts: Arc<RwLock<HashMap<AggregateId, ServerSnapshot>>>,
    prices: Arc<RwLock<HashMap<LineItemId, Money>>>,
    inventory: Arc<RwLock<HashMap<LineItemId, u64>>>,
    offline: AtomicBool,
}

impl MemoryTransport {
    pub fn new(config: MemoryTransportConfig) -> Self {
        Self {
            config,
            carts: Arc::new(RwLock::new(HashMap::new())),
            prices: Arc::new(RwLock::new(HashMap::new())),
            inventory: Arc::new(RwLock::new(HashMap::new())),
            offline: AtomicBool::new(false),
        }
    }

    /// Replace the backend's state for a cart.
    pub fn seed(&self, snapshot: ServerSnapshot) {
        self.carts
            .write()
            .insert(snapshot.aggregate.id.clone(), snapshot);
    }

    pub fn set_price(&self, line: impl Into<LineItemId>, price: Money) {
        self.prices.write().insert(line.into(), price);
    }

    /// Cap the quantity the backend will accept for a line.
    pub fn set_inventory(&self, line: impl Into<LineItemId>, available: u64) {
        self.inventory.write().insert(line.into(), available);
    }

    /// While offline every call fails with [`TransportError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// The backend's current state for a cart.
    pub fn snapshot_of(&self, cart_id: &AggregateId) -> Option<ServerSnapshot> {
        self.carts.read().get(cart_id).cloned()
    }

    fn check_online(&self) -> Result<(), TransportError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(TransportError::Unavailable("backend offline".to_string()))
        } else {
            Ok(())
        }
    }

    fn price_for(&self, line: &LineItemId) -> Money {
        self.prices.read().get(line).cloned().unwrap_or_else(|| {
            Money::from_minor(self.config.default_price_minor, self.config.currency_code.clone())
        })
    }

    fn apply(
        &self,
        cart_id: &AggregateId,
        mutation: &PendingMutation,
    ) -> Result<ServerSnapshot, TransportError> {
        let mut carts = self.carts.write();
        let current = carts.entry(cart_id.clone()).or_insert_with(|| {
            ServerSnapshot::new(
                Aggregate::new(cart_id.clone(), self.config.currency_code.clone()),
                0,
            )
        });

        let mut aggregate = current.aggregate.clone();
        let existing = aggregate.line(&mutation.target).map(|l| l.quantity);
        let quantity = match (mutation.kind, existing) {
            (MutationKind::Remove, None) => {
                return Err(TransportError::Rejected(format!(
                    "line {} is not in the cart",
                    mutation.target
                )))
            }
            (MutationKind::Remove, Some(_)) if mutation.exclusive => 0,
            (MutationKind::Remove, Some(q)) => q.saturating_sub(mutation.delta.unsigned_abs()),
            (MutationKind::Add, q) | (MutationKind::Update, q) => {
                let q = q.unwrap_or(0);
                if mutation.delta >= 0 {
                    q.saturating_add(mutation.delta.unsigned_abs())
                } else {
                    q.saturating_sub(mutation.delta.unsigned_abs())
                }
            }
        };

        if let Some(&available) = self.inventory.read().get(&mutation.target) {
            if quantity > available {
                return Err(TransportError::Rejected(format!(
                    "only {} of {} available",
                    available, mutation.target
                )));
            }
        }

        if quantity == 0 {
            aggregate.remove_line(&mutation.target);
        } else if let Some(line) = aggregate.line_mut(&mutation.target) {
            line.quantity = quantity;
        } else {
            let price = self.price_for(&mutation.target);
            aggregate.upsert_line(LineItem::new(mutation.target.clone(), quantity, price));
        }

        *current = ServerSnapshot::new(aggregate, current.server_version + 1);
        Ok(current.clone())
    }

    async fn delay(&self) {
        let jitter_ms = self.config.jitter.as_millis() as u64;
        let extra = if jitter_ms > 0 {
            Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        } else {
            Duration::ZERO
        };
        let total = self.config.latency + extra;
        if !total.is_zero() {
            tokio::time::sleep(total).await;
        }
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new(MemoryTransportConfig::default())
    }
}

#[async_trait]
impl CartTransport for MemoryTransport {
    async fn submit(
        &self,
        cart_id: &AggregateId,
        mutation: &PendingMutation,
    ) -> Result<ServerSnapshot, TransportError> {
        self.check_online()?;
        let result = self.apply(cart_id, mutation);
        self.delay().await;
        result
    }

    async fn fetch(&self, cart_id: &AggregateId) -> Result<ServerSnapshot, TransportError> {
        self.check_online()?;
        let snapshot = self
            .snapshot_of(cart_id)
            .ok_or_else(|| TransportError::CartNotFound(cart_id.clone()))?;
        self.delay().await;
        Ok(snapshot)
    }
}
