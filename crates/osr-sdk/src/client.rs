//! High-level client for the Garnet SDK.

use crate::cart::{Cart, CartConfig};
use crate::error::{Result, SdkError};
use crate::transport::{CartTransport, MemoryTransport, MemoryTransportConfig};
use osr_core::{AggregateId, ServerSnapshot};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use ulid::Ulid;

/// Configuration for the Garnet client.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Currency for carts created before their first fetch.
    pub currency_code: String,
    /// Configuration applied to every cart the client opens.
    pub cart: CartConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            currency_code: "USD".to_string(),
            cart: CartConfig::default(),
        }
    }
}

/// Builder for client configuration.
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    pub fn currency_code(mut self, code: impl Into<String>) -> Self {
        self.config.currency_code = code.into();
        self
    }

    pub fn cart_config(mut self, cart: CartConfig) -> Self {
        self.config.cart = cart;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The main Garnet client.
///
/// Owns a transport and one [`Cart`] per aggregate id. Carts are fully
/// independent: each has its own reconciler, lock and subscribers.
///
/// # Example
///
/// ```rust
/// use osr_sdk::{Client, ClientConfig, MutationIntent};
///
/// let client = Client::new_with_memory_transport(ClientConfig::default());
/// let cart = client.open_cart("cart-1");
///
/// let ticket = cart.apply_optimistic(MutationIntent::add("tee-m-red", 2)).unwrap();
/// assert_eq!(cart.current_view().total_quantity(), 2);
/// # let _ = ticket;
/// ```
pub struct Client<T: CartTransport> {
    config: ClientConfig,
    transport: Arc<T>,
    carts: Arc<RwLock<HashMap<AggregateId, Arc<Cart<T>>>>>,
}

impl Client<MemoryTransport> {
    /// Create a client backed by an in-memory backend (for testing).
    pub fn new_with_memory_transport(config: ClientConfig) -> Self {
        let transport = Arc::new(MemoryTransport::new(MemoryTransportConfig {
            currency_code: config.currency_code.clone(),
            ..Default::default()
        }));
        Self::new(transport, config)
    }
}

impl<T: CartTransport> Client<T> {
    /// Create a new client with a custom transport.
    pub fn new(transport: Arc<T>, config: ClientConfig) -> Self {
        Self {
            config,
            transport,
            carts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Open a cart, starting from an empty version-zero snapshot if it is
    /// not open yet. Opening an open cart returns the same handle.
    pub fn open_cart(&self, cart_id: impl Into<AggregateId>) -> Arc<Cart<T>> {
        let cart_id = cart_id.into();
        let initial = ServerSnapshot::initial(cart_id.clone(), self.config.currency_code.clone());
        self.open_with(cart_id, initial)
    }

    /// Open a cart under a freshly generated id.
    pub fn create_cart(&self) -> Arc<Cart<T>> {
        self.open_cart(format!("cart-{}", Ulid::new()))
    }

    /// Open a cart and load its confirmed state from the backend.
    pub async fn open_and_fetch(&self, cart_id: impl Into<AggregateId>) -> Result<Arc<Cart<T>>> {
        let cart_id = cart_id.into();
        let snapshot = self.transport.fetch(&cart_id).await?;
        let cart = self.open_with(cart_id, snapshot.clone());
        // A cart that was already open keeps its state; offer the fetch.
        cart.observe_snapshot(snapshot);
        Ok(cart)
    }

    pub fn get_cart(&self, cart_id: &AggregateId) -> Result<Arc<Cart<T>>> {
        self.carts
            .read()
            .get(cart_id)
            .cloned()
            .ok_or_else(|| SdkError::CartNotFound(cart_id.clone()))
    }

    /// Close a cart. Pending mutations stay with any handles still held.
    pub fn close_cart(&self, cart_id: &AggregateId) -> bool {
        self.carts.write().remove(cart_id).is_some()
    }

    pub fn cart_ids(&self) -> Vec<AggregateId> {
        self.carts.read().keys().cloned().collect()
    }

    fn open_with(&self, cart_id: AggregateId, initial: ServerSnapshot) -> Arc<Cart<T>> {
        let mut carts = self.carts.write();
        if let Some(cart) = carts.get(&cart_id) {
            return cart.clone();
        }

        debug!(cart = %cart_id, version = initial.server_version, "opening cart");
        let cart = Arc::new(Cart::new(
            initial,
            self.transport.clone(),
            self.config.cart.clone(),
        ));
        carts.insert(cart_id, cart.clone());
        cart
    }
}
