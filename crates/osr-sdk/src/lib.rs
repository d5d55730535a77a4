//! Garnet SDK - optimistic cart state for responsive storefronts
//!
//! The SDK keeps a locally merged view of a cart that includes mutations
//! the server has not confirmed yet, and reconciles it as replies arrive.
//!
//! # Quick Start
//!
//! ```rust
//! use osr_sdk::{Client, ClientConfig, MutationIntent};
//!
//! let client = Client::new_with_memory_transport(ClientConfig::default());
//! let cart = client.open_cart("cart-1");
//!
//! // Observe every change to the merged view
//! cart.subscribe(|change| {
//!     println!("badge: {}", change.view.total_quantity());
//! });
//!
//! // Apply an intent before the server has seen it
//! let ticket = cart.apply_optimistic(MutationIntent::add("tee-m-red", 1)).unwrap();
//! assert_eq!(cart.current_view().total_quantity(), 1);
//!
//! // The transport later resolves it
//! cart.reject(ticket.id(), osr_sdk::RejectReason::Cancelled);
//! assert_eq!(cart.current_view().total_quantity(), 0);
//! ```
//!
//! # Architecture
//!
//! - [`reconciler`] - the state machine merging pending mutations over snapshots
//! - [`hub`] - subscription callbacks and broadcast events
//! - [`validation`] - built-in and pluggable intent validation
//! - [`cart`] - per-aggregate serialization point and transport wiring
//! - [`client`] - multi-cart entry point
//! - [`transport`] - transport abstraction and in-memory backend
//! - [`error`] - error types

pub mod cart;
pub mod client;
pub mod error;
pub mod hub;
pub mod reconciler;
pub mod transport;
pub mod validation;

// Re-exports for convenience
pub use cart::{settle_all, Cart, CartConfig, CartConfigBuilder, MutationTicket, Settlement};
pub use client::{Client, ClientConfig, ClientConfigBuilder};
pub use error::{ReconcileError, RejectReason, Result, SdkError};
pub use hub::{SubscriptionHub, SubscriptionToken, Transition, ViewChange};
pub use reconciler::{ReconcileOutcome, Reconciler};
pub use transport::{CartTransport, MemoryTransport, MemoryTransportConfig, TransportError};
pub use validation::{IntentValidator, MaxLineQuantity, UnknownTargetPolicy};

// Re-export commonly used types from the core crates
pub use osr_core::{
    Aggregate, AggregateId, LineItem, LineItemId, MergedLine, MergedView, Money, MutationId,
    MutationIntent, MutationKind, PendingMutation, ProductVariant, ProductVariants,
    SelectedOption, ServerSnapshot, ServerVersion, ValidationError,
};
pub use osr_store::{PendingMutationStore, ServerSnapshotCache, SnapshotOutcome};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::cart::{Cart, CartConfig, MutationTicket};
    pub use crate::client::{Client, ClientConfig};
    pub use crate::error::{RejectReason, SdkError};
    pub use crate::hub::{Transition, ViewChange};
    pub use crate::transport::{CartTransport, MemoryTransport};
    pub use osr_core::{MergedView, MutationIntent, ServerSnapshot};
}
