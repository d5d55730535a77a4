//! Core data model for the Garnet optimistic state reconciler.
//!
//! - [`aggregate`] - server-confirmed aggregates and versioned snapshots
//! - [`mutation`] - intents and the pending mutations they become
//! - [`view`] - the deterministic merge of pending mutations over a snapshot
//! - [`variant`] - optimistic product variant selection
//! - [`money`], [`ids`], [`error`] - supporting types

pub mod aggregate;
pub mod error;
pub mod ids;
pub mod money;
pub mod mutation;
pub mod variant;
pub mod view;

pub use aggregate::{Aggregate, LineItem, ServerSnapshot, ServerVersion};
pub use error::ValidationError;
pub use ids::{AggregateId, LineItemId, MutationId};
pub use money::Money;
pub use mutation::{MutationIntent, MutationKind, PendingMutation};
pub use variant::{ProductVariant, ProductVariants, SelectedOption};
pub use view::{MergedLine, MergedView};
