//! State holders for the Garnet reconciler.
//!
//! - [`PendingMutationStore`] holds in-flight local mutations in submission order.
//! - [`ServerSnapshotCache`] holds the latest confirmed snapshot behind a
//!   strictly increasing version guard.

pub mod cache;
pub mod pending;

pub use cache::{ServerSnapshotCache, SnapshotOutcome};
pub use pending::PendingMutationStore;
