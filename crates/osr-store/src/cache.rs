//! Cache of the latest server-confirmed snapshot.
//!
//! Network replies can arrive out of order, so a snapshot is accepted only
//! when its version is strictly greater than the current one. Older or
//! equal versions are discarded whole. A snapshot of another aggregate is
//! never installed, whatever its version.

use osr_core::{AggregateId, ServerSnapshot, ServerVersion};
use std::sync::Arc;

/// Result of offering a snapshot to the cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// The snapshot is now current.
    Installed { previous: ServerVersion },
    /// The snapshot was not newer than the current one and was dropped.
    Stale {
        offered: ServerVersion,
        current: ServerVersion,
    },
    /// The snapshot belongs to a different aggregate and was dropped.
    Foreign {
        offered: AggregateId,
        current: AggregateId,
    },
}

impl SnapshotOutcome {
    pub fn is_installed(&self) -> bool {
        matches!(self, SnapshotOutcome::Installed { .. })
    }
}

/// Holds exactly one current snapshot.
#[derive(Clone, Debug)]
pub struct ServerSnapshotCache {
    current: Arc<ServerSnapshot>,
}

impl ServerSnapshotCache {
    pub fn new(initial: ServerSnapshot) -> Self {
        Self {
            current: Arc::new(initial),
        }
    }

    /// Install `snapshot` if it is newer than the current one and describes
    /// the same aggregate.
    pub fn set(&mut self, snapshot: ServerSnapshot) -> SnapshotOutcome {
        if snapshot.aggregate.id != self.current.aggregate.id {
            return SnapshotOutcome::Foreign {
                offered: snapshot.aggregate.id,
                current: self.current.aggregate.id.clone(),
            };
        }
        let current = self.current.server_version;
        if snapshot.server_version <= current {
            return SnapshotOutcome::Stale {
                offered: snapshot.server_version,
                current,
            };
        }
        self.current = Arc::new(snapshot);
        SnapshotOutcome::Installed { previous: current }
    }

    pub fn get(&self) -> &Arc<ServerSnapshot> {
        &self.current
    }

    pub fn version(&self) -> ServerVersion {
        self.current.server_version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use osr_core::{Aggregate, LineItem, Money};

    fn snapshot(quantity: u64, version: ServerVersion) -> ServerSnapshot {
        let cart = Aggregate::new("cart-1", "USD")
            .with_line(LineItem::new("a", quantity, Money::from_minor(100, "USD")));
        ServerSnapshot::new(cart, version)
    }

    #[test]
    fn test_newer_snapshot_is_installed() {
        let mut cache = ServerSnapshotCache::new(snapshot(1, 1));
        let outcome = cache.set(snapshot(2, 2));

        assert_eq!(outcome, SnapshotOutcome::Installed { previous: 1 });
        assert_eq!(cache.version(), 2);
        assert_eq!(cache.get().aggregate.total_quantity(), 2);
    }

    #[test]
    fn test_out_of_order_snapshot_is_discarded() {
        let mut cache = ServerSnapshotCache::new(snapshot(1, 1));
        cache.set(snapshot(9, 9));

        let outcome = cache.set(snapshot(7, 7));

        assert_eq!(outcome, SnapshotOutcome::Stale { offered: 7, current: 9 });
        assert_eq!(cache.version(), 9);
        assert_eq!(cache.get().aggregate.total_quantity(), 9);
    }

    #[test]
    fn test_equal_version_is_stale() {
        let mut cache = ServerSnapshotCache::new(snapshot(1, 3));
        assert!(!cache.set(snapshot(5, 3)).is_installed());
        assert_eq!(cache.get().aggregate.total_quantity(), 1);
    }

    #[test]
    fn test_snapshot_of_other_aggregate_is_refused() {
        let mut cache = ServerSnapshotCache::new(snapshot(1, 1));
        let other = ServerSnapshot::new(
            Aggregate::new("cart-2", "EUR")
                .with_line(LineItem::new("b", 9, Money::from_minor(100, "EUR"))),
            50,
        );

        let outcome = cache.set(other);

        assert_eq!(
            outcome,
            SnapshotOutcome::Foreign {
                offered: "cart-2".into(),
                current: "cart-1".into(),
            }
        );
        assert_eq!(cache.version(), 1);
        assert_eq!(cache.get().aggregate_id().as_str(), "cart-1");
    }
}
