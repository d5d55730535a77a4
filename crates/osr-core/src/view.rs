//! The merged view: server snapshot plus live pending mutations.
//!
//! # Merge algorithm
//!
//! ```text
//! view = snapshot.aggregate
//! for m in pending (submission order):
//!     if m.target was exclusively removed earlier in this pass: skip
//!     Add      -> create line if missing (unpriced, optimistic); qty += delta
//!     Update   -> qty = max(0, qty + delta)
//!     Remove   -> qty = max(0, qty - delta)
//!     Remove*  -> qty = 0; suppress later mutations on m.target   (* exclusive)
//! drop lines whose qty is 0
//! ```
//!
//! Clamping happens at every step, so a removal beyond the available
//! quantity is a no-op against the floor and a later add starts from zero.
//! The result depends only on the snapshot and the ordered pending list.

use crate::aggregate::{ServerSnapshot, ServerVersion};
use crate::ids::{AggregateId, LineItemId};
use crate::money::Money;
use crate::mutation::{MutationKind, PendingMutation};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A line as consumers see it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedLine {
    pub id: LineItemId,
    pub quantity: u64,
    /// Unit price from the server. `None` for lines that only exist
    /// optimistically.
    pub price: Option<Money>,
    /// Whether a pending mutation touched this line.
    pub is_optimistic: bool,
}

impl MergedLine {
    /// Quantity times unit price, if the line is priced.
    pub fn cost(&self) -> Option<Money> {
        self.price.as_ref()?.checked_mul(self.quantity)
    }
}

/// Derived state observed by consumers. Never stored as truth.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedView {
    aggregate_id: AggregateId,
    currency_code: String,
    server_version: ServerVersion,
    pending_count: usize,
    lines: Vec<MergedLine>,
}

impl MergedView {
    /// Apply `pending` on top of `snapshot` in the given order.
    pub fn merge(snapshot: &ServerSnapshot, pending: &[PendingMutation]) -> Self {
        let mut lines: Vec<MergedLine> = snapshot
            .aggregate
            .lines()
            .iter()
            .map(|line| MergedLine {
                id: line.id.clone(),
                quantity: line.quantity,
                price: Some(line.price.clone()),
                is_optimistic: false,
            })
            .collect();
        let mut suppressed: HashSet<&LineItemId> = HashSet::new();

        for mutation in pending {
            if suppressed.contains(&mutation.target) {
                continue;
            }
            if mutation.kind == MutationKind::Remove && mutation.exclusive {
                suppressed.insert(&mutation.target);
            }
            let existing = lines.iter().position(|l| l.id == mutation.target);
            let creates = match mutation.kind {
                MutationKind::Add => true,
                MutationKind::Update => mutation.delta > 0,
                MutationKind::Remove => false,
            };
            let idx = match (existing, creates) {
                (Some(idx), _) => idx,
                (None, true) => {
                    lines.push(MergedLine {
                        id: mutation.target.clone(),
                        quantity: 0,
                        price: None,
                        is_optimistic: true,
                    });
                    lines.len() - 1
                }
                // Shrinking a line that is not there is a no-op.
                (None, false) => continue,
            };

            let line = &mut lines[idx];
            line.is_optimistic = true;
            line.quantity = match mutation.kind {
                MutationKind::Remove if mutation.exclusive => 0,
                MutationKind::Remove => line.quantity.saturating_sub(mutation.delta.unsigned_abs()),
                MutationKind::Add | MutationKind::Update => apply_signed(line.quantity, mutation.delta),
            };
        }

        lines.retain(|l| l.quantity > 0);

        Self {
            aggregate_id: snapshot.aggregate.id.clone(),
            currency_code: snapshot.aggregate.currency_code.clone(),
            server_version: snapshot.server_version,
            pending_count: pending.len(),
            lines,
        }
    }

    pub fn aggregate_id(&self) -> &AggregateId {
        &self.aggregate_id
    }

    pub fn currency_code(&self) -> &str {
        &self.currency_code
    }

    /// Version of the snapshot this view was built on.
    pub fn server_version(&self) -> ServerVersion {
        self.server_version
    }

    /// Number of pending mutations folded into this view.
    pub fn pending_count(&self) -> usize {
        self.pending_count
    }

    /// True when the view equals the confirmed server state.
    pub fn is_settled(&self) -> bool {
        self.pending_count == 0
    }

    /// Visible lines (quantity above zero), snapshot order first, then
    /// optimistic lines in the order they were created.
    pub fn lines(&self) -> &[MergedLine] {
        &self.lines
    }

    pub fn line(&self, id: &LineItemId) -> Option<&MergedLine> {
        self.lines.iter().find(|l| &l.id == id)
    }

    /// Quantity of a line, zero when it is not visible.
    pub fn quantity_of(&self, id: &LineItemId) -> u64 {
        self.line(id).map(|l| l.quantity).unwrap_or(0)
    }

    /// Sum of visible quantities; what a cart badge displays.
    pub fn total_quantity(&self) -> u64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Estimated subtotal in the aggregate currency.
    ///
    /// `None` while any visible line is unpriced or priced in another
    /// currency, since a partial sum would understate the total.
    pub fn subtotal(&self) -> Option<Money> {
        self.lines
            .iter()
            .try_fold(Money::zero(self.currency_code.clone()), |acc, line| {
                acc.checked_add(&line.cost()?)
            })
    }
}

fn apply_signed(quantity: u64, delta: i64) -> u64 {
    if delta >= 0 {
        quantity.saturating_add(delta.unsigned_abs())
    } else {
        quantity.saturating_sub(delta.unsigned_abs())
    }
}
