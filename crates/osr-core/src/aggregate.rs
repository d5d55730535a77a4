//! Server-confirmed state: aggregates, line items and versioned snapshots.

use crate::ids::{AggregateId, LineItemId};
use crate::money::Money;
use serde::{Deserialize, Serialize};

/// Monotonic version assigned by the server to each confirmed state.
pub type ServerVersion = u64;

/// A line item as confirmed by the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: LineItemId,
    pub quantity: u64,
    /// Unit price. Set by the server and never changed by the client.
    pub price: Money,
}

impl LineItem {
    pub fn new(id: impl Into<LineItemId>, quantity: u64, price: Money) -> Self {
        Self {
            id: id.into(),
            quantity,
            price,
        }
    }
}

/// The domain object under reconciliation, e.g. a cart.
///
/// Lines keep the order the server returned them in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregate {
    pub id: AggregateId,
    pub currency_code: String,
    lines: Vec<LineItem>,
}

impl Aggregate {
    /// Create an empty aggregate.
    pub fn new(id: impl Into<AggregateId>, currency_code: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            currency_code: currency_code.into(),
            lines: Vec::new(),
        }
    }

    /// Builder-style line insertion. A line with an existing id is replaced.
    pub fn with_line(mut self, line: LineItem) -> Self {
        self.upsert_line(line);
        self
    }

    /// Insert or replace a line, keeping the position of a replaced line.
    pub fn upsert_line(&mut self, line: LineItem) {
        match self.lines.iter_mut().find(|l| l.id == line.id) {
            Some(existing) => *existing = line,
            None => self.lines.push(line),
        }
    }

    /// Remove a line, returning it if present.
    pub fn remove_line(&mut self, id: &LineItemId) -> Option<LineItem> {
        let pos = self.lines.iter().position(|l| &l.id == id)?;
        Some(self.lines.remove(pos))
    }

    pub fn line(&self, id: &LineItemId) -> Option<&LineItem> {
        self.lines.iter().find(|l| &l.id == id)
    }

    pub fn line_mut(&mut self, id: &LineItemId) -> Option<&mut LineItem> {
        self.lines.iter_mut().find(|l| &l.id == id)
    }

    pub fn lines(&self) -> &[LineItem] {
        &self.lines
    }

    /// Sum of line quantities.
    pub fn total_quantity(&self) -> u64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}

/// An immutable, versioned, server-confirmed state.
///
/// Snapshots are replaced wholesale; they are never merged field by field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSnapshot {
    pub aggregate: Aggregate,
    pub server_version: ServerVersion,
}

impl ServerSnapshot {
    pub fn new(aggregate: Aggregate, server_version: ServerVersion) -> Self {
        Self {
            aggregate,
            server_version,
        }
    }

    /// Version zero snapshot of an empty aggregate, used before the first
    /// fetch completes.
    pub fn initial(id: impl Into<AggregateId>, currency_code: impl Into<String>) -> Self {
        Self::new(Aggregate::new(id, currency_code), 0)
    }

    pub fn aggregate_id(&self) -> &AggregateId {
        &self.aggregate.id
    }
}
