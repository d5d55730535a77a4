//! Identifiers for aggregates, line items and pending mutations.

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Identity of an aggregate under reconciliation (e.g. a cart id).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AggregateId(String);

impl AggregateId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AggregateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AggregateId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for AggregateId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identity of a line item inside an aggregate.
///
/// Server-assigned for confirmed lines; for lines that only exist
/// optimistically the client picks the id (typically the merchandise id).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LineItemId(String);

impl LineItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LineItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for LineItemId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for LineItemId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Client-generated, unique identifier of a pending mutation.
///
/// ULIDs sort by creation time, which keeps log output readable, but the
/// merge order is always the store's insertion order, never the id order.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MutationId(String);

impl MutationId {
    pub fn new() -> Self {
        Self(Ulid::new().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MutationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutation_ids_are_unique() {
        let a = MutationId::new();
        let b = MutationId::new();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 26);
    }

    #[test]
    fn test_display_matches_inner() {
        let line = LineItemId::from("gid://shop/CartLine/1");
        assert_eq!(line.to_string(), "gid://shop/CartLine/1");
        assert_eq!(AggregateId::new("cart-1").as_str(), "cart-1");
    }
}
