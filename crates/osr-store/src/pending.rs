//! Store for in-flight local mutations.
//!
//! Mutations are kept in insertion order, which is the order the merge
//! applies them in. The store is a plain value; its owner (the reconciler,
//! behind the cart's lock) serializes access to it.

use osr_core::{LineItemId, MutationId, PendingMutation};
use serde::{Deserialize, Serialize};

/// Pending mutations awaiting confirmation or rejection.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PendingMutationStore {
    entries: Vec<PendingMutation>,
}

impl PendingMutationStore {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a mutation and return its id.
    ///
    /// A mutation whose id is already present replaces nothing and is not
    /// added twice.
    pub fn add(&mut self, mutation: PendingMutation) -> MutationId {
        let id = mutation.id.clone();
        if !self.contains(&id) {
            self.entries.push(mutation);
        }
        id
    }

    /// Remove a mutation, returning it if it was still pending.
    pub fn remove(&mut self, id: &MutationId) -> Option<PendingMutation> {
        let pos = self.entries.iter().position(|m| &m.id == id)?;
        Some(self.entries.remove(pos))
    }

    /// All pending mutations in insertion order.
    pub fn list(&self) -> &[PendingMutation] {
        &self.entries
    }

    pub fn get(&self, id: &MutationId) -> Option<&PendingMutation> {
        self.entries.iter().find(|m| &m.id == id)
    }

    pub fn contains(&self, id: &MutationId) -> bool {
        self.get(id).is_some()
    }

    /// Pending mutations on one line item, in insertion order.
    pub fn targets<'a>(&'a self, line: &'a LineItemId) -> impl Iterator<Item = &'a PendingMutation> + 'a {
        self.entries.iter().filter(move |m| &m.target == line)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
