//! The in-memory document catalog (§4.3): `_id -> offset` for one
//! collection, rebuilt from the trailer on open and kept current as
//! documents are inserted, updated (new offset), and deleted (removed).
//!
//! Grounded on the teacher's in-memory `DocumentId -> Location` index
//! (`cache/core.rs`'s lookup table), generalized from a cache of recently
//! touched documents to the complete authoritative location map §4.3 asks
//! for, since every read must resolve through it.

use crate::id::DocId;
use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct Catalog {
    offsets: HashMap<DocId, u64>,
    last_id: i64,
}

impl Catalog {
    #[must_use]
    pub fn new() -> Self {
        Self { offsets: HashMap::new(), last_id: 0 }
    }

    /// Rebuilds a catalog from a trailer-persisted `(id, offset)` list,
    /// preserving the highest auto-assigned integer id seen so `next_id`
    /// never reuses one.
    #[must_use]
    pub fn from_entries(entries: Vec<(crate::value::Value, u64)>, last_id: i64) -> Self {
        let mut offsets = HashMap::with_capacity(entries.len());
        for (id, offset) in entries {
            offsets.insert(DocId(id), offset);
        }
        Self { offsets, last_id }
    }

    #[must_use]
    pub fn entries(&self) -> Vec<(crate::value::Value, u64)> {
        self.offsets.iter().map(|(id, off)| (id.0.clone(), *off)).collect()
    }

    #[must_use]
    pub fn last_id(&self) -> i64 {
        self.last_id
    }

    /// Returns the next auto-assigned integer `_id` and advances the
    /// counter (§3: auto-assignment draws from the collection's `last_id`).
    pub fn next_id(&mut self) -> DocId {
        self.last_id += 1;
        DocId::int(self.last_id)
    }

    pub fn observe_id(&mut self, id: &DocId) {
        if let crate::value::Value::Int(n) = id.0 {
            self.last_id = self.last_id.max(n);
        }
    }

    #[must_use]
    pub fn lookup(&self, id: &DocId) -> Option<u64> {
        self.offsets.get(id).copied()
    }

    #[must_use]
    pub fn contains(&self, id: &DocId) -> bool {
        self.offsets.contains_key(id)
    }

    /// Inserts or retargets an id to a new offset (used both for first
    /// insert and for the new offset an update writes).
    pub fn put(&mut self, id: DocId, offset: u64) {
        self.observe_id(&id);
        self.offsets.insert(id, offset);
    }

    pub fn remove(&mut self, id: &DocId) -> Option<u64> {
        self.offsets.remove(id)
    }

    #[must_use]
    pub fn document_count(&self) -> usize {
        self.offsets.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DocId, &u64)> {
        self.offsets.iter()
    }

    #[must_use]
    pub fn ids(&self) -> Vec<DocId> {
        self.offsets.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn next_id_advances_monotonically() {
        let mut cat = Catalog::new();
        assert_eq!(cat.next_id().value(), &Value::Int(1));
        assert_eq!(cat.next_id().value(), &Value::Int(2));
    }

    #[test]
    fn from_entries_preserves_last_id_floor() {
        let cat = Catalog::from_entries(vec![(Value::Int(7), 256)], 7);
        assert_eq!(cat.last_id(), 7);
        assert_eq!(cat.lookup(&DocId::int(7)), Some(256));
    }

    #[test]
    fn put_and_remove_round_trip() {
        let mut cat = Catalog::new();
        let id = DocId::int(1);
        cat.put(id.clone(), 100);
        assert_eq!(cat.lookup(&id), Some(100));
        cat.put(id.clone(), 200);
        assert_eq!(cat.lookup(&id), Some(200));
        assert_eq!(cat.document_count(), 1);
        cat.remove(&id);
        assert!(!cat.contains(&id));
    }

    #[test]
    fn observe_id_raises_floor_for_caller_supplied_ids() {
        let mut cat = Catalog::new();
        cat.observe_id(&DocId::int(41));
        assert_eq!(cat.next_id().value(), &Value::Int(42));
    }
}
