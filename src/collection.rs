//! `Collection`: one named document collection — its catalog, declared
//! indexes, and the write path that keeps the primary store, WAL, catalog,
//! and indexes consistent (§4.3, §4.6).
//!
//! Grounded on the teacher's deleted `collection/ops.rs` write-then-index
//! ordering (insert into storage, then update indexes, then log), adapted
//! to this crate's store/WAL/index types and generalized to the full
//! operator-driven update path §4.6 describes instead of the teacher's
//! single-document replace.

use crate::catalog::Catalog;
use crate::errors::{DbError, DbResult};
use crate::id::DocId;
use crate::index::IndexManager;
use crate::record::Record;
use crate::schema::Schema;
use crate::store::PrimaryStore;
use crate::value::{Document, Value};
use crate::wal::{Wal, WalOp};

/// A single named collection: its on-disk record store, in-memory catalog,
/// and secondary indexes, all kept in lockstep on every write.
pub struct Collection {
    pub name: String,
    pub(crate) catalog: Catalog,
    pub(crate) indexes: IndexManager,
    pub(crate) schema: Option<Schema>,
}

impl Collection {
    #[must_use]
    pub fn new(name: impl Into<String>, catalog: Catalog, indexes: IndexManager) -> Self {
        Self { name: name.into(), catalog, indexes, schema: None }
    }

    pub fn set_schema(&mut self, schema: Option<Schema>) {
        self.schema = schema;
    }

    #[must_use]
    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    #[must_use]
    pub fn document_count(&self) -> usize {
        self.catalog.document_count()
    }

    #[must_use]
    pub fn list_indexes(&self) -> Vec<String> {
        self.indexes.list_indexes()
    }

    /// Resolves `_id` to its stored document by consulting the catalog then
    /// reading the primary store at that offset.
    pub fn get(&self, store: &mut PrimaryStore, id: &DocId) -> DbResult<Option<Document>> {
        let Some(offset) = self.catalog.lookup(id) else { return Ok(None) };
        match store.read_record_at(offset)? {
            Record::Live(doc) => Ok(Some(doc)),
            Record::Tombstone(_) => Ok(None),
        }
    }

    /// Inserts a new document, auto-assigning `_id` if the caller didn't
    /// supply one. Writes the WAL frame, appends the record, and updates
    /// the catalog and every index — in that order, so a crash between any
    /// two steps still leaves a state recovery can reconcile (WAL replay
    /// reapplies anything the store/catalog missed; the catalog/indexes are
    /// themselves rebuilt from the trailer + a rebuild pass if they were
    /// never flushed).
    ///
    /// # Errors
    /// Returns `DuplicateKey` if a unique index rejects one of the new
    /// document's indexed field values, or if `_id` already exists.
    pub fn insert(&mut self, store: &mut PrimaryStore, wal: &mut Wal, tx_id: u64, mut doc: Document) -> DbResult<DocId> {
        let id = match doc.get("_id") {
            Some(v) => DocId(v.clone()),
            None => {
                let assigned = self.catalog.next_id();
                doc.insert("_id", assigned.value().clone());
                assigned
            }
        };
        if self.catalog.contains(&id) {
            return Err(DbError::DuplicateKey { index: "_id".to_string(), key: id.to_string() });
        }
        if let Some(schema) = &self.schema {
            schema.validate(&doc)?;
        }

        wal.append(tx_id, &WalOp::Insert { collection: self.name.clone(), id: id.clone(), doc: doc.clone() })?;
        let offset = store.append_record(&Record::Live(doc.clone()))?;
        self.indexes.on_insert(&id, &doc)?;
        self.catalog.put(id.clone(), offset);
        Ok(id)
    }

    /// Replaces the document at `id` with `new_doc` (its `_id` is forced to
    /// match `id` regardless of what `new_doc` carries). Returns `false` if
    /// no document exists at `id`.
    pub fn replace(&mut self, store: &mut PrimaryStore, wal: &mut Wal, tx_id: u64, id: &DocId, mut new_doc: Document) -> DbResult<bool> {
        let Some(old_offset) = self.catalog.lookup(id) else { return Ok(false) };
        let old = match store.read_record_at(old_offset)? {
            Record::Live(doc) => doc,
            Record::Tombstone(_) => return Ok(false),
        };
        new_doc.insert("_id", id.value().clone());
        if let Some(schema) = &self.schema {
            schema.validate(&new_doc)?;
        }

        wal.append(tx_id, &WalOp::Update { collection: self.name.clone(), id: id.clone(), doc: new_doc.clone() })?;
        let new_offset = store.append_record(&Record::Live(new_doc.clone()))?;
        self.indexes.on_update(id, &old, &new_doc)?;
        self.catalog.put(id.clone(), new_offset);
        Ok(true)
    }

    /// Deletes the document at `id`, writing a tombstone record. Returns
    /// `false` if no live document exists at `id`.
    pub fn delete(&mut self, store: &mut PrimaryStore, wal: &mut Wal, tx_id: u64, id: &DocId) -> DbResult<bool> {
        let Some(offset) = self.catalog.lookup(id) else { return Ok(false) };
        let old = match store.read_record_at(offset)? {
            Record::Live(doc) => doc,
            Record::Tombstone(_) => return Ok(false),
        };

        wal.append(tx_id, &WalOp::Delete { collection: self.name.clone(), id: id.clone() })?;
        let _ = store.append_record(&Record::Tombstone(id.value().clone()));
        self.indexes.on_remove(id, &old);
        self.catalog.remove(id);
        Ok(true)
    }

    pub fn create_index(&mut self, store: &mut PrimaryStore, name: &str, key_path: &str, unique: bool) -> DbResult<()> {
        let mut docs: Vec<(DocId, Document)> = Vec::with_capacity(self.catalog.document_count());
        for (id, &offset) in self.catalog.iter() {
            if let Record::Live(doc) = store.read_record_at(offset)? {
                docs.push((id.clone(), doc));
            }
        }
        self.indexes.create_index(name, key_path, unique, docs.iter().map(|(id, d)| (id.clone(), d)))
    }

    pub fn drop_index(&mut self, name: &str) -> DbResult<()> {
        self.indexes.drop_index(name)
    }

    /// Resolves indexed key lookups without touching the primary store,
    /// returning the matching document ids (used by the query planner's
    /// index-scan path).
    #[must_use]
    pub fn index_lookup(&self, index_name: &str, key: &Value) -> Option<Vec<DocId>> {
        self.indexes.lookup(index_name, key).map(<[DocId]>::to_vec)
    }

    pub fn iter_ids(&self) -> impl Iterator<Item = DocId> + '_ {
        self.catalog.iter().map(|(id, _)| id.clone())
    }

    pub fn checkpoint_indexes(&self) -> DbResult<()> {
        self.indexes.checkpoint()
    }
}
