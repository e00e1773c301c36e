//! `IndexManager`: the set of secondary indexes declared on one collection.
//!
//! Grounded on the teacher's `cache::CacheConfig` style of a small owning
//! struct over a named map of subsystems, generalized here to own one
//! [`BTree`] per declared index and fan writes out to all of them.

use crate::errors::{DbError, DbResult};
use crate::id::DocId;
use crate::index::btree::BTree;
use crate::store::trailer::IndexMeta;
use crate::value::{Document, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub struct IndexManager {
    dir: PathBuf,
    collection: String,
    trees: HashMap<String, BTree>,
    meta: HashMap<String, IndexMeta>,
}

impl IndexManager {
    #[must_use]
    pub fn new(dir: impl AsRef<Path>, collection: impl Into<String>) -> Self {
        Self { dir: dir.as_ref().to_path_buf(), collection: collection.into(), trees: HashMap::new(), meta: HashMap::new() }
    }

    /// Reopens every index named in `descriptors`, completing/discarding any
    /// interrupted two-phase commit along the way (`BTree::open`).
    pub fn load(dir: impl AsRef<Path>, collection: impl Into<String>, descriptors: &[IndexMeta]) -> DbResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        let collection = collection.into();
        let mut trees = HashMap::new();
        let mut meta = HashMap::new();
        for desc in descriptors {
            let path = index_path(&dir, &collection, &desc.name);
            let tree = BTree::open(&path, desc.unique)?;
            trees.insert(desc.name.clone(), tree);
            meta.insert(desc.name.clone(), desc.clone());
        }
        Ok(Self { dir, collection, trees, meta })
    }

    #[must_use]
    pub fn descriptors(&self) -> Vec<IndexMeta> {
        let mut out: Vec<IndexMeta> = self.meta.values().cloned().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    #[must_use]
    pub fn list_indexes(&self) -> Vec<String> {
        self.descriptors().into_iter().map(|m| m.name).collect()
    }

    #[must_use]
    pub fn has_index(&self, name: &str) -> bool {
        self.trees.contains_key(name)
    }

    /// Builds a new index from a full scan of `docs` and registers it.
    ///
    /// # Errors
    /// Returns `DuplicateKey` if `unique` is set and two documents share a
    /// key value.
    pub fn create_index<'a>(
        &mut self,
        name: &str,
        key_path: &str,
        unique: bool,
        docs: impl Iterator<Item = (DocId, &'a Document)>,
    ) -> DbResult<()> {
        if self.trees.contains_key(name) {
            return Err(DbError::InvalidArgument(format!("index {name} already exists")));
        }
        let path = index_path(&self.dir, &self.collection, name);
        let mut tree = BTree::new_empty(&path, unique);
        tree.rebuild(name, docs, key_path)?;
        tree.commit()?;
        self.meta.insert(name.to_string(), IndexMeta { name: name.to_string(), key_path: key_path.to_string(), unique });
        self.trees.insert(name.to_string(), tree);
        Ok(())
    }

    /// # Errors
    /// Returns `NoSuchIndex` if `name` isn't a declared index.
    pub fn drop_index(&mut self, name: &str) -> DbResult<()> {
        let tree = self.trees.remove(name).ok_or_else(|| DbError::NoSuchIndex(name.to_string()))?;
        self.meta.remove(name);
        let _ = std::fs::remove_file(tree.path());
        Ok(())
    }

    /// Applies a freshly-inserted document to every declared index. Rolls
    /// back any index already updated if a later one rejects the key
    /// (unique-constraint violation), so a failed insert never leaves a
    /// partially indexed document (§4.4 consistency).
    pub fn on_insert(&mut self, id: &DocId, doc: &Document) -> DbResult<()> {
        let mut applied: Vec<&str> = Vec::new();
        for (name, meta) in &self.meta {
            let tree = self.trees.get_mut(name).expect("tree exists for every meta entry");
            let keys: Vec<Value> = crate::value::index_key_values(doc, &meta.key_path);
            let mut ok = true;
            for key in &keys {
                if tree.insert(name, key, id.clone()).is_err() {
                    ok = false;
                    break;
                }
            }
            if !ok {
                for applied_name in &applied {
                    let t = self.trees.get_mut(*applied_name).unwrap();
                    let m = &self.meta[*applied_name];
                    for key in crate::value::index_key_values(doc, &m.key_path) {
                        t.remove(&key, id);
                    }
                }
                let failed_meta = &self.meta[name];
                return Err(DbError::DuplicateKey {
                    index: name.clone(),
                    key: format!("{:?}", crate::value::index_key_values(doc, &failed_meta.key_path)),
                });
            }
            applied.push(name);
        }
        Ok(())
    }

    pub fn on_remove(&mut self, id: &DocId, doc: &Document) {
        for (name, meta) in &self.meta {
            let tree = self.trees.get_mut(name).expect("tree exists for every meta entry");
            for key in crate::value::index_key_values(doc, &meta.key_path) {
                tree.remove(&key, id);
            }
        }
    }

    /// Re-indexes a document in place: removes it under `old`'s keys and
    /// reinserts it under `new`'s.
    pub fn on_update(&mut self, id: &DocId, old: &Document, new: &Document) -> DbResult<()> {
        self.on_remove(id, old);
        self.on_insert(id, new)
    }

    /// Flushes every index tree's current in-memory state to disk.
    pub fn checkpoint(&self) -> DbResult<()> {
        for tree in self.trees.values() {
            tree.commit()?;
        }
        Ok(())
    }

    /// Regenerates every declared index from a full scan of `docs`, then
    /// commits each one — the two-phase update compaction performs once it
    /// has rewritten a collection's catalog against the new store (§4.10
    /// step 4), so a stale or interrupted index file never survives a
    /// compaction pass.
    ///
    /// # Errors
    /// Returns `DuplicateKey` if `docs` (the post-compaction live set)
    /// violates a unique index's constraint.
    pub fn rebuild_all<'a>(&mut self, docs: &'a [(DocId, Document)]) -> DbResult<()> {
        for (name, meta) in &self.meta {
            let tree = self.trees.get_mut(name).expect("tree exists for every meta entry");
            tree.rebuild(name, docs.iter().map(|(id, d)| (id.clone(), d)), &meta.key_path)?;
            tree.commit()?;
        }
        Ok(())
    }

    #[must_use]
    pub fn lookup(&self, name: &str, key: &Value) -> Option<&[DocId]> {
        self.trees.get(name).map(|t| t.lookup(key))
    }

    #[must_use]
    pub fn meta_for(&self, name: &str) -> Option<&IndexMeta> {
        self.meta.get(name)
    }

    pub fn range_scan(&self, name: &str) -> Option<impl Iterator<Item = (&Vec<u8>, &Vec<DocId>)>> {
        self.trees.get(name).map(BTree::range_scan)
    }
}

fn index_path(dir: &Path, collection: &str, index_name: &str) -> PathBuf {
    dir.join(format!("{collection}_{index_name}.idx"))
}
