//! `Engine`: the database handle (§6 external interfaces) — owns the
//! primary store, WAL, every collection's catalog and indexes, the
//! durability controller, the query cache, and the transaction
//! coordinator, and is the one place that wires them together on open,
//! on every write, and on checkpoint/compact/close.
//!
//! Grounded on the teacher's `database/engine.rs` (the struct that owns
//! the collection map and fans operations out to storage), generalized
//! from the teacher's in-memory-collections-plus-periodic-WASP-snapshot
//! model to this crate's WAL-replay-on-open model (§4.2, §4.8).

use crate::cache::{CacheMetrics, QueryCache};
use crate::catalog::Catalog;
use crate::collection::Collection;
use crate::compact::{self, CompactionStats};
use crate::durability::{DurabilityController, DurabilityMode};
use crate::errors::{DbError, DbResult};
use crate::fsutil;
use crate::id::DocId;
use crate::index::IndexManager;
use crate::logger::Logger;
use crate::query::exec;
use crate::query::types::{DeleteReport, ExplainReport, Filter, FindOptions, UpdateReport};
use crate::record::Record;
use crate::schema::Schema;
use crate::store::{CollectionDescriptor, PrimaryStore};
use crate::transaction::{PendingOp, TransactionCoordinator};
use crate::update::UpdateOp;
use crate::value::{Document, Value};
use crate::wal::{Wal, WalFrame, WalOp};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

const DEFAULT_CACHE_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct EngineStats {
    pub collection_count: usize,
    pub total_documents: u64,
    pub durability_mode: DurabilityMode,
    pub cache: CacheMetrics,
}

/// A single open database handle over the file at `path` (plus its `.wal`
/// and `_<col>_<idx>.idx` companions, §6).
pub struct Engine {
    path: PathBuf,
    store: PrimaryStore,
    wal: Wal,
    collections: HashMap<String, Collection>,
    durability: DurabilityController,
    cache: QueryCache,
    tx: TransactionCoordinator,
    logger: Option<Logger>,
    /// Tags each WAL `BeginTxn..CommitTxn` span. Distinct from
    /// `TransactionCoordinator`'s handles, which only name a buffering
    /// area in memory and never appear in the WAL themselves — only the
    /// resolved operations a commit hands off do (§4.8).
    next_tx_id: u64,
}

impl Engine {
    /// Opens (creating if absent) the database at `path`, replaying any WAL
    /// frames from an unclean shutdown before returning (§4.2, §8 "every
    /// operation that returned success before a crash is reflected after
    /// reopen").
    ///
    /// # Errors
    /// Returns `AlreadyOpen` if another handle holds the file, or a
    /// corruption error if the header/trailer/WAL can't be parsed.
    pub fn open(path: impl AsRef<Path>, mode: DurabilityMode) -> DbResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut store = PrimaryStore::open(&path)?;
        let mut wal = Wal::open(fsutil::wal_path(&path))?;
        let idx_dir = fsutil::index_dir(&path);

        let descriptors = store.read_trailer()?;
        let mut collections: HashMap<String, Collection> = HashMap::with_capacity(descriptors.len());
        for d in &descriptors {
            let catalog = Catalog::from_entries(d.document_catalog.clone(), d.last_id);
            let indexes = IndexManager::load(&idx_dir, d.name.clone(), &d.indexes)?;
            collections.insert(d.name.clone(), Collection::new(d.name.clone(), catalog, indexes));
        }

        let frames = wal.replay()?;
        let replayed_any = !frames.is_empty();
        replay_frames(&mut collections, &mut store, &idx_dir, frames);

        let mut engine = Self {
            path,
            store,
            wal,
            collections,
            durability: DurabilityController::new(mode),
            cache: QueryCache::new(DEFAULT_CACHE_CAPACITY),
            tx: TransactionCoordinator::new(),
            logger: None,
            next_tx_id: 1,
        };

        if replayed_any {
            engine.checkpoint()?;
        }
        Ok(engine)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes a fresh trailer (every collection's catalog + index
    /// descriptors) and truncates the WAL, per §4.9 "explicit checkpoint
    /// forces full flush + WAL truncate in all modes".
    pub fn checkpoint(&mut self) -> DbResult<()> {
        let mut descriptors = Vec::with_capacity(self.collections.len());
        for col in self.collections.values() {
            col.checkpoint_indexes()?;
            descriptors.push(CollectionDescriptor {
                name: col.name.clone(),
                last_id: col.catalog.last_id(),
                document_count: crate::utils::num::usize_to_u64(col.document_count()),
                document_catalog: col.catalog.entries(),
                indexes: col.indexes.descriptors(),
            });
        }
        self.store.write_trailer(&descriptors)?;
        self.store.sync()?;
        self.wal.truncate()?;
        self.durability.note_checkpoint();
        Ok(())
    }

    /// Checkpoints, then rewrites the primary file keeping only documents
    /// each collection's catalog still points at (§4.10). Requires no
    /// in-flight transactions — callers must commit or roll back first.
    pub fn compact(&mut self) -> DbResult<CompactionStats> {
        self.checkpoint()?;
        let snapshot: Vec<(String, Catalog)> = self.collections.iter().map(|(name, col)| (name.clone(), col.catalog.clone())).collect();
        let (rebuilt, stats) = compact::compact_all(&mut self.store, &snapshot)?;

        // The old handle's fd now refers to an unlinked inode (rename
        // replaced the directory entry) — reopen fresh to see the
        // compacted file, then re-point every catalog at its new offsets.
        self.store = PrimaryStore::open(&self.path)?;
        for (name, catalog) in rebuilt {
            if let Some(col) = self.collections.get_mut(&name) {
                col.catalog = catalog;
            }
        }

        // Regenerate every index by scanning the new catalog (§4.10 step 4):
        // the old trees were built against offsets the rename just retired.
        for col in self.collections.values_mut() {
            let mut docs: Vec<(DocId, Document)> = Vec::with_capacity(col.document_count());
            for id in col.iter_ids() {
                if let Some(doc) = col.get(&mut self.store, &id)? {
                    docs.push((id, doc));
                }
            }
            col.indexes.rebuild_all(&docs)?;
        }

        self.cache.invalidate_all();
        self.checkpoint()?;
        Ok(stats)
    }

    /// Flushes and releases the handle. Consuming `self` makes a dangling
    /// reference to a closed engine impossible to construct.
    pub fn close(mut self) -> DbResult<()> {
        self.checkpoint()
    }

    pub fn set_durability_mode(&mut self, mode: DurabilityMode) {
        self.durability.set_mode(mode);
    }

    #[must_use]
    pub fn stats(&self) -> EngineStats {
        let total_documents = self.collections.values().map(|c| crate::utils::num::usize_to_u64(c.document_count())).sum();
        EngineStats { collection_count: self.collections.len(), total_documents, durability_mode: self.durability.mode(), cache: self.cache.metrics() }
    }

    /// Initializes process-wide file logging next to the database (§6 "log
    /// level is a process-wide setting").
    ///
    /// # Errors
    /// Returns an error if the log directory or appender can't be created.
    pub fn init_logging(&mut self, level: log::LevelFilter) -> DbResult<()> {
        let base = self.path.parent().unwrap_or_else(|| Path::new("."));
        let name = self.path.file_stem().and_then(|s| s.to_str()).unwrap_or("ironbase");
        let logger = Logger::init_for_db(base, name, level).map_err(|e| DbError::InvalidArgument(e.to_string()))?;
        self.logger = Some(logger);
        Ok(())
    }

    pub fn set_log_level(&self, level: log::LevelFilter) {
        if let Some(logger) = &self.logger {
            logger.set_log_level(level);
        }
    }

    // --- Collections --------------------------------------------------

    #[must_use]
    pub fn list_collections(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.keys().cloned().collect();
        names.sort();
        names
    }

    /// # Errors
    /// Returns `CollectionAlreadyExists` if `name` is already declared.
    pub fn create_collection(&mut self, name: &str) -> DbResult<()> {
        if self.collections.contains_key(name) {
            return Err(DbError::CollectionAlreadyExists(name.to_string()));
        }
        let indexes = IndexManager::new(fsutil::index_dir(&self.path), name);
        self.collections.insert(name.to_string(), Collection::new(name, Catalog::new(), indexes));
        Ok(())
    }

    /// Drops a collection and its index files. Its documents' bytes remain
    /// in the primary file as garbage until the next `compact()`.
    ///
    /// # Errors
    /// Returns `NoSuchCollection` if `name` isn't declared.
    pub fn drop_collection(&mut self, name: &str) -> DbResult<()> {
        let mut col = self.collections.remove(name).ok_or_else(|| DbError::NoSuchCollection(name.to_string()))?;
        for index_name in col.list_indexes() {
            let _ = col.drop_index(&index_name);
        }
        self.cache.invalidate_collection(name);
        Ok(())
    }

    pub fn set_schema(&mut self, collection: &str, schema: Option<Schema>) -> DbResult<()> {
        self.collection_mut(collection)?.set_schema(schema);
        Ok(())
    }

    fn collection(&self, name: &str) -> DbResult<&Collection> {
        self.collections.get(name).ok_or_else(|| DbError::NoSuchCollection(name.to_string()))
    }

    fn collection_mut(&mut self, name: &str) -> DbResult<&mut Collection> {
        self.collections.get_mut(name).ok_or_else(|| DbError::NoSuchCollection(name.to_string()))
    }

    fn alloc_wal_tx_id(&mut self) -> u64 {
        let id = self.next_tx_id;
        self.next_tx_id += 1;
        id
    }

    fn after_write(&mut self, collection: &str) -> DbResult<()> {
        self.cache.invalidate_collection(collection);
        if self.durability.record_write() {
            self.wal.sync()?;
        }
        Ok(())
    }

    // --- Writes (auto-commit) ------------------------------------------

    /// # Errors
    /// Returns `NoSuchCollection`, `DuplicateKey`, or `SchemaViolation`.
    pub fn insert_one(&mut self, collection: &str, doc: Document) -> DbResult<DocId> {
        let tx_id = self.alloc_wal_tx_id();
        self.wal.append(tx_id, &WalOp::BeginTxn)?;
        let col = self.collections.get_mut(collection).ok_or_else(|| DbError::NoSuchCollection(collection.to_string()))?;
        let id = col.insert(&mut self.store, &mut self.wal, tx_id, doc)?;
        self.wal.append(tx_id, &WalOp::CommitTxn)?;
        self.after_write(collection)?;
        Ok(id)
    }

    /// Inserts every document in `docs` under its own auto-commit
    /// transaction and returns the ids that succeeded. A later document's
    /// failure (e.g. a duplicate key) does not roll back earlier
    /// successes in the same call, mirroring ordinary (non-bulk-ordered)
    /// multi-document insert semantics rather than all-or-nothing.
    pub fn insert_many(&mut self, collection: &str, docs: Vec<Document>) -> (Vec<DocId>, Vec<DbError>) {
        let mut ids = Vec::with_capacity(docs.len());
        let mut errors = Vec::new();
        for doc in docs {
            match self.insert_one(collection, doc) {
                Ok(id) => ids.push(id),
                Err(e) => errors.push(e),
            }
        }
        (ids, errors)
    }

    /// # Errors
    /// Returns `NoSuchCollection`.
    pub fn find(&mut self, collection: &str, filter: &Filter, options: &FindOptions) -> DbResult<Vec<Document>> {
        let key = QueryCache::fingerprint(collection, &format!("{filter:?}{options:?}"));
        if let Some(cached) = self.cache.get(collection, key) {
            return Ok(cached);
        }
        let col = self.collections.get(collection).ok_or_else(|| DbError::NoSuchCollection(collection.to_string()))?;
        let docs = exec::find_docs(&mut self.store, col, filter, options)?;
        self.cache.put(collection, key, docs.clone());
        Ok(docs)
    }

    /// # Errors
    /// Returns `NoSuchCollection`.
    pub fn find_one(&mut self, collection: &str, filter: &Filter) -> DbResult<Option<Document>> {
        let options = FindOptions { limit: Some(1), ..Default::default() };
        Ok(self.find(collection, filter, &options)?.into_iter().next())
    }

    /// # Errors
    /// Returns `NoSuchCollection`.
    pub fn find_with_hint(&mut self, collection: &str, filter: &Filter, index_name: &str) -> DbResult<Vec<Document>> {
        let options = FindOptions { hint: Some(index_name.to_string()), ..Default::default() };
        self.find(collection, filter, &options)
    }

    /// # Errors
    /// Returns `NoSuchCollection`.
    pub fn count_documents(&mut self, collection: &str, filter: &Filter) -> DbResult<usize> {
        let col = self.collections.get(collection).ok_or_else(|| DbError::NoSuchCollection(collection.to_string()))?;
        exec::count_documents(&mut self.store, col, filter)
    }

    /// # Errors
    /// Returns `NoSuchCollection`.
    pub fn distinct(&mut self, collection: &str, path: &str, filter: &Filter) -> DbResult<Vec<Value>> {
        let col = self.collections.get(collection).ok_or_else(|| DbError::NoSuchCollection(collection.to_string()))?;
        exec::distinct(&mut self.store, col, path, filter)
    }

    /// # Errors
    /// Returns `NoSuchCollection`.
    pub fn explain(&mut self, collection: &str, filter: &Filter, hint: Option<&str>) -> DbResult<ExplainReport> {
        let col = self.collections.get(collection).ok_or_else(|| DbError::NoSuchCollection(collection.to_string()))?;
        exec::explain(&mut self.store, col, filter, hint)
    }

    /// # Errors
    /// Returns `NoSuchCollection`.
    pub fn aggregate(&mut self, collection: &str, pipeline: &[crate::aggregate::Stage]) -> DbResult<Vec<Document>> {
        let col = self.collections.get(collection).ok_or_else(|| DbError::NoSuchCollection(collection.to_string()))?;
        let ids: Vec<DocId> = col.iter_ids().collect();
        let mut docs = Vec::with_capacity(ids.len());
        for id in &ids {
            if let Some(doc) = col.get(&mut self.store, id)? {
                docs.push(doc);
            }
        }
        Ok(crate::aggregate::run_pipeline(docs, pipeline))
    }

    /// # Errors
    /// Returns `NoSuchCollection`.
    pub fn update_one(&mut self, collection: &str, filter: &Filter, ops: &[UpdateOp]) -> DbResult<UpdateReport> {
        self.update_matching(collection, filter, ops, Some(1))
    }

    /// # Errors
    /// Returns `NoSuchCollection`.
    pub fn update_many(&mut self, collection: &str, filter: &Filter, ops: &[UpdateOp]) -> DbResult<UpdateReport> {
        self.update_matching(collection, filter, ops, None)
    }

    fn update_matching(&mut self, collection: &str, filter: &Filter, ops: &[UpdateOp], limit: Option<usize>) -> DbResult<UpdateReport> {
        let tx_id = self.alloc_wal_tx_id();
        self.wal.append(tx_id, &WalOp::BeginTxn)?;
        let col = self.collections.get_mut(collection).ok_or_else(|| DbError::NoSuchCollection(collection.to_string()))?;
        let report = exec::update_matching(&mut self.store, col, &mut self.wal, tx_id, filter, ops, limit)?;
        self.wal.append(tx_id, &WalOp::CommitTxn)?;
        self.after_write(collection)?;
        Ok(report)
    }

    /// # Errors
    /// Returns `NoSuchCollection`.
    pub fn delete_one(&mut self, collection: &str, filter: &Filter) -> DbResult<DeleteReport> {
        self.delete_matching(collection, filter, Some(1))
    }

    /// # Errors
    /// Returns `NoSuchCollection`.
    pub fn delete_many(&mut self, collection: &str, filter: &Filter) -> DbResult<DeleteReport> {
        self.delete_matching(collection, filter, None)
    }

    fn delete_matching(&mut self, collection: &str, filter: &Filter, limit: Option<usize>) -> DbResult<DeleteReport> {
        let tx_id = self.alloc_wal_tx_id();
        self.wal.append(tx_id, &WalOp::BeginTxn)?;
        let col = self.collections.get_mut(collection).ok_or_else(|| DbError::NoSuchCollection(collection.to_string()))?;
        let report = exec::delete_matching(&mut self.store, col, &mut self.wal, tx_id, filter, limit)?;
        self.wal.append(tx_id, &WalOp::CommitTxn)?;
        self.after_write(collection)?;
        Ok(report)
    }

    // --- Indexes --------------------------------------------------------

    /// # Errors
    /// Returns `NoSuchCollection` or `InvalidArgument` if the name is taken.
    pub fn create_index(&mut self, collection: &str, key_path: &str, unique: bool) -> DbResult<String> {
        let name = format!("{collection}_{}_idx", key_path.replace(['.', ','], "_"));
        let col = self.collections.get_mut(collection).ok_or_else(|| DbError::NoSuchCollection(collection.to_string()))?;
        col.create_index(&mut self.store, &name, key_path, unique)?;
        Ok(name)
    }

    /// Builds one composite-key index over several fields (§6
    /// `create_compound_index`); the fields' values combine into a single
    /// array key per document (`value::index_key_values`).
    ///
    /// # Errors
    /// Returns `NoSuchCollection` or `InvalidArgument` if the name is taken.
    pub fn create_compound_index(&mut self, collection: &str, paths: &[String], unique: bool) -> DbResult<String> {
        let key_path = paths.join(",");
        self.create_index(collection, &key_path, unique)
    }

    /// # Errors
    /// Returns `NoSuchCollection` or `NoSuchIndex`.
    pub fn drop_index(&mut self, collection: &str, name: &str) -> DbResult<()> {
        self.collection_mut(collection)?.drop_index(name)
    }

    /// # Errors
    /// Returns `NoSuchCollection`.
    pub fn list_indexes(&self, collection: &str) -> DbResult<Vec<String>> {
        Ok(self.collection(collection)?.list_indexes())
    }

    // --- Transactions ----------------------------------------------------

    #[must_use]
    pub fn begin_transaction(&mut self) -> u64 {
        self.tx.begin()
    }

    /// # Errors
    /// Returns `TransactionNotFound`/`TransactionClosed`.
    pub fn insert_one_tx(&mut self, tx_id: u64, collection: impl Into<String>, doc: Document) -> DbResult<()> {
        self.tx.insert_one_tx(tx_id, collection, doc)
    }

    /// # Errors
    /// Returns `TransactionNotFound`/`TransactionClosed`.
    pub fn update_one_tx(&mut self, tx_id: u64, collection: impl Into<String>, id: DocId, doc: Document) -> DbResult<()> {
        self.tx.update_one_tx(tx_id, collection, id, doc)
    }

    /// # Errors
    /// Returns `TransactionNotFound`/`TransactionClosed`.
    pub fn delete_one_tx(&mut self, tx_id: u64, collection: impl Into<String>, id: DocId) -> DbResult<()> {
        self.tx.delete_one_tx(tx_id, collection, id)
    }

    /// Logs `BeginTxn`, every resolved operation, then `CommitTxn` to the
    /// WAL — in that order, before applying any effect in memory — so a
    /// crash right after this call returns leaves a WAL replay able to
    /// reconstruct the whole transaction even if none of its effects made
    /// it into the catalog yet (§4.8).
    ///
    /// # Errors
    /// Returns `TransactionNotFound`/`TransactionClosed` if `tx_id` is
    /// invalid, or the first per-operation error (`NoSuchCollection`,
    /// `DuplicateKey`, `SchemaViolation`) — which, per §4.8, is surfaced
    /// even though the commit itself is already durable at that point.
    pub fn commit_transaction(&mut self, tx_id: u64) -> DbResult<()> {
        let ops = self.tx.take_for_commit(tx_id)?;
        let mut resolved = Vec::with_capacity(ops.len());
        for op in ops {
            resolved.push(resolve_tx_op(&mut self.collections, op)?);
        }

        let wal_tx = self.alloc_wal_tx_id();
        self.wal.append(wal_tx, &WalOp::BeginTxn)?;
        for op in &resolved {
            self.wal.append(wal_tx, op)?;
        }
        self.wal.append(wal_tx, &WalOp::CommitTxn)?;
        if self.durability.record_write() {
            self.wal.sync()?;
        }

        let mut touched: HashSet<String> = HashSet::new();
        for op in resolved {
            match op {
                WalOp::Insert { collection, id, doc } => {
                    let col = self.collections.get_mut(&collection).expect("resolved against a live collection");
                    reapply_insert(col, &mut self.store, id, doc)?;
                    touched.insert(collection);
                }
                WalOp::Update { collection, id, doc } => {
                    let col = self.collections.get_mut(&collection).expect("resolved against a live collection");
                    reapply_update(col, &mut self.store, id, doc)?;
                    touched.insert(collection);
                }
                WalOp::Delete { collection, id } => {
                    let col = self.collections.get_mut(&collection).expect("resolved against a live collection");
                    reapply_delete(col, &mut self.store, id)?;
                    touched.insert(collection);
                }
                WalOp::BeginTxn | WalOp::CommitTxn | WalOp::Checkpoint => unreachable!("resolve_tx_op only emits Insert/Update/Delete"),
            }
        }
        for name in touched {
            self.cache.invalidate_collection(&name);
        }
        Ok(())
    }

    /// # Errors
    /// Returns `TransactionNotFound`/`TransactionClosed`.
    pub fn rollback_transaction(&mut self, tx_id: u64) -> DbResult<()> {
        self.tx.rollback(tx_id)
    }
}

/// Turns a buffered op into the concrete WAL frame it will log, resolving
/// `_id` auto-assignment and validating uniqueness/schema up front so the
/// WAL frame already carries the exact effect that gets applied afterward.
fn resolve_tx_op(collections: &mut HashMap<String, Collection>, op: PendingOp) -> DbResult<WalOp> {
    match op {
        PendingOp::Insert { collection, mut doc } => {
            let col = collections.get_mut(&collection).ok_or_else(|| DbError::NoSuchCollection(collection.clone()))?;
            let id = match doc.get("_id") {
                Some(v) => DocId(v.clone()),
                None => {
                    let assigned = col.catalog.next_id();
                    doc.insert("_id", assigned.value().clone());
                    assigned
                }
            };
            if col.catalog.contains(&id) {
                return Err(DbError::DuplicateKey { index: "_id".to_string(), key: id.to_string() });
            }
            if let Some(schema) = col.schema() {
                schema.validate(&doc)?;
            }
            Ok(WalOp::Insert { collection, id, doc })
        }
        PendingOp::Replace { collection, id, mut doc } => {
            let col = collections.get_mut(&collection).ok_or_else(|| DbError::NoSuchCollection(collection.clone()))?;
            doc.insert("_id", id.value().clone());
            if let Some(schema) = col.schema() {
                schema.validate(&doc)?;
            }
            Ok(WalOp::Update { collection, id, doc })
        }
        PendingOp::Delete { collection, id } => {
            if !collections.contains_key(&collection) {
                return Err(DbError::NoSuchCollection(collection));
            }
            Ok(WalOp::Delete { collection, id })
        }
    }
}

/// Applies a WAL-logged insert directly to the store/catalog/indexes,
/// bypassing `Collection::insert` (which would also append a — redundant
/// — WAL frame). Shared by both `commit_transaction` and WAL replay.
fn reapply_insert(col: &mut Collection, store: &mut PrimaryStore, id: DocId, doc: Document) -> DbResult<()> {
    let offset = store.append_record(&Record::Live(doc.clone()))?;
    col.indexes.on_insert(&id, &doc)?;
    col.catalog.put(id, offset);
    Ok(())
}

fn reapply_update(col: &mut Collection, store: &mut PrimaryStore, id: DocId, doc: Document) -> DbResult<()> {
    if let Some(old_offset) = col.catalog.lookup(&id) {
        if let Ok(Record::Live(old)) = store.read_record_at(old_offset) {
            col.indexes.on_remove(&id, &old);
        }
    }
    let offset = store.append_record(&Record::Live(doc.clone()))?;
    col.indexes.on_insert(&id, &doc)?;
    col.catalog.put(id, offset);
    Ok(())
}

fn reapply_delete(col: &mut Collection, store: &mut PrimaryStore, id: DocId) -> DbResult<()> {
    if let Some(offset) = col.catalog.lookup(&id) {
        if let Ok(Record::Live(old)) = store.read_record_at(offset) {
            col.indexes.on_remove(&id, &old);
        }
    }
    let _ = store.append_record(&Record::Tombstone(id.value().clone()));
    col.catalog.remove(&id);
    Ok(())
}

/// Replays every frame belonging to a transaction that reached
/// `CommitTxn`, in WAL order, lazily materializing a collection the first
/// time a frame names one not already known from the trailer (§4.2: a
/// collection created and written to but never checkpointed is recovered
/// purely from its WAL frames). Tolerant of per-op failures (e.g. a
/// unique-index collision): unlike a live commit, a replay error here
/// would otherwise turn one corrupt tail frame into an unopenable
/// database, which is worse than skipping that one effect and logging it.
fn replay_frames(collections: &mut HashMap<String, Collection>, store: &mut PrimaryStore, idx_dir: &Path, frames: Vec<WalFrame>) {
    let committed: HashSet<u64> = frames.iter().filter(|f| matches!(f.op, WalOp::CommitTxn)).map(|f| f.tx_id).collect();

    for frame in frames {
        if !committed.contains(&frame.tx_id) {
            continue;
        }
        let result = match frame.op {
            WalOp::Insert { collection, id, doc } => {
                let col = collections.entry(collection.clone()).or_insert_with(|| Collection::new(collection.clone(), Catalog::new(), IndexManager::new(idx_dir, collection)));
                reapply_insert(col, store, id, doc)
            }
            WalOp::Update { collection, id, doc } => {
                let col = collections.entry(collection.clone()).or_insert_with(|| Collection::new(collection.clone(), Catalog::new(), IndexManager::new(idx_dir, collection)));
                reapply_update(col, store, id, doc)
            }
            WalOp::Delete { collection, id } => match collections.get_mut(&collection) {
                Some(col) => reapply_delete(col, store, id),
                None => Ok(()),
            },
            WalOp::BeginTxn | WalOp::CommitTxn | WalOp::Checkpoint => Ok(()),
        };
        if let Err(e) = result {
            log::warn!("WAL replay: dropping one effect at seq {}: {e}", frame.seq);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use crate::query::types::SortSpec;
    use crate::query::Order;
    use tempfile::tempdir;

    fn open(dir: &Path) -> Engine {
        let mut engine = Engine::open(dir.join("db.ironbase"), DurabilityMode::Safe).unwrap();
        engine.create_collection("users").unwrap();
        engine
    }

    #[test]
    fn insert_and_find_round_trip() {
        let dir = tempdir().unwrap();
        let mut engine = open(dir.path());
        let id = engine.insert_one("users", doc! { "name".to_string() => Value::Str("ana".into()) }).unwrap();
        let found = engine.find_one("users", &Filter::Eq("_id".into(), id.value().clone())).unwrap().unwrap();
        assert_eq!(found.get("name"), Some(&Value::Str("ana".into())));
    }

    #[test]
    fn update_then_delete_reflected_in_count() {
        let dir = tempdir().unwrap();
        let mut engine = open(dir.path());
        engine.insert_one("users", doc! { "age".to_string() => Value::Int(20) }).unwrap();
        engine.insert_one("users", doc! { "age".to_string() => Value::Int(30) }).unwrap();

        let report = engine.update_many("users", &Filter::Gte("age".into(), Value::Int(25)), &[UpdateOp::Set("tier".into(), Value::Str("gold".into()))]).unwrap();
        assert_eq!(report.modified_count, 1);

        let deleted = engine.delete_many("users", &Filter::MatchAll).unwrap();
        assert_eq!(deleted.deleted_count, 2);
        assert_eq!(engine.count_documents("users", &Filter::MatchAll).unwrap(), 0);
    }

    #[test]
    fn checkpoint_then_reopen_preserves_documents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.ironbase");
        {
            let mut engine = Engine::open(&path, DurabilityMode::Safe).unwrap();
            engine.create_collection("users").unwrap();
            engine.insert_one("users", doc! { "name".to_string() => Value::Str("bo".into()) }).unwrap();
            engine.checkpoint().unwrap();
        }
        let mut reopened = Engine::open(&path, DurabilityMode::Safe).unwrap();
        assert_eq!(reopened.count_documents("users", &Filter::MatchAll).unwrap(), 1);
    }

    #[test]
    fn uncommitted_wal_frames_are_replayed_on_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.ironbase");
        {
            let mut engine = Engine::open(&path, DurabilityMode::Safe).unwrap();
            engine.create_collection("users").unwrap();
            // No checkpoint: simulates a crash right after a durable insert.
            engine.insert_one("users", doc! { "name".to_string() => Value::Str("cy".into()) }).unwrap();
        }
        let mut reopened = Engine::open(&path, DurabilityMode::Safe).unwrap();
        assert_eq!(reopened.count_documents("users", &Filter::MatchAll).unwrap(), 1);
    }

    #[test]
    fn rolled_back_transaction_leaves_no_trace() {
        let dir = tempdir().unwrap();
        let mut engine = open(dir.path());
        let tx = engine.begin_transaction();
        engine.insert_one_tx(tx, "users", doc! { "name".to_string() => Value::Str("dee".into()) }).unwrap();
        engine.rollback_transaction(tx).unwrap();
        assert_eq!(engine.count_documents("users", &Filter::MatchAll).unwrap(), 0);
    }

    #[test]
    fn committed_transaction_applies_all_ops_together() {
        let dir = tempdir().unwrap();
        let mut engine = open(dir.path());
        let tx = engine.begin_transaction();
        engine.insert_one_tx(tx, "users", doc! { "name".to_string() => Value::Str("eve".into()) }).unwrap();
        engine.insert_one_tx(tx, "users", doc! { "name".to_string() => Value::Str("fay".into()) }).unwrap();
        engine.commit_transaction(tx).unwrap();
        assert_eq!(engine.count_documents("users", &Filter::MatchAll).unwrap(), 2);
    }

    #[test]
    fn index_backed_find_matches_full_scan() {
        let dir = tempdir().unwrap();
        let mut engine = open(dir.path());
        engine.insert_one("users", doc! { "email".to_string() => Value::Str("a@x.com".into()) }).unwrap();
        engine.insert_one("users", doc! { "email".to_string() => Value::Str("b@x.com".into()) }).unwrap();
        let index_name = engine.create_index("users", "email", true).unwrap();

        let filter = Filter::Eq("email".into(), Value::Str("a@x.com".into()));
        let via_index = engine.find_with_hint("users", &filter, &index_name).unwrap();
        let via_scan = engine.find("users", &filter, &FindOptions::default()).unwrap();
        assert_eq!(via_index.len(), 1);
        assert_eq!(via_index, via_scan);
    }

    #[test]
    fn duplicate_key_on_unique_index_is_rejected() {
        let dir = tempdir().unwrap();
        let mut engine = open(dir.path());
        engine.insert_one("users", doc! { "email".to_string() => Value::Str("a@x.com".into()) }).unwrap();
        engine.create_index("users", "email", true).unwrap();
        let err = engine.insert_one("users", doc! { "email".to_string() => Value::Str("a@x.com".into()) });
        assert!(matches!(err, Err(DbError::DuplicateKey { .. })));
    }

    #[test]
    fn compact_reclaims_space_and_keeps_live_documents() {
        let dir = tempdir().unwrap();
        let mut engine = open(dir.path());
        let id = engine.insert_one("users", doc! { "name".to_string() => Value::Str("gil".into()) }).unwrap();
        engine.update_one("users", &Filter::Eq("_id".into(), id.value().clone()), &[UpdateOp::Set("name".into(), Value::Str("gilly".into()))]).unwrap();

        let stats = engine.compact().unwrap();
        assert_eq!(stats.documents_kept, 1);
        assert_eq!(engine.count_documents("users", &Filter::MatchAll).unwrap(), 1);
        let doc = engine.find_one("users", &Filter::Eq("_id".into(), id.value().clone())).unwrap().unwrap();
        assert_eq!(doc.get("name"), Some(&Value::Str("gilly".into())));
    }

    #[test]
    fn sort_skip_limit_apply_in_order() {
        let dir = tempdir().unwrap();
        let mut engine = open(dir.path());
        for n in [3, 1, 2] {
            engine.insert_one("users", doc! { "n".to_string() => Value::Int(n) }).unwrap();
        }
        let options = FindOptions { sort: vec![SortSpec { path: "n".into(), order: Order::Asc }], skip: 1, limit: Some(1), ..Default::default() };
        let out = engine.find("users", &Filter::MatchAll, &options).unwrap();
        assert_eq!(out[0].get("n"), Some(&Value::Int(2)));
    }
}
