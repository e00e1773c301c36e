//! Transaction coordinator (§4.8): buffers a transaction's writes in memory
//! and only hands them to the engine for durable application on `commit`.
//! Readers never observe a transaction's effects before that point — there
//! is no isolation beyond this all-or-nothing visibility boundary (§4.8,
//! resolved Open Question "uncommitted visibility").
//!
//! New relative to the teacher; grounded on the write-then-index-then-WAL
//! ordering used throughout `collection.rs` (itself generalized from the
//! teacher's deleted `collection/ops.rs`), generalized here into a holding
//! area that defers that ordering until commit instead of applying it
//! immediately.

use crate::errors::{DbError, DbResult};
use crate::id::DocId;
use crate::value::Document;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub enum PendingOp {
    Insert { collection: String, doc: Document },
    Replace { collection: String, id: DocId, doc: Document },
    Delete { collection: String, id: DocId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxState {
    Active,
    Closed,
}

struct Transaction {
    ops: Vec<PendingOp>,
    state: TxState,
}

/// Owns every in-flight transaction's buffered operations. Does not itself
/// touch storage — `Engine::commit` drains a transaction's ops here and
/// applies them through the normal collection write path under one shared
/// WAL transaction id.
#[derive(Default)]
pub struct TransactionCoordinator {
    next_id: u64,
    transactions: HashMap<u64, Transaction>,
}

impl TransactionCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self { next_id: 1, transactions: HashMap::new() }
    }

    pub fn begin(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.transactions.insert(id, Transaction { ops: Vec::new(), state: TxState::Active });
        id
    }

    fn active_mut(&mut self, tx_id: u64) -> DbResult<&mut Transaction> {
        let tx = self.transactions.get_mut(&tx_id).ok_or(DbError::TransactionNotFound(tx_id))?;
        if tx.state != TxState::Active {
            return Err(DbError::TransactionClosed(tx_id));
        }
        Ok(tx)
    }

    pub fn insert_one_tx(&mut self, tx_id: u64, collection: impl Into<String>, doc: Document) -> DbResult<()> {
        self.active_mut(tx_id)?.ops.push(PendingOp::Insert { collection: collection.into(), doc });
        Ok(())
    }

    pub fn update_one_tx(&mut self, tx_id: u64, collection: impl Into<String>, id: DocId, doc: Document) -> DbResult<()> {
        self.active_mut(tx_id)?.ops.push(PendingOp::Replace { collection: collection.into(), id, doc });
        Ok(())
    }

    pub fn delete_one_tx(&mut self, tx_id: u64, collection: impl Into<String>, id: DocId) -> DbResult<()> {
        self.active_mut(tx_id)?.ops.push(PendingOp::Delete { collection: collection.into(), id });
        Ok(())
    }

    /// Closes the transaction and hands its buffered ops to the caller for
    /// durable application. Idempotent closing is not supported: committing
    /// or rolling back twice returns `TransactionClosed`.
    pub fn take_for_commit(&mut self, tx_id: u64) -> DbResult<Vec<PendingOp>> {
        let tx = self.active_mut(tx_id)?;
        tx.state = TxState::Closed;
        Ok(std::mem::take(&mut tx.ops))
    }

    pub fn rollback(&mut self, tx_id: u64) -> DbResult<()> {
        let tx = self.active_mut(tx_id)?;
        tx.state = TxState::Closed;
        tx.ops.clear();
        Ok(())
    }
}
