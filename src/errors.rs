//! Crate-wide error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("corrupt header: {0}")]
    CorruptHeader(String),

    #[error("corrupt record: {0}")]
    CorruptRecord(String),

    #[error("corrupt WAL: {0}")]
    CorruptWal(String),

    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    #[error("duplicate key on unique index {index}: {key}")]
    DuplicateKey { index: String, key: String },

    #[error("transaction not found: {0}")]
    TransactionNotFound(u64),

    #[error("transaction already closed: {0}")]
    TransactionClosed(u64),

    #[error("schema violation: {0}")]
    SchemaViolation(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("collection not found: {0}")]
    NoSuchCollection(String),

    #[error("collection already exists: {0}")]
    CollectionAlreadyExists(String),

    #[error("index not found: {0}")]
    NoSuchIndex(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database is already open: {0}")]
    AlreadyOpen(String),
}

pub type DbResult<T> = Result<T, DbError>;
