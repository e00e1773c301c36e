#![forbid(unsafe_code)]
//! An embedded, single-process document database: a WAL, on-disk B+Tree
//! secondary indexes, and a MongoDB-style query/update/aggregation surface
//! over a single append-only primary file.
//!
//! [`Engine`] is the entry point: it owns the primary store, WAL, every
//! collection's catalog and indexes, and fans the external interface out
//! to the lower-level modules declared below.

pub mod aggregate;
pub mod cache;
pub mod catalog;
pub mod collection;
pub mod compact;
pub mod durability;
pub mod engine;
pub mod errors;
pub mod fsutil;
pub mod id;
pub mod index;
pub mod logger;
pub mod query;
pub mod record;
pub mod schema;
pub mod store;
pub mod transaction;
pub mod update;
pub mod utils;
pub mod value;
pub mod wal;

pub use aggregate::{Accumulator, Expr, GroupSpec, Stage};
pub use collection::Collection;
pub use durability::DurabilityMode;
pub use engine::{Engine, EngineStats};
pub use errors::{DbError, DbResult};
pub use id::DocId;
pub use query::types::{DeleteReport, ExplainReport, UpdateReport};
pub use query::{Filter, FindOptions, Order, SortSpec};
pub use schema::{Schema, ValueKind};
pub use update::UpdateOp;
pub use value::{Document, Value};
