//! Query engine (§4.5): filter AST, evaluation, planning, and the
//! collection-facing operations (`find`, `count`, `distinct`, `explain`).

pub mod eval;
pub mod exec;
pub mod planner;
pub mod types;

pub use types::{Filter, FindOptions, Order, SortSpec};
