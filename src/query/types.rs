//! Filter AST and the request/response shapes the query and update/delete
//! paths share (§4.5, §4.6).
//!
//! Grounded on the teacher's deleted `query/types.rs`, which already
//! modeled a comparable node set (`Eq/Ne/Gt/Gte/Lt/Lte/In/Nin/Exists/Regex`
//! behind a feature flag); this generalizes that to an unconditional
//! `Regex` variant plus the array-predicate nodes (`Size`, `All`,
//! `ElemMatch`) the teacher never implemented.

use crate::value::Value;

#[derive(Debug, Clone)]
pub enum Filter {
    Eq(String, Value),
    Ne(String, Value),
    Gt(String, Value),
    Gte(String, Value),
    Lt(String, Value),
    Lte(String, Value),
    In(String, Vec<Value>),
    Nin(String, Vec<Value>),
    Exists(String, bool),
    Regex(String, String),
    Size(String, usize),
    /// Matches if every element of `Vec<Value>` appears somewhere in the
    /// array at `path`.
    All(String, Vec<Value>),
    /// Matches if at least one element of the array at `path` satisfies
    /// every sub-filter in the nested list.
    ElemMatch(String, Vec<Filter>),
    Not(Box<Filter>),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    /// The empty filter: matches every document (an empty `{}` query).
    MatchAll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
pub struct SortSpec {
    pub path: String,
    pub order: Order,
}

#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub sort: Vec<SortSpec>,
    pub skip: usize,
    pub limit: Option<usize>,
    pub projection: Option<Vec<String>>,
    /// Name of an index the caller wants considered for this query; the
    /// planner still falls back to a full scan if it can't use it (§4.5
    /// `find_with_hint`).
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateReport {
    pub matched_count: usize,
    pub modified_count: usize,
    pub upserted_id: Option<Value>,
}

#[derive(Debug, Clone, Default)]
pub struct DeleteReport {
    pub deleted_count: usize,
}

#[derive(Debug, Clone)]
pub struct ExplainReport {
    pub used_index: Option<String>,
    pub documents_examined: usize,
    pub documents_returned: usize,
}
