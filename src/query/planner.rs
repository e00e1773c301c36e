//! Query planning (§4.5): choose an index scan over a full collection scan
//! when the filter's leading clause is an equality on an indexed path.

use crate::collection::Collection;
use crate::id::DocId;
use crate::query::types::Filter;

#[derive(Debug, Clone)]
pub enum Plan {
    IndexScan { index_name: String },
    FullScan,
}

/// Picks a plan for `filter`, preferring `hint` when it names a usable
/// index, then falling back to any index whose path matches a top-level
/// equality clause, then a full scan.
#[must_use]
pub fn plan_for(collection: &Collection, filter: &Filter, hint: Option<&str>) -> Plan {
    if let Some(name) = hint {
        if collection.list_indexes().iter().any(|n| n == name) {
            return Plan::IndexScan { index_name: name.to_string() };
        }
    }
    if let Some(name) = find_equality_index(collection, filter) {
        return Plan::IndexScan { index_name: name };
    }
    Plan::FullScan
}

fn find_equality_index(collection: &Collection, filter: &Filter) -> Option<String> {
    let eq_path = leading_equality_path(filter)?;
    for name in collection.list_indexes() {
        if collection.indexes.meta_for(&name).is_some_and(|m| m.key_path == eq_path) {
            return Some(name);
        }
    }
    None
}

fn leading_equality_path(filter: &Filter) -> Option<&str> {
    match filter {
        Filter::Eq(path, _) => Some(path.as_str()),
        Filter::And(clauses) => clauses.iter().find_map(leading_equality_path),
        _ => None,
    }
}

/// Resolves an `IndexScan` plan's equality value out of the filter so the
/// executor can do the actual index lookup.
#[must_use]
pub fn equality_value_for<'a>(filter: &'a Filter, index_name_path: &str) -> Option<&'a crate::value::Value> {
    match filter {
        Filter::Eq(path, v) if path == index_name_path => Some(v),
        Filter::And(clauses) => clauses.iter().find_map(|f| equality_value_for(f, index_name_path)),
        _ => None,
    }
}
