//! Update operators (§4.6): `$set/$unset/$inc/$push/$pull/$addToSet/$pop`.
//!
//! Grounded on the teacher's deleted `query/exec.rs::apply_update` dot-path
//! helpers, generalized from a single `$set`-only path to the full
//! MongoDB-style operator set.

use crate::errors::{DbError, DbResult};
use crate::value::{Document, Value, get_path, set_path, unset_path};

#[derive(Debug, Clone)]
pub enum UpdateOp {
    Set(String, Value),
    Unset(String),
    Inc(String, f64),
    /// `$push`: appends `values` (more than one if `$each` was used).
    Push(String, Vec<Value>),
    /// `$pull`: removes every array element deep-equal to `value`.
    Pull(String, Value),
    /// `$addToSet`: appends each of `values` only if not already present.
    AddToSet(String, Vec<Value>),
    /// `$pop`: `true` pops the last element, `false` pops the first.
    Pop(String, bool),
}

/// Applies every op in order, returning whether anything in `doc` actually
/// changed (drives `modified_count`, §4.6).
///
/// # Errors
/// Returns `InvalidArgument` if an `$inc` targets a field holding a
/// non-numeric existing value.
pub fn apply_ops(doc: &mut Document, ops: &[UpdateOp]) -> DbResult<bool> {
    let mut changed = false;
    for op in ops {
        changed |= apply_one(doc, op)?;
    }
    Ok(changed)
}

fn apply_one(doc: &mut Document, op: &UpdateOp) -> DbResult<bool> {
    Ok(match op {
        UpdateOp::Set(path, value) => set_path(doc, path, value.clone()),
        UpdateOp::Unset(path) => unset_path(doc, path),
        UpdateOp::Inc(path, delta) => {
            let existing = get_path(doc, path);
            if let Some(v) = existing {
                if !v.is_numeric() {
                    return Err(DbError::InvalidArgument(format!("$inc on non-numeric field at path \"{path}\"")));
                }
            }
            let current = existing.and_then(Value::as_f64).unwrap_or(0.0);
            let next = current + delta;
            let next_value = if next.fract() == 0.0 && existing.is_none_or(|v| matches!(v, Value::Int(_))) {
                Value::Int(next as i64)
            } else {
                Value::Float(next)
            };
            set_path(doc, path, next_value)
        }
        UpdateOp::Push(path, values) => {
            let mut arr = array_at(doc, path);
            arr.extend(values.iter().cloned());
            set_path(doc, path, Value::Array(arr));
            true
        }
        UpdateOp::Pull(path, target) => {
            let mut arr = array_at(doc, path);
            let before = arr.len();
            arr.retain(|v| !v.deep_eq(target));
            let changed = arr.len() != before;
            if changed {
                set_path(doc, path, Value::Array(arr));
            }
            changed
        }
        UpdateOp::AddToSet(path, values) => {
            let mut arr = array_at(doc, path);
            let mut changed = false;
            for v in values {
                if !arr.iter().any(|existing| existing.deep_eq(v)) {
                    arr.push(v.clone());
                    changed = true;
                }
            }
            if changed {
                set_path(doc, path, Value::Array(arr));
            }
            changed
        }
        UpdateOp::Pop(path, last) => {
            let mut arr = array_at(doc, path);
            let popped = if *last { arr.pop() } else if arr.is_empty() { None } else { Some(arr.remove(0)) };
            if popped.is_some() {
                set_path(doc, path, Value::Array(arr));
            }
            popped.is_some()
        }
    })
}

fn array_at(doc: &Document, path: &str) -> Vec<Value> {
    match get_path(doc, path) {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}
