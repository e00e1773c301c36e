//! The document value model (§3): a recursive value tree plus the
//! insertion-ordered mapping type that both documents and nested objects use.
//!
//! Grounded on the teacher's `SerializableBsonDocument`/`bson::Bson` wrapper
//! (`types.rs`) but implemented as a crate-owned enum rather than re-exporting
//! the `bson` crate, since §3 fixes the exact variant set (no `ObjectId`,
//! `Decimal128`, etc.) and §4.4 needs a canonical byte encoding this crate
//! controls end to end.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// A document value: the universal type stored in records, returned by
/// queries, and produced by update/aggregation expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<Value>),
    Document(Document),
}

impl Value {
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a.as_slice()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(d) => Some(d),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Deep equality used by `$addToSet`/`$pull` value matching.
    #[must_use]
    pub fn deep_eq(&self, other: &Value) -> bool {
        compare_values(self, other) == Ordering::Equal && same_kind_for_eq(self, other)
    }
}

fn same_kind_for_eq(a: &Value, b: &Value) -> bool {
    // Numeric cross-kind equality (1 == 1.0) is intentional per §4.5; every
    // other pairing must share a type tag to count as deep-equal.
    match (a, b) {
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => true,
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| x.deep_eq(y))
        }
        (Value::Document(x), Value::Document(y)) => {
            x.len() == y.len() && x.iter().all(|(k, v)| y.get(k).is_some_and(|v2| v.deep_eq(v2)))
        }
        _ => std::mem::discriminant(a) == std::mem::discriminant(b),
    }
}

/// An insertion-ordered string-keyed mapping. Plays the role of both the
/// document root and any nested sub-object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document(Vec<(String, Value)>);

impl Document {
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.0.iter_mut().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    /// Inserts or overwrites `key`, returning the previous value if present.
    /// Overwriting preserves the key's original position (matches the
    /// teacher's `bson::Document::insert` semantics).
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        let key = key.into();
        if let Some(slot) = self.0.iter_mut().find(|(k, _)| *k == key) {
            return Some(std::mem::replace(&mut slot.1, value));
        }
        self.0.push((key, value));
        None
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let pos = self.0.iter().position(|(k, _)| k == key)?;
        Some(self.0.remove(pos).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.iter().map(|(k, _)| k)
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        let mut doc = Document::new();
        for (k, v) in iter {
            doc.insert(k, v);
        }
        doc
    }
}

/// Builds a `Document` from `key: value` pairs, mirroring `bson::doc!`.
#[macro_export]
macro_rules! doc {
    ( $( $key:expr => $val:expr ),* $(,)? ) => {{
        #[allow(unused_mut)]
        let mut d = $crate::value::Document::new();
        $( d.insert($key, $val); )*
        d
    }};
}

/// Dot-path lookup. Descends through nested `Document`s; a dotted segment
/// applied where the current value is an `Array` matches if *any* element
/// satisfies the remaining path (MongoDB-compatible, §4.5) — callers that
/// need this semantics use [`get_path_any`] instead of this exact lookup.
#[must_use]
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut cur: &Value = doc.get(path.split('.').next()?)?;
    let mut parts = path.split('.');
    parts.next();
    for part in parts {
        match cur {
            Value::Document(d) => cur = d.get(part)?,
            _ => return None,
        }
    }
    Some(cur)
}

/// Collects every value reachable at `path`, expanding arrays encountered
/// along the way into each of their elements (§4.5: "a path into an array
/// applied to a comparison matches if any element matches").
pub fn get_path_any<'a>(doc: &'a Document, path: &str) -> Vec<&'a Value> {
    fn walk<'a>(cur: &'a Value, segs: &[&str], out: &mut Vec<&'a Value>) {
        let Some((&head, rest)) = segs.split_first() else {
            out.push(cur);
            return;
        };
        match cur {
            Value::Document(d) => {
                if let Some(v) = d.get(head) {
                    walk(v, rest, out);
                }
            }
            Value::Array(items) => {
                for item in items {
                    walk(item, segs, out);
                }
            }
            _ => {}
        }
    }
    let segs: Vec<&str> = path.split('.').collect();
    let mut out = Vec::new();
    if let Some((&head, rest)) = segs.split_first() {
        if let Some(v) = doc.get(head) {
            walk(v, rest, &mut out);
        }
    }
    out
}

/// Index key extraction (§3 "key_path (dot path or compound list)"): a
/// `key_path` containing `,` names several fields whose first value each
/// combine into one composite key; a plain dot path behaves exactly like
/// [`get_path_any`]. Used wherever an index key is derived from a document
/// instead of calling `get_path_any` directly, so compound indexes share
/// the same insert/remove/rebuild code as single-field ones.
#[must_use]
pub fn index_key_values(doc: &Document, key_path: &str) -> Vec<Value> {
    if key_path.contains(',') {
        let parts: Vec<Value> = key_path.split(',').map(|p| get_path(doc, p.trim()).cloned().unwrap_or(Value::Null)).collect();
        vec![Value::Array(parts)]
    } else {
        get_path_any(doc, key_path).into_iter().cloned().collect()
    }
}

/// Sets `path`, creating intermediate `Document`s as needed. Returns `true`
/// if the stored value changed (used to compute `modified_count`).
pub fn set_path(doc: &mut Document, path: &str, value: Value) -> bool {
    let (parent, last) = ensure_parent(doc, path);
    let old = parent.insert(last, value.clone());
    old.as_ref() != Some(&value)
}

/// Removes the terminal path segment. Does not create intermediate
/// documents (§4.6: "$unset ... does not create").
pub fn unset_path(doc: &mut Document, path: &str) -> bool {
    let mut cur = doc;
    let mut segs = path.split('.').peekable();
    loop {
        let Some(seg) = segs.next() else { return false };
        if segs.peek().is_none() {
            return cur.remove(seg).is_some();
        }
        match cur.get_mut(seg) {
            Some(Value::Document(d)) => cur = d,
            _ => return false,
        }
    }
}

fn ensure_parent<'a>(doc: &'a mut Document, path: &str) -> (&'a mut Document, String) {
    let mut cur = doc;
    let mut segs = path.split('.').peekable();
    loop {
        let seg = segs.next().unwrap_or_default();
        if segs.peek().is_none() {
            return (cur, seg.to_string());
        }
        let needs_new = !matches!(cur.get(seg), Some(Value::Document(_)));
        if needs_new {
            cur.insert(seg, Value::Document(Document::new()));
        }
        cur = match cur.get_mut(seg) {
            Some(Value::Document(d)) => d,
            _ => unreachable!("just inserted a Document at this key"),
        };
    }
}

/// Type rank for the canonical total order (§4.5): nulls < booleans <
/// numbers < strings < arrays < mappings.
fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int(_) | Value::Float(_) => 2,
        Value::Str(_) => 3,
        Value::Array(_) => 4,
        Value::Document(_) => 5,
    }
}

/// Total order over `Value` used for sorting, comparisons and B+Tree key
/// ordering. Numbers compare by numeric value regardless of int/float
/// representation; strings compare by code point; cross-kind values never
/// compare equal and order strictly by [`type_rank`].
#[must_use]
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (x, y) if x.is_numeric() && y.is_numeric() => {
            let (fx, fy) = (x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN));
            fx.total_cmp(&fy)
        }
        (Value::Str(x), Value::Str(y)) => x.cmp(y),
        (Value::Array(xs), Value::Array(ys)) => {
            for (x, y) in xs.iter().zip(ys.iter()) {
                let ord = compare_values(x, y);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            xs.len().cmp(&ys.len())
        }
        (Value::Document(x), Value::Document(y)) => {
            let xk: BTreeSet<&String> = x.keys().collect();
            let yk: BTreeSet<&String> = y.keys().collect();
            for k in xk.union(&yk) {
                let ord = match (x.get(k), y.get(k)) {
                    (Some(vx), Some(vy)) => compare_values(vx, vy),
                    (Some(_), None) => Ordering::Greater,
                    (None, Some(_)) => Ordering::Less,
                    (None, None) => Ordering::Equal,
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Order-preserving byte encoding used for B+Tree keys (§4.4). Strings and
/// documents are assumed not to contain embedded NUL bytes; this is an
/// accepted simplification (see DESIGN.md).
#[must_use]
pub fn encode_key(v: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    encode_key_into(v, &mut out);
    out
}

fn encode_key_into(v: &Value, out: &mut Vec<u8>) {
    match v {
        Value::Null => out.push(0),
        Value::Bool(b) => {
            out.push(1);
            out.push(u8::from(*b));
        }
        Value::Int(_) | Value::Float(_) => {
            out.push(2);
            let f = v.as_f64().unwrap_or(0.0);
            out.extend_from_slice(&order_preserving_f64(f));
        }
        Value::Str(s) => {
            out.push(3);
            out.extend_from_slice(s.as_bytes());
            out.push(0);
        }
        Value::Array(items) => {
            out.push(4);
            for item in items {
                encode_key_into(item, out);
                out.push(0);
            }
            out.push(1);
        }
        Value::Document(d) => {
            out.push(5);
            let mut entries: Vec<(&String, &Value)> = d.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            for (k, val) in entries {
                out.extend_from_slice(k.as_bytes());
                out.push(0);
                encode_key_into(val, out);
                out.push(0);
            }
            out.push(1);
        }
    }
}

/// Maps an `f64` to a `u64` bit pattern whose unsigned numeric order matches
/// the IEEE-754 total order of the floats (including negative numbers).
fn order_preserving_f64(f: f64) -> [u8; 8] {
    let bits = f.to_bits();
    let mapped = if bits & (1 << 63) != 0 { !bits } else { bits | (1 << 63) };
    mapped.to_be_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_insert_overwrite_preserves_position() {
        let mut d = Document::new();
        d.insert("a", Value::Int(1));
        d.insert("b", Value::Int(2));
        d.insert("a", Value::Int(3));
        let keys: Vec<&String> = d.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(d.get("a"), Some(&Value::Int(3)));
    }

    #[test]
    fn numeric_cross_kind_equality() {
        assert_eq!(compare_values(&Value::Int(1), &Value::Float(1.0)), Ordering::Equal);
        assert!(Value::Int(1).deep_eq(&Value::Float(1.0)));
    }

    #[test]
    fn type_rank_orders_kinds() {
        assert_eq!(compare_values(&Value::Null, &Value::Bool(false)), Ordering::Less);
        assert_eq!(compare_values(&Value::Bool(true), &Value::Int(0)), Ordering::Less);
        assert_eq!(compare_values(&Value::Int(100), &Value::Str("a".into())), Ordering::Less);
    }

    #[test]
    fn dot_path_get_and_set() {
        let mut d = Document::new();
        set_path(&mut d, "a.b.c", Value::Int(5));
        assert_eq!(get_path(&d, "a.b.c"), Some(&Value::Int(5)));
        assert!(unset_path(&mut d, "a.b.c"));
        assert_eq!(get_path(&d, "a.b.c"), None);
    }

    #[test]
    fn get_path_any_matches_array_elements() {
        let mut d = Document::new();
        d.insert(
            "tags",
            Value::Array(vec![Value::Str("x".into()), Value::Str("y".into())]),
        );
        let vals = get_path_any(&d, "tags");
        assert_eq!(vals, vec![&Value::Str("x".into()), &Value::Str("y".into())]);
    }

    #[test]
    fn encode_key_preserves_numeric_order() {
        let mut keys: Vec<(Value, Vec<u8>)> = vec![-5i64, -1, 0, 1, 5]
            .into_iter()
            .map(|i| (Value::Int(i), encode_key(&Value::Int(i))))
            .collect();
        keys.sort_by(|a, b| a.1.cmp(&b.1));
        let order: Vec<i64> = keys.iter().map(|(v, _)| v.as_i64().unwrap()).collect();
        assert_eq!(order, vec![-5, -1, 0, 1, 5]);
    }
}
