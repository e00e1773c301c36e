//! Filter evaluation, document comparison for `$sort`, and dot-path
//! projection (§4.5).
//!
//! Grounded on the teacher's deleted `query/eval.rs`, generalized to give
//! every comparison node "any array element matches" semantics via
//! [`crate::value::get_path_any`] instead of the teacher's single-value
//! `get_path`.

use crate::query::types::{Filter, Order, SortSpec};
use crate::value::{Document, Value, compare_values, get_path, get_path_any};
use regex::Regex;
use std::cmp::Ordering;

#[must_use]
pub fn eval_filter(doc: &Document, filter: &Filter) -> bool {
    match filter {
        Filter::MatchAll => true,
        Filter::Eq(path, v) => get_path_any(doc, path).iter().any(|x| values_loosely_equal(x, v)),
        Filter::Ne(path, v) => !get_path_any(doc, path).iter().any(|x| values_loosely_equal(x, v)),
        Filter::Gt(path, v) => get_path_any(doc, path).iter().any(|x| compare_values(x, v) == Ordering::Greater),
        Filter::Gte(path, v) => get_path_any(doc, path).iter().any(|x| compare_values(x, v) != Ordering::Less),
        Filter::Lt(path, v) => get_path_any(doc, path).iter().any(|x| compare_values(x, v) == Ordering::Less),
        Filter::Lte(path, v) => get_path_any(doc, path).iter().any(|x| compare_values(x, v) != Ordering::Greater),
        Filter::In(path, vs) => get_path_any(doc, path).iter().any(|x| vs.iter().any(|v| values_loosely_equal(x, v))),
        Filter::Nin(path, vs) => !get_path_any(doc, path).iter().any(|x| vs.iter().any(|v| values_loosely_equal(x, v))),
        Filter::Exists(path, expected) => get_path(doc, path).is_some() == *expected,
        Filter::Regex(path, pattern) => match Regex::new(pattern) {
            Ok(re) => get_path_any(doc, path).iter().any(|x| x.as_str().is_some_and(|s| re.is_match(s))),
            Err(_) => false,
        },
        Filter::Size(path, n) => match get_path(doc, path) {
            Some(Value::Array(items)) => items.len() == *n,
            _ => false,
        },
        Filter::All(path, wanted) => match get_path(doc, path) {
            Some(Value::Array(items)) => wanted.iter().all(|w| items.iter().any(|x| x.deep_eq(w))),
            _ => false,
        },
        Filter::ElemMatch(path, subfilters) => match get_path(doc, path) {
            Some(Value::Array(items)) => items.iter().any(|item| match item {
                Value::Document(d) => subfilters.iter().all(|f| eval_filter(d, f)),
                other => subfilters.iter().all(|f| eval_scalar_as_eq(other, f)),
            }),
            _ => false,
        },
        Filter::Not(inner) => !eval_filter(doc, inner),
        Filter::And(fs) => fs.iter().all(|f| eval_filter(doc, f)),
        Filter::Or(fs) => fs.iter().any(|f| eval_filter(doc, f)),
    }
}

/// `$elemMatch` against an array of scalars: a bare `Eq`/comparison filter
/// with an empty path is applied directly to the element.
fn eval_scalar_as_eq(value: &Value, filter: &Filter) -> bool {
    match filter {
        Filter::Eq(_, v) => values_loosely_equal(value, v),
        Filter::Gt(_, v) => compare_values(value, v) == Ordering::Greater,
        Filter::Gte(_, v) => compare_values(value, v) != Ordering::Less,
        Filter::Lt(_, v) => compare_values(value, v) == Ordering::Less,
        Filter::Lte(_, v) => compare_values(value, v) != Ordering::Greater,
        _ => false,
    }
}

/// Equality as used by comparison filters: the same canonical order as
/// everywhere else, so `1 == 1.0` but `"1" != 1`.
fn values_loosely_equal(a: &Value, b: &Value) -> bool {
    compare_values(a, b) == Ordering::Equal
}

/// Orders two documents per `sort_specs`, the same comparator the B+Tree
/// and catalog use underneath (§3 "one comparator, reused everywhere").
#[must_use]
pub fn compare_docs(a: &Document, b: &Document, sort_specs: &[SortSpec]) -> Ordering {
    for spec in sort_specs {
        let av = get_path(a, &spec.path);
        let bv = get_path(b, &spec.path);
        let ord = match (av, bv) {
            (Some(x), Some(y)) => compare_values(x, y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        let ord = if spec.order == Order::Desc { ord.reverse() } else { ord };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Projects `paths` out of `doc` into a new document, always keeping `_id`
/// unless the caller explicitly excludes it by name (§4.5 projection).
#[must_use]
pub fn project_fields(doc: &Document, paths: &[String]) -> Document {
    let mut out = Document::new();
    if !paths.iter().any(|p| p == "_id") {
        if let Some(id) = doc.get("_id") {
            out.insert("_id", id.clone());
        }
    }
    for path in paths {
        if let Some(v) = get_path(doc, path) {
            out.insert(path.clone(), v.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn eq_matches_array_elements() {
        let d = doc! { "tags".to_string() => Value::Array(vec![Value::Str("a".into()), Value::Str("b".into())]) };
        assert!(eval_filter(&d, &Filter::Eq("tags".into(), Value::Str("b".into()))));
        assert!(!eval_filter(&d, &Filter::Eq("tags".into(), Value::Str("c".into()))));
    }

    #[test]
    fn numeric_cross_kind_eq_matches() {
        let d = doc! { "n".to_string() => Value::Int(5) };
        assert!(eval_filter(&d, &Filter::Eq("n".into(), Value::Float(5.0))));
    }

    #[test]
    fn and_or_not_compose() {
        let d = doc! { "a".to_string() => Value::Int(1), "b".to_string() => Value::Int(2) };
        let f = Filter::And(vec![
            Filter::Eq("a".into(), Value::Int(1)),
            Filter::Not(Box::new(Filter::Eq("b".into(), Value::Int(3)))),
        ]);
        assert!(eval_filter(&d, &f));
    }

    #[test]
    fn size_and_all_match_arrays() {
        let d = doc! { "tags".to_string() => Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]) };
        assert!(eval_filter(&d, &Filter::Size("tags".into(), 3)));
        assert!(eval_filter(&d, &Filter::All("tags".into(), vec![Value::Int(1), Value::Int(3)])));
        assert!(!eval_filter(&d, &Filter::All("tags".into(), vec![Value::Int(9)])));
    }

    #[test]
    fn elem_match_applies_subfilters_to_one_element() {
        let elem1 = Value::Document(doc! { "x".to_string() => Value::Int(1) });
        let elem2 = Value::Document(doc! { "x".to_string() => Value::Int(9) });
        let d = doc! { "items".to_string() => Value::Array(vec![elem1, elem2]) };
        let f = Filter::ElemMatch("items".into(), vec![Filter::Eq("x".into(), Value::Int(9))]);
        assert!(eval_filter(&d, &f));
        let f2 = Filter::ElemMatch("items".into(), vec![Filter::Eq("x".into(), Value::Int(42))]);
        assert!(!eval_filter(&d, &f2));
    }

    #[test]
    fn sort_orders_by_path_then_reverses_for_desc() {
        let a = doc! { "n".to_string() => Value::Int(1) };
        let b = doc! { "n".to_string() => Value::Int(2) };
        let specs = vec![SortSpec { path: "n".into(), order: Order::Desc }];
        assert_eq!(compare_docs(&a, &b, &specs), Ordering::Greater);
    }
}
