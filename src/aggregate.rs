//! Aggregation pipeline (§4.7): `$match/$project/$group/$sort/$skip/$limit`
//! over value expressions with `$sum/$avg/$min/$max/$first/$last`
//! accumulators.
//!
//! New relative to the teacher (it has no aggregation layer); grounded on
//! the query engine's filter/eval/sort primitives (§4.5) which this reuses
//! for `$match` and `$sort` rather than reimplementing comparison logic.

use crate::query::eval::{compare_docs, eval_filter};
use crate::query::types::{Filter, SortSpec};
use crate::value::{Document, Value, get_path};

#[derive(Debug, Clone)]
pub enum Expr {
    Field(String),
    Literal(Value),
    Add(Box<Expr>, Box<Expr>),
    Subtract(Box<Expr>, Box<Expr>),
    Multiply(Box<Expr>, Box<Expr>),
    Divide(Box<Expr>, Box<Expr>),
    Concat(Vec<Expr>),
}

#[must_use]
pub fn eval_expr(doc: &Document, expr: &Expr) -> Value {
    match expr {
        Expr::Field(path) => get_path(doc, path).cloned().unwrap_or(Value::Null),
        Expr::Literal(v) => v.clone(),
        Expr::Add(a, b) => numeric_binop(doc, a, b, |x, y| x + y),
        Expr::Subtract(a, b) => numeric_binop(doc, a, b, |x, y| x - y),
        Expr::Multiply(a, b) => numeric_binop(doc, a, b, |x, y| x * y),
        Expr::Divide(a, b) => numeric_binop(doc, a, b, |x, y| x / y),
        Expr::Concat(parts) => {
            let mut s = String::new();
            for part in parts {
                match eval_expr(doc, part) {
                    Value::Str(x) => s.push_str(&x),
                    other => s.push_str(&format!("{other:?}")),
                }
            }
            Value::Str(s)
        }
    }
}

fn numeric_binop(doc: &Document, a: &Expr, b: &Expr, f: impl Fn(f64, f64) -> f64) -> Value {
    let av = eval_expr(doc, a).as_f64().unwrap_or(0.0);
    let bv = eval_expr(doc, b).as_f64().unwrap_or(0.0);
    Value::Float(f(av, bv))
}

#[derive(Debug, Clone)]
pub enum Accumulator {
    Sum(Expr),
    Avg(Expr),
    Min(Expr),
    Max(Expr),
    First(Expr),
    Last(Expr),
}

#[derive(Debug, Clone)]
pub struct GroupSpec {
    /// The group key expression (`None` groups everything into one bucket,
    /// mirroring `_id: null`).
    pub key: Option<Expr>,
    pub accumulators: Vec<(String, Accumulator)>,
}

#[derive(Debug, Clone)]
pub enum Stage {
    Match(Filter),
    Project(Vec<(String, Expr)>),
    Group(GroupSpec),
    Sort(Vec<SortSpec>),
    Skip(usize),
    Limit(usize),
}

/// Runs `stages` over `input` in order, threading the output of one stage
/// into the next (§4.7).
#[must_use]
pub fn run_pipeline(input: Vec<Document>, stages: &[Stage]) -> Vec<Document> {
    let mut current = input;
    for stage in stages {
        current = run_stage(current, stage);
    }
    current
}

fn run_stage(input: Vec<Document>, stage: &Stage) -> Vec<Document> {
    match stage {
        Stage::Match(filter) => input.into_iter().filter(|d| eval_filter(d, filter)).collect(),
        Stage::Project(fields) => input
            .iter()
            .map(|d| {
                let mut out = Document::new();
                for (name, expr) in fields {
                    out.insert(name.clone(), eval_expr(d, expr));
                }
                out
            })
            .collect(),
        Stage::Group(spec) => run_group(&input, spec),
        Stage::Sort(specs) => {
            let mut out = input;
            out.sort_by(|a, b| compare_docs(a, b, specs));
            out
        }
        Stage::Skip(n) => input.into_iter().skip(*n).collect(),
        Stage::Limit(n) => input.into_iter().take(*n).collect(),
    }
}

fn group_key_repr(doc: &Document, key: Option<&Expr>) -> Value {
    key.map_or(Value::Null, |expr| eval_expr(doc, expr))
}

fn run_group(input: &[Document], spec: &GroupSpec) -> Vec<Document> {
    let mut buckets: Vec<(Value, Vec<&Document>)> = Vec::new();
    for doc in input {
        let key = group_key_repr(doc, spec.key.as_ref());
        match buckets.iter_mut().find(|(k, _)| k.deep_eq(&key)) {
            Some((_, docs)) => docs.push(doc),
            None => buckets.push((key, vec![doc])),
        }
    }

    buckets
        .into_iter()
        .map(|(key, docs)| {
            let mut out = Document::new();
            out.insert("_id", key);
            for (name, acc) in &spec.accumulators {
                out.insert(name.clone(), apply_accumulator(&docs, acc));
            }
            out
        })
        .collect()
}

fn apply_accumulator(docs: &[&Document], acc: &Accumulator) -> Value {
    match acc {
        Accumulator::Sum(expr) => Value::Float(docs.iter().map(|d| eval_expr(d, expr).as_f64().unwrap_or(0.0)).sum()),
        Accumulator::Avg(expr) => {
            if docs.is_empty() {
                return Value::Null;
            }
            let total: f64 = docs.iter().map(|d| eval_expr(d, expr).as_f64().unwrap_or(0.0)).sum();
            Value::Float(total / docs.len() as f64)
        }
        Accumulator::Min(expr) => docs
            .iter()
            .map(|d| eval_expr(d, expr))
            .min_by(|a, b| crate::value::compare_values(a, b))
            .unwrap_or(Value::Null),
        Accumulator::Max(expr) => docs
            .iter()
            .map(|d| eval_expr(d, expr))
            .max_by(|a, b| crate::value::compare_values(a, b))
            .unwrap_or(Value::Null),
        Accumulator::First(expr) => docs.first().map_or(Value::Null, |d| eval_expr(d, expr)),
        Accumulator::Last(expr) => docs.last().map_or(Value::Null, |d| eval_expr(d, expr)),
    }
}
