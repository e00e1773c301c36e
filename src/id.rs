//! `DocId`: a `Value` wrapped so it can serve as a `HashMap`/`BTreeMap` key.
//!
//! §3 allows `_id` to be "any primitive" supplied by the caller, but the
//! catalog (§4.3) needs `Eq`/`Hash`/`Ord`, which raw `Value` cannot provide
//! (floats aren't `Eq`). `DocId` derives those from the same canonical byte
//! encoding the B+Tree uses for index keys (`value::encode_key`), so catalog
//! order and index order agree, per the "one comparator, reused everywhere"
//! design note.

use crate::value::{Value, compare_values, encode_key};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocId(pub Value);

impl DocId {
    #[must_use]
    pub fn int(n: i64) -> Self {
        DocId(Value::Int(n))
    }

    #[must_use]
    pub fn value(&self) -> &Value {
        &self.0
    }
}

impl PartialEq for DocId {
    fn eq(&self, other: &Self) -> bool {
        compare_values(&self.0, &other.0) == Ordering::Equal
    }
}
impl Eq for DocId {}

impl PartialOrd for DocId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DocId {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_values(&self.0, &other.0)
    }
}

impl Hash for DocId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        encode_key(&self.0).hash(state);
    }
}

impl std::fmt::Display for DocId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Value::Int(i) => write!(f, "{i}"),
            Value::Str(s) => write!(f, "{s}"),
            other => write!(f, "{other:?}"),
        }
    }
}
