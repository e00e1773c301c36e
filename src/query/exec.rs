//! Query and mutation execution (§4.5, §4.6): the operations collections
//! expose over the planner + evaluator.

use crate::collection::Collection;
use crate::errors::DbResult;
use crate::id::DocId;
use crate::query::eval::{compare_docs, eval_filter, project_fields};
use crate::query::planner::{self, Plan};
use crate::query::types::{DeleteReport, ExplainReport, Filter, FindOptions, UpdateReport};
use crate::store::PrimaryStore;
use crate::update::UpdateOp;
use crate::value::Document;
use crate::wal::Wal;

/// Candidate document ids the plan expects to examine, in encounter order.
fn candidate_ids(collection: &Collection, filter: &Filter, hint: Option<&str>) -> (Plan, Vec<DocId>) {
    let plan = planner::plan_for(collection, filter, hint);
    match &plan {
        Plan::IndexScan { index_name } => {
            let meta = collection.indexes.meta_for(index_name).expect("planner only returns known indexes");
            if let Some(value) = planner::equality_value_for(filter, &meta.key_path) {
                let ids = collection.index_lookup(index_name, value).unwrap_or_default();
                (plan, ids)
            } else {
                (Plan::FullScan, collection.iter_ids().collect())
            }
        }
        Plan::FullScan => (plan, collection.iter_ids().collect()),
    }
}

fn load_matching(
    store: &mut PrimaryStore,
    collection: &Collection,
    ids: &[DocId],
    filter: &Filter,
) -> DbResult<Vec<(DocId, Document)>> {
    let mut out = Vec::new();
    for id in ids {
        if let Some(doc) = collection.get(store, id)? {
            if eval_filter(&doc, filter) {
                out.push((id.clone(), doc));
            }
        }
    }
    Ok(out)
}

/// Finds documents matching `filter`, applying sort, skip, limit, and
/// projection in that order (§4.5: sort before pagination, projection last).
pub fn find_docs(
    store: &mut PrimaryStore,
    collection: &Collection,
    filter: &Filter,
    options: &FindOptions,
) -> DbResult<Vec<Document>> {
    let (_, ids) = candidate_ids(collection, filter, options.hint.as_deref());
    let mut matched = load_matching(store, collection, &ids, filter)?;

    if !options.sort.is_empty() {
        matched.sort_by(|(_, a), (_, b)| compare_docs(a, b, &options.sort));
    }

    let skipped: Vec<Document> = matched.into_iter().skip(options.skip).map(|(_, d)| d).collect();
    let limited: Vec<Document> = match options.limit {
        Some(n) => skipped.into_iter().take(n).collect(),
        None => skipped,
    };

    Ok(match &options.projection {
        Some(paths) => limited.iter().map(|d| project_fields(d, paths)).collect(),
        None => limited,
    })
}

pub fn count_documents(store: &mut PrimaryStore, collection: &Collection, filter: &Filter) -> DbResult<usize> {
    let (_, ids) = candidate_ids(collection, filter, None);
    Ok(load_matching(store, collection, &ids, filter)?.len())
}

/// Distinct values of `path` across documents matching `filter`, in first-
/// encountered order (§4.5 `distinct`).
pub fn distinct(
    store: &mut PrimaryStore,
    collection: &Collection,
    path: &str,
    filter: &Filter,
) -> DbResult<Vec<crate::value::Value>> {
    let (_, ids) = candidate_ids(collection, filter, None);
    let matched = load_matching(store, collection, &ids, filter)?;
    let mut out: Vec<crate::value::Value> = Vec::new();
    for (_, doc) in matched {
        for v in crate::value::get_path_any(&doc, path) {
            if !out.iter().any(|existing| existing.deep_eq(v)) {
                out.push(v.clone());
            }
        }
    }
    Ok(out)
}

pub fn explain(store: &mut PrimaryStore, collection: &Collection, filter: &Filter, hint: Option<&str>) -> DbResult<ExplainReport> {
    let (plan, ids) = candidate_ids(collection, filter, hint);
    let examined = ids.len();
    let matched = load_matching(store, collection, &ids, filter)?;
    let used_index = match plan {
        Plan::IndexScan { index_name } => Some(index_name),
        Plan::FullScan => None,
    };
    Ok(ExplainReport { used_index, documents_examined: examined, documents_returned: matched.len() })
}

/// Applies `ops` to every document matching `filter`, up to `limit` (`None`
/// meaning unbounded, i.e. `update_many`).
pub fn update_matching(
    store: &mut PrimaryStore,
    collection: &mut Collection,
    wal: &mut Wal,
    tx_id: u64,
    filter: &Filter,
    ops: &[UpdateOp],
    limit: Option<usize>,
) -> DbResult<UpdateReport> {
    let (_, ids) = candidate_ids(collection, filter, None);
    let matched = load_matching(store, collection, &ids, filter)?;
    let targets: Vec<(DocId, Document)> = match limit {
        Some(n) => matched.into_iter().take(n).collect(),
        None => matched,
    };

    let mut report = UpdateReport { matched_count: targets.len(), ..Default::default() };
    for (id, mut doc) in targets {
        let changed = crate::update::apply_ops(&mut doc, ops)?;
        if changed {
            collection.replace(store, wal, tx_id, &id, doc)?;
            report.modified_count += 1;
        }
    }
    Ok(report)
}

pub fn delete_matching(
    store: &mut PrimaryStore,
    collection: &mut Collection,
    wal: &mut Wal,
    tx_id: u64,
    filter: &Filter,
    limit: Option<usize>,
) -> DbResult<DeleteReport> {
    let (_, ids) = candidate_ids(collection, filter, None);
    let matched = load_matching(store, collection, &ids, filter)?;
    let targets: Vec<DocId> = match limit {
        Some(n) => matched.into_iter().take(n).map(|(id, _)| id).collect(),
        None => matched.into_iter().map(|(id, _)| id).collect(),
    };

    let mut report = DeleteReport::default();
    for id in targets {
        if collection.delete(store, wal, tx_id, &id)? {
            report.deleted_count += 1;
        }
    }
    Ok(report)
}
