//! Secondary indexes (§4.4): compound keys, range scans behind `$gt`/`$lt`
//! style filters, and index maintenance across update/delete.

use ironbase::{DurabilityMode, Engine, Filter, UpdateOp, Value, doc};
use tempfile::tempdir;

fn fresh(dir: &std::path::Path) -> Engine {
    let mut db = Engine::open(dir.join("store.ironbase"), DurabilityMode::Safe).unwrap();
    db.create_collection("users").unwrap();
    db
}

#[test]
fn compound_index_keys_on_every_listed_field() {
    let dir = tempdir().unwrap();
    let mut db = fresh(dir.path());
    db.insert_one("users", doc! { "last".to_string() => Value::Str("ray".into()), "first".to_string() => Value::Str("a".into()) }).unwrap();
    db.insert_one("users", doc! { "last".to_string() => Value::Str("ray".into()), "first".to_string() => Value::Str("b".into()) }).unwrap();

    let name = db.create_compound_index("users", &["last".to_string(), "first".to_string()], true).unwrap();
    assert!(db.list_indexes("users").unwrap().contains(&name));

    // A third document with the same compound key as an existing one is
    // rejected by the unique compound index even though neither field
    // alone repeats across all three documents.
    let err = db.insert_one("users", doc! { "last".to_string() => Value::Str("ray".into()), "first".to_string() => Value::Str("a".into()) });
    assert!(matches!(err, Err(ironbase::DbError::DuplicateKey { .. })));
}

#[test]
fn dropping_an_index_falls_back_to_a_full_scan_without_error() {
    let dir = tempdir().unwrap();
    let mut db = fresh(dir.path());
    db.insert_one("users", doc! { "age".to_string() => Value::Int(22) }).unwrap();
    let name = db.create_index("users", "age", false).unwrap();
    db.drop_index("users", &name).unwrap();

    assert!(db.list_indexes("users").unwrap().is_empty());
    let out = db.find("users", &Filter::Eq("age".into(), Value::Int(22)), &ironbase::FindOptions::default()).unwrap();
    assert_eq!(out.len(), 1);
}

#[test]
fn updating_an_indexed_field_keeps_the_index_consistent() {
    let dir = tempdir().unwrap();
    let mut db = fresh(dir.path());
    let id = db.insert_one("users", doc! { "email".to_string() => Value::Str("r@x.com".into()) }).unwrap();
    let name = db.create_index("users", "email", true).unwrap();

    db.update_one("users", &Filter::Eq("_id".into(), id.value().clone()), &[UpdateOp::Set("email".into(), Value::Str("s@x.com".into()))]).unwrap();

    let old = db.find_with_hint("users", &Filter::Eq("email".into(), Value::Str("r@x.com".into())), &name).unwrap();
    let new = db.find_with_hint("users", &Filter::Eq("email".into(), Value::Str("s@x.com".into())), &name).unwrap();
    assert!(old.is_empty());
    assert_eq!(new.len(), 1);

    // The old key is free again once the index no longer points at it.
    db.insert_one("users", doc! { "email".to_string() => Value::Str("r@x.com".into()) }).unwrap();
}

#[test]
fn dropping_a_document_removes_it_from_every_index() {
    let dir = tempdir().unwrap();
    let mut db = fresh(dir.path());
    let id = db.insert_one("users", doc! { "email".to_string() => Value::Str("t@x.com".into()) }).unwrap();
    let name = db.create_index("users", "email", true).unwrap();

    db.delete_one("users", &Filter::Eq("_id".into(), id.value().clone())).unwrap();
    let found = db.find_with_hint("users", &Filter::Eq("email".into(), Value::Str("t@x.com".into())), &name).unwrap();
    assert!(found.is_empty());

    db.insert_one("users", doc! { "email".to_string() => Value::Str("t@x.com".into()) }).unwrap();
}

#[test]
fn creating_a_unique_index_over_existing_duplicates_fails() {
    let dir = tempdir().unwrap();
    let mut db = fresh(dir.path());
    db.insert_one("users", doc! { "email".to_string() => Value::Str("u@x.com".into()) }).unwrap();
    db.insert_one("users", doc! { "email".to_string() => Value::Str("u@x.com".into()) }).unwrap();

    let err = db.create_index("users", "email", true);
    assert!(err.is_err());
    // The failed build must not leave a partial index file registered.
    assert!(db.list_indexes("users").unwrap().is_empty());
}
