//! Multi-document transactions (§4.8): buffered writes across several
//! collections become visible all at once on commit, not one at a time,
//! and rollback leaves the database exactly as it was.

use ironbase::{DurabilityMode, Engine, Filter, Value, doc};
use tempfile::tempdir;

#[test]
fn a_transaction_spans_multiple_collections_atomically() {
    let dir = tempdir().unwrap();
    let mut db = Engine::open(dir.path().join("store.ironbase"), DurabilityMode::Safe).unwrap();
    db.create_collection("accounts").unwrap();
    db.create_collection("ledger").unwrap();

    let tx = db.begin_transaction();
    db.insert_one_tx(tx, "accounts", doc! { "owner".to_string() => Value::Str("uma".into()), "balance".to_string() => Value::Int(100) }).unwrap();
    db.insert_one_tx(tx, "ledger", doc! { "note".to_string() => Value::Str("opening balance".into()) }).unwrap();
    db.commit_transaction(tx).unwrap();

    assert_eq!(db.count_documents("accounts", &Filter::MatchAll).unwrap(), 1);
    assert_eq!(db.count_documents("ledger", &Filter::MatchAll).unwrap(), 1);
}

#[test]
fn deletes_inside_a_transaction_only_apply_on_commit() {
    let dir = tempdir().unwrap();
    let mut db = Engine::open(dir.path().join("store.ironbase"), DurabilityMode::Safe).unwrap();
    db.create_collection("users").unwrap();
    let id = db.insert_one("users", doc! { "name".to_string() => Value::Str("vik".into()) }).unwrap();

    let tx = db.begin_transaction();
    db.delete_one_tx(tx, "users", id.clone()).unwrap();
    assert_eq!(db.count_documents("users", &Filter::MatchAll).unwrap(), 1, "uncommitted delete must not be visible yet");

    db.commit_transaction(tx).unwrap();
    assert_eq!(db.count_documents("users", &Filter::MatchAll).unwrap(), 0);
}

#[test]
fn committing_a_transaction_with_a_duplicate_key_fails_and_applies_nothing() {
    let dir = tempdir().unwrap();
    let mut db = Engine::open(dir.path().join("store.ironbase"), DurabilityMode::Safe).unwrap();
    db.create_collection("users").unwrap();
    db.insert_one("users", doc! { "_id".to_string() => Value::Int(1) }).unwrap();

    let tx = db.begin_transaction();
    db.insert_one_tx(tx, "users", doc! { "name".to_string() => Value::Str("w".into()) }).unwrap();
    db.insert_one_tx(tx, "users", doc! { "_id".to_string() => Value::Int(1) }).unwrap();

    let err = db.commit_transaction(tx);
    assert!(err.is_err());

    // Since `resolve_tx_op` validates every buffered op before logging or
    // applying any of them, the first (non-conflicting) insert must not
    // have landed either.
    assert_eq!(db.count_documents("users", &Filter::MatchAll).unwrap(), 1);
}

#[test]
fn operating_on_an_already_committed_transaction_handle_errors() {
    let dir = tempdir().unwrap();
    let mut db = Engine::open(dir.path().join("store.ironbase"), DurabilityMode::Safe).unwrap();
    db.create_collection("users").unwrap();

    let tx = db.begin_transaction();
    db.insert_one_tx(tx, "users", doc! { "name".to_string() => Value::Str("xan".into()) }).unwrap();
    db.commit_transaction(tx).unwrap();

    let err = db.insert_one_tx(tx, "users", doc! { "name".to_string() => Value::Str("again".into()) });
    assert!(matches!(err, Err(ironbase::DbError::TransactionClosed(_))));
}

#[test]
fn unknown_transaction_handle_errors_on_commit() {
    let dir = tempdir().unwrap();
    let mut db = Engine::open(dir.path().join("store.ironbase"), DurabilityMode::Safe).unwrap();
    db.create_collection("users").unwrap();
    assert!(matches!(db.commit_transaction(999), Err(ironbase::DbError::TransactionNotFound(999))));
}
