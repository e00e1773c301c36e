//! Crash-recovery scenarios: everything durably committed before an
//! unclean shutdown must come back after reopening, and a torn WAL tail
//! must not take the whole database down with it.

use ironbase::{DurabilityMode, Engine, Filter, Value, doc};
use std::fs::OpenOptions;
use std::io::Write;
use tempfile::tempdir;

#[test]
fn a_second_open_on_the_same_path_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.ironbase");
    let _first = Engine::open(&path, DurabilityMode::Safe).unwrap();
    let second = Engine::open(&path, DurabilityMode::Safe);
    assert!(matches!(second, Err(ironbase::DbError::AlreadyOpen(_))));
}

#[test]
fn committed_writes_survive_reopen_after_dropping_without_checkpoint() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.ironbase");
    {
        let mut db = Engine::open(&path, DurabilityMode::Safe).unwrap();
        db.create_collection("users").unwrap();
        db.insert_one("users", doc! { "name".to_string() => Value::Str("kai".into()) }).unwrap();
        db.update_many("users", &Filter::MatchAll, &[ironbase::UpdateOp::Set("tier".into(), Value::Str("gold".into()))]).unwrap();
        // Dropped here without calling checkpoint() or close() — simulates a
        // crash right after both writes' WAL frames were durably appended.
    }

    let mut reopened = Engine::open(&path, DurabilityMode::Safe).unwrap();
    let doc = reopened.find_one("users", &Filter::MatchAll).unwrap().unwrap();
    assert_eq!(doc.get("name"), Some(&Value::Str("kai".into())));
    assert_eq!(doc.get("tier"), Some(&Value::Str("gold".into())));
}

#[test]
fn a_transaction_that_never_committed_before_the_crash_leaves_no_trace_on_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.ironbase");
    {
        let mut db = Engine::open(&path, DurabilityMode::Safe).unwrap();
        db.create_collection("users").unwrap();
        let tx = db.begin_transaction();
        db.insert_one_tx(tx, "users", doc! { "name".to_string() => Value::Str("lost".into()) }).unwrap();
        // No commit_transaction call: the BeginTxn/ops/CommitTxn WAL frames
        // were never written in the first place, since commit is what emits
        // them (§4.8) — dropping here is indistinguishable from a crash
        // before the caller ever called commit.
    }

    let mut reopened = Engine::open(&path, DurabilityMode::Safe).unwrap();
    assert_eq!(reopened.count_documents("users", &Filter::MatchAll).unwrap(), 0);
}

#[test]
fn garbage_appended_after_the_last_good_wal_frame_is_ignored_on_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.ironbase");
    {
        let mut db = Engine::open(&path, DurabilityMode::Safe).unwrap();
        db.create_collection("users").unwrap();
        db.insert_one("users", doc! { "name".to_string() => Value::Str("mina".into()) }).unwrap();
    }

    let wal_path = {
        let mut s = path.as_os_str().to_os_string();
        s.push(".wal");
        std::path::PathBuf::from(s)
    };
    let mut f = OpenOptions::new().append(true).open(&wal_path).unwrap();
    f.write_all(&9999u32.to_le_bytes()).unwrap();
    f.write_all(b"not a real frame").unwrap();

    let mut reopened = Engine::open(&path, DurabilityMode::Safe).unwrap();
    let doc = reopened.find_one("users", &Filter::MatchAll).unwrap().unwrap();
    assert_eq!(doc.get("name"), Some(&Value::Str("mina".into())));
}

#[test]
fn a_write_after_a_checkpointed_reopen_does_not_clobber_the_trailer() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.ironbase");
    {
        let mut db = Engine::open(&path, DurabilityMode::Safe).unwrap();
        db.create_collection("users").unwrap();
        db.insert_one("users", doc! { "name".to_string() => Value::Str("nor".into()) }).unwrap();
        db.checkpoint().unwrap();
        // Reopen on top of a freshly checkpointed file: no WAL frames to
        // replay, so this handle's first append must resume past the
        // trailer `checkpoint()` just wrote, not on top of it.
    }
    {
        let mut db = Engine::open(&path, DurabilityMode::Safe).unwrap();
        db.insert_one("users", doc! { "name".to_string() => Value::Str("opal".into()) }).unwrap();
        // Dropped here without a second checkpoint — simulates a crash
        // right after this second insert's WAL frames were appended.
    }

    let mut reopened = Engine::open(&path, DurabilityMode::Safe).unwrap();
    assert_eq!(reopened.count_documents("users", &Filter::MatchAll).unwrap(), 2);
}
