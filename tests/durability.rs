//! Durability modes (§4.9): data that made it into the WAL survives a
//! reopen regardless of mode, since replay only needs the frames to be on
//! disk — `Safe`/`Batch`/`Unsafe` only change *when* `fsync` happens, not
//! whether writes eventually land in the file.

use ironbase::{DurabilityMode, Engine, Filter, Value, doc};
use tempfile::tempdir;

#[test]
fn batch_mode_defers_fsync_but_checkpoint_still_flushes_durably() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.ironbase");
    {
        let mut db = Engine::open(&path, DurabilityMode::Batch(100)).unwrap();
        db.create_collection("users").unwrap();
        for n in 0..5 {
            db.insert_one("users", doc! { "n".to_string() => Value::Int(n) }).unwrap();
        }
        db.checkpoint().unwrap();
    }
    let mut reopened = Engine::open(&path, DurabilityMode::Safe).unwrap();
    assert_eq!(reopened.count_documents("users", &Filter::MatchAll).unwrap(), 5);
}

#[test]
fn switching_durability_mode_at_runtime_is_reflected_in_stats() {
    let dir = tempdir().unwrap();
    let mut db = Engine::open(dir.path().join("store.ironbase"), DurabilityMode::Safe).unwrap();
    assert_eq!(db.stats().durability_mode, DurabilityMode::Safe);
    db.set_durability_mode(DurabilityMode::Unsafe);
    assert_eq!(db.stats().durability_mode, DurabilityMode::Unsafe);
}

#[test]
fn unsafe_mode_writes_are_still_present_after_an_explicit_checkpoint() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.ironbase");
    {
        let mut db = Engine::open(&path, DurabilityMode::Unsafe).unwrap();
        db.create_collection("users").unwrap();
        db.insert_one("users", doc! { "name".to_string() => Value::Str("quin".into()) }).unwrap();
        db.checkpoint().unwrap();
    }
    let mut reopened = Engine::open(&path, DurabilityMode::Unsafe).unwrap();
    assert_eq!(reopened.count_documents("users", &Filter::MatchAll).unwrap(), 1);
}
