// Concurrent claims on one task must produce exactly one winner, with the
// storage layer as the only serialization point. Each thread opens its own
// connection to the same database file, as separate scheduler processes would.

use std::sync::{Arc, Barrier};

use chrono::Utc;
use rusqlite::Connection;
use taskmill_store::TaskStore;

const WORKERS: usize = 8;

#[test]
fn concurrent_claims_have_exactly_one_winner() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("claims.db");

    let setup = TaskStore::new(Connection::open(&db_path).unwrap()).unwrap();
    let task = setup.insert("pwd", Utc::now()).unwrap();

    let barrier = Arc::new(Barrier::new(WORKERS));
    let mut handles = Vec::new();

    for worker in 0..WORKERS {
        let barrier = Arc::clone(&barrier);
        let db_path = db_path.clone();
        let task_id = task.id.clone();
        handles.push(std::thread::spawn(move || {
            let store = TaskStore::new(Connection::open(&db_path).unwrap()).unwrap();
            let token = format!("worker-{worker}");
            barrier.wait();
            store.try_claim(&task_id, &token, Utc::now()).unwrap()
        }));
    }

    let wins: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(wins.iter().filter(|&&won| won).count(), 1);

    // The stored record names the single winner.
    let fetched = setup.get(&task.id).unwrap();
    let winner_idx = wins.iter().position(|&won| won).unwrap();
    assert_eq!(
        fetched.picked_by.as_deref(),
        Some(format!("worker-{winner_idx}").as_str())
    );
}

#[test]
fn losing_a_claim_has_no_side_effects() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("claims.db");

    let store = TaskStore::new(Connection::open(&db_path).unwrap()).unwrap();
    let now = Utc::now();
    let task = store.insert("pwd", now).unwrap();

    assert!(store.try_claim(&task.id, "winner", now).unwrap());
    let before = store.get(&task.id).unwrap();

    let loser = TaskStore::new(Connection::open(&db_path).unwrap()).unwrap();
    assert!(!loser.try_claim(&task.id, "loser", Utc::now()).unwrap());

    let after = store.get(&task.id).unwrap();
    assert_eq!(before.picked_at, after.picked_at);
    assert_eq!(after.picked_by.as_deref(), Some("winner"));
}
