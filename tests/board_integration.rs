use std::collections::HashSet;
use std::sync::{Arc, Barrier};

use chrono::{Duration, TimeZone, Utc};
use tempfile::tempdir;

use chatboard::clock::ManualClock;
use chatboard::config::BoardConfig;
use chatboard::error::ChatError;
use chatboard::model::{MessageKind, PresenceEntry};
use chatboard::store::board::ChatBoard;
use chatboard::store::document::{self, DocumentStore, FsDocumentStore};
use chatboard::store::lock::FileGate;
use chatboard::store::roster::USERS_KEY;

fn assert_strictly_increasing(ids: &[u64]) {
    assert!(
        ids.windows(2).all(|w| w[0] < w[1]),
        "ids not strictly increasing: {ids:?}"
    );
}

#[test]
fn concurrent_senders_across_board_handles_lose_nothing() {
    let dir = tempdir().unwrap();
    let config = BoardConfig::new(dir.path());
    ChatBoard::open(config.clone()).unwrap();

    let threads = 8;
    let per_thread = 15;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let config = config.clone();
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                // Each worker opens its own board, like separate request processes.
                let board = ChatBoard::open(config).unwrap();
                barrier.wait();
                (0..per_thread)
                    .map(|i| {
                        board
                            .ledger()
                            .append(&format!("user{t}"), &format!("msg {t}-{i}"), MessageKind::User)
                            .unwrap()
                            .id
                    })
                    .collect::<Vec<u64>>()
            })
        })
        .collect();

    let mut returned = HashSet::new();
    for h in handles {
        let ids = h.join().unwrap();
        assert_strictly_increasing(&ids);
        returned.extend(ids);
    }

    let board = ChatBoard::open(config).unwrap();
    let stored = board.messages();
    assert_eq!(stored.len(), threads * per_thread);
    assert_eq!(returned.len(), threads * per_thread);
    let stored_ids: Vec<u64> = stored.iter().map(|m| m.id).collect();
    assert_strictly_increasing(&stored_ids);
    assert_eq!(stored_ids.iter().copied().collect::<HashSet<_>>(), returned);
}

#[test]
fn concurrent_joins_with_same_name_admit_exactly_one() {
    let dir = tempdir().unwrap();
    let config = BoardConfig::new(dir.path());
    ChatBoard::open(config.clone()).unwrap();

    let threads = 6;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let config = config.clone();
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                let board = ChatBoard::open(config).unwrap();
                barrier.wait();
                board.roster().join("alice")
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, ChatError::NameTaken(_)))
    );

    let board = ChatBoard::open(config).unwrap();
    assert_eq!(board.presence().len(), 1);
}

#[test]
fn in_memory_ledger_caps_at_retention_limit() {
    let board = Arc::new(ChatBoard::in_memory(BoardConfig::new("/mem")));
    let threads = 4;
    let per_thread = 260;

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let board = Arc::clone(&board);
            std::thread::spawn(move || {
                for i in 0..per_thread {
                    board
                        .ledger()
                        .append("load", &format!("{t}-{i}"), MessageKind::User)
                        .unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let stored = board.messages();
    assert_eq!(stored.len(), 1000);
    let ids: Vec<u64> = stored.iter().map(|m| m.id).collect();
    assert_strictly_increasing(&ids);
    assert_eq!(board.ledger().query(0).len(), 50);
}

#[test]
fn expired_presence_is_pruned_from_persisted_roster() {
    let dir = tempdir().unwrap();
    let config = BoardConfig::new(dir.path());
    std::fs::create_dir_all(&config.data_dir).unwrap();

    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap(),
    ));
    let board = ChatBoard::from_parts(
        config.clone(),
        Box::new(FsDocumentStore),
        Box::new(FileGate::new(config.lock_path())),
        Box::new(Arc::clone(&clock)),
    );
    board.ensure_documents().unwrap();

    let now = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
    let stale = PresenceEntry {
        name: "ghost".into(),
        joined_at: now - Duration::minutes(5),
        last_seen: now - Duration::seconds(31),
    };
    document::write_sequence(&FsDocumentStore, &config.users_path(), USERS_KEY, &[stale]).unwrap();
    board.roster().join("alice").unwrap();

    assert_eq!(board.roster().prune_and_list_active().unwrap(), vec!["alice"]);
    let raw = FsDocumentStore.read(&config.users_path());
    let names: Vec<&str> = raw["users"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["alice"]);

    clock.advance(Duration::seconds(30));
    assert!(board.roster().prune_and_list_active().unwrap().is_empty());
    board.roster().join("alice").unwrap();
}

#[test]
fn readers_never_observe_a_torn_document() {
    let dir = tempdir().unwrap();
    let config = BoardConfig::new(dir.path());
    let board = Arc::new(ChatBoard::open(config.clone()).unwrap());

    let writer = {
        let board = Arc::clone(&board);
        std::thread::spawn(move || {
            for i in 0..60 {
                board
                    .ledger()
                    .append("writer", &"x".repeat(200 + i), MessageKind::User)
                    .unwrap();
            }
        })
    };

    let mut last_len = 0;
    while !writer.is_finished() {
        let raw = std::fs::read_to_string(config.messages_path()).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&raw).expect("complete JSON image");
        let len = doc["messages"].as_array().unwrap().len();
        assert!(len >= last_len);
        last_len = len;
    }
    writer.join().unwrap();
    assert_eq!(board.messages().len(), 60);
}
