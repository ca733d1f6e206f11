//! Tests for score persistence.

use socratic_shared::score_store::{checksum, ScoreStore, StoredScore, SCORE_FILE};
use std::fs;

#[test]
fn test_save_then_load() {
    let dir = tempfile::tempdir().unwrap();
    let store = ScoreStore::new(dir.path());
    store.save(4.2).unwrap();
    assert_eq!(store.load(), 4.2);
    assert!(dir.path().join(SCORE_FILE).exists());
    assert!(!dir.path().join("score.json.tmp").exists());
}

#[test]
fn test_creates_state_dir() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("state").join("socratic");
    let store = ScoreStore::new(&nested);
    store.save(-1.4).unwrap();
    assert_eq!(store.load(), -1.4);
}

#[test]
fn test_tampered_score_loads_as_zero() {
    let dir = tempfile::tempdir().unwrap();
    let store = ScoreStore::new(dir.path());
    store.save(1.0).unwrap();

    let text = fs::read_to_string(store.path()).unwrap();
    let mut stored: StoredScore = serde_json::from_str(&text).unwrap();
    stored.score = 99.0;
    fs::write(store.path(), serde_json::to_string(&stored).unwrap()).unwrap();

    assert_eq!(store.load(), 0.0);
}

#[test]
fn test_garbage_file_loads_as_zero() {
    let dir = tempfile::tempdir().unwrap();
    let store = ScoreStore::new(dir.path());
    fs::write(store.path(), "not json").unwrap();
    assert_eq!(store.load(), 0.0);
}

#[test]
fn test_reset_writes_zero() {
    let dir = tempfile::tempdir().unwrap();
    let store = ScoreStore::new(dir.path());
    store.save(12.6).unwrap();
    store.reset().unwrap();
    assert_eq!(store.load(), 0.0);

    let stored: StoredScore =
        serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
    assert_eq!(stored.checksum, checksum(0.0));
}
