//! Checkpoint persistence tests.
//!
//! Tests cover: save/load round trip, shutdown reset on load, the
//! not-found / parse / I-O split, and replace-by-rename.

use workshop_core::{
    checkpoint::{self, CheckpointStore},
    clock::{compute_open, SimClock},
    error::CheckpointError,
};

#[test]
fn round_trip_preserves_minutes_and_clears_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clock.state");

    for minutes in [0u64, 50, 479, 480, 959, 1439, 10_000_000, u64::MAX] {
        let clock = SimClock::new(minutes);
        checkpoint::save(&clock, &path).expect("save");

        let mut restored = SimClock::new(3);
        restored.request_shutdown();
        let loaded = checkpoint::load(&mut restored, &path).expect("load");

        assert_eq!(loaded, minutes);
        assert_eq!(restored.sim_minutes(), minutes);
        assert!(!restored.shutdown_requested());
        assert_eq!(restored.is_open_now(), compute_open(minutes));
    }
}

#[test]
fn file_is_a_single_decimal_line() {
    let dir = tempfile::tempdir().unwrap();
    let store = CheckpointStore::new(dir.path().join("clock.state"));
    store.save(&SimClock::new(1234)).unwrap();

    let content = std::fs::read_to_string(store.path()).unwrap();
    assert_eq!(content, "1234\n");
}

#[test]
fn save_replaces_without_leftovers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clock.state");
    std::fs::write(&path, "999999 stale trailing data\n").unwrap();

    checkpoint::save(&SimClock::new(7), &path).unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "7\n");
    let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 1, "temp file left behind");
}

#[test]
fn missing_file_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let mut clock = SimClock::new(42);

    let err = checkpoint::load(&mut clock, &dir.path().join("absent.state")).unwrap_err();
    assert!(err.is_not_found(), "got {err:?}");
    assert_eq!(clock.sim_minutes(), 42, "clock must be untouched on failure");
}

#[test]
fn non_numeric_content_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clock.state");
    std::fs::write(&path, "twelve o'clock\n").unwrap();

    let mut clock = SimClock::new(42);
    let err = checkpoint::load(&mut clock, &path).unwrap_err();
    assert!(matches!(err, CheckpointError::Parse { .. }), "got {err:?}");
    assert!(!err.is_not_found());
    assert_eq!(clock.sim_minutes(), 42);
}

#[test]
fn empty_file_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clock.state");
    std::fs::write(&path, "").unwrap();

    let err = checkpoint::read(&path).unwrap_err();
    assert!(matches!(err, CheckpointError::Parse { .. }), "got {err:?}");
}

#[test]
fn save_into_missing_directory_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("no-such-dir").join("clock.state");

    let err = checkpoint::save(&SimClock::new(1), &path).unwrap_err();
    assert!(matches!(err, CheckpointError::Io { .. }), "got {err:?}");
}
