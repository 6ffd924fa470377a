// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use rp_core::test_support::workspace;
use tempfile::tempdir;

fn tables() -> Tables {
    let mut tables = Tables::default();
    tables
        .workspaces
        .insert("ws-1".into(), workspace("ws-1"));
    tables
}

#[test]
fn save_and_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("snapshot.zst");

    let size = Snapshot::new(7, tables()).save(&path).unwrap();
    assert!(size > 0);

    let loaded = Snapshot::load(&path).unwrap().unwrap();
    assert_eq!(loaded.version, 7);
    assert_eq!(loaded.tables, tables());
    assert!(!path.with_extension("tmp").exists());
}

#[test]
fn saved_file_is_zstd() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("snapshot.zst");
    Snapshot::new(1, tables()).save(&path).unwrap();
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[..4], &ZSTD_MAGIC);
}

#[test]
fn plain_json_snapshot_still_loads() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("snapshot.json");
    let json = serde_json::to_vec(&Snapshot::new(3, tables())).unwrap();
    std::fs::write(&path, json).unwrap();
    assert_eq!(Snapshot::load(&path).unwrap().unwrap().version, 3);
}

#[test]
fn missing_snapshot_is_none() {
    let dir = tempdir().unwrap();
    assert!(Snapshot::load(&dir.path().join("nope.zst")).unwrap().is_none());
}

#[test]
fn corrupt_snapshot_moves_to_bak() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("snapshot.zst");
    std::fs::write(&path, b"not a snapshot").unwrap();

    assert!(Snapshot::load(&path).unwrap().is_none());
    assert!(!path.exists());
    assert!(path.with_extension("bak").exists());
}

#[yare::parameterized(
    one = { 1, &["bak"] },
    two = { 2, &["bak", "bak.2"] },
    three = { 3, &["bak", "bak.2", "bak.3"] },
    oldest_dropped = { 5, &["bak", "bak.2", "bak.3"] },
)]
fn bak_files_rotate(corrupt_loads: usize, kept: &[&str]) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("snapshot.zst");
    for _ in 0..corrupt_loads {
        std::fs::write(&path, b"garbage").unwrap();
        assert!(Snapshot::load(&path).unwrap().is_none());
    }
    for ext in ["bak", "bak.2", "bak.3", "bak.4"] {
        assert_eq!(
            path.with_extension(ext).exists(),
            kept.contains(&ext),
            "{ext} after {corrupt_loads} corrupt loads"
        );
    }
}
