//! AdminStore open, upgrade and refresh tests

use replica_admin_core::{Error, ReplicaId, Timestamp, UploadState};
use replica_admin_durability::FormatVersion;
use replica_admin_engine::{AccessMode, AdminStore};
use tempfile::TempDir;

#[test]
fn test_read_write_upgrades_legacy_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("admin.data");
    std::fs::write(&path, "0.3\nf1.arc c1 BA1 UPLOAD_COMPLETED BA2 UPLOAD_STARTED\n").unwrap();

    let store = AdminStore::open(temp_dir.path()).unwrap();
    assert_eq!(store.last_load_stats().unwrap().version, FormatVersion::Legacy);
    assert_eq!(store.state("f1.arc", "BA1").unwrap(), UploadState::UploadCompleted);

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.starts_with("0.4\nf1.arc c1 UPLOAD_STARTED "));

    // appends after the upgrade are current-version lines
    store
        .set_replica_state(
            "f1.arc",
            ReplicaId::new("BA2").unwrap(),
            UploadState::UploadCompleted,
            Timestamp::from_millis(500),
        )
        .unwrap();
    drop(store);

    let store = AdminStore::open(temp_dir.path()).unwrap();
    assert_eq!(store.last_load_stats().unwrap().version, FormatVersion::Current);
    assert_eq!(store.state("f1.arc", "BA2").unwrap(), UploadState::UploadCompleted);
}

#[test]
fn test_read_only_never_upgrades() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("admin.data");
    let legacy = "0.3\nf1.arc c1 BA1 UPLOAD_COMPLETED\n";
    std::fs::write(&path, legacy).unwrap();

    let store = AdminStore::open_read_only(temp_dir.path()).unwrap();
    assert_eq!(store.mode(), AccessMode::ReadOnly);
    assert!(store.has_entry("f1.arc"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), legacy);
}

#[test]
fn test_unsupported_version_fails_open() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("admin.data"), "2.0\n").unwrap();
    match AdminStore::open(temp_dir.path()) {
        Err(Error::Format(msg)) => assert!(msg.contains("2.0")),
        Err(other) => panic!("unexpected error {:?}", other),
        Ok(_) => panic!("open must fail"),
    }
}

#[test]
fn test_conflicting_lines_drop_entry_on_open() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(
        temp_dir.path().join("admin.data"),
        "0.4\nf1.arc A UPLOAD_STARTED 1\nf1.arc B UPLOAD_STARTED 2\nf2.arc C UPLOAD_STARTED 3\n",
    )
    .unwrap();
    let store = AdminStore::open_read_only(temp_dir.path()).unwrap();
    assert!(!store.has_entry("f1.arc"));
    assert!(store.has_entry("f2.arc"));
    assert_eq!(store.last_load_stats().unwrap().conflicts, 1);
}

#[test]
fn test_read_only_refresh_follows_writer() {
    let temp_dir = TempDir::new().unwrap();
    let writer = AdminStore::open(temp_dir.path()).unwrap();
    writer.put_entry("f1.arc", "c1", None).unwrap();

    let reader = AdminStore::open_read_only(temp_dir.path()).unwrap();
    assert_eq!(reader.len(), 1);
    assert!(!reader.refresh().unwrap());

    writer.put_entry("f2.arc", "c2", None).unwrap();
    writer
        .set_replica_state(
            "f2.arc",
            ReplicaId::new("BA1").unwrap(),
            UploadState::UploadFailed,
            Timestamp::from_millis(4),
        )
        .unwrap();

    // appends grow the file, so the change is seen even within one mtime tick
    assert!(reader.refresh().unwrap());
    assert_eq!(reader.len(), 2);
    assert_eq!(reader.state("f2.arc", "BA1").unwrap(), UploadState::UploadFailed);
    assert!(!reader.refresh().unwrap());

    // a writer store never reloads
    assert!(!writer.refresh().unwrap());
}

mod reopen_props {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Put(u8),
        Report(u8, u8, UploadState, u64),
        Remove(u8),
        Correct(u8),
        Checkpoint,
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        let state = prop::sample::select(UploadState::ALL.to_vec());
        prop_oneof![
            4 => (0u8..6).prop_map(Op::Put),
            6 => (0u8..6, 0u8..3, state, 0u64..1_000)
                .prop_map(|(f, r, s, t)| Op::Report(f, r, s, t)),
            1 => (0u8..6).prop_map(Op::Remove),
            1 => (0u8..6).prop_map(Op::Correct),
            1 => Just(Op::Checkpoint),
        ]
    }

    fn filename(i: u8) -> String {
        format!("f{}.arc", i)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        /// Whatever mix of journal appends and snapshot rewrites produced the
        /// admin file, reopening yields the same registry.
        #[test]
        fn reopen_restores_registry(ops in prop::collection::vec(arb_op(), 0..40)) {
            let temp_dir = TempDir::new().unwrap();
            let store = AdminStore::open(temp_dir.path()).unwrap();
            for op in ops {
                match op {
                    Op::Put(f) => {
                        let _ = store.put_entry(&filename(f), "chk", None);
                    }
                    Op::Report(f, r, s, t) => {
                        let replica = ReplicaId::new(format!("BA{}", r)).unwrap();
                        let _ = store.set_replica_state(&filename(f), replica, s, Timestamp::from_millis(t));
                    }
                    Op::Remove(f) => {
                        store.remove_entry(&filename(f)).unwrap();
                    }
                    Op::Correct(f) => {
                        let _ = store.correct_checksum(&filename(f), "fixed");
                    }
                    Op::Checkpoint => store.checkpoint().unwrap(),
                }
            }
            let before: Vec<_> = {
                let mut names: Vec<String> = store.all_filenames().into_iter().collect();
                names.sort();
                names.iter().map(|n| store.entry(n).unwrap()).collect()
            };
            drop(store);

            let reopened = AdminStore::open_read_only(temp_dir.path()).unwrap();
            prop_assert!(reopened.last_load_stats().unwrap().is_clean());
            prop_assert_eq!(reopened.len(), before.len());
            for entry in before {
                let loaded = reopened.entry(entry.filename()).unwrap();
                prop_assert_eq!(loaded.checksum(), entry.checksum());
                for record in entry.replica_records() {
                    let id = record.replica_id().as_str();
                    prop_assert_eq!(loaded.replica_record(id).unwrap(), record);
                }
                prop_assert_eq!(loaded.replica_count(), entry.replica_count());
            }
        }
    }
}
