//! Multi-threaded AdminStore tests
//!
//! Concurrent state reports from many threads must serialize: every report
//! lands, the secondary index agrees with a scan, and the journal replays to
//! the same state.

use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

use replica_admin_core::{ReplicaId, Timestamp, UploadState};
use replica_admin_engine::AdminStore;
use tempfile::TempDir;

const FILES: usize = 16;
const REPLICAS: usize = 4;

fn filename(i: usize) -> String {
    format!("file-{:02}.arc", i)
}

fn replica(i: usize) -> ReplicaId {
    ReplicaId::new(format!("BA{}", i)).unwrap()
}

// ============================================================================
// Concurrent writers
// ============================================================================

/// Test: one thread per replica reports every file; all reports land
#[test]
fn test_parallel_reports_all_land() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(AdminStore::open(temp_dir.path()).unwrap());
    for i in 0..FILES {
        store.put_entry(&filename(i), "chk", None).unwrap();
    }

    let barrier = Arc::new(Barrier::new(REPLICAS));
    let handles: Vec<_> = (0..REPLICAS)
        .map(|r| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..FILES {
                    for (t, state) in [UploadState::DataUploaded, UploadState::UploadCompleted]
                        .into_iter()
                        .enumerate()
                    {
                        store
                            .set_replica_state(
                                &filename(i),
                                replica(r),
                                state,
                                Timestamp::from_millis(t as u64 + 1),
                            )
                            .unwrap();
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let all: HashSet<String> = (0..FILES).map(filename).collect();
    for r in 0..REPLICAS {
        let name = replica(r);
        assert_eq!(
            store.filenames_with_state(name.as_str(), UploadState::UploadCompleted),
            all
        );
        assert!(store
            .filenames_with_state(name.as_str(), UploadState::DataUploaded)
            .is_empty());
    }
    assert!(store.report().incomplete_files.is_empty());

    // The journal replays to the same state.
    drop(store);
    let reopened = AdminStore::open(temp_dir.path()).unwrap();
    let stats = reopened.last_load_stats().unwrap();
    assert!(stats.is_clean());
    assert_eq!(stats.lines_read, FILES + FILES * REPLICAS * 2);
    for r in 0..REPLICAS {
        assert_eq!(
            reopened.filenames_with_state(replica(r).as_str(), UploadState::UploadCompleted),
            all
        );
    }
}

/// Test: readers running alongside a writer only see whole mutations
#[test]
fn test_readers_never_see_partial_entries() {
    let store = Arc::new(AdminStore::ephemeral());
    let barrier = Arc::new(Barrier::new(3));

    let writer = {
        let store = Arc::clone(&store);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            for i in 0..200 {
                let name = filename(i);
                store.put_entry(&name, "chk", None).unwrap();
                store
                    .set_replica_state(&name, replica(0), UploadState::UploadCompleted, Timestamp::EPOCH)
                    .unwrap();
                if i % 3 == 0 {
                    store.remove_entry(&name).unwrap();
                }
            }
        })
    };

    let readers: Vec<_> = (0..2)
        .map(|_| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..200 {
                    let view = store.view();
                    for name in view.filenames_with_state("BA0", UploadState::UploadCompleted) {
                        let entry = view.entry(&name).unwrap();
                        assert!(entry.has_replica_record("BA0"));
                    }
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for r in readers {
        r.join().unwrap();
    }
    assert_eq!(store.len(), 200 - (0..200).filter(|i| i % 3 == 0).count());
}

/// Test: concurrent registrations of the same file; exactly one wins
#[test]
fn test_duplicate_registration_race() {
    let store = Arc::new(AdminStore::ephemeral());
    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|n| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store.put_entry("same.arc", &format!("chk{}", n), None).is_ok()
            })
        })
        .collect();
    let wins = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(wins, 1);
    assert_eq!(store.len(), 1);
}
