//! End-to-end tests for colbridge-core against the in-memory store.

use bytes::Bytes;
use colbridge_core::config::RowGrouping;
use colbridge_core::request::{AtomicIncrementRequest, RowLock, RowLockRequest};
use colbridge_core::store::{MemoryStore, ScanRange};
use colbridge_core::{
    Capability, Cell, DeleteRequest, Error, GetRequest, PutRequest, RowGroup, StoreClient,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn create_client(tables: &[&str]) -> (Arc<MemoryStore>, StoreClient) {
    let store = Arc::new(MemoryStore::with_tables(tables.iter().copied()));
    let client = StoreClient::builder(store.clone())
        .with_flush_interval(Duration::from_secs(3600))
        .build();
    (store, client)
}

mod write_read {
    use super::*;

    #[test]
    fn test_put_flush_get_scenario() {
        let (_store, client) = create_client(&["metrics"]);

        client
            .put(&PutRequest::new("metrics", "ts1", "cf", "q", 100, vec![1u8, 2, 3]))
            .unwrap();
        client.flush().unwrap();

        let cells = client
            .get(&GetRequest::new("metrics", "ts1", "cf", ["q"]))
            .unwrap();
        assert_eq!(cells, vec![Cell::new("ts1", "cf", "q", 100, vec![1u8, 2, 3])]);
    }

    #[test]
    fn test_round_trip_binary_keys() {
        let (_store, client) = create_client(&["tsdb"]);
        let samples: Vec<(Vec<u8>, Vec<u8>, i64, Vec<u8>)> = vec![
            (vec![0, 0, 1, 0x50, 0x00], vec![0x00, 0x10], 0, vec![]),
            (vec![0xff; 12], vec![0xf0, 0x0b], i64::MAX, vec![7; 64]),
            (b"row with spaces".to_vec(), b"q\0q".to_vec(), -5, b"v".to_vec()),
        ];

        for (row, qualifier, ts, value) in &samples {
            client
                .put(&PutRequest::new(
                    "tsdb",
                    row.clone(),
                    "t",
                    qualifier.clone(),
                    *ts,
                    value.clone(),
                ))
                .unwrap();
        }
        client.flush().unwrap();

        for (row, qualifier, ts, value) in samples {
            let cells = client
                .get(&GetRequest::new("tsdb", row.clone(), "t", [qualifier.clone()]))
                .unwrap();
            assert_eq!(cells, vec![Cell::new(row, "t", qualifier, ts, value)]);
        }
    }

    #[test]
    fn test_delete_removes_only_targeted_qualifiers() {
        let (_store, client) = create_client(&["metrics"]);
        client
            .put(&PutRequest::new("metrics", "r", "f", "q1", 1, "one"))
            .unwrap();
        client
            .put(&PutRequest::new("metrics", "r", "f", "q2", 1, "two"))
            .unwrap();
        client
            .delete(&DeleteRequest::new("metrics", "r", "f", ["q1"]))
            .unwrap();
        client.flush().unwrap();

        let cells = client
            .get(&GetRequest::new("metrics", "r", "f", ["q1", "q2"]))
            .unwrap();
        assert_eq!(cells, vec![Cell::new("r", "f", "q2", 1, "two")]);
    }

    #[test]
    fn test_writes_interleave_across_tables() {
        let (store, client) = create_client(&["tsdb", "tsdb-uid"]);
        for i in 0..10 {
            let table = if i % 2 == 0 { "tsdb" } else { "tsdb-uid" };
            client
                .put(&PutRequest::new(table, format!("r{}", i), "f", "q", i, "v"))
                .unwrap();
        }
        client
            .delete(&DeleteRequest::new("tsdb", "r0", "f", ["q"]))
            .unwrap();
        client.flush().unwrap();

        assert_eq!(store.cells("tsdb").len(), 4);
        assert_eq!(store.cells("tsdb-uid").len(), 5);
        assert_eq!(client.buffer_stats().open_writers, 2);
    }
}

mod lifecycle {
    use super::*;

    #[test]
    fn test_interval_change_preserves_pending_writes() {
        let (_store, client) = create_client(&["metrics"]);
        client
            .put(&PutRequest::new("metrics", "ts1", "cf", "q", 5, "before"))
            .unwrap();

        client.set_flush_interval(Duration::from_millis(20)).unwrap();
        assert_eq!(client.flush_interval(), Duration::from_millis(20));
        client.flush().unwrap();

        let cells = client
            .get(&GetRequest::new("metrics", "ts1", "cf", ["q"]))
            .unwrap();
        assert_eq!(cells, vec![Cell::new("ts1", "cf", "q", 5, "before")]);
    }

    #[test]
    fn test_failed_interval_change_loses_nothing() {
        let (store, client) = create_client(&["metrics"]);
        client
            .put(&PutRequest::new("metrics", "ts1", "cf", "q", 100, "pending"))
            .unwrap();
        store.fail_writes("metrics", true);

        assert!(matches!(
            client.set_flush_interval(Duration::from_millis(10)),
            Err(Error::Flush { .. })
        ));
        assert_eq!(client.flush_interval(), Duration::from_secs(3600));

        store.fail_writes("metrics", false);
        client.flush().unwrap();

        let cells = client
            .get(&GetRequest::new("metrics", "ts1", "cf", ["q"]))
            .unwrap();
        assert_eq!(cells, vec![Cell::new("ts1", "cf", "q", 100, "pending")]);
    }

    #[test]
    fn test_shutdown_flushes_then_rejects() {
        let (store, client) = create_client(&["metrics"]);
        client
            .put(&PutRequest::new("metrics", "ts1", "cf", "q", 1, "v"))
            .unwrap();
        client.shutdown().unwrap();
        assert_eq!(store.cells("metrics").len(), 1);

        let put = client.put(&PutRequest::new("metrics", "ts2", "cf", "q", 1, "v"));
        let delete = client.delete(&DeleteRequest::new("metrics", "ts1", "cf", ["q"]));
        let flush = client.flush();
        assert!(matches!(put, Err(Error::BufferClosed)));
        assert!(matches!(delete, Err(Error::BufferClosed)));
        assert!(matches!(flush, Err(Error::BufferClosed)));

        // Nothing slipped through after shutdown.
        assert_eq!(store.cells("metrics"), vec![Cell::new("ts1", "cf", "q", 1, "v")]);
        // Reads are unaffected by a closed write path.
        assert_eq!(
            client
                .get(&GetRequest::new("metrics", "ts1", "cf", ["q"]))
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_failed_table_does_not_block_others() {
        let (store, client) = create_client(&["a", "b", "c"]);
        for table in ["a", "b", "c"] {
            client
                .put(&PutRequest::new(table, "r", "f", "q", 1, "v"))
                .unwrap();
        }
        store.fail_writes("b", true);

        match client.flush() {
            Err(Error::Flush {
                table,
                failed_tables,
                ..
            }) => {
                assert_eq!(table, "b");
                assert_eq!(failed_tables, 1);
            }
            other => panic!("expected flush failure, got {:?}", other),
        }
        assert_eq!(store.cells("a").len(), 1);
        assert_eq!(store.cells("c").len(), 1);
        assert!(store.cells("b").is_empty());

        // The caller retries once the table recovers.
        store.fail_writes("b", false);
        client.flush().unwrap();
        assert_eq!(store.cells("b").len(), 1);
    }

    #[test]
    fn test_concurrent_writers_with_interval_changes() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 200;

        let (store, client) = create_client(&["t0", "t1", "t2"]);
        let client = Arc::new(client);

        let writers: Vec<_> = (0..THREADS)
            .map(|t| {
                let client = Arc::clone(&client);
                thread::spawn(move || {
                    for i in 0..PER_THREAD {
                        let table = format!("t{}", (t + i) % 3);
                        client
                            .put(&PutRequest::new(
                                table,
                                format!("w{:02}-{:04}", t, i),
                                "f",
                                "q",
                                i as i64,
                                "v",
                            ))
                            .unwrap();
                    }
                })
            })
            .collect();

        let toggler = {
            let client = Arc::clone(&client);
            thread::spawn(move || {
                for i in 0..50u64 {
                    client
                        .set_flush_interval(Duration::from_millis(1 + i % 5))
                        .unwrap();
                    client.flush().unwrap();
                }
            })
        };

        for handle in writers {
            handle.join().unwrap();
        }
        toggler.join().unwrap();
        client.shutdown().unwrap();

        let total: usize = ["t0", "t1", "t2"]
            .iter()
            .map(|t| store.cells(t).len())
            .sum();
        assert_eq!(total, THREADS * PER_THREAD);
        assert_eq!(client.buffer_stats().mutations_staged, (THREADS * PER_THREAD) as u64);
    }
}

mod unsupported {
    use super::*;

    #[test]
    fn test_row_lock_and_increment_fail_without_side_effects() {
        let (store, client) = create_client(&["metrics"]);
        client
            .put(&PutRequest::new("metrics", "ctr", "f", "n", 1, "7"))
            .unwrap();
        client.flush().unwrap();
        let before = store.cells("metrics");
        let writers_before = store.writers_created();

        let lock = client.lock_row(&RowLockRequest {
            table: "metrics".into(),
            row: Bytes::from_static(b"ctr"),
        });
        assert!(matches!(lock, Err(Error::Unsupported(Capability::RowLock))));

        let unlock = client.unlock_row(RowLock {
            table: "metrics".into(),
            row: Bytes::from_static(b"ctr"),
            lock_id: 1,
        });
        assert!(matches!(unlock, Err(Error::Unsupported(Capability::RowLock))));

        let incr = client.atomic_increment(&AtomicIncrementRequest {
            table: "metrics".into(),
            row: Bytes::from_static(b"ctr"),
            family: Bytes::from_static(b"f"),
            qualifier: Bytes::from_static(b"n"),
            amount: 1,
        });
        assert!(matches!(
            incr,
            Err(Error::Unsupported(Capability::AtomicIncrement))
        ));

        client.flush().unwrap();
        assert_eq!(store.cells("metrics"), before);
        assert_eq!(store.writers_created(), writers_before);
        assert!(!client.supports(Capability::RowLock));
        assert!(!client.supports(Capability::AtomicIncrement));
    }
}

mod row_scans {
    use super::*;

    fn load_rows(client: &StoreClient) {
        let layout = [("R1", 3), ("R2", 1), ("R3", 2)];
        for (row, cells) in layout {
            for q in 0..cells {
                client
                    .put(&PutRequest::new(
                        "tsdb",
                        row,
                        "t",
                        format!("q{}", q),
                        100 + q as i64,
                        format!("{}-{}", row, q),
                    ))
                    .unwrap();
            }
        }
        client.flush().unwrap();
    }

    fn collect(client: &StoreClient) -> Vec<RowGroup> {
        client
            .scan_rows("tsdb", ScanRange::all())
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_row_groups_complete_and_contiguous() {
        let (store, client) = create_client(&["tsdb"]);
        load_rows(&client);

        let rows = collect(&client);
        let shape: Vec<(&[u8], usize)> = rows.iter().map(|g| (&g.row()[..], g.len())).collect();
        assert_eq!(
            shape,
            vec![(&b"R1"[..], 3), (&b"R2"[..], 1), (&b"R3"[..], 2)]
        );

        let flattened: Vec<Cell> = rows.into_iter().flatten().collect();
        assert_eq!(flattened, store.cells("tsdb"));
    }

    #[test]
    fn test_exhausted_scan() {
        let (_store, client) = create_client(&["tsdb"]);
        load_rows(&client);

        let mut rows = client.scan_rows("tsdb", ScanRange::all()).unwrap();
        let mut seen = 0;
        while rows.has_next() {
            rows.next_row().unwrap();
            seen += 1;
        }
        assert_eq!(seen, 3);
        assert!(!rows.has_next());
        assert!(matches!(rows.next_row(), Err(Error::IteratorExhausted)));
    }

    #[test]
    fn test_server_and_client_grouping_agree() {
        let store = Arc::new(MemoryStore::with_tables(["tsdb"]));
        let client = StoreClient::builder(store.clone())
            .with_grouping(RowGrouping::Client)
            .build();
        let server = StoreClient::builder(store.clone())
            .with_grouping(RowGrouping::Server)
            .build();
        load_rows(&client);
        client
            .put(&PutRequest::new("tsdb", "R2", "t", "q0", 50, "older"))
            .unwrap();
        client.flush().unwrap();

        assert_eq!(collect(&client), collect(&server));
    }

    #[test]
    fn test_range_and_column_restricted_scan() {
        let (_store, client) = create_client(&["tsdb"]);
        load_rows(&client);

        let mut scanner = client.new_scanner("tsdb").unwrap();
        scanner
            .set_range(ScanRange::between("R2", "R3"))
            .fetch_column("t", "q0");
        let rows: Vec<RowGroup> = client
            .rows(scanner)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|g| g.len() == 1));
        assert_eq!(rows[1].row().as_ref(), b"R3");
    }

    #[test]
    fn test_dropping_partial_scan_releases_handle() {
        let (store, client) = create_client(&["tsdb"]);
        load_rows(&client);

        let mut rows = client.scan_rows("tsdb", ScanRange::all()).unwrap();
        rows.next_row().unwrap();
        assert_eq!(store.open_scans(), 1);
        drop(rows);
        assert_eq!(store.open_scans(), 0);

        // Fully consumed scans release the handle before the adapter is dropped.
        let mut rows = client.scan_rows("tsdb", ScanRange::all()).unwrap();
        while rows.next().is_some() {}
        assert_eq!(store.open_scans(), 0);
    }

    #[test]
    fn test_large_scan_streams_rows() {
        let (_store, client) = create_client(&["tsdb"]);
        for r in 0..2_000 {
            for q in 0..3 {
                client
                    .put(&PutRequest::new(
                        "tsdb",
                        format!("row{:06}", r),
                        "t",
                        format!("q{}", q),
                        1,
                        "v",
                    ))
                    .unwrap();
            }
        }
        client.flush().unwrap();

        let mut count = 0;
        for group in client.scan_rows("tsdb", ScanRange::all()).unwrap() {
            assert_eq!(group.unwrap().len(), 3);
            count += 1;
        }
        assert_eq!(count, 2_000);
    }

    #[test]
    fn test_scan_of_missing_table_is_read_failure() {
        let (_store, client) = create_client(&["tsdb"]);
        assert!(matches!(
            client.scan_rows("nope", ScanRange::all()),
            Err(Error::Read { .. })
        ));
    }
}
