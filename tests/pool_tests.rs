use std::time::{Duration, Instant};

use tabquery::config::PoolConfig;
use tabquery::error::TabError;
use tabquery::pool::ConnectionPool;
use tabquery::table::{Table, Value};
use tempfile::TempDir;

fn shared_table() -> Table {
    Table::new(["col1", "col2"])
        .row([Value::from(1), Value::from("a")])
        .row([Value::from(2), Value::from("b")])
        .row([Value::from(3), Value::from("c")])
}

fn pool_in(dir: &TempDir, size: usize, wait: Duration) -> ConnectionPool {
    let config = PoolConfig::default()
        .temp_dir(dir.path())
        .pool_size(size)
        .max_wait_time(wait);
    ConnectionPool::open(config).expect("pool opens")
}

#[test]
fn test_exhaustion_times_out() {
    let dir = TempDir::new().unwrap();
    let pool = pool_in(&dir, 2, Duration::from_secs(1));

    let _a = pool.acquire().unwrap();
    let _b = pool.acquire().unwrap();
    assert_eq!(pool.idle_count(), 0);

    let started = Instant::now();
    let err = pool.acquire().err().expect("third acquire must fail");
    let elapsed = started.elapsed();

    match err {
        TabError::PoolExhausted { waited } => assert!(waited >= Duration::from_millis(900)),
        other => panic!("unexpected error: {other}"),
    }
    assert!(elapsed >= Duration::from_millis(500), "returned too early: {elapsed:?}");
    assert!(elapsed <= Duration::from_millis(1500), "returned too late: {elapsed:?}");
}

#[test]
fn test_release_unblocks_waiter() {
    let dir = TempDir::new().unwrap();
    let pool = pool_in(&dir, 1, Duration::from_secs(5));

    std::thread::scope(|s| {
        let held = pool.acquire().unwrap();
        let waiter = s.spawn(|| pool.acquire().map(|_| ()));
        std::thread::sleep(Duration::from_millis(100));
        drop(held);
        assert!(waiter.join().unwrap().is_ok());
    });
    assert_eq!(pool.idle_count(), 1);
}

#[test]
fn test_concurrent_registration_of_one_table() {
    let dir = TempDir::new().unwrap();
    let pool = pool_in(&dir, 10, Duration::from_secs(60));
    let table = shared_table();

    std::thread::scope(|s| {
        let handles: Vec<_> = (0..50)
            .map(|_| s.spawn(|| pool.register("shared_table", &table)))
            .collect();
        for handle in handles {
            handle.join().unwrap().expect("registration succeeds");
        }
    });

    assert!(pool.is_registered("shared_table"));
    let result = pool
        .sql("SELECT COUNT(*) AS n, SUM(col1) AS total FROM shared_table", &[])
        .unwrap();
    assert_eq!(result.get(0, "n"), Some(&Value::from(3)));
    assert_eq!(result.get(0, "total").and_then(|v| match v {
        Value::Integer(i) => Some(*i),
        Value::Real(f) => Some(*f as i64),
        _ => None,
    }), Some(6));
    assert_eq!(pool.idle_count(), 10);
}

#[test]
fn test_concurrent_registration_of_distinct_tables() {
    let dir = TempDir::new().unwrap();
    let pool = pool_in(&dir, 4, Duration::from_secs(60));

    std::thread::scope(|s| {
        for i in 0..20 {
            let pool = &pool;
            s.spawn(move || {
                let table = Table::new(["id"]).row([Value::from(i)]);
                let name = format!("table_{i}");
                pool.register(&name, &table).unwrap();
                let result = pool
                    .sql(&format!("SELECT id FROM {name}"), &[])
                    .unwrap();
                assert_eq!(result.rows, vec![vec![Value::from(i)]]);
            });
        }
    });

    assert_eq!(pool.registered_tables().len(), 20);
}

#[test]
fn test_teardown_and_reopen() {
    let dir = TempDir::new().unwrap();
    let pool = pool_in(&dir, 2, Duration::from_secs(1));
    pool.register("shared_table", &shared_table()).unwrap();
    let path = pool.backing_path().to_path_buf();
    assert!(path.exists());

    pool.close();
    assert!(!path.exists());
    assert!(!pool.is_registered("shared_table"));
    assert!(matches!(pool.sql("SELECT 1", &[]), Err(TabError::PoolClosed)));

    let reopened = pool_in(&dir, 2, Duration::from_secs(1));
    assert!(reopened.registered_tables().is_empty());
    reopened.register("shared_table", &shared_table()).unwrap();
    let result = reopened.sql("SELECT col2 FROM shared_table ORDER BY col1 DESC", &[]).unwrap();
    assert_eq!(result.rows[0], vec![Value::from("c")]);
}

#[test]
fn test_drop_removes_backing_file() {
    let dir = TempDir::new().unwrap();
    let path = {
        let pool = pool_in(&dir, 1, Duration::from_secs(1));
        pool.backing_path().to_path_buf()
    };
    assert!(!path.exists());
}

#[test]
fn test_retry_exhaustion_surfaces_backend_error() {
    let dir = TempDir::new().unwrap();
    let pool = pool_in(&dir, 1, Duration::from_secs(1));
    let table = Table::new(["x"]).row([Value::from(1)]);

    let started = Instant::now();
    let err = pool.register("nosuch.t", &table).unwrap_err();
    let elapsed = started.elapsed();

    match &err {
        TabError::Database(e) => {
            let message = e.to_string();
            assert!(message.starts_with("Catalog Error"), "{message}");
            assert!(message.contains("nosuch"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }
    // Two linear backoffs of 100 ms and 200 ms between three attempts.
    assert!(elapsed >= Duration::from_millis(250), "gave up too early: {elapsed:?}");
    assert!(!pool.is_registered("nosuch.t"));
    assert_eq!(pool.idle_count(), 1);

    // The returned session is still healthy.
    pool.register("t", &table).unwrap();
    assert!(pool.is_registered("t"));
}

#[test]
fn test_backend_errors_propagate() {
    let dir = TempDir::new().unwrap();
    let pool = pool_in(&dir, 1, Duration::from_secs(1));
    let err = pool.sql("SELECT * FROM missing_table", &[]).unwrap_err();
    assert!(matches!(err, TabError::Database(_)));
    // The session went back to the pool.
    assert_eq!(pool.idle_count(), 1);
}
