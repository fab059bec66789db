//! DuckDB connection pool.
//!
//! One database file per pool, shared by `pool_size` sessions. Sessions are
//! handed out through a bounded channel; a caller blocks up to
//! `max_wait_time` for one and gets it back through a [`PooledConnection`]
//! guard that returns the session on drop.
//!
//! ```no_run
//! use tabquery::pool::ConnectionPool;
//! use tabquery::config::PoolConfig;
//! use tabquery::table::{Table, Value};
//!
//! let pool = ConnectionPool::open(PoolConfig::default().pool_size(4))?;
//! let table = Table::new(["id"]).row([Value::from(1)]);
//! pool.register("ids", &table)?;
//! let result = pool.sql("SELECT COUNT(*) AS n FROM ids", &[])?;
//! assert_eq!(result.get(0, "n"), Some(&Value::from(1)));
//! # Ok::<(), tabquery::error::TabError>(())
//! ```

pub mod catalog;
mod convert;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use duckdb::Connection;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

use crate::config::PoolConfig;
use crate::error::{TabError, TabResult};
use crate::sanitizer::sanitize_sql_table_name;
use crate::table::{Table, Value};
use crate::transpiler::{Dialect, SqlParserTranspiler, Transpiler, escape_identifier};
use catalog::CatalogOutcome;

static GLOBAL_POOL: RwLock<Option<Arc<ConnectionPool>>> = RwLock::new(None);
static POOL_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// A pooled session that returns to the pool when dropped.
pub struct PooledConnection<'a> {
    conn: Option<Connection>,
    pool: &'a ConnectionPool,
    broken: bool,
}

impl PooledConnection<'_> {
    /// Replace the session with a fresh one on return.
    fn mark_broken(&mut self) {
        self.broken = true;
    }
}

impl std::ops::Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        self.conn
            .as_ref()
            .expect("Connection should always be present")
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        let pool = self.pool;
        if pool.is_closed() {
            drop(conn);
        } else {
            pool.release(conn, self.broken);
        }

        // A session returned after close() must not outlive the pool, and
        // the last one out may have written the WAL file back.
        let last = pool.checked_out.fetch_sub(1, Ordering::SeqCst) == 1;
        if pool.is_closed() {
            pool.drain_idle();
            if last {
                pool.remove_backing_files();
            }
        }
    }
}

/// Bounded pool of DuckDB sessions over one backing file.
pub struct ConnectionPool {
    config: PoolConfig,
    backing_path: PathBuf,
    idle_tx: Sender<Connection>,
    idle_rx: Receiver<Connection>,
    registered_tables: Mutex<HashSet<String>>,
    closed: AtomicBool,
    checked_out: AtomicUsize,
    transpiler: Arc<dyn Transpiler>,
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("backing_path", &self.backing_path)
            .field("pool_size", &self.config.pool_size)
            .field("idle", &self.idle_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl ConnectionPool {
    /// Process-wide pool, created on first use.
    ///
    /// Arguments only matter on the call that creates the pool; later calls
    /// return the existing pool whatever they pass. After
    /// [`close_instance`](Self::close_instance) or [`close`](Self::close)
    /// the next call builds a new one.
    pub fn instance(pool_size: Option<usize>, max_wait_time: Option<f64>) -> TabResult<Arc<Self>> {
        {
            let guard = GLOBAL_POOL.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(pool) = guard.as_ref().filter(|p| !p.is_closed()) {
                return Ok(Arc::clone(pool));
            }
        }

        let mut guard = GLOBAL_POOL.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(pool) = guard.as_ref().filter(|p| !p.is_closed()) {
            return Ok(Arc::clone(pool));
        }

        let mut config = PoolConfig::default();
        if let Some(size) = pool_size {
            config.pool_size = size;
        }
        if let Some(wait) = max_wait_time {
            config.max_wait_time_secs = wait;
        }
        let pool = Arc::new(Self::build(config, None)?);
        *guard = Some(Arc::clone(&pool));
        Ok(pool)
    }

    /// Close and forget the process-wide pool.
    pub fn close_instance() {
        let pool = GLOBAL_POOL
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(pool) = pool {
            pool.close();
        }
    }

    /// Open a pool with its own backing file.
    pub fn open(config: PoolConfig) -> TabResult<Self> {
        let sequence = POOL_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        Self::build(config, Some(sequence))
    }

    fn build(config: PoolConfig, sequence: Option<u64>) -> TabResult<Self> {
        config.validate()?;
        let backing_path = config.backing_path(sequence);
        if let Some(parent) = backing_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let first = Connection::open(&backing_path)?;
        let mut sessions = Vec::with_capacity(config.pool_size);
        for _ in 1..config.pool_size {
            sessions.push(first.try_clone()?);
        }
        sessions.push(first);

        let (idle_tx, idle_rx) = channel::bounded(config.pool_size);
        for session in sessions {
            let _ = idle_tx.try_send(session);
        }

        tracing::info!(
            path = %backing_path.display(),
            pool_size = config.pool_size,
            max_wait_secs = config.max_wait_time_secs,
            "connection pool opened"
        );

        Ok(Self {
            config,
            backing_path,
            idle_tx,
            idle_rx,
            registered_tables: Mutex::new(HashSet::new()),
            closed: AtomicBool::new(false),
            checked_out: AtomicUsize::new(0),
            transpiler: Arc::new(SqlParserTranspiler::new(Dialect::DuckDb)),
        })
    }

    /// Use `transpiler` to rewrite queries passed to [`sql`](Self::sql).
    pub fn with_transpiler(mut self, transpiler: Arc<dyn Transpiler>) -> Self {
        self.transpiler = transpiler;
        self
    }

    /// Wait up to `max_wait_time` for an idle session.
    pub fn acquire(&self) -> TabResult<PooledConnection<'_>> {
        if self.is_closed() {
            return Err(TabError::PoolClosed);
        }
        let started = Instant::now();
        match self.idle_rx.recv_timeout(self.config.wait_duration()) {
            Ok(conn) if self.is_closed() => {
                drop(conn);
                Err(TabError::PoolClosed)
            }
            Ok(conn) => {
                self.checked_out.fetch_add(1, Ordering::SeqCst);
                Ok(PooledConnection {
                    conn: Some(conn),
                    pool: self,
                    broken: false,
                })
            }
            Err(RecvTimeoutError::Timeout) if self.is_closed() => Err(TabError::PoolClosed),
            Err(RecvTimeoutError::Timeout) => {
                let waited = started.elapsed();
                tracing::debug!(waited_ms = waited.as_millis() as u64, "pool exhausted");
                Err(TabError::PoolExhausted { waited })
            }
            Err(RecvTimeoutError::Disconnected) => Err(TabError::PoolClosed),
        }
    }

    /// Materialize `table` as `name` once per pool.
    ///
    /// Concurrent callers racing on the same name all succeed; exactly one
    /// of them creates the table.
    ///
    /// A dotted name is schema-qualified: `main.events` creates `events` in
    /// schema `main`, and is remembered as `main.events`. Once the retry
    /// budget is spent the last backend error is returned as is.
    pub fn register(&self, name: &str, table: &Table) -> TabResult<()> {
        if self.is_registered(name) {
            return Ok(());
        }
        table.validate()?;

        let mut conn = self.acquire()?;
        let stage = escape_identifier(&format!(
            "__tabquery_stage_{}",
            sanitize_sql_table_name(name)
        ));

        let result = in_transaction(&mut conn, |c| stage_rows(c, &stage, table))
            .and_then(|()| self.materialize(&mut conn, name, &stage));

        if let Err(e) = conn.execute_batch(&format!("DROP TABLE IF EXISTS {}", stage)) {
            tracing::debug!(table = name, error = %e, "staging table not dropped");
        }

        result?;
        self.tables().insert(name.to_string());
        tracing::debug!(table = name, rows = table.len(), "table registered");
        Ok(())
    }

    fn materialize(&self, conn: &mut PooledConnection<'_>, name: &str, stage: &str) -> TabResult<()> {
        let create = format!(
            "CREATE TABLE IF NOT EXISTS {} AS SELECT * FROM {}",
            escape_identifier(name),
            stage
        );
        let retry = self.config.retry;

        let mut attempt = 0;
        loop {
            let err = match in_transaction(conn, |c| Ok(c.execute_batch(&create)?)) {
                Ok(()) => return Ok(()),
                Err(TabError::Database(e)) => e,
                Err(other) => return Err(other),
            };

            let last = attempt + 1 >= retry.max_attempts;
            let delay = match CatalogOutcome::of(&err) {
                CatalogOutcome::AlreadyExists => {
                    tracing::debug!(table = name, "table created concurrently");
                    return Ok(());
                }
                _ if last => return Err(err.into()),
                CatalogOutcome::Conflict => retry.conflict_delay(attempt),
                _ => retry.linear_delay(attempt),
            };
            tracing::debug!(
                table = name,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "table creation failed, retrying"
            );
            std::thread::sleep(delay);
            attempt += 1;
        }
    }

    /// Run `query` with positional `params` and collect the result.
    pub fn sql(&self, query: &str, params: &[Value]) -> TabResult<Table> {
        let query = self.transpiler.transpile(query, Dialect::DuckDb)?;
        let conn = self.acquire()?;
        query_table(&conn, &query, params)
    }

    /// Close the pool and delete its backing file. Safe to call twice.
    ///
    /// Sessions still checked out stay usable until their guards drop; the
    /// last one to drop removes the backing files again.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let dropped = self.drain_idle();
        self.tables().clear();
        self.remove_backing_files();

        tracing::info!(
            path = %self.backing_path.display(),
            sessions_closed = dropped,
            sessions_in_use = self.checked_out.load(Ordering::SeqCst),
            "connection pool closed"
        );
    }

    fn release(&self, conn: Connection, broken: bool) {
        let conn = if broken {
            match conn.try_clone() {
                Ok(fresh) => fresh,
                Err(e) => {
                    tracing::warn!(error = %e, "could not replace broken session; pool shrinks by one");
                    return;
                }
            }
        } else {
            conn
        };
        // Capacity equals pool_size, so this only fails after close().
        let _ = self.idle_tx.try_send(conn);
    }

    fn drain_idle(&self) -> usize {
        let mut dropped = 0;
        while let Ok(conn) = self.idle_rx.try_recv() {
            drop(conn);
            dropped += 1;
        }
        dropped
    }

    fn remove_backing_files(&self) {
        for path in [self.backing_path.clone(), wal_path(&self.backing_path)] {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove backing file");
                }
            }
        }
    }

    pub fn backing_path(&self) -> &Path {
        &self.backing_path
    }

    pub fn pool_size(&self) -> usize {
        self.config.pool_size
    }

    pub fn max_wait_time(&self) -> Duration {
        self.config.wait_duration()
    }

    /// Sessions currently waiting in the pool.
    pub fn idle_count(&self) -> usize {
        self.idle_rx.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.tables().contains(name)
    }

    /// Names registered so far, sorted.
    pub fn registered_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables().iter().cloned().collect();
        names.sort();
        names
    }

    fn tables(&self) -> MutexGuard<'_, HashSet<String>> {
        self.registered_tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ConnectionPool {
    fn drop(&mut self) {
        self.close();
    }
}

/// Run `op` between BEGIN and COMMIT, rolling back on any error.
fn in_transaction<T>(
    conn: &mut PooledConnection<'_>,
    op: impl FnOnce(&Connection) -> TabResult<T>,
) -> TabResult<T> {
    let result = {
        let session: &Connection = conn;
        session
            .execute_batch("BEGIN TRANSACTION")
            .map_err(TabError::from)
            .and_then(|()| op(session))
            .and_then(|value| {
                session.execute_batch("COMMIT")?;
                Ok(value)
            })
    };

    if result.is_err()
        && let Err(e) = conn.execute_batch("ROLLBACK")
        && CatalogOutcome::of(&e) != CatalogOutcome::NoActiveTransaction
    {
        tracing::warn!(error = %e, "rollback failed; session will be replaced");
        conn.mark_broken();
    }
    result
}

/// Copy `table` into a session-local temporary table.
fn stage_rows(conn: &Connection, stage: &str, table: &Table) -> TabResult<()> {
    let types = table.column_types();
    let columns: Vec<String> = table
        .columns
        .iter()
        .zip(&types)
        .map(|(name, ty)| format!("{} {}", quote_column(name), ty.sql_name()))
        .collect();
    conn.execute_batch(&format!(
        "CREATE OR REPLACE TEMP TABLE {} ({})",
        stage,
        columns.join(", ")
    ))?;

    let placeholders = vec!["?"; types.len()].join(", ");
    let mut insert = conn.prepare(&format!("INSERT INTO {} VALUES ({})", stage, placeholders))?;
    for row in &table.rows {
        let values: Vec<duckdb::types::Value> = row
            .iter()
            .zip(&types)
            .map(|(value, ty)| convert::to_duckdb(&value.coerce(*ty)))
            .collect();
        let params: Vec<&dyn duckdb::ToSql> = values.iter().map(|v| v as &dyn duckdb::ToSql).collect();
        insert.execute(params.as_slice())?;
    }
    Ok(())
}

fn query_table(conn: &Connection, sql: &str, params: &[Value]) -> TabResult<Table> {
    let mut stmt = conn.prepare(sql)?;
    let values: Vec<duckdb::types::Value> = params.iter().map(convert::to_duckdb).collect();
    let params: Vec<&dyn duckdb::ToSql> = values.iter().map(|v| v as &dyn duckdb::ToSql).collect();

    // Column metadata is only available once the statement has run.
    let mut rows = stmt.query(params.as_slice())?;
    let columns: Vec<String> = match rows.as_ref() {
        Some(statement) => (0..statement.column_count())
            .map(|i| {
                statement
                    .column_name(i)
                    .map(|s| s.to_string())
                    .unwrap_or_else(|_| format!("col{}", i))
            })
            .collect(),
        None => return Ok(Table::default()),
    };

    let width = columns.len();
    let mut table = Table::new(columns);
    while let Some(row) = rows.next()? {
        let values = (0..width)
            .map(|i| convert::from_row(row, i))
            .collect::<Result<Vec<_>, _>>()?;
        table.rows.push(values);
    }
    Ok(table)
}

/// Column name for a CREATE TABLE definition; always quoted, never split on dots.
fn quote_column(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn wal_path(path: &Path) -> PathBuf {
    let mut wal = path.as_os_str().to_owned();
    wal.push(".wal");
    PathBuf::from(wal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn small_pool(dir: &TempDir, size: usize) -> ConnectionPool {
        ConnectionPool::open(
            PoolConfig::default()
                .temp_dir(dir.path())
                .pool_size(size)
                .max_wait_time(Duration::from_millis(200)),
        )
        .unwrap()
    }

    #[test]
    fn test_guard_returns_session() {
        let dir = TempDir::new().unwrap();
        let pool = small_pool(&dir, 2);
        assert_eq!(pool.idle_count(), 2);
        {
            let _a = pool.acquire().unwrap();
            assert_eq!(pool.idle_count(), 1);
        }
        assert_eq!(pool.idle_count(), 2);
    }

    #[test]
    fn test_register_and_query_with_params() {
        let dir = TempDir::new().unwrap();
        let pool = small_pool(&dir, 2);
        let table = Table::new(["name", "score"])
            .row(["a".into(), 1.into()])
            .row(["b".into(), 2.5.into()])
            .row(["c".into(), Value::Null]);
        pool.register("scores", &table).unwrap();
        assert!(pool.is_registered("scores"));

        let result = pool
            .sql("SELECT name FROM scores WHERE score > ? ORDER BY name", &[Value::from(1)])
            .unwrap();
        assert_eq!(result.columns, vec!["name"]);
        assert_eq!(result.rows, vec![vec![Value::from("b")]]);
    }

    #[test]
    fn test_register_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let pool = small_pool(&dir, 1);
        let first = Table::new(["x"]).row([1.into()]);
        let second = Table::new(["x"]).row([1.into()]).row([2.into()]);
        pool.register("t", &first).unwrap();
        pool.register("t", &second).unwrap();

        let count = pool.sql("SELECT COUNT(*) AS n FROM t", &[]).unwrap();
        assert_eq!(count.get(0, "n"), Some(&Value::from(1)));
    }

    #[test]
    fn test_temporal_columns_round_trip() {
        let dir = TempDir::new().unwrap();
        let pool = small_pool(&dir, 1);
        let date = chrono::NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let ts = date.and_hms_opt(12, 30, 0).unwrap();
        let table = Table::new(["d", "ts"]).row([date.into(), ts.into()]);
        pool.register("events", &table).unwrap();

        let result = pool.sql("SELECT d, ts FROM events", &[]).unwrap();
        assert_eq!(result.rows, vec![vec![Value::Date(date), Value::Timestamp(ts)]]);
    }

    #[test]
    fn test_invalid_table_is_rejected_before_acquire() {
        let dir = TempDir::new().unwrap();
        let pool = small_pool(&dir, 1);
        let _held = pool.acquire().unwrap();
        let err = pool.register("empty", &Table::default()).unwrap_err();
        assert!(matches!(err, TabError::InvalidTable(_)));
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let pool = small_pool(&dir, 2);
        let path = pool.backing_path().to_path_buf();
        assert!(path.exists());

        pool.close();
        pool.close();
        assert!(pool.is_closed());
        assert!(!path.exists());
        assert_eq!(pool.idle_count(), 0);
        assert!(matches!(pool.acquire(), Err(TabError::PoolClosed)));
    }

    #[test]
    fn test_session_returned_after_close_is_discarded() {
        let dir = TempDir::new().unwrap();
        let pool = small_pool(&dir, 2);
        let path = pool.backing_path().to_path_buf();
        let held = pool.acquire().unwrap();

        pool.close();
        assert!(!path.exists());

        // The session still works and may write the WAL file back.
        held.execute_batch("CREATE TABLE late AS SELECT 1 AS x").unwrap();
        drop(held);

        assert_eq!(pool.idle_count(), 0);
        assert!(!path.exists());
        assert!(!wal_path(&path).exists());
        assert!(matches!(pool.acquire(), Err(TabError::PoolClosed)));
    }

    #[test]
    fn test_dotted_name_is_schema_qualified() {
        let dir = TempDir::new().unwrap();
        let pool = small_pool(&dir, 1);
        let table = Table::new(["x"]).row([1.into()]);
        pool.register("main.events", &table).unwrap();

        assert!(pool.is_registered("main.events"));
        let result = pool.sql("SELECT x FROM events", &[]).unwrap();
        assert_eq!(result.rows, vec![vec![Value::from(1)]]);
    }

    #[test]
    fn test_wal_path() {
        assert_eq!(
            wal_path(Path::new("/tmp/x.duckdb")),
            PathBuf::from("/tmp/x.duckdb.wal")
        );
    }
}
