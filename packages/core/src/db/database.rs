//! Database Connection Management
//!
//! This module owns the libsql database handle, the schema, and the single
//! connection every operation of a store instance runs on.
//!
//! # Architecture
//!
//! - **One connection per store**: opened lazily, cached, shared by every
//!   call. `close()` checkpoints and drops it; the next call reopens it.
//! - **WAL mode**: Write-Ahead Logging, checkpointed before backups
//! - **Foreign keys**: Enabled on every connection (edges and statuses
//!   reference nodes)
//! - **Explicit transactions**: `BEGIN IMMEDIATE` / `COMMIT` / `ROLLBACK` on
//!   the shared connection
//!
//! # Schema
//!
//! ```text
//! nodes(id PK, data, created_at, updated_at)
//! edges(id PK, source FK->nodes, target FK->nodes, data, created_at, updated_at)
//! audit_log(id PK AUTOINCREMENT, entity_type, entity_id, action, old_data?, new_data?,
//!           user_id?, ip_address?, created_at)
//! node_status(id PK AUTOINCREMENT, node_id FK->nodes, status, created_at)
//! ```

use crate::db::error::DatabaseError;
use crate::models::time::{format_timestamp, SystemTimeProvider, TimeProvider};
use chrono::{DateTime, SubsecRound, Utc};
use libsql::{Builder, Connection, Database};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// Busy timeout applied to every connection (milliseconds)
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// Database service for managing the libsql handle, schema and connection
///
/// # Examples
///
/// ```no_run
/// use gdmon_core::db::DatabaseService;
/// use std::path::PathBuf;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let db = DatabaseService::new(PathBuf::from("/var/lib/gdmon/graph.db")).await?;
///     let conn = db.connection().await?;
///     Ok(())
/// }
/// ```
pub struct DatabaseService {
    db: Database,

    /// Path to the database file
    pub db_path: PathBuf,

    busy_timeout_ms: u64,

    clock: Arc<dyn TimeProvider>,

    /// Cached connection; `None` until first use and after `close()`
    connection: Mutex<Option<Connection>>,

    /// Held by services for the duration of each write unit
    write_lock: Mutex<()>,
}

impl fmt::Debug for DatabaseService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseService")
            .field("db_path", &self.db_path)
            .field("busy_timeout_ms", &self.busy_timeout_ms)
            .finish_non_exhaustive()
    }
}

impl DatabaseService {
    /// Open (creating if needed) the database at `db_path` with default settings
    pub async fn new(db_path: PathBuf) -> Result<Self, DatabaseError> {
        Self::with_options(
            db_path,
            DEFAULT_BUSY_TIMEOUT_MS,
            Arc::new(SystemTimeProvider),
        )
        .await
    }

    /// Open the database with an explicit busy timeout and clock
    ///
    /// This will:
    /// 1. Ensure the parent directory exists (create if needed)
    /// 2. Open/create the database file
    /// 3. Initialize the schema (CREATE TABLE IF NOT EXISTS)
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if:
    /// - Parent directory cannot be created
    /// - Database connection fails
    /// - Schema initialization fails
    pub async fn with_options(
        db_path: PathBuf,
        busy_timeout_ms: u64,
        clock: Arc<dyn TimeProvider>,
    ) -> Result<Self, DatabaseError> {
        if db_path.as_os_str().is_empty() {
            return Err(DatabaseError::invalid_path(db_path));
        }

        let is_new_database = !db_path.exists();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::PermissionDenied {
                        DatabaseError::permission_denied(db_path.clone())
                    } else {
                        DatabaseError::DirectoryCreationFailed(e)
                    }
                })?;
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::connection_failed(db_path.clone(), e))?;

        let service = Self {
            db,
            db_path,
            busy_timeout_ms,
            clock,
            connection: Mutex::new(None),
            write_lock: Mutex::new(()),
        };

        service.initialize_schema(is_new_database).await?;

        tracing::debug!(path = %service.db_path.display(), "database ready");
        Ok(service)
    }

    /// Path of the storage file
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Current time from the store's clock, truncated to the storage resolution
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now().trunc_subsecs(6)
    }

    /// Current time in the storage format
    pub fn now_timestamp(&self) -> String {
        format_timestamp(self.now())
    }

    /// Get the store's connection, opening it if it is not open
    ///
    /// The returned handle shares the underlying SQLite connection with every
    /// other caller, so a transaction begun on one handle is visible to all.
    pub async fn connection(&self) -> Result<Connection, DatabaseError> {
        let mut slot = self.connection.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }

        let conn = self.open_connection().await?;
        *slot = Some(conn.clone());
        Ok(conn)
    }

    /// Serialize write units on this store
    ///
    /// Every write shares one connection, so two interleaved transactions
    /// would collide. Services hold this guard from `BEGIN` until the unit
    /// (including any backup it takes) has finished.
    pub async fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }

    /// Flush the WAL into the main file and drop the cached connection
    ///
    /// Returns `true` when the checkpoint completed, in which case the storage
    /// file is self-contained and can be copied. `false` means another
    /// connection held the WAL and some commits are still only in the `-wal`
    /// file. The connection is dropped either way; the next call to
    /// [`connection`](Self::connection) reopens it.
    pub async fn close(&self) -> Result<bool, DatabaseError> {
        let mut slot = self.connection.lock().await;
        let conn = match slot.take() {
            Some(conn) => conn,
            None => self.open_connection().await?,
        };

        let complete = self.checkpoint(&conn).await?;
        if !complete {
            tracing::warn!(path = %self.db_path.display(), "WAL checkpoint blocked by another connection");
        }

        drop(conn);
        tracing::debug!(path = %self.db_path.display(), "connection closed");
        Ok(complete)
    }

    /// Run `wal_checkpoint(TRUNCATE)`; `false` when its busy flag is set
    async fn checkpoint(&self, conn: &Connection) -> Result<bool, DatabaseError> {
        let pragma = "PRAGMA wal_checkpoint(TRUNCATE)";
        let mut rows = conn.query(pragma, ()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        let row = rows.next().await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        let busy = match row {
            Some(row) => row.get::<i64>(0).map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to read '{}' result: {}", pragma, e))
            })?,
            None => 0,
        };
        Ok(busy == 0)
    }

    async fn open_connection(&self) -> Result<Connection, DatabaseError> {
        let conn = self
            .db
            .connect()
            .map_err(|e| DatabaseError::connection_failed(self.db_path.clone(), e))?;

        self.execute_pragma(&conn, &format!("PRAGMA busy_timeout = {}", self.busy_timeout_ms))
            .await?;

        // Per-connection setting; referential integrity depends on it
        self.execute_pragma(&conn, "PRAGMA foreign_keys = ON")
            .await?;

        Ok(conn)
    }

    /// Execute a PRAGMA statement
    ///
    /// PRAGMA statements may return rows, so we must use query() instead of execute().
    async fn execute_pragma(&self, conn: &Connection, pragma: &str) -> Result<(), DatabaseError> {
        let mut stmt = conn.prepare(pragma).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        let mut rows = stmt.query(()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        // Step once so the pragma runs even if the driver defers execution
        rows.next().await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        Ok(())
    }

    /// Initialize database schema and configuration
    ///
    /// Idempotent: every statement is `IF NOT EXISTS`.
    async fn initialize_schema(&self, is_new_database: bool) -> Result<(), DatabaseError> {
        let conn = self.connection().await?;

        self.execute_pragma(&conn, "PRAGMA journal_mode = WAL")
            .await?;

        let tables = [
            (
                "nodes",
                "CREATE TABLE IF NOT EXISTS nodes (
                    id TEXT PRIMARY KEY NOT NULL,
                    data TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now') || '000'),
                    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now') || '000')
                )",
            ),
            (
                "edges",
                "CREATE TABLE IF NOT EXISTS edges (
                    id TEXT PRIMARY KEY NOT NULL,
                    source TEXT NOT NULL,
                    target TEXT NOT NULL,
                    data TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now') || '000'),
                    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now') || '000'),
                    FOREIGN KEY (source) REFERENCES nodes(id) ON DELETE CASCADE,
                    FOREIGN KEY (target) REFERENCES nodes(id) ON DELETE CASCADE
                )",
            ),
            (
                "audit_log",
                "CREATE TABLE IF NOT EXISTS audit_log (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    entity_type TEXT NOT NULL,
                    entity_id TEXT NOT NULL,
                    action TEXT NOT NULL,
                    old_data TEXT,
                    new_data TEXT,
                    user_id TEXT,
                    ip_address TEXT,
                    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now') || '000')
                )",
            ),
            (
                "node_status",
                "CREATE TABLE IF NOT EXISTS node_status (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    node_id TEXT NOT NULL,
                    status TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now') || '000'),
                    FOREIGN KEY (node_id) REFERENCES nodes(id) ON DELETE CASCADE
                )",
            ),
        ];

        for (name, sql) in tables {
            conn.execute(sql, ()).await.map_err(|e| {
                DatabaseError::initialization_failed(format!(
                    "Failed to create {} table: {}",
                    name, e
                ))
            })?;
        }

        self.create_core_indexes(&conn).await?;

        // Flush schema to the main file so a backup of a fresh store is usable
        if is_new_database && !self.checkpoint(&conn).await? {
            tracing::warn!(path = %self.db_path.display(), "schema checkpoint blocked by another connection");
        }

        Ok(())
    }

    /// Create indexes on the columns every lookup and ordering uses
    async fn create_core_indexes(&self, conn: &Connection) -> Result<(), DatabaseError> {
        let indexes = [
            ("idx_edges_source", "edges(source)"),
            ("idx_edges_target", "edges(target)"),
            ("idx_edges_source_target", "edges(source, target)"),
            ("idx_audit_entity", "audit_log(entity_type, entity_id)"),
            ("idx_audit_created", "audit_log(created_at)"),
            ("idx_audit_action", "audit_log(action)"),
            ("idx_node_status_node_id", "node_status(node_id)"),
            ("idx_node_status_created", "node_status(created_at)"),
        ];

        for (name, target) in indexes {
            conn.execute(
                &format!("CREATE INDEX IF NOT EXISTS {} ON {}", name, target),
                (),
            )
            .await
            .map_err(|e| {
                DatabaseError::initialization_failed(format!(
                    "Failed to create index '{}': {}",
                    name, e
                ))
            })?;
        }

        Ok(())
    }
}

/// Begin a write transaction, taking the write lock up front
pub async fn begin_transaction(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute("BEGIN IMMEDIATE", ())
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to begin transaction: {}", e)))?;
    Ok(())
}

/// Commit the open transaction, rolling back if the commit itself fails
pub async fn commit_transaction(conn: &Connection) -> Result<(), DatabaseError> {
    if let Err(e) = conn.execute("COMMIT", ()).await {
        rollback_transaction(conn).await;
        return Err(DatabaseError::sql_execution(format!(
            "Failed to commit transaction: {}",
            e
        )));
    }
    Ok(())
}

/// Roll back the open transaction; failures are logged, not returned
pub async fn rollback_transaction(conn: &Connection) {
    if let Err(e) = conn.execute("ROLLBACK", ()).await {
        tracing::error!(error = %e, "rollback failed");
    }
}

/// Commit on `Ok`, roll back on `Err`, and pass the result through
pub async fn finish_transaction<T, E>(conn: &Connection, result: Result<T, E>) -> Result<T, E>
where
    E: From<DatabaseError>,
{
    match result {
        Ok(value) => {
            commit_transaction(conn).await?;
            Ok(value)
        }
        Err(err) => {
            rollback_transaction(conn).await;
            Err(err)
        }
    }
}
