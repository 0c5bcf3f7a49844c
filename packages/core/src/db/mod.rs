//! Database Layer
//!
//! This module handles all storage interactions using libsql (embedded,
//! SQLite-compatible):
//!
//! - Database initialization, schema and connection management
//! - Row access for nodes, edges, statuses and the audit log
//! - File-level backups of the storage file
//! - Change events published after commits
//!
//! # Architecture
//!
//! Query modules are free functions over a borrowed `libsql::Connection`.
//! The services layer decides transaction boundaries and pairs every
//! mutation with its audit entry; nothing here knows about restores.

mod backup;
mod database;
mod error;
pub mod events;

pub mod audit_log;
pub mod graph_queries;
pub mod status_queries;

pub use backup::{random_suffix, BackupInfo, BackupManager, DEFAULT_BACKUP_DIR};
pub use database::{
    begin_transaction, commit_transaction, finish_transaction, rollback_transaction,
    DatabaseService, DEFAULT_BUSY_TIMEOUT_MS,
};
pub use error::{BackupError, DatabaseError};
pub use events::GraphEvent;
