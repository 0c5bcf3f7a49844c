//! Database Error Types
//!
//! Errors raised by the storage layer: connection management, schema
//! initialisation, SQL execution, stored-value decoding, and backups.

use std::path::PathBuf;
use thiserror::Error;

/// Database operation errors
///
/// Covers connection, initialization and statement failures. Business-level
/// outcomes (not found, duplicate id) are expressed by the service layer.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to establish database connection
    #[error("Failed to connect to database at {path}: {source}")]
    ConnectionFailed {
        path: PathBuf,
        source: libsql::Error,
    },

    /// Failed to initialize database schema
    #[error("Failed to initialize database schema: {0}")]
    InitializationFailed(String),

    /// Invalid database path provided
    #[error("Invalid database path: {path}")]
    InvalidPath { path: PathBuf },

    /// Permission denied when accessing database
    #[error("Permission denied for database path: {path}")]
    PermissionDenied { path: PathBuf },

    /// Failed to create parent directory
    #[error("Failed to create parent directory for database: {0}")]
    DirectoryCreationFailed(#[from] std::io::Error),

    /// libsql operation error
    #[error("Database operation failed: {0}")]
    LibsqlError(#[from] libsql::Error),

    /// SQL execution error with context
    #[error("SQL execution failed: {context}")]
    SqlExecutionError { context: String },

    /// A stored JSON column could not be encoded or decoded
    #[error("Malformed JSON in {context}: {source}")]
    MalformedJson {
        context: String,
        source: serde_json::Error,
    },

    /// A stored column held a value outside its domain
    #[error("Malformed value in {context}: {value}")]
    MalformedValue { context: String, value: String },
}

impl DatabaseError {
    /// Create a connection failed error
    pub fn connection_failed(path: PathBuf, source: libsql::Error) -> Self {
        Self::ConnectionFailed { path, source }
    }

    /// Create an initialization failed error
    pub fn initialization_failed(msg: impl Into<String>) -> Self {
        Self::InitializationFailed(msg.into())
    }

    /// Create an invalid path error
    pub fn invalid_path(path: PathBuf) -> Self {
        Self::InvalidPath { path }
    }

    /// Create a permission denied error
    pub fn permission_denied(path: PathBuf) -> Self {
        Self::PermissionDenied { path }
    }

    /// Create a SQL execution error with context
    pub fn sql_execution(context: impl Into<String>) -> Self {
        Self::SqlExecutionError {
            context: context.into(),
        }
    }

    pub fn malformed_json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::MalformedJson {
            context: context.into(),
            source,
        }
    }

    pub fn malformed_value(context: impl Into<String>, value: impl Into<String>) -> Self {
        Self::MalformedValue {
            context: context.into(),
            value: value.into(),
        }
    }
}

/// Backup creation errors
#[derive(Error, Debug)]
pub enum BackupError {
    /// A backup with this name is already on disk; backups are never overwritten
    #[error("Backup file already exists: {file}")]
    AlreadyExists { file: PathBuf },

    /// Name would escape the backup directory or is empty
    #[error("Invalid backup name: {name:?}")]
    InvalidName { name: String },

    /// The storage file has no on-disk location (e.g. `:memory:`)
    #[error("Storage file not found: {path}")]
    StorageMissing { path: PathBuf },

    /// Another connection blocked the WAL checkpoint; the file alone would be stale
    #[error("WAL checkpoint blocked by another connection: {path}")]
    CheckpointIncomplete { path: PathBuf },

    /// Could not release the active connection before copying
    #[error("Failed to quiesce database before backup: {0}")]
    Database(#[from] DatabaseError),

    /// Directory creation or file copy failed
    #[error("Backup I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl BackupError {
    pub fn io(path: PathBuf, source: std::io::Error) -> Self {
        Self::Io { path, source }
    }

    /// Path of the conflicting backup, if that is why the backup failed
    pub fn existing_file(&self) -> Option<&PathBuf> {
        match self {
            BackupError::AlreadyExists { file } => Some(file),
            _ => None,
        }
    }
}
