//! gdmon Core - audit-logged graph store
//!
//! This crate stores a directed graph (nodes and edges with JSON payloads)
//! in an embedded libsql database and keeps an append-only audit trail of
//! every mutation, from which single entities or the whole graph can be
//! rolled back.
//!
//! # Architecture
//!
//! - **Audit-atomic writes**: each mutation and its audit entries commit together
//! - **Backup before restore**: every restore first copies the storage file
//! - **Explicit actors**: the acting user and address are passed on each call
//! - **libsql**: Embedded SQLite-compatible database, one connection per store
//!
//! # Modules
//!
//! - [`models`] - Payloads, audit entries, statuses, clock
//! - [`db`] - Schema, row access, backups, change events
//! - [`services`] - GraphService, StatusService, RestoreService
//! - [`config`] - Store configuration and environment overrides
//! - [`graph`] - `Graph`, the boolean-result facade over the services

pub mod config;
pub mod db;
pub mod graph;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use config::GraphConfig;
pub use graph::{BackupReport, Graph};
pub use models::*;
pub use services::*;
