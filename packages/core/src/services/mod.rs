//! Business Services
//!
//! This module contains the core business logic services:
//!
//! - `GraphService` - Node/edge CRUD, audit capture, backups
//! - `StatusService` - Append-only node status history
//! - `RestoreService` - Entity restore and restore-to-timestamp
//!
//! Services own transaction boundaries: each public mutation is one unit
//! covering the data change and its audit entries.

pub mod error;
pub mod graph_service;
pub mod restore_service;
pub mod status_service;

pub use error::GraphServiceError;
pub use graph_service::{GraphService, GRAPH_EVENT_CHANNEL_CAPACITY, SYSTEM_ENTITY_ID};
pub use restore_service::{RestoreService, TimestampRestoreSummary};
pub use status_service::StatusService;
