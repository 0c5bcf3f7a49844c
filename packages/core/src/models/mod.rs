//! Data Models
//!
//! This module contains the data structures shared by the store and its callers:
//!
//! - `graph` - Node/edge payloads and the full-graph snapshot
//! - `audit` - Audit entries, entity types, actions and the acting user
//! - `status` - Node status values and rows
//! - `time` - Clock abstraction and the storage timestamp format

mod audit;
mod graph;
mod status;
pub mod time;

pub use audit::{AuditAction, AuditActor, AuditEntry, EntityType};
pub use graph::{
    as_entity_data, edge_payload, node_payload, EdgeEndpoints, EntityData, GraphElement,
    GraphSnapshot, ValidationError,
};
pub use status::{NodeStatus, StatusValue};
