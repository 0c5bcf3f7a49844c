//! Service Layer Error Types
//!
//! This module defines error types for graph, status and restore
//! operations. The [`Graph`](crate::Graph) facade turns these into the
//! boolean / `Option` results callers see.

use crate::db::{BackupError, DatabaseError};
use crate::models::{AuditAction, EntityType, ValidationError};
use thiserror::Error;

/// Service operation errors
#[derive(Error, Debug)]
pub enum GraphServiceError {
    /// Node not found by ID
    #[error("Node not found: {id}")]
    NodeNotFound { id: String },

    /// Edge not found by ID
    #[error("Edge not found: {id}")]
    EdgeNotFound { id: String },

    /// A node with this id already exists
    #[error("Node already exists: {id}")]
    DuplicateNode { id: String },

    /// An edge with this id already exists
    #[error("Edge already exists: {id}")]
    DuplicateEdge { id: String },

    /// Edge endpoint does not reference an existing node
    #[error("Edge {edge_id} references missing node {node_id}")]
    MissingEndpoint { edge_id: String, node_id: String },

    /// Restoring the edge would leave it pointing at a missing node
    #[error("Cannot restore edge {edge_id}: endpoint {node_id} does not exist")]
    DanglingEdge { edge_id: String, node_id: String },

    /// No audit entry with this id belongs to the given entity
    #[error("Audit entry {audit_id} not found for {entity_type} {entity_id}")]
    AuditEntryNotFound {
        audit_id: i64,
        entity_type: EntityType,
        entity_id: String,
    },

    /// The entry records something that has no inverse
    #[error("Audit entry {audit_id} ({entity_type} {action}) cannot be reversed")]
    NotReversible {
        audit_id: i64,
        entity_type: EntityType,
        action: AuditAction,
    },

    /// The entry's snapshot is missing or unusable for the reversal
    #[error("Audit entry {audit_id} has an unusable snapshot: {reason}")]
    InvalidSnapshot { audit_id: i64, reason: String },

    /// Pre-restore backup could not be taken; nothing was changed
    #[error("Backup before restore failed: {0}")]
    BackupFailed(#[source] BackupError),

    /// Caller input rejected
    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),

    /// Database operation failed
    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),
}

impl GraphServiceError {
    pub fn node_not_found(id: impl Into<String>) -> Self {
        Self::NodeNotFound { id: id.into() }
    }

    pub fn edge_not_found(id: impl Into<String>) -> Self {
        Self::EdgeNotFound { id: id.into() }
    }

    pub fn missing_endpoint(edge_id: impl Into<String>, node_id: impl Into<String>) -> Self {
        Self::MissingEndpoint {
            edge_id: edge_id.into(),
            node_id: node_id.into(),
        }
    }

    pub fn dangling_edge(edge_id: impl Into<String>, node_id: impl Into<String>) -> Self {
        Self::DanglingEdge {
            edge_id: edge_id.into(),
            node_id: node_id.into(),
        }
    }

    pub fn invalid_snapshot(audit_id: i64, reason: impl Into<String>) -> Self {
        Self::InvalidSnapshot {
            audit_id,
            reason: reason.into(),
        }
    }

    /// Expected outcomes (missing entity, duplicate id, integrity) as opposed
    /// to storage, backup or decoding failures
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::NodeNotFound { .. }
                | Self::EdgeNotFound { .. }
                | Self::DuplicateNode { .. }
                | Self::DuplicateEdge { .. }
                | Self::MissingEndpoint { .. }
                | Self::DanglingEdge { .. }
                | Self::AuditEntryNotFound { .. }
                | Self::NotReversible { .. }
                | Self::ValidationFailed(_)
        )
    }
}

impl From<libsql::Error> for GraphServiceError {
    fn from(e: libsql::Error) -> Self {
        Self::Database(DatabaseError::from(e))
    }
}
