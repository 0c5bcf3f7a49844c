//! Graph Change Events
//!
//! Events emitted by the services after a mutation commits. Subscribers (a
//! UI, a websocket bridge, a cache) get notified without coupling to the
//! storage layer.
//!
//! # Architecture
//!
//! Events are published on a tokio broadcast channel, so any number of
//! subscribers receive every event. Work that rolls back emits nothing.

use crate::models::{EntityData, StatusValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Change notifications for the graph store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GraphEvent {
    /// A node was created, by `add_node` or by a restore
    #[serde(rename_all = "camelCase")]
    NodeCreated { id: String, data: EntityData },

    /// A node's payload was replaced
    #[serde(rename_all = "camelCase")]
    NodeUpdated { id: String, data: EntityData },

    /// A node was deleted (its incident edges get their own events)
    NodeDeleted { id: String },

    #[serde(rename_all = "camelCase")]
    EdgeCreated {
        id: String,
        source: String,
        target: String,
    },

    /// An edge's endpoints or payload were replaced by a restore
    #[serde(rename_all = "camelCase")]
    EdgeUpdated {
        id: String,
        source: String,
        target: String,
    },

    EdgeDeleted { id: String },

    #[serde(rename_all = "camelCase")]
    StatusChanged { node_id: String, status: StatusValue },

    #[serde(rename_all = "camelCase")]
    BackupCreated {
        backup_name: String,
        file_size: u64,
    },

    /// A timestamp restore rewrote the graph; consumers should reload
    #[serde(rename_all = "camelCase")]
    GraphRestored {
        timestamp: DateTime<Utc>,
        operations_reversed: usize,
    },
}

impl GraphEvent {
    /// Get a string representation of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            GraphEvent::NodeCreated { .. } => "node:created",
            GraphEvent::NodeUpdated { .. } => "node:updated",
            GraphEvent::NodeDeleted { .. } => "node:deleted",
            GraphEvent::EdgeCreated { .. } => "edge:created",
            GraphEvent::EdgeUpdated { .. } => "edge:updated",
            GraphEvent::EdgeDeleted { .. } => "edge:deleted",
            GraphEvent::StatusChanged { .. } => "status:changed",
            GraphEvent::BackupCreated { .. } => "backup:created",
            GraphEvent::GraphRestored { .. } => "graph:restored",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The wire format is internally tagged and flat
    #[test]
    fn test_event_serialization_contract() {
        let event = GraphEvent::StatusChanged {
            node_id: "n1".to_string(),
            status: StatusValue::Maintenance,
        };

        let parsed = serde_json::to_value(&event).unwrap();

        assert_eq!(parsed["type"], "statusChanged");
        assert_eq!(parsed["nodeId"], "n1");
        assert_eq!(parsed["status"], "maintenance");
        assert!(parsed.get("statusChanged").is_none());
    }

    #[test]
    fn test_event_type_names() {
        assert_eq!(
            GraphEvent::NodeDeleted { id: "n1".into() }.event_type(),
            "node:deleted"
        );
        assert_eq!(
            GraphEvent::BackupCreated {
                backup_name: "b".into(),
                file_size: 1
            }
            .event_type(),
            "backup:created"
        );
    }
}
