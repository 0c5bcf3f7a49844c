//! Graph Entity Model
//!
//! Nodes and edges carry an open-ended JSON object as their payload. The store
//! only guarantees that a node payload contains its `id` and that an edge
//! payload contains `id`, `source` and `target`; everything else is preserved
//! verbatim through snapshot and restore.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Opaque entity payload
pub type EntityData = Map<String, Value>;

/// Validation errors for model values built from caller or stored input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error("Unknown audit action: {0}")]
    UnknownAuditAction(String),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Payload is not a JSON object")]
    NotAnObject,
}

/// One element of a [`GraphSnapshot`]; the stored payload wrapped under `data`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphElement {
    pub data: EntityData,
}

/// Full graph read, nodes and edges in creation order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<GraphElement>,
    pub edges: Vec<GraphElement>,
}

impl GraphSnapshot {
    pub fn node_ids(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter_map(|n| n.data.get("id").and_then(Value::as_str))
            .collect()
    }

    pub fn edge_ids(&self) -> Vec<&str> {
        self.edges
            .iter()
            .filter_map(|e| e.data.get("id").and_then(Value::as_str))
            .collect()
    }
}

/// Edge identity as recovered from an audit snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeEndpoints {
    pub source: String,
    pub target: String,
}

impl EdgeEndpoints {
    /// Read `source` and `target` back out of an edge payload
    pub fn from_data(data: &EntityData) -> Result<Self, ValidationError> {
        let field = |name: &str| {
            data.get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| ValidationError::MissingField(name.to_string()))
        };

        Ok(Self {
            source: field("source")?,
            target: field("target")?,
        })
    }
}

/// Payload for a node: caller data with `id` injected
pub fn node_payload(id: &str, mut data: EntityData) -> EntityData {
    data.insert("id".to_string(), Value::String(id.to_string()));
    data
}

/// Payload for an edge: caller data with `id`, `source` and `target` injected
pub fn edge_payload(id: &str, source: &str, target: &str, mut data: EntityData) -> EntityData {
    data.insert("id".to_string(), Value::String(id.to_string()));
    data.insert("source".to_string(), Value::String(source.to_string()));
    data.insert("target".to_string(), Value::String(target.to_string()));
    data
}

/// Interpret a JSON value as an entity payload
pub fn as_entity_data(value: Value) -> Result<EntityData, ValidationError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ValidationError::NotAnObject),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_payload_overrides_caller_id() {
        let data = as_entity_data(json!({"id": "spoofed", "label": "db"})).unwrap();
        let payload = node_payload("n1", data);
        assert_eq!(payload["id"], "n1");
        assert_eq!(payload["label"], "db");
    }

    #[test]
    fn test_edge_payload_carries_endpoints() {
        let payload = edge_payload("e1", "n1", "n2", EntityData::new());
        let endpoints = EdgeEndpoints::from_data(&payload).unwrap();
        assert_eq!(endpoints.source, "n1");
        assert_eq!(endpoints.target, "n2");
        assert_eq!(payload["id"], "e1");
    }

    #[test]
    fn test_endpoints_require_both_fields() {
        let data = as_entity_data(json!({"id": "e1", "source": "n1"})).unwrap();
        assert_eq!(
            EdgeEndpoints::from_data(&data),
            Err(ValidationError::MissingField("target".to_string()))
        );
    }

    #[test]
    fn test_snapshot_serialization_wraps_data() {
        let snapshot = GraphSnapshot {
            nodes: vec![GraphElement {
                data: node_payload("n1", EntityData::new()),
            }],
            edges: vec![],
        };
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value, json!({"nodes": [{"data": {"id": "n1"}}], "edges": []}));
        assert_eq!(snapshot.node_ids(), vec!["n1"]);
    }

    #[test]
    fn test_non_object_payload_rejected() {
        assert_eq!(as_entity_data(json!([1, 2])), Err(ValidationError::NotAnObject));
    }
}
