//! Status Service - append-only node status history

use crate::db::audit_log::{self, NewAuditEntry};
use crate::db::{begin_transaction, finish_transaction, graph_queries, status_queries};
use crate::db::{DatabaseService, GraphEvent};
use crate::models::{AuditAction, AuditActor, EntityType, NodeStatus, StatusValue};
use crate::services::error::GraphServiceError;
use libsql::Connection;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::broadcast;

pub struct StatusService {
    db: Arc<DatabaseService>,
    event_tx: broadcast::Sender<GraphEvent>,
}

impl StatusService {
    pub fn new(db: Arc<DatabaseService>, event_tx: broadcast::Sender<GraphEvent>) -> Self {
        Self { db, event_tx }
    }

    pub fn allowed_statuses() -> &'static [StatusValue] {
        &StatusValue::ALL
    }

    /// Append a status row for an existing node
    pub async fn set_status(
        &self,
        node_id: &str,
        status: StatusValue,
        actor: &AuditActor,
    ) -> Result<(), GraphServiceError> {
        let _guard = self.db.lock_writes().await;
        let conn = self.db.connection().await?;

        begin_transaction(&conn).await?;
        let result = self.set_status_tx(&conn, node_id, status, actor).await;
        finish_transaction(&conn, result).await?;

        tracing::info!(node_id = %node_id, status = %status, "node status set");
        let _ = self.event_tx.send(GraphEvent::StatusChanged {
            node_id: node_id.to_string(),
            status,
        });
        Ok(())
    }

    async fn set_status_tx(
        &self,
        conn: &Connection,
        node_id: &str,
        status: StatusValue,
        actor: &AuditActor,
    ) -> Result<(), GraphServiceError> {
        if !graph_queries::node_exists(conn, node_id).await? {
            return Err(GraphServiceError::node_not_found(node_id));
        }

        let now = self.db.now_timestamp();
        status_queries::insert_status(conn, node_id, status, &now).await?;

        let new_data = json!({ "status": status.as_str() });
        audit_log::append(
            conn,
            NewAuditEntry {
                entity_type: EntityType::NodeStatus,
                entity_id: node_id,
                action: AuditAction::Create,
                old_data: None,
                new_data: Some(&new_data),
            },
            actor,
            &now,
        )
        .await?;
        Ok(())
    }

    pub async fn current(&self, node_id: &str) -> Result<Option<NodeStatus>, GraphServiceError> {
        let conn = self.db.connection().await?;
        Ok(status_queries::current(&conn, node_id).await?)
    }

    /// Every status row for the node, newest first
    pub async fn history(&self, node_id: &str) -> Result<Vec<NodeStatus>, GraphServiceError> {
        let conn = self.db.connection().await?;
        Ok(status_queries::history(&conn, node_id).await?)
    }

    pub async fn all_current(&self) -> Result<Vec<NodeStatus>, GraphServiceError> {
        let conn = self.db.connection().await?;
        Ok(status_queries::all_current(&conn).await?)
    }
}
