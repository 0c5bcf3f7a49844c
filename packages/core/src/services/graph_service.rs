//! Graph Service - CRUD over nodes and edges with audit capture
//!
//! Every mutation runs in one transaction together with the audit entries it
//! produces, so a change is never persisted without its history (and a
//! failed audit insert undoes the change). Events are published only after
//! the transaction commits.
//!
//! # Examples
//!
//! ```no_run
//! use gdmon_core::db::{BackupManager, DatabaseService, DEFAULT_BACKUP_DIR};
//! use gdmon_core::models::{AuditActor, EntityData};
//! use gdmon_core::services::GraphService;
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let path = PathBuf::from("./data/graph.db");
//!     let db = Arc::new(DatabaseService::new(path.clone()).await?);
//!     let service = GraphService::new(db, BackupManager::new(&path, DEFAULT_BACKUP_DIR));
//!
//!     let actor = AuditActor::system();
//!     service.add_node("web-1", EntityData::new(), &actor).await?;
//!     service.add_node("db-1", EntityData::new(), &actor).await?;
//!     service.add_edge("web-1->db-1", "web-1", "db-1", EntityData::new(), &actor).await?;
//!     Ok(())
//! }
//! ```

use crate::db::audit_log::{self, NewAuditEntry};
use crate::db::graph_queries as queries;
use crate::db::{
    begin_transaction, finish_transaction, BackupError, BackupInfo, BackupManager,
    DatabaseService, GraphEvent,
};
use crate::models::{
    edge_payload, node_payload, AuditAction, AuditActor, AuditEntry, EntityData, EntityType,
    GraphSnapshot,
};
use crate::services::error::GraphServiceError;
use libsql::Connection;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Capacity of the change-event channel
///
/// Slow subscribers that fall further behind than this receive
/// `RecvError::Lagged` and should reload.
pub const GRAPH_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Entity id under which graph-wide events (backups, restores) are audited
pub const SYSTEM_ENTITY_ID: &str = "graph";

/// Core service for graph mutations and reads
pub struct GraphService {
    db: Arc<DatabaseService>,
    backups: BackupManager,
    event_tx: broadcast::Sender<GraphEvent>,
}

impl GraphService {
    pub fn new(db: Arc<DatabaseService>, backups: BackupManager) -> Self {
        let (event_tx, _) = broadcast::channel(GRAPH_EVENT_CHANNEL_CAPACITY);
        Self {
            db,
            backups,
            event_tx,
        }
    }

    pub fn db(&self) -> &Arc<DatabaseService> {
        &self.db
    }

    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }

    /// Subscribe to change events
    ///
    /// Returns a receiver for every event published after this call.
    pub fn subscribe_to_events(&self) -> broadcast::Receiver<GraphEvent> {
        self.event_tx.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<GraphEvent> {
        self.event_tx.clone()
    }

    /// Having no subscribers is not an error
    pub(crate) fn emit_event(&self, event: GraphEvent) {
        let _ = self.event_tx.send(event);
    }

    // Reads

    pub async fn node_exists(&self, id: &str) -> Result<bool, GraphServiceError> {
        let conn = self.db.connection().await?;
        Ok(queries::node_exists(&conn, id).await?)
    }

    pub async fn get_node(&self, id: &str) -> Result<Option<EntityData>, GraphServiceError> {
        let conn = self.db.connection().await?;
        Ok(queries::fetch_node_data(&conn, id).await?)
    }

    pub async fn edge_exists_by_id(&self, id: &str) -> Result<bool, GraphServiceError> {
        let conn = self.db.connection().await?;
        Ok(queries::edge_exists_by_id(&conn, id).await?)
    }

    /// Whether an edge joins the two nodes in either direction
    pub async fn edge_exists(&self, a: &str, b: &str) -> Result<bool, GraphServiceError> {
        let conn = self.db.connection().await?;
        Ok(queries::edge_exists_between(&conn, a, b).await?)
    }

    /// Full graph, nodes and edges in creation order
    pub async fn get(&self) -> Result<GraphSnapshot, GraphServiceError> {
        let conn = self.db.connection().await?;
        let snapshot = queries::load_snapshot(&conn).await?;
        tracing::debug!(
            nodes = snapshot.nodes.len(),
            edges = snapshot.edges.len(),
            "graph snapshot loaded"
        );
        Ok(snapshot)
    }

    pub async fn audit_history(
        &self,
        entity_type: Option<EntityType>,
        entity_id: Option<&str>,
    ) -> Result<Vec<AuditEntry>, GraphServiceError> {
        let conn = self.db.connection().await?;
        Ok(audit_log::history(&conn, entity_type, entity_id).await?)
    }

    // Node mutations

    /// Create a node; the stored payload is `data` with `id` injected
    pub async fn add_node(
        &self,
        id: &str,
        data: EntityData,
        actor: &AuditActor,
    ) -> Result<EntityData, GraphServiceError> {
        let _guard = self.db.lock_writes().await;
        let conn = self.db.connection().await?;
        let payload = node_payload(id, data);

        begin_transaction(&conn).await?;
        let result = self.add_node_tx(&conn, id, &payload, actor).await;
        finish_transaction(&conn, result).await?;

        tracing::info!(node_id = %id, "node created");
        self.emit_event(GraphEvent::NodeCreated {
            id: id.to_string(),
            data: payload.clone(),
        });
        Ok(payload)
    }

    async fn add_node_tx(
        &self,
        conn: &Connection,
        id: &str,
        payload: &EntityData,
        actor: &AuditActor,
    ) -> Result<(), GraphServiceError> {
        if queries::node_exists(conn, id).await? {
            return Err(GraphServiceError::DuplicateNode { id: id.to_string() });
        }

        let now = self.db.now_timestamp();
        queries::insert_node(conn, id, payload, &now).await?;

        let new_data = Value::Object(payload.clone());
        audit_log::append(
            conn,
            NewAuditEntry {
                entity_type: EntityType::Node,
                entity_id: id,
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

    /// Replace a node's payload, keeping its id
    pub async fn update_node(
        &self,
        id: &str,
        data: EntityData,
        actor: &AuditActor,
    ) -> Result<EntityData, GraphServiceError> {
        let _guard = self.db.lock_writes().await;
        let conn = self.db.connection().await?;
        let payload = node_payload(id, data);

        begin_transaction(&conn).await?;
        let result = self.update_node_tx(&conn, id, &payload, actor).await;
        finish_transaction(&conn, result).await?;

        tracing::info!(node_id = %id, "node updated");
        self.emit_event(GraphEvent::NodeUpdated {
            id: id.to_string(),
            data: payload.clone(),
        });
        Ok(payload)
    }

    async fn update_node_tx(
        &self,
        conn: &Connection,
        id: &str,
        payload: &EntityData,
        actor: &AuditActor,
    ) -> Result<(), GraphServiceError> {
        let previous = queries::fetch_node_data(conn, id)
            .await?
            .ok_or_else(|| GraphServiceError::node_not_found(id))?;

        let now = self.db.now_timestamp();
        queries::update_node_data(conn, id, payload, &now).await?;

        let old_data = Value::Object(previous);
        let new_data = Value::Object(payload.clone());
        audit_log::append(
            conn,
            NewAuditEntry {
                entity_type: EntityType::Node,
                entity_id: id,
                action: AuditAction::Update,
                old_data: Some(&old_data),
                new_data: Some(&new_data),
            },
            actor,
            &now,
        )
        .await?;
        Ok(())
    }

    /// Delete a node and every edge touching it
    ///
    /// Writes one `delete` entry per removed edge, then one for the node, all
    /// in the same transaction. Returns the ids of the removed edges.
    pub async fn remove_node(
        &self,
        id: &str,
        actor: &AuditActor,
    ) -> Result<Vec<String>, GraphServiceError> {
        let _guard = self.db.lock_writes().await;
        let conn = self.db.connection().await?;

        begin_transaction(&conn).await?;
        let result = self.remove_node_tx(&conn, id, actor).await;
        let removed_edges = finish_transaction(&conn, result).await?;

        tracing::info!(
            node_id = %id,
            edges_removed = removed_edges.len(),
            "node deleted"
        );
        for edge_id in &removed_edges {
            self.emit_event(GraphEvent::EdgeDeleted {
                id: edge_id.clone(),
            });
        }
        self.emit_event(GraphEvent::NodeDeleted { id: id.to_string() });
        Ok(removed_edges)
    }

    async fn remove_node_tx(
        &self,
        conn: &Connection,
        id: &str,
        actor: &AuditActor,
    ) -> Result<Vec<String>, GraphServiceError> {
        let previous = queries::fetch_node_data(conn, id)
            .await?
            .ok_or_else(|| GraphServiceError::node_not_found(id))?;

        let now = self.db.now_timestamp();

        let edges = queries::fetch_incident_edges(conn, id).await?;
        queries::delete_incident_edges(conn, id).await?;
        let removed = self
            .audit_edge_deletes(conn, edges, actor, AuditAction::Delete, &now)
            .await?;

        queries::delete_node_row(conn, id).await?;

        let old_data = Value::Object(previous);
        audit_log::append(
            conn,
            NewAuditEntry {
                entity_type: EntityType::Node,
                entity_id: id,
                action: AuditAction::Delete,
                old_data: Some(&old_data),
                new_data: None,
            },
            actor,
            &now,
        )
        .await?;

        Ok(removed)
    }

    /// One audit entry per already-deleted edge, tagged with `action`
    pub(crate) async fn audit_edge_deletes(
        &self,
        conn: &Connection,
        edges: Vec<(String, EntityData)>,
        actor: &AuditActor,
        action: AuditAction,
        now: &str,
    ) -> Result<Vec<String>, GraphServiceError> {
        let mut removed = Vec::with_capacity(edges.len());
        for (edge_id, edge_data) in edges {
            let old_data = Value::Object(edge_data);
            audit_log::append(
                conn,
                NewAuditEntry {
                    entity_type: EntityType::Edge,
                    entity_id: &edge_id,
                    action,
                    old_data: Some(&old_data),
                    new_data: None,
                },
                actor,
                now,
            )
            .await?;
            removed.push(edge_id);
        }
        Ok(removed)
    }

    // Edge mutations

    /// Create an edge between two existing nodes
    ///
    /// The stored payload carries `id`, `source` and `target` so the edge can
    /// be rebuilt from its audit snapshot alone.
    pub async fn add_edge(
        &self,
        id: &str,
        source: &str,
        target: &str,
        data: EntityData,
        actor: &AuditActor,
    ) -> Result<EntityData, GraphServiceError> {
        let _guard = self.db.lock_writes().await;
        let conn = self.db.connection().await?;
        let payload = edge_payload(id, source, target, data);

        begin_transaction(&conn).await?;
        let result = self
            .add_edge_tx(&conn, id, source, target, &payload, actor)
            .await;
        finish_transaction(&conn, result).await?;

        tracing::info!(edge_id = %id, source = %source, target = %target, "edge created");
        self.emit_event(GraphEvent::EdgeCreated {
            id: id.to_string(),
            source: source.to_string(),
            target: target.to_string(),
        });
        Ok(payload)
    }

    async fn add_edge_tx(
        &self,
        conn: &Connection,
        id: &str,
        source: &str,
        target: &str,
        payload: &EntityData,
        actor: &AuditActor,
    ) -> Result<(), GraphServiceError> {
        if queries::edge_exists_by_id(conn, id).await? {
            return Err(GraphServiceError::DuplicateEdge { id: id.to_string() });
        }
        for endpoint in [source, target] {
            if !queries::node_exists(conn, endpoint).await? {
                return Err(GraphServiceError::missing_endpoint(id, endpoint));
            }
        }

        let now = self.db.now_timestamp();
        queries::insert_edge(conn, id, source, target, payload, &now).await?;

        let new_data = Value::Object(payload.clone());
        audit_log::append(
            conn,
            NewAuditEntry {
                entity_type: EntityType::Edge,
                entity_id: id,
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

    pub async fn remove_edge(&self, id: &str, actor: &AuditActor) -> Result<(), GraphServiceError> {
        let _guard = self.db.lock_writes().await;
        let conn = self.db.connection().await?;

        begin_transaction(&conn).await?;
        let result = self.remove_edge_tx(&conn, id, actor).await;
        finish_transaction(&conn, result).await?;

        tracing::info!(edge_id = %id, "edge deleted");
        self.emit_event(GraphEvent::EdgeDeleted { id: id.to_string() });
        Ok(())
    }

    async fn remove_edge_tx(
        &self,
        conn: &Connection,
        id: &str,
        actor: &AuditActor,
    ) -> Result<(), GraphServiceError> {
        let previous = queries::fetch_edge_data(conn, id)
            .await?
            .ok_or_else(|| GraphServiceError::edge_not_found(id))?;

        let now = self.db.now_timestamp();
        queries::delete_edge_row(conn, id).await?;
        self.audit_edge_deletes(
            conn,
            vec![(id.to_string(), previous)],
            actor,
            AuditAction::Delete,
            &now,
        )
        .await?;
        Ok(())
    }

    /// Delete every edge leaving `source`
    ///
    /// Succeeds with an empty list when nothing matched.
    pub async fn remove_edges_from(
        &self,
        source: &str,
        actor: &AuditActor,
    ) -> Result<Vec<String>, GraphServiceError> {
        let _guard = self.db.lock_writes().await;
        let conn = self.db.connection().await?;

        begin_transaction(&conn).await?;
        let result = self.remove_edges_from_tx(&conn, source, actor).await;
        let removed = finish_transaction(&conn, result).await?;

        tracing::info!(source = %source, edges_removed = removed.len(), "outgoing edges deleted");
        for edge_id in &removed {
            self.emit_event(GraphEvent::EdgeDeleted {
                id: edge_id.clone(),
            });
        }
        Ok(removed)
    }

    async fn remove_edges_from_tx(
        &self,
        conn: &Connection,
        source: &str,
        actor: &AuditActor,
    ) -> Result<Vec<String>, GraphServiceError> {
        let edges = queries::fetch_edges_from(conn, source).await?;
        if edges.is_empty() {
            return Ok(Vec::new());
        }

        let now = self.db.now_timestamp();
        queries::delete_edges_from(conn, source).await?;
        self.audit_edge_deletes(conn, edges, actor, AuditAction::Delete, &now)
            .await
    }

    // Audit and backups

    /// Append a caller-supplied audit entry
    pub async fn audit_log(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        action: AuditAction,
        old_data: Option<&Value>,
        new_data: Option<&Value>,
        actor: &AuditActor,
    ) -> Result<i64, GraphServiceError> {
        let _guard = self.db.lock_writes().await;
        let conn = self.db.connection().await?;
        let now = self.db.now_timestamp();

        let id = audit_log::append(
            &conn,
            NewAuditEntry {
                entity_type,
                entity_id,
                action,
                old_data,
                new_data,
            },
            actor,
            &now,
        )
        .await?;
        Ok(id)
    }

    /// Copy the storage file to a named backup and audit it
    pub async fn create_backup(
        &self,
        name: Option<&str>,
        actor: &AuditActor,
    ) -> Result<BackupInfo, BackupError> {
        let _guard = self.db.lock_writes().await;
        self.create_backup_locked(name, actor).await
    }

    /// Backup for callers already holding the write lock
    pub(crate) async fn create_backup_locked(
        &self,
        name: Option<&str>,
        actor: &AuditActor,
    ) -> Result<BackupInfo, BackupError> {
        let info = self.backups.create_backup(&self.db, name).await?;

        // The file is on disk either way; a failed audit insert is reported, not fatal
        if let Err(e) = self.audit_backup(&info, actor).await {
            tracing::error!(
                backup_name = %info.backup_name,
                error = %e,
                "failed to audit backup"
            );
        }

        self.emit_event(GraphEvent::BackupCreated {
            backup_name: info.backup_name.clone(),
            file_size: info.file_size,
        });
        Ok(info)
    }

    async fn audit_backup(
        &self,
        info: &BackupInfo,
        actor: &AuditActor,
    ) -> Result<(), GraphServiceError> {
        let conn = self.db.connection().await?;
        let new_data = json!({
            "backup_file": info.file.display().to_string(),
            "backup_name": info.backup_name,
            "file_size": info.file_size,
        });
        audit_log::append(
            &conn,
            NewAuditEntry {
                entity_type: EntityType::System,
                entity_id: SYSTEM_ENTITY_ID,
                action: AuditAction::Backup,
                old_data: None,
                new_data: Some(&new_data),
            },
            actor,
            &self.db.now_timestamp(),
        )
        .await?;
        Ok(())
    }
}
